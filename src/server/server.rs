//! Accept loop and connection registry

use super::connection::{Connection, ConnectionFactory};
use crate::error::{ProxyError, Result};
use crate::transport::Listener;
use futures::future::join_all;
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

type Registry = Arc<StdMutex<Vec<Arc<dyn Connection>>>>;

enum Lifecycle {
    Idle,
    Running(JoinHandle<()>),
    Disposed,
}

/// SOCKS5 server
///
/// Accepts clients from a [`Listener`] and hands each one to a
/// [`Connection`] built by the injected factory. Disposing the server
/// stops the accept loop first and then disposes every tracked connection.
pub struct SocksServer {
    listener: Arc<dyn Listener>,
    factory: Arc<dyn ConnectionFactory>,
    cancel: CancellationToken,
    lifecycle: Mutex<Lifecycle>,
    connections: Registry,
}

impl SocksServer {
    /// Create a server; nothing is accepted until [`start`](Self::start)
    pub fn new(listener: Arc<dyn Listener>, factory: Arc<dyn ConnectionFactory>) -> Self {
        SocksServer {
            listener,
            factory,
            cancel: CancellationToken::new(),
            lifecycle: Mutex::new(Lifecycle::Idle),
            connections: Arc::new(StdMutex::new(Vec::new())),
        }
    }

    /// Start accepting clients
    pub async fn start(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock().await;
        match *lifecycle {
            Lifecycle::Idle => {}
            Lifecycle::Running(_) => {
                return Err(ProxyError::InvalidOperation(
                    "server already started".to_string(),
                ))
            }
            Lifecycle::Disposed => return Err(ProxyError::Disposed("server")),
        }

        match self.listener.local_addr() {
            Ok(addr) => info!("SOCKS5 server listening on {}", addr),
            Err(_) => info!("SOCKS5 server started"),
        }

        let handle = tokio::spawn(accept_loop(
            self.listener.clone(),
            self.factory.clone(),
            self.connections.clone(),
            self.cancel.clone(),
        ));
        *lifecycle = Lifecycle::Running(handle);
        Ok(())
    }

    /// Stop accepting, then dispose every connection
    pub async fn dispose(&self) {
        let mut lifecycle = self.lifecycle.lock().await;
        self.cancel.cancel();

        match std::mem::replace(&mut *lifecycle, Lifecycle::Disposed) {
            Lifecycle::Running(handle) => {
                if let Err(e) = handle.await {
                    debug!("Accept loop ended abnormally: {}", e);
                }
            }
            Lifecycle::Idle => {}
            Lifecycle::Disposed => return,
        }

        let connections = std::mem::take(&mut *lock(&self.connections));
        debug!("Disposing {} connections", connections.len());
        join_all(connections.iter().map(|c| c.dispose())).await;
        info!("SOCKS5 server stopped");
    }

    /// Address clients connect to
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Tracked connections that have not terminated
    pub fn connection_count(&self) -> usize {
        lock(&self.connections)
            .iter()
            .filter(|c| !c.is_terminated())
            .count()
    }
}

impl std::fmt::Debug for SocksServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocksServer")
            .field("listener", &self.listener)
            .field("connections", &self.connection_count())
            .finish_non_exhaustive()
    }
}

fn lock(registry: &Registry) -> MutexGuard<'_, Vec<Arc<dyn Connection>>> {
    registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Accept errors that mean the listener was shut down
fn is_listener_closed(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::BrokenPipe | io::ErrorKind::NotConnected)
}

async fn accept_loop(
    listener: Arc<dyn Listener>,
    factory: Arc<dyn ConnectionFactory>,
    connections: Registry,
    cancel: CancellationToken,
) {
    loop {
        let accepted = tokio::select! {
            _ = cancel.cancelled() => break,
            accepted = listener.accept() => accepted,
        };

        let stream = match accepted {
            Ok(stream) => stream,
            Err(e) if is_listener_closed(&e) => {
                debug!("Listener closed: {}", e);
                break;
            }
            Err(e) => {
                error!("Unhandled error in listener loop: {}", e);
                break;
            }
        };

        let connection = factory.create(stream, &cancel);
        {
            let mut tracked = lock(&connections);
            tracked.retain(|c| !c.is_terminated());
            tracked.push(connection.clone());
        }

        if let Err(e) = connection.start().await {
            warn!("Failed to start connection: {}", e);
        }
    }
    debug!("Accept loop finished");
}
