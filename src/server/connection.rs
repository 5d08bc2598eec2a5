//! Per-client SOCKS5 state machine
//!
//! A connection negotiates the method, reads one command, builds the
//! matching proxy and runs it. Every failure after negotiation is answered
//! with a reply carrying the best-fitting code, and none of them escape to
//! the server.

use super::proxy::{Proxy, ProxyFactory};
use crate::error::{ProxyError, ReplyCode, Result, Socks5Error};
use crate::pool::BufferPool;
use crate::socks::{AuthMethod, Command, CommandReply, Greeting, GreetingReply, SocksCommand};
use crate::transport::ClientStream;
use anyhow::Context;
use async_trait::async_trait;
use std::fmt::{self, Debug};
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Protocol progress of one connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Waiting for the client greeting
    Greeting,
    /// Method negotiated, waiting for the command
    Negotiated,
    /// Command read, building the proxy
    Dispatching,
    /// Proxy running
    Proxying,
    /// Finished or disposed
    Terminated,
}

/// A client connection owned by the server
#[async_trait]
pub trait Connection: Debug + Send + Sync {
    /// Start handling the client; fails if started or disposed before
    async fn start(&self) -> Result<()>;

    /// Cancel handling and wait for it to finish
    async fn dispose(&self);

    /// Whether the connection has finished
    fn is_terminated(&self) -> bool;
}

/// Creates connections for accepted client streams
pub trait ConnectionFactory: Debug + Send + Sync {
    /// Wrap `stream`; the connection is cancelled along with `shutdown`
    fn create(&self, stream: Box<dyn ClientStream>, shutdown: &CancellationToken)
        -> Arc<dyn Connection>;
}

enum Lifecycle {
    Idle(Box<dyn ClientStream>),
    Running(JoinHandle<()>),
    Disposed,
}

/// SOCKS5 connection
pub struct SocksConnection {
    id: u64,
    peer: Option<SocketAddr>,
    lifecycle: Mutex<Lifecycle>,
    cancel: CancellationToken,
    state: Arc<watch::Sender<ConnectionState>>,
    proxies: Arc<dyn ProxyFactory>,
    pool: BufferPool,
}

impl SocksConnection {
    /// Wrap an accepted client stream
    pub fn new(
        id: u64,
        stream: Box<dyn ClientStream>,
        proxies: Arc<dyn ProxyFactory>,
        pool: BufferPool,
        cancel: CancellationToken,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Greeting);
        SocksConnection {
            id,
            peer: stream.peer_addr().ok(),
            lifecycle: Mutex::new(Lifecycle::Idle(stream)),
            cancel,
            state: Arc::new(state),
            proxies,
            pool,
        }
    }

    /// Connection id, unique per factory
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Watch the protocol state
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }
}

impl Debug for SocksConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocksConnection")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Connection for SocksConnection {
    async fn start(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock().await;
        match std::mem::replace(&mut *lifecycle, Lifecycle::Disposed) {
            Lifecycle::Idle(stream) => {
                let handler = Handler {
                    cancel: self.cancel.clone(),
                    state: self.state.clone(),
                    proxies: self.proxies.clone(),
                    pool: self.pool.clone(),
                };
                let span = match self.peer {
                    Some(peer) => info_span!("connection", id = self.id, peer = %peer),
                    None => info_span!("connection", id = self.id),
                };
                *lifecycle = Lifecycle::Running(tokio::spawn(handler.serve(stream).instrument(span)));
                Ok(())
            }
            Lifecycle::Running(handle) => {
                *lifecycle = Lifecycle::Running(handle);
                Err(ProxyError::InvalidOperation(
                    "connection already started".to_string(),
                ))
            }
            Lifecycle::Disposed => Err(ProxyError::Disposed("connection")),
        }
    }

    async fn dispose(&self) {
        let mut lifecycle = self.lifecycle.lock().await;
        self.cancel.cancel();
        match std::mem::replace(&mut *lifecycle, Lifecycle::Disposed) {
            Lifecycle::Running(handle) => {
                if let Err(e) = handle.await {
                    debug!("Connection {} task ended abnormally: {}", self.id, e);
                }
            }
            Lifecycle::Idle(stream) => drop(stream),
            Lifecycle::Disposed => {}
        }
        self.state.send_replace(ConnectionState::Terminated);
    }

    fn is_terminated(&self) -> bool {
        *self.state.borrow() == ConnectionState::Terminated
    }
}

/// State moved into the handling task
struct Handler {
    cancel: CancellationToken,
    state: Arc<watch::Sender<ConnectionState>>,
    proxies: Arc<dyn ProxyFactory>,
    pool: BufferPool,
}

impl Handler {
    async fn serve(self, mut stream: Box<dyn ClientStream>) {
        debug!("Connection accepted");

        let result = tokio::select! {
            _ = self.cancel.cancelled() => Ok(()),
            result = self.handle(stream.as_mut()) => result,
        };
        if let Err(e) = result {
            warn!("Connection error: {:#}", e);
        }

        drop(stream);
        self.state.send_replace(ConnectionState::Terminated);
        info!("Connection terminated");
    }

    async fn handle(&self, stream: &mut dyn ClientStream) -> anyhow::Result<()> {
        let greeting = Greeting::read_from(stream, &self.pool)
            .await
            .context("Failed to read greeting")?;

        if !greeting.offers(AuthMethod::None) {
            warn!(
                "No acceptable authentication methods offered: {:?}",
                greeting.methods
            );
            GreetingReply::new(AuthMethod::NoAcceptableMethods)
                .write_to(stream, &self.pool)
                .await?;
            return Ok(());
        }
        GreetingReply::new(AuthMethod::None)
            .write_to(stream, &self.pool)
            .await?;
        self.state.send_replace(ConnectionState::Negotiated);

        let proxy = match self.dispatch(stream).await {
            Ok(proxy) => proxy,
            Err(e) => {
                let reply = failure_reply(&e);
                CommandReply::failure(reply)
                    .write_to(stream, &self.pool)
                    .await?;
                return Ok(());
            }
        };

        let bind = proxy.bind_endpoint();
        CommandReply::new(ReplyCode::Succeeded, bind)
            .write_to(stream, &self.pool)
            .await?;
        self.state.send_replace(ConnectionState::Proxying);

        proxy.run(stream, self.cancel.clone()).await
    }

    async fn dispatch(&self, stream: &mut dyn ClientStream) -> anyhow::Result<Box<dyn Proxy>> {
        let command = Command::read_from(stream, &self.pool).await?;
        self.state.send_replace(ConnectionState::Dispatching);
        info!("SOCKS5 {} request to {}", command.command, command.endpoint);

        match command.command {
            SocksCommand::Connect => self.proxies.create_tcp_proxy(&command.endpoint).await,
            SocksCommand::UdpAssociate => {
                let local = stream.local_addr()?;
                let peer = stream.peer_addr()?;
                self.proxies.create_udp_proxy(local, peer).await
            }
            SocksCommand::Bind => {
                Err(Socks5Error::CommandNotSupported(SocksCommand::Bind.to_byte()).into())
            }
        }
    }
}

/// Reply code for a failed dispatch, logging by error class
fn failure_reply(error: &anyhow::Error) -> ReplyCode {
    if let Some(protocol) = error.chain().find_map(|c| c.downcast_ref::<Socks5Error>()) {
        warn!("Protocol error: {}", protocol);
        return protocol.reply_code().unwrap_or(ReplyCode::GeneralFailure);
    }

    if error.chain().any(|c| c.is::<io::Error>()) {
        warn!("Network error: {:#}", error);
    } else {
        error!("Connection error: {:#}", error);
    }
    ReplyCode::GeneralFailure
}

/// Factory numbering connections from one
#[derive(Debug)]
pub struct DefaultConnectionFactory {
    proxies: Arc<dyn ProxyFactory>,
    pool: BufferPool,
    next_id: AtomicU64,
}

impl DefaultConnectionFactory {
    /// Create a new factory
    pub fn new(proxies: Arc<dyn ProxyFactory>, pool: BufferPool) -> Self {
        DefaultConnectionFactory {
            proxies,
            pool,
            next_id: AtomicU64::new(1),
        }
    }
}

impl ConnectionFactory for DefaultConnectionFactory {
    fn create(
        &self,
        stream: Box<dyn ClientStream>,
        shutdown: &CancellationToken,
    ) -> Arc<dyn Connection> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        Arc::new(SocksConnection::new(
            id,
            stream,
            self.proxies.clone(),
            self.pool.clone(),
            shutdown.child_token(),
        ))
    }
}
