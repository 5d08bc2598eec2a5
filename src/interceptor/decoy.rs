//! Decoy-prefix obfuscators
//!
//! Before real traffic reaches a destination, a burst of random-sized,
//! random-delayed packets filled from the OS CSPRNG is sent to it through
//! the relay socket. The real payload is always forwarded afterwards.
//!
//! Two scopes exist:
//! - first session: only the first payload relayed through the factory
//!   ever is prefixed, no matter how many sessions follow
//! - session: the first payload to each destination of a session is
//!   prefixed

use super::{DatagramInterceptor, InterceptorFactory};
use crate::config::DecoySettings;
use crate::error::{ProxyError, Result};
use crate::pool::BufferPool;
use crate::socks::{Datagram, Endpoint};
use crate::transport::DatagramSocket;
use async_trait::async_trait;
use rand::rngs::OsRng;
use rand::{Rng, RngCore};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

pub(super) const FIRST_SESSION_NAME: &str = "random-first-session-prefix";
pub(super) const SESSION_NAME: &str = "random-session-prefix";

pub(super) fn build_first_session(
    settings: &DecoySettings,
    pool: &BufferPool,
) -> Result<Arc<dyn InterceptorFactory>> {
    Ok(Arc::new(FirstSessionPrefixFactory::new(*settings, pool.clone())?))
}

pub(super) fn build_session(
    settings: &DecoySettings,
    pool: &BufferPool,
) -> Result<Arc<dyn InterceptorFactory>> {
    Ok(Arc::new(SessionPrefixFactory::new(*settings, pool.clone())?))
}

fn validated(settings: DecoySettings) -> Result<DecoySettings> {
    settings
        .validate()
        .map_err(|e| ProxyError::Config(format!("Invalid decoy settings: {}", e)))?;
    Ok(settings)
}

#[derive(Debug)]
enum Scope {
    /// Shared by every interceptor of one factory
    FirstSession(Arc<AtomicBool>),
    /// Destinations already prefixed in this session
    ///
    /// Holds one entry per distinct destination until the session ends.
    PerDestination(Mutex<HashSet<Endpoint>>),
}

impl Scope {
    /// Returns true exactly once per scope key
    fn claim(&self, destination: &Endpoint) -> bool {
        match self {
            Scope::FirstSession(sent) => !sent.swap(true, Ordering::AcqRel),
            Scope::PerDestination(seen) => match seen.lock() {
                Ok(mut seen) => seen.insert(destination.clone()),
                Err(poisoned) => poisoned.into_inner().insert(destination.clone()),
            },
        }
    }

    /// Undo a claim whose burst could not be sent
    fn release(&self, destination: &Endpoint) {
        match self {
            Scope::FirstSession(sent) => sent.store(false, Ordering::Release),
            Scope::PerDestination(seen) => {
                let mut seen = seen.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                seen.remove(destination);
            }
        }
    }
}

/// Interceptor that sends decoys ahead of the first real payload
#[derive(Debug)]
pub struct DecoyPrefixInterceptor {
    settings: DecoySettings,
    pool: BufferPool,
    scope: Scope,
}

impl DecoyPrefixInterceptor {
    async fn send_decoys(&self, destination: &Endpoint, relay: &dyn DatagramSocket) -> Result<u32> {
        let count = OsRng.gen_range(self.settings.count());
        let mut buf = self.pool.rent(self.settings.bytes_max);

        for i in 0..count {
            let size = OsRng.gen_range(self.settings.bytes());
            let delay = OsRng.gen_range(self.settings.delay_ms());
            OsRng.fill_bytes(&mut buf[..size]);

            tokio::time::sleep(Duration::from_millis(delay)).await;

            debug!(
                "Sending decoy {}/{} to {}: {} bytes delayed {}ms",
                i + 1,
                count,
                destination,
                size,
                delay
            );
            relay.send_to(&buf[..size], destination).await?;
        }
        Ok(count)
    }
}

#[async_trait]
impl DatagramInterceptor for DecoyPrefixInterceptor {
    async fn try_intercept_outgoing(
        &self,
        _payload: &[u8],
        destination: &Endpoint,
        relay: &dyn DatagramSocket,
    ) -> Result<bool> {
        if !self.scope.claim(destination) {
            return Ok(false);
        }

        match self.send_decoys(destination, relay).await {
            Ok(count) => debug!("Sent {} decoys ahead of first payload to {}", count, destination),
            Err(e) => {
                warn!("Failed to send decoys to {}: {}", destination, e);
                self.scope.release(destination);
            }
        }
        Ok(false)
    }

    async fn try_intercept_incoming(
        &self,
        _datagram: &Datagram<'_>,
        _bound: &dyn DatagramSocket,
    ) -> Result<bool> {
        Ok(false)
    }
}

/// Prefixes only the first payload relayed through any of its interceptors
#[derive(Debug)]
pub struct FirstSessionPrefixFactory {
    settings: DecoySettings,
    pool: BufferPool,
    sent: Arc<AtomicBool>,
}

impl FirstSessionPrefixFactory {
    /// Validate `settings` and create the factory
    pub fn new(settings: DecoySettings, pool: BufferPool) -> Result<Self> {
        Ok(FirstSessionPrefixFactory {
            settings: validated(settings)?,
            pool,
            sent: Arc::new(AtomicBool::new(false)),
        })
    }
}

impl InterceptorFactory for FirstSessionPrefixFactory {
    fn name(&self) -> &'static str {
        FIRST_SESSION_NAME
    }

    fn create(&self) -> Box<dyn DatagramInterceptor> {
        Box::new(DecoyPrefixInterceptor {
            settings: self.settings,
            pool: self.pool.clone(),
            scope: Scope::FirstSession(self.sent.clone()),
        })
    }
}

/// Prefixes the first payload to each destination of every session
#[derive(Debug)]
pub struct SessionPrefixFactory {
    settings: DecoySettings,
    pool: BufferPool,
}

impl SessionPrefixFactory {
    /// Validate `settings` and create the factory
    pub fn new(settings: DecoySettings, pool: BufferPool) -> Result<Self> {
        Ok(SessionPrefixFactory {
            settings: validated(settings)?,
            pool,
        })
    }
}

impl InterceptorFactory for SessionPrefixFactory {
    fn name(&self) -> &'static str {
        SESSION_NAME
    }

    fn create(&self) -> Box<dyn DatagramInterceptor> {
        Box::new(DecoyPrefixInterceptor {
            settings: self.settings,
            pool: self.pool.clone(),
            scope: Scope::PerDestination(Mutex::new(HashSet::new())),
        })
    }
}
