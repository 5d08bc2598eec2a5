//! Datagram interceptors
//!
//! An interceptor sees every datagram the UDP relay forwards and may alter
//! the shape of the traffic, e.g. by injecting decoy packets. Interceptors
//! are selected by name from a static registry; each UDP session gets its
//! own instance from the selected [`InterceptorFactory`].

mod decoy;
mod passthrough;

pub use decoy::{DecoyPrefixInterceptor, FirstSessionPrefixFactory, SessionPrefixFactory};
pub use passthrough::{PassthroughFactory, PassthroughInterceptor};

use crate::config::{DecoySettings, UdpConfig};
use crate::error::{ProxyError, Result};
use crate::pool::BufferPool;
use crate::socks::{Datagram, Endpoint};
use crate::transport::DatagramSocket;
use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;

/// Hooks invoked by the UDP relay for every datagram
///
/// Returning `true` means the interceptor handled the datagram and the
/// relay must not forward it.
#[async_trait]
pub trait DatagramInterceptor: Debug + Send + Sync {
    /// Called before forwarding `payload` to `destination` through `relay`
    async fn try_intercept_outgoing(
        &self,
        payload: &[u8],
        destination: &Endpoint,
        relay: &dyn DatagramSocket,
    ) -> Result<bool>;

    /// Called before forwarding `datagram` to the client through `bound`
    async fn try_intercept_incoming(
        &self,
        datagram: &Datagram<'_>,
        bound: &dyn DatagramSocket,
    ) -> Result<bool>;
}

/// Creates one interceptor per UDP session
pub trait InterceptorFactory: Debug + Send + Sync {
    /// Registry name of the interceptors produced
    fn name(&self) -> &'static str;

    /// Create the interceptor for a new session
    fn create(&self) -> Box<dyn DatagramInterceptor>;
}

type Constructor = fn(&DecoySettings, &BufferPool) -> Result<Arc<dyn InterceptorFactory>>;

/// Registry entry
pub struct InterceptorDescriptor {
    /// Name used in configuration
    pub name: &'static str,
    /// One-line summary
    pub description: &'static str,
    constructor: Constructor,
}

impl InterceptorDescriptor {
    /// Build the factory for this entry
    pub fn build(
        &self,
        settings: &DecoySettings,
        pool: &BufferPool,
    ) -> Result<Arc<dyn InterceptorFactory>> {
        (self.constructor)(settings, pool)
    }
}

impl Debug for InterceptorDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptorDescriptor")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish()
    }
}

/// Every available interceptor
pub static INTERCEPTORS: &[InterceptorDescriptor] = &[
    InterceptorDescriptor {
        name: passthrough::NAME,
        description: "Forward datagrams unchanged",
        constructor: passthrough::build,
    },
    InterceptorDescriptor {
        name: decoy::FIRST_SESSION_NAME,
        description: "Send random decoys before the first datagram of the first session",
        constructor: decoy::build_first_session,
    },
    InterceptorDescriptor {
        name: decoy::SESSION_NAME,
        description: "Send random decoys before the first datagram to each destination of a session",
        constructor: decoy::build_session,
    },
];

/// Look up a registry entry
pub fn find(name: &str) -> Option<&'static InterceptorDescriptor> {
    INTERCEPTORS.iter().find(|d| d.name.eq_ignore_ascii_case(name))
}

/// Registered names
pub fn names() -> impl Iterator<Item = &'static str> {
    INTERCEPTORS.iter().map(|d| d.name)
}

/// Build the factory selected by `config`
pub fn create_factory(config: &UdpConfig, pool: &BufferPool) -> Result<Arc<dyn InterceptorFactory>> {
    let descriptor = find(&config.interceptor).ok_or_else(|| {
        ProxyError::Config(format!("Unknown UDP interceptor '{}'", config.interceptor))
    })?;
    descriptor.build(&config.decoy, pool)
}
