//! Proxy contracts and the default factory
//!
//! A proxy is built from a parsed SOCKS command before the reply is sent,
//! and then run to completion against the client stream.

use super::tcp_proxy::TcpProxy;
use super::udp_proxy::UdpProxy;
use crate::interceptor::InterceptorFactory;
use crate::pool::BufferPool;
use crate::socks::Endpoint;
use crate::transport::{ClientStream, Connector};
use anyhow::Result;
use async_trait::async_trait;
use std::fmt::Debug;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A ready-to-run relay for one SOCKS command
#[async_trait]
pub trait Proxy: Debug + Send {
    /// Endpoint reported to the client in the success reply
    fn bind_endpoint(&self) -> Endpoint;

    /// Relay until either side is done or `cancel` fires
    async fn run(self: Box<Self>, client: &mut dyn ClientStream, cancel: CancellationToken)
        -> Result<()>;
}

/// Builds proxies for dispatched commands
#[async_trait]
pub trait ProxyFactory: Debug + Send + Sync {
    /// Build a CONNECT relay to `destination`
    async fn create_tcp_proxy(&self, destination: &Endpoint) -> Result<Box<dyn Proxy>>;

    /// Build a UDP ASSOCIATE relay for a control connection
    ///
    /// `control_local` and `control_peer` are the local and remote
    /// endpoints of the client's TCP control stream.
    async fn create_udp_proxy(
        &self,
        control_local: SocketAddr,
        control_peer: SocketAddr,
    ) -> Result<Box<dyn Proxy>>;
}

/// Factory wiring proxies to a [`Connector`] and an [`InterceptorFactory`]
#[derive(Debug, Clone)]
pub struct DefaultProxyFactory {
    connector: Arc<dyn Connector>,
    interceptors: Arc<dyn InterceptorFactory>,
    pool: BufferPool,
}

impl DefaultProxyFactory {
    /// Create a new factory
    pub fn new(
        connector: Arc<dyn Connector>,
        interceptors: Arc<dyn InterceptorFactory>,
        pool: BufferPool,
    ) -> Self {
        DefaultProxyFactory {
            connector,
            interceptors,
            pool,
        }
    }
}

#[async_trait]
impl ProxyFactory for DefaultProxyFactory {
    async fn create_tcp_proxy(&self, destination: &Endpoint) -> Result<Box<dyn Proxy>> {
        let proxy = TcpProxy::connect(self.connector.as_ref(), destination, self.pool.clone()).await?;
        Ok(Box::new(proxy))
    }

    async fn create_udp_proxy(
        &self,
        control_local: SocketAddr,
        control_peer: SocketAddr,
    ) -> Result<Box<dyn Proxy>> {
        let proxy = UdpProxy::bind(
            self.connector.as_ref(),
            self.interceptors.create(),
            control_local,
            control_peer,
            self.pool.clone(),
        )
        .await?;
        Ok(Box::new(proxy))
    }
}
