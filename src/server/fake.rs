//! Proxy doubles for connection and server tests

use super::proxy::{Proxy, ProxyFactory};
use crate::socks::Endpoint;
use crate::transport::ClientStream;
use anyhow::Result;
use async_trait::async_trait;
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

/// Proxy echoing the client back to itself until EOF
#[derive(Debug)]
pub(crate) struct EchoProxy;

pub(crate) const ECHO_BIND: &str = "10.0.0.1:8080";

#[async_trait]
impl Proxy for EchoProxy {
    fn bind_endpoint(&self) -> Endpoint {
        ECHO_BIND.parse::<SocketAddr>().map(Endpoint::from).unwrap_or_default()
    }

    async fn run(self: Box<Self>, client: &mut dyn ClientStream, cancel: CancellationToken) -> Result<()> {
        let mut buf = [0u8; 256];
        loop {
            let n = tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                n = client.read(&mut buf) => n?,
            };
            if n == 0 {
                return Ok(());
            }
            client.write_all(&buf[..n]).await?;
        }
    }
}

/// Factory recording requests and handing out [`EchoProxy`]
#[derive(Debug, Default)]
pub(crate) struct FakeProxyFactory {
    pub(crate) fail_with: Option<io::ErrorKind>,
    pub(crate) requests: Arc<Mutex<Vec<Endpoint>>>,
    pub(crate) associations: Arc<Mutex<Vec<(SocketAddr, SocketAddr)>>>,
}

impl FakeProxyFactory {
    fn outcome(&self) -> Result<Box<dyn Proxy>> {
        match self.fail_with {
            Some(kind) => Err(io::Error::new(kind, "scripted failure").into()),
            None => Ok(Box::new(EchoProxy)),
        }
    }
}

#[async_trait]
impl ProxyFactory for FakeProxyFactory {
    async fn create_tcp_proxy(&self, destination: &Endpoint) -> Result<Box<dyn Proxy>> {
        self.requests.lock().unwrap().push(destination.clone());
        self.outcome()
    }

    async fn create_udp_proxy(
        &self,
        control_local: SocketAddr,
        control_peer: SocketAddr,
    ) -> Result<Box<dyn Proxy>> {
        self.associations
            .lock()
            .unwrap()
            .push((control_local, control_peer));
        self.outcome()
    }
}
