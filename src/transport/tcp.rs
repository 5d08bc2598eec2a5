//! TCP listener and outbound connector

use super::{BoundUdpSocket, ClientStream, Connector, DatagramSocket, Listener, UdpClient};
use crate::config::ServerConfig;
use crate::socks::Endpoint;
use async_trait::async_trait;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info};

/// Socket options for configuring connections
#[derive(Debug, Clone)]
pub struct SocketOpts {
    /// Enable TCP_NODELAY
    pub nodelay: bool,
    /// TCP keepalive timeout
    pub keepalive_secs: Option<u64>,
    /// TCP keepalive interval
    pub keepalive_interval: Option<u64>,
}

impl Default for SocketOpts {
    fn default() -> Self {
        SocketOpts {
            nodelay: true,
            keepalive_secs: Some(20),
            keepalive_interval: Some(8),
        }
    }
}

impl SocketOpts {
    /// Create socket options from server config
    pub fn from_config(config: &ServerConfig) -> Self {
        SocketOpts {
            nodelay: config.nodelay,
            keepalive_secs: Some(config.keepalive_secs),
            keepalive_interval: Some(config.keepalive_interval),
        }
    }

    /// Apply socket options to a TCP stream
    pub fn apply(&self, stream: &TcpStream) -> io::Result<()> {
        stream.set_nodelay(self.nodelay)?;

        if let (Some(timeout), Some(interval)) = (self.keepalive_secs, self.keepalive_interval) {
            let socket = socket2::SockRef::from(stream);
            let keepalive = socket2::TcpKeepalive::new()
                .with_time(Duration::from_secs(timeout))
                .with_interval(Duration::from_secs(interval));
            socket.set_tcp_keepalive(&keepalive)?;
        }

        Ok(())
    }
}

/// Listener accepting SOCKS clients over TCP
#[derive(Debug)]
pub struct TcpClientListener {
    listener: TcpListener,
    opts: SocketOpts,
}

impl TcpClientListener {
    /// Bind with SO_REUSEADDR on `addr`
    pub fn bind(addr: SocketAddr, opts: SocketOpts) -> io::Result<Self> {
        let socket = socket2::Socket::new(
            socket2::Domain::for_address(addr),
            socket2::Type::STREAM,
            Some(socket2::Protocol::TCP),
        )?;
        socket.set_reuse_address(true)?;
        socket.set_nonblocking(true)?;
        socket.bind(&addr.into())?;
        socket.listen(1024)?;

        let listener = TcpListener::from_std(socket.into())?;
        info!("Listening on {}", listener.local_addr()?);
        Ok(TcpClientListener { listener, opts })
    }
}

#[async_trait]
impl Listener for TcpClientListener {
    async fn accept(&self) -> io::Result<Box<dyn ClientStream>> {
        let (stream, peer) = self.listener.accept().await?;
        if let Err(e) = self.opts.apply(&stream) {
            debug!("Failed to apply socket options for {}: {}", peer, e);
        }
        Ok(Box::new(stream))
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

/// Connector dialing destinations directly through the OS
#[derive(Debug, Clone)]
pub struct DirectConnector {
    opts: SocketOpts,
    connect_timeout: Duration,
}

impl DirectConnector {
    /// Create a connector
    pub fn new(opts: SocketOpts, connect_timeout: Duration) -> Self {
        DirectConnector {
            opts,
            connect_timeout,
        }
    }

    /// Create a connector from server config
    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(
            SocketOpts::from_config(config),
            Duration::from_secs(config.connect_timeout),
        )
    }
}

impl Default for DirectConnector {
    fn default() -> Self {
        Self::new(SocketOpts::default(), Duration::from_secs(10))
    }
}

#[async_trait]
impl Connector for DirectConnector {
    async fn connect(&self, endpoint: &Endpoint) -> io::Result<Box<dyn ClientStream>> {
        let connect = async {
            match endpoint {
                Endpoint::Ip(addr) => TcpStream::connect(addr).await,
                Endpoint::Domain(domain, port) => TcpStream::connect((domain.as_str(), *port)).await,
            }
        };

        let stream = tokio::time::timeout(self.connect_timeout, connect)
            .await
            .map_err(|_| {
                io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("Connection to {} timed out", endpoint),
                )
            })??;

        self.opts.apply(&stream)?;
        debug!("Connected to {} from {}", endpoint, stream.local_addr()?);
        Ok(Box::new(stream))
    }

    async fn bind_udp(&self, local: SocketAddr) -> io::Result<Box<dyn DatagramSocket>> {
        Ok(Box::new(BoundUdpSocket::bind(local).await?))
    }

    fn unbound_udp(&self) -> Box<dyn DatagramSocket> {
        Box::new(UdpClient::new())
    }
}
