//! Transport module for MangleSocks
//!
//! This module defines the socket contracts the proxy engine consumes and
//! their tokio-backed implementations: client streams and listeners on the
//! client side, and a connector producing outbound TCP streams and UDP
//! sockets on the destination side.

mod memory;
mod tcp;
mod udp;

#[cfg(test)]
pub(crate) mod fake;

pub use memory::{ChannelListener, MemoryStream};
pub use tcp::{DirectConnector, SocketOpts, TcpClientListener};
pub use udp::{BoundUdpSocket, UdpClient};

use crate::socks::Endpoint;
use async_trait::async_trait;
use std::fmt::Debug;
use std::io;
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

/// Byte stream to a SOCKS client, aware of both of its endpoints
pub trait ClientStream: AsyncRead + AsyncWrite + Unpin + Send + Sync + Debug {
    /// Local endpoint of the stream
    fn local_addr(&self) -> io::Result<SocketAddr>;

    /// Remote endpoint of the stream
    fn peer_addr(&self) -> io::Result<SocketAddr>;
}

impl ClientStream for TcpStream {
    fn local_addr(&self) -> io::Result<SocketAddr> {
        TcpStream::local_addr(self)
    }

    fn peer_addr(&self) -> io::Result<SocketAddr> {
        TcpStream::peer_addr(self)
    }
}

/// Source of incoming client streams
#[async_trait]
pub trait Listener: Debug + Send + Sync {
    /// Wait for the next client
    async fn accept(&self) -> io::Result<Box<dyn ClientStream>>;

    /// Local endpoint clients connect to
    fn local_addr(&self) -> io::Result<SocketAddr>;
}

/// Datagram socket used by the UDP relay
#[async_trait]
pub trait DatagramSocket: Debug + Send + Sync {
    /// Send `buf` to `target`, resolving domain endpoints first
    async fn send_to(&self, buf: &[u8], target: &Endpoint) -> io::Result<usize>;

    /// Receive one datagram into `buf`
    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)>;

    /// Local endpoint of the socket
    fn local_addr(&self) -> io::Result<SocketAddr>;
}

/// Destination-side connectivity
#[async_trait]
pub trait Connector: Debug + Send + Sync {
    /// Open a TCP stream to `endpoint`
    async fn connect(&self, endpoint: &Endpoint) -> io::Result<Box<dyn ClientStream>>;

    /// Bind a UDP socket on `local`
    async fn bind_udp(&self, local: SocketAddr) -> io::Result<Box<dyn DatagramSocket>>;

    /// Create a UDP socket that binds lazily on first send
    fn unbound_udp(&self) -> Box<dyn DatagramSocket>;
}
