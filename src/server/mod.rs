//! SOCKS5 server engine
//!
//! [`SocksServer`] accepts clients, each handled by a [`SocksConnection`]
//! that dispatches to a [`TcpProxy`] or a [`UdpProxy`] built by a
//! [`ProxyFactory`].

mod connection;
mod proxy;
#[allow(clippy::module_inception)]
mod server;
mod tcp_proxy;
mod udp_proxy;

#[cfg(test)]
pub(crate) mod fake;

pub use connection::{
    Connection, ConnectionFactory, ConnectionState, DefaultConnectionFactory, SocksConnection,
};
pub use proxy::{DefaultProxyFactory, Proxy, ProxyFactory};
pub use server::SocksServer;
pub use tcp_proxy::TcpProxy;
pub use udp_proxy::UdpProxy;
