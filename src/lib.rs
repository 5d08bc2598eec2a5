//! # MangleSocks - SOCKS5 Proxy with Traffic-Shape Obfuscation
//!
//! MangleSocks is a SOCKS5 server supporting CONNECT and UDP ASSOCIATE.
//! UDP traffic passes through a pluggable datagram interceptor that can
//! disguise the shape of a flow, for example by sending random decoy
//! packets ahead of the first real datagram.
//!
//! ## Features
//!
//! - **TCP CONNECT**: Bidirectional relay with half-close support
//! - **UDP ASSOCIATE**: Full relay including fragment reassembly
//! - **Interceptors**: Passthrough and random decoy-prefix obfuscators
//! - **Pooled Buffers**: Every scratch buffer is rented from a shared pool
//!
//! ## Usage
//!
//! ```rust,ignore
//! use manglesocks::config::Config;
//! use manglesocks::interceptor::create_factory;
//! use manglesocks::pool::BufferPool;
//! use manglesocks::server::{DefaultConnectionFactory, DefaultProxyFactory, SocksServer};
//! use manglesocks::transport::{DirectConnector, SocketOpts, TcpClientListener};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!     let pool = BufferPool::new();
//!
//!     let listener = TcpClientListener::bind(
//!         config.server.listen_addr().map_err(anyhow::Error::msg)?,
//!         SocketOpts::from_config(&config.server),
//!     )?;
//!     let proxies = DefaultProxyFactory::new(
//!         Arc::new(DirectConnector::from_config(&config.server)),
//!         create_factory(&config.udp, &pool)?,
//!         pool.clone(),
//!     );
//!     let server = SocksServer::new(
//!         Arc::new(listener),
//!         Arc::new(DefaultConnectionFactory::new(Arc::new(proxies), pool)),
//!     );
//!
//!     server.start().await?;
//!     tokio::signal::ctrl_c().await?;
//!     server.dispose().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! SOCKS5 Client -> SocksServer -> SocksConnection -> TcpProxy / UdpProxy -> Target
//!                                                        |
//!                                                  DatagramInterceptor
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod config;
pub mod error;
pub mod helper;
pub mod interceptor;
pub mod pool;
pub mod server;
pub mod socks;
pub mod transport;

// Re-export commonly used items
pub use config::{load_config, Config};
pub use error::{ProxyError, ReplyCode, Socks5Error};
pub use pool::BufferPool;
pub use server::SocksServer;

/// Version of the MangleSocks library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name of the application
pub const NAME: &str = env!("CARGO_PKG_NAME");
