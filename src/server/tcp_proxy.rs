//! TCP relay for SOCKS5 CONNECT
//!
//! The outbound connection is opened while the proxy is built, so a
//! failure reaches the client as a failure reply. Running the proxy copies
//! both directions concurrently until both have seen EOF.

use super::proxy::Proxy;
use crate::pool::BufferPool;
use crate::socks::{Endpoint, TCP_RELAY_BUFFER_SIZE};
use crate::transport::{ClientStream, Connector};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Relay between a client and one connected destination
#[derive(Debug)]
pub struct TcpProxy {
    remote: Box<dyn ClientStream>,
    destination: Endpoint,
    bind: Endpoint,
    pool: BufferPool,
}

impl TcpProxy {
    /// Connect to `destination` through `connector`
    pub async fn connect(
        connector: &dyn Connector,
        destination: &Endpoint,
        pool: BufferPool,
    ) -> Result<Self> {
        debug!("Connecting to target: {}", destination);
        let remote = connector
            .connect(destination)
            .await
            .with_context(|| format!("Failed to connect to {}", destination))?;

        let bind = remote
            .local_addr()
            .map(Endpoint::from)
            .unwrap_or_default();

        Ok(TcpProxy {
            remote,
            destination: destination.clone(),
            bind,
            pool,
        })
    }
}

#[async_trait]
impl Proxy for TcpProxy {
    fn bind_endpoint(&self) -> Endpoint {
        self.bind.clone()
    }

    async fn run(
        self: Box<Self>,
        client: &mut dyn ClientStream,
        cancel: CancellationToken,
    ) -> Result<()> {
        let TcpProxy {
            remote,
            destination,
            pool,
            ..
        } = *self;

        info!("SOCKS5 tunnel established to {}", destination);

        let (mut client_read, mut client_write) = tokio::io::split(client);
        let (mut remote_read, mut remote_write) = tokio::io::split(remote);

        let upstream = copy_until_eof(&mut client_read, &mut remote_write, &pool);
        let downstream = copy_until_eof(&mut remote_read, &mut client_write, &pool);

        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Relay to {} cancelled", destination);
                Ok(())
            }
            result = async { tokio::try_join!(upstream, downstream) } => {
                let (sent, received) =
                    result.with_context(|| format!("Relay to {} failed", destination))?;
                debug!(
                    "Relay to {} finished: {} bytes sent, {} bytes received",
                    destination, sent, received
                );
                Ok(())
            }
        }
    }
}

/// Copy `reader` into `writer` through one pooled buffer
///
/// On EOF the writer is shut down so the peer sees the half-close.
async fn copy_until_eof<R, W>(reader: &mut R, writer: &mut W, pool: &BufferPool) -> io::Result<u64>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut buf = pool.rent(TCP_RELAY_BUFFER_SIZE);
    let mut total = 0u64;

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            if let Err(e) = writer.shutdown().await {
                debug!("Shutdown after EOF failed: {}", e);
            }
            return Ok(total);
        }
        writer.write_all(&buf[..n]).await?;
        total += n as u64;
    }
}
