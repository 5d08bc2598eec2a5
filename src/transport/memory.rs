//! In-memory client transport
//!
//! Lets the SOCKS engine serve streams that never touch a local listener,
//! e.g. streams carried by another tunnel.

use super::{ClientStream, Listener};
use async_trait::async_trait;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{duplex, AsyncRead, AsyncWrite, DuplexStream, ReadBuf};
use tokio::sync::{mpsc, Mutex};

/// Duplex stream with fixed local and peer endpoints
#[derive(Debug)]
pub struct MemoryStream {
    inner: DuplexStream,
    local: SocketAddr,
    peer: SocketAddr,
}

impl MemoryStream {
    /// Wrap an existing duplex stream
    pub fn new(inner: DuplexStream, local: SocketAddr, peer: SocketAddr) -> Self {
        MemoryStream { inner, local, peer }
    }

    /// Create a connected pair; the second half is the client's end
    pub fn pair(local: SocketAddr, peer: SocketAddr, max_buf_size: usize) -> (Self, DuplexStream) {
        let (server, client) = duplex(max_buf_size);
        (MemoryStream::new(server, local, peer), client)
    }
}

impl ClientStream for MemoryStream {
    fn local_addr(&self) -> io::Result<SocketAddr> {
        Ok(self.local)
    }

    fn peer_addr(&self) -> io::Result<SocketAddr> {
        Ok(self.peer)
    }
}

impl AsyncRead for MemoryStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for MemoryStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

/// Listener fed through a channel
///
/// Accept fails with `BrokenPipe` once every sender is dropped.
#[derive(Debug)]
pub struct ChannelListener {
    incoming: Mutex<mpsc::Receiver<Box<dyn ClientStream>>>,
    local: SocketAddr,
}

impl ChannelListener {
    /// Create a listener and the sender that feeds it
    pub fn new(local: SocketAddr, capacity: usize) -> (Self, mpsc::Sender<Box<dyn ClientStream>>) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            ChannelListener {
                incoming: Mutex::new(rx),
                local,
            },
            tx,
        )
    }
}

#[async_trait]
impl Listener for ChannelListener {
    async fn accept(&self) -> io::Result<Box<dyn ClientStream>> {
        self.incoming
            .lock()
            .await
            .recv()
            .await
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "listener closed"))
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        Ok(self.local)
    }
}
