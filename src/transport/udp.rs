//! UDP sockets for the relay
//!
//! [`BoundUdpSocket`] is the client-facing socket of an association.
//! [`UdpClient`] talks to arbitrary destinations and keeps one optional
//! handle per address family, opened on the first send to that family.

use super::DatagramSocket;
use crate::helper::unmap_socket_addr;
use crate::socks::Endpoint;
use async_trait::async_trait;
use std::future::{poll_fn, Future};
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::task::Poll;
use tokio::io::ReadBuf;
use tokio::net::UdpSocket;
use tokio::sync::{Notify, OnceCell};

/// UDP socket bound to a fixed local endpoint
#[derive(Debug)]
pub struct BoundUdpSocket {
    socket: UdpSocket,
}

impl BoundUdpSocket {
    /// Bind on `local`
    pub async fn bind(local: SocketAddr) -> io::Result<Self> {
        Ok(BoundUdpSocket {
            socket: UdpSocket::bind(local).await?,
        })
    }
}

#[async_trait]
impl DatagramSocket for BoundUdpSocket {
    async fn send_to(&self, buf: &[u8], target: &Endpoint) -> io::Result<usize> {
        let addr = target.resolve().await?;
        self.socket.send_to(buf, addr).await
    }

    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        let (n, addr) = self.socket.recv_from(buf).await?;
        Ok((n, unmap_socket_addr(addr)))
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

/// Destination-facing UDP socket with lazily opened IPv4 and IPv6 handles
#[derive(Debug, Default)]
pub struct UdpClient {
    v4: OnceCell<UdpSocket>,
    v6: OnceCell<UdpSocket>,
    opened: Notify,
}

impl UdpClient {
    /// Create a client with no handle open yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the IPv4 handle is open
    pub fn has_ipv4(&self) -> bool {
        self.v4.initialized()
    }

    /// Whether the IPv6 handle is open
    pub fn has_ipv6(&self) -> bool {
        self.v6.initialized()
    }

    async fn socket_for(&self, target: &SocketAddr) -> io::Result<&UdpSocket> {
        let (cell, local): (&OnceCell<UdpSocket>, SocketAddr) = if target.is_ipv4() {
            (&self.v4, (Ipv4Addr::UNSPECIFIED, 0).into())
        } else {
            (&self.v6, (Ipv6Addr::UNSPECIFIED, 0).into())
        };

        if let Some(socket) = cell.get() {
            return Ok(socket);
        }

        let socket = cell.get_or_try_init(|| UdpSocket::bind(local)).await?;
        self.opened.notify_waiters();
        Ok(socket)
    }
}

#[async_trait]
impl DatagramSocket for UdpClient {
    async fn send_to(&self, buf: &[u8], target: &Endpoint) -> io::Result<usize> {
        let addr = target.resolve().await?;
        self.socket_for(&addr).await?.send_to(buf, addr).await
    }

    /// Receive from whichever handles are open
    ///
    /// Waits while no handle is open, and picks up a handle opened while
    /// already waiting on the other one.
    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        loop {
            let opened = self.opened.notified();
            tokio::pin!(opened);
            opened.as_mut().enable();

            let (v4, v6) = (self.v4.get(), self.v6.get());
            if v4.is_none() && v6.is_none() {
                opened.await;
                continue;
            }

            let received = poll_fn(|cx| {
                for socket in [v4, v6].into_iter().flatten() {
                    let mut read_buf = ReadBuf::new(&mut *buf);
                    if let Poll::Ready(result) = socket.poll_recv_from(cx, &mut read_buf) {
                        let n = read_buf.filled().len();
                        return Poll::Ready(Some(result.map(|addr| (n, addr))));
                    }
                }

                let waiting_for_other = v4.is_none() || v6.is_none();
                if waiting_for_other && opened.as_mut().poll(cx).is_ready() {
                    return Poll::Ready(None);
                }
                Poll::Pending
            })
            .await;

            if let Some(result) = received {
                return result.map(|(n, addr)| (n, unmap_socket_addr(addr)));
            }
        }
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.v4
            .get()
            .or_else(|| self.v6.get())
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "UDP client not bound"))?
            .local_addr()
    }
}
