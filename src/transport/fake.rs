//! Scriptable sockets for unit tests

use super::{ClientStream, Connector, DatagramSocket};
use crate::socks::Endpoint;
use async_trait::async_trait;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};

/// Datagram socket fed with staged packets that records every send
#[derive(Debug)]
pub(crate) struct FakeDatagramSocket {
    local: SocketAddr,
    inbound: Mutex<mpsc::UnboundedReceiver<(Vec<u8>, SocketAddr)>>,
    sent: mpsc::UnboundedSender<(Vec<u8>, Endpoint)>,
    send_count: Arc<AtomicUsize>,
    fail_sends: Arc<AtomicBool>,
    dropped: Arc<AtomicBool>,
}

/// Test-side controls of a [`FakeDatagramSocket`]
#[derive(Debug)]
pub(crate) struct FakeSocketHandle {
    inbound: mpsc::UnboundedSender<(Vec<u8>, SocketAddr)>,
    sent: mpsc::UnboundedReceiver<(Vec<u8>, Endpoint)>,
    send_count: Arc<AtomicUsize>,
    fail_sends: Arc<AtomicBool>,
    dropped: Arc<AtomicBool>,
}

impl FakeDatagramSocket {
    pub(crate) fn new(local: SocketAddr) -> (Self, FakeSocketHandle) {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (sent_tx, sent_rx) = mpsc::unbounded_channel();
        let send_count = Arc::new(AtomicUsize::new(0));
        let fail_sends = Arc::new(AtomicBool::new(false));
        let dropped = Arc::new(AtomicBool::new(false));

        (
            FakeDatagramSocket {
                local,
                inbound: Mutex::new(inbound_rx),
                sent: sent_tx,
                send_count: send_count.clone(),
                fail_sends: fail_sends.clone(),
                dropped: dropped.clone(),
            },
            FakeSocketHandle {
                inbound: inbound_tx,
                sent: sent_rx,
                send_count,
                fail_sends,
                dropped,
            },
        )
    }
}

impl Drop for FakeDatagramSocket {
    fn drop(&mut self) {
        self.dropped.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl DatagramSocket for FakeDatagramSocket {
    async fn send_to(&self, buf: &[u8], target: &Endpoint) -> io::Result<usize> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "message too long"));
        }
        self.send_count.fetch_add(1, Ordering::SeqCst);
        let _ = self.sent.send((buf.to_vec(), target.clone()));
        Ok(buf.len())
    }

    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        let next = self.inbound.lock().await.recv().await;
        match next {
            Some((data, from)) => {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                Ok((n, from))
            }
            None => std::future::pending().await,
        }
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        Ok(self.local)
    }
}

impl FakeSocketHandle {
    /// Stage a packet for the next receive
    pub(crate) fn push(&self, data: impl Into<Vec<u8>>, from: SocketAddr) {
        let _ = self.inbound.send((data.into(), from));
    }

    /// Wait for the next recorded send
    pub(crate) async fn next_sent(&mut self) -> (Vec<u8>, Endpoint) {
        tokio::time::timeout(Duration::from_secs(5), self.sent.recv())
            .await
            .expect("timed out waiting for a send")
            .expect("socket dropped")
    }

    /// Recorded sends available without waiting
    pub(crate) fn drain_sent(&mut self) -> Vec<(Vec<u8>, Endpoint)> {
        let mut sent = Vec::new();
        while let Ok(item) = self.sent.try_recv() {
            sent.push(item);
        }
        sent
    }

    /// Make every following send fail until reset
    pub(crate) fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn send_count(&self) -> usize {
        self.send_count.load(Ordering::SeqCst)
    }

    pub(crate) fn is_dropped(&self) -> bool {
        self.dropped.load(Ordering::SeqCst)
    }
}

/// Connector handing out pre-built sockets and streams
#[derive(Debug, Default)]
pub(crate) struct FakeConnector {
    bound: StdMutex<Option<FakeDatagramSocket>>,
    relay: StdMutex<Option<FakeDatagramSocket>>,
    streams: StdMutex<Vec<Box<dyn ClientStream>>>,
    pub(crate) connected: StdMutex<Vec<Endpoint>>,
    pub(crate) bound_on: StdMutex<Vec<SocketAddr>>,
}

impl FakeConnector {
    pub(crate) fn with_udp(bound: FakeDatagramSocket, relay: FakeDatagramSocket) -> Self {
        FakeConnector {
            bound: StdMutex::new(Some(bound)),
            relay: StdMutex::new(Some(relay)),
            ..Default::default()
        }
    }

    pub(crate) fn with_stream(stream: Box<dyn ClientStream>) -> Self {
        FakeConnector {
            streams: StdMutex::new(vec![stream]),
            ..Default::default()
        }
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self, endpoint: &Endpoint) -> io::Result<Box<dyn ClientStream>> {
        self.connected.lock().unwrap().push(endpoint.clone());
        self.streams
            .lock()
            .unwrap()
            .pop()
            .ok_or_else(|| io::Error::new(io::ErrorKind::ConnectionRefused, "no stream staged"))
    }

    async fn bind_udp(&self, local: SocketAddr) -> io::Result<Box<dyn DatagramSocket>> {
        self.bound_on.lock().unwrap().push(local);
        match self.bound.lock().unwrap().take() {
            Some(socket) => Ok(Box::new(socket)),
            None => Err(io::Error::new(io::ErrorKind::AddrInUse, "no socket staged")),
        }
    }

    fn unbound_udp(&self) -> Box<dyn DatagramSocket> {
        match self.relay.lock().unwrap().take() {
            Some(socket) => Box::new(socket),
            None => Box::new(FakeDatagramSocket::new(([0, 0, 0, 0], 0).into()).0),
        }
    }
}
