//! UDP relay for SOCKS5 UDP ASSOCIATE
//!
//! Client datagrams arrive framed on the bound socket, are reassembled
//! and forwarded unframed through the relay socket. Replies are framed
//! with their source and sent back to the client. The session lives as
//! long as the TCP control connection.

use super::proxy::Proxy;
use crate::helper::{sleep_until_deadline, unmap_socket_addr};
use crate::interceptor::DatagramInterceptor;
use crate::pool::BufferPool;
use crate::socks::{
    Datagram, DatagramHeader, DatagramReassembler, Endpoint, IPV6_DATAGRAM_HEADER_LEN,
    MAX_UDP_SIZE,
};
use crate::transport::{ClientStream, Connector, DatagramSocket};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::fmt;
use std::net::SocketAddr;
use tokio::io::AsyncReadExt;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// One UDP ASSOCIATE session
pub struct UdpProxy {
    bound: Box<dyn DatagramSocket>,
    relay: Box<dyn DatagramSocket>,
    interceptor: Box<dyn DatagramInterceptor>,
    reassembler: DatagramReassembler,
    pool: BufferPool,
    control_peer: SocketAddr,
    bind: Endpoint,
}

impl UdpProxy {
    /// Bind the client-facing socket next to the control connection
    ///
    /// The bound socket listens on the control connection's local address
    /// with an ephemeral port; the relay socket opens lazily on first send.
    pub async fn bind(
        connector: &dyn Connector,
        interceptor: Box<dyn DatagramInterceptor>,
        control_local: SocketAddr,
        control_peer: SocketAddr,
        pool: BufferPool,
    ) -> Result<Self> {
        let local = SocketAddr::new(unmap_socket_addr(control_local).ip(), 0);
        let bound = connector
            .bind_udp(local)
            .await
            .with_context(|| format!("Failed to bind UDP socket on {}", local))?;
        let bind = Endpoint::from(unmap_socket_addr(bound.local_addr()?));

        Ok(UdpProxy {
            bound,
            relay: connector.unbound_udp(),
            interceptor,
            reassembler: DatagramReassembler::new(pool.clone()),
            pool,
            control_peer: unmap_socket_addr(control_peer),
            bind,
        })
    }

    /// Cancel the session when the control connection closes
    async fn watch_control(&self, control: &mut dyn ClientStream, session: &CancellationToken) {
        let _guard = session.clone().drop_guard();
        let mut probe = self.pool.rent(1);

        loop {
            tokio::select! {
                _ = session.cancelled() => return,
                read = control.read(&mut probe) => match read {
                    Ok(0) => {
                        debug!("Control connection closed");
                        return;
                    }
                    Ok(_) => warn!("Protocol violation: data received on UDP control connection"),
                    Err(e) => {
                        debug!("Control connection failed: {}", e);
                        return;
                    }
                },
            }
        }
    }

    /// Client to destination
    async fn send_loop(
        &self,
        session: &CancellationToken,
        client_endpoint: oneshot::Sender<SocketAddr>,
    ) -> Result<()> {
        let _guard = session.clone().drop_guard();
        let mut client_endpoint = Some(client_endpoint);
        let mut packet = self.pool.rent(MAX_UDP_SIZE);

        loop {
            let received = tokio::select! {
                _ = session.cancelled() => return Ok(()),
                _ = sleep_until_deadline(self.reassembler.deadline()) => {
                    debug!("Fragment reassembly timed out");
                    self.reassembler.on_timeout();
                    continue;
                }
                received = self.bound.recv_from(&mut packet) => received,
            };

            let (len, source) = received.context("UDP receive from client failed")?;
            let source = unmap_socket_addr(source);
            if source.ip() != self.control_peer.ip() {
                warn!(
                    "Dropping datagram from {}: does not match client {}",
                    source,
                    self.control_peer.ip()
                );
                continue;
            }

            // a stalled interceptor must not hold the session open
            let forwarded = tokio::select! {
                _ = session.cancelled() => return Ok(()),
                forwarded = self.forward_outgoing(&packet[..len]) => forwarded,
            };
            if let Err(e) = forwarded {
                warn!("Dropping datagram from {}: {:#}", source, e);
                continue;
            }

            if let Some(tx) = client_endpoint.take() {
                debug!("UDP client endpoint is {}", source);
                let _ = tx.send(source);
            }
        }
    }

    async fn forward_outgoing(&self, packet: &[u8]) -> Result<()> {
        let datagram = Datagram::read_from(packet)?;
        let header = &datagram.header;

        let completed = self.reassembler.get_completed_set_or_add(
            datagram.payload,
            header.position(),
            header.is_final_fragment(),
        )?;
        let Some(completed) = completed else {
            return Ok(());
        };

        let joined;
        let payload = match completed.as_single() {
            Some(single) => single,
            None => {
                let mut buf = self.pool.rent(completed.total_len());
                completed.copy_to(&mut buf)?;
                joined = buf;
                &joined[..]
            }
        };

        let destination = header.remote();
        if self
            .interceptor
            .try_intercept_outgoing(payload, destination, self.relay.as_ref())
            .await?
        {
            return Ok(());
        }

        self.relay
            .send_to(payload, destination)
            .await
            .with_context(|| format!("Failed to send to {}", destination))?;
        Ok(())
    }

    /// Destination to client
    async fn receive_loop(
        &self,
        session: &CancellationToken,
        client_endpoint: oneshot::Receiver<SocketAddr>,
    ) -> Result<()> {
        let _guard = session.clone().drop_guard();

        let client = tokio::select! {
            _ = session.cancelled() => return Ok(()),
            learned = client_endpoint => match learned {
                Ok(addr) => Endpoint::from(addr),
                Err(_) => return Ok(()),
            },
        };

        // Payload lands after room for the largest header so framing needs no copy
        let mut frame = self.pool.rent(IPV6_DATAGRAM_HEADER_LEN + MAX_UDP_SIZE);

        loop {
            let received = tokio::select! {
                _ = session.cancelled() => return Ok(()),
                received = self.relay.recv_from(&mut frame[IPV6_DATAGRAM_HEADER_LEN..]) => received,
            };
            let (len, source) = received.context("UDP receive from destination failed")?;

            let header = DatagramHeader::new(Endpoint::from(source));
            let header_len = header.byte_len();
            if header_len + len > MAX_UDP_SIZE {
                warn!(
                    "Dropping {} byte datagram from {}: exceeds maximum UDP size",
                    len, source
                );
                continue;
            }

            let start = IPV6_DATAGRAM_HEADER_LEN - header_len;
            let end = IPV6_DATAGRAM_HEADER_LEN + len;
            header.write_to(&mut frame[start..IPV6_DATAGRAM_HEADER_LEN])?;

            let datagram = Datagram::new(header, &frame[IPV6_DATAGRAM_HEADER_LEN..end]);
            tokio::select! {
                _ = session.cancelled() => return Ok(()),
                _ = self.deliver_incoming(&datagram, &frame[start..end], &client) => {}
            }
        }
    }

    async fn deliver_incoming(&self, datagram: &Datagram<'_>, framed: &[u8], client: &Endpoint) {
        let source = datagram.header.remote();
        match self
            .interceptor
            .try_intercept_incoming(datagram, self.bound.as_ref())
            .await
        {
            Ok(true) => return,
            Ok(false) => {}
            Err(e) => {
                warn!("Dropping datagram from {}: {}", source, e);
                return;
            }
        }

        if let Err(e) = self.bound.send_to(framed, client).await {
            warn!("Failed to send datagram to client {}: {}", client, e);
        }
    }
}

impl fmt::Debug for UdpProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UdpProxy")
            .field("bind", &self.bind)
            .field("control_peer", &self.control_peer)
            .field("interceptor", &self.interceptor)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Proxy for UdpProxy {
    fn bind_endpoint(&self) -> Endpoint {
        self.bind.clone()
    }

    async fn run(
        self: Box<Self>,
        client: &mut dyn ClientStream,
        cancel: CancellationToken,
    ) -> Result<()> {
        let session = cancel.child_token();
        let (endpoint_tx, endpoint_rx) = oneshot::channel();

        info!("UDP relay bound on {}", self.bind);
        let ((), sent, received) = tokio::join!(
            self.watch_control(client, &session),
            self.send_loop(&session, endpoint_tx),
            self.receive_loop(&session, endpoint_rx),
        );
        info!("UDP relay on {} closed", self.bind);

        sent.and(received)
    }
}
