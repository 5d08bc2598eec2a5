//! Test utilities for MangleSocks
//!
//! This module provides common test utilities used across integration tests.

#![allow(dead_code)]

use manglesocks::config::{DecoySettings, UdpConfig};
use manglesocks::interceptor::create_factory;
use manglesocks::server::{DefaultConnectionFactory, DefaultProxyFactory, SocksServer};
use manglesocks::socks::{Datagram, DatagramHeader, Endpoint};
use manglesocks::transport::{DirectConnector, SocketOpts, TcpClientListener};
use manglesocks::BufferPool;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UdpSocket};

/// Upper bound for any single network step in a test
pub const STEP_TIMEOUT: Duration = Duration::from_secs(5);

/// Start a TCP echo server on an available loopback port
pub async fn start_tcp_echo() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            tokio::spawn(async move {
                let (mut reader, mut writer) = stream.split();
                let _ = tokio::io::copy(&mut reader, &mut writer).await;
            });
        }
    });

    addr
}

/// Start a UDP echo server on an available loopback port
pub async fn start_udp_echo() -> SocketAddr {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();

    tokio::spawn(async move {
        let mut buf = vec![0u8; 65536];
        loop {
            let Ok((n, from)) = socket.recv_from(&mut buf).await else {
                return;
            };
            let _ = socket.send_to(&buf[..n], from).await;
        }
    });

    addr
}

/// A port nothing listens on
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Start a proxy on an available loopback port
pub async fn start_proxy(udp: UdpConfig) -> (SocksServer, SocketAddr) {
    let pool = BufferPool::new();
    let listener =
        TcpClientListener::bind("127.0.0.1:0".parse().unwrap(), SocketOpts::default()).unwrap();
    let proxies = DefaultProxyFactory::new(
        Arc::new(DirectConnector::new(SocketOpts::default(), STEP_TIMEOUT)),
        create_factory(&udp, &pool).unwrap(),
        pool.clone(),
    );
    let server = SocksServer::new(
        Arc::new(listener),
        Arc::new(DefaultConnectionFactory::new(Arc::new(proxies), pool)),
    );
    server.start().await.unwrap();

    let addr = server.local_addr().unwrap();
    (server, addr)
}

/// UDP settings sending `count` immediate decoys of 100..=200 bytes
pub fn decoy_config(interceptor: &str, count: u32) -> UdpConfig {
    UdpConfig {
        interceptor: interceptor.to_string(),
        decoy: DecoySettings {
            count_min: count,
            count_max: count,
            delay_ms_min: 0,
            delay_ms_max: 0,
            bytes_min: 100,
            bytes_max: 200,
        },
    }
}

/// Build a SOCKS5 greeting offering `methods`
pub fn greeting(methods: &[u8]) -> Vec<u8> {
    let mut data = vec![5, methods.len() as u8];
    data.extend_from_slice(methods);
    data
}

/// Build a SOCKS5 request for an IP endpoint
pub fn request(command: u8, addr: SocketAddr) -> Vec<u8> {
    let mut data = vec![5, command, 0];
    data.extend_from_slice(&Endpoint::from(addr).to_bytes().unwrap());
    data
}

/// Connect to the proxy and negotiate no authentication
pub async fn negotiate(proxy: SocketAddr) -> TcpStream {
    let mut stream = TcpStream::connect(proxy).await.unwrap();
    stream.write_all(&greeting(&[0])).await.unwrap();

    let mut reply = [0u8; 2];
    stream.read_exact(&mut reply).await.unwrap();
    assert_eq!(reply, [5, 0]);
    stream
}

/// Read an IPv4 command reply, returning the reply code and bind endpoint
pub async fn read_ipv4_reply(stream: &mut TcpStream) -> (u8, SocketAddr) {
    let mut reply = [0u8; 10];
    tokio::time::timeout(STEP_TIMEOUT, stream.read_exact(&mut reply))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reply[0], 5);
    assert_eq!(reply[3], 1, "expected an IPv4 bind endpoint");

    let ip = [reply[4], reply[5], reply[6], reply[7]];
    let port = u16::from_be_bytes([reply[8], reply[9]]);
    (reply[1], SocketAddr::from((ip, port)))
}

/// Frame `payload` for the UDP relay
pub fn frame(remote: SocketAddr, payload: &[u8]) -> Vec<u8> {
    Datagram::new(DatagramHeader::new(Endpoint::from(remote)), payload)
        .to_bytes()
        .unwrap()
}

/// Receive one framed datagram, returning its remote endpoint and payload
pub async fn recv_frame(socket: &UdpSocket) -> (Endpoint, Vec<u8>) {
    let mut buf = vec![0u8; 65536];
    let (n, _) = tokio::time::timeout(STEP_TIMEOUT, socket.recv_from(&mut buf))
        .await
        .unwrap()
        .unwrap();

    let datagram = Datagram::read_from(&buf[..n]).unwrap();
    (datagram.header.remote().clone(), datagram.payload.to_vec())
}
