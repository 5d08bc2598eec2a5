//! SOCKS5 type definitions
//!
//! Defines the core types used in SOCKS5 protocol handling.

use super::consts::*;
use crate::error::Socks5Error;
use bytes::{Buf, BufMut};
use std::fmt;
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};

/// SOCKS5 command types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocksCommand {
    /// TCP CONNECT - establish a TCP connection to target
    Connect,
    /// TCP BIND - wait for incoming connection (never served)
    Bind,
    /// UDP ASSOCIATE - establish UDP relay
    UdpAssociate,
}

impl SocksCommand {
    /// Parse a command byte into SocksCommand
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            SOCKS5_CMD_TCP_CONNECT => Some(SocksCommand::Connect),
            SOCKS5_CMD_TCP_BIND => Some(SocksCommand::Bind),
            SOCKS5_CMD_UDP_ASSOCIATE => Some(SocksCommand::UdpAssociate),
            _ => None,
        }
    }

    /// Convert SocksCommand to byte
    pub fn to_byte(self) -> u8 {
        match self {
            SocksCommand::Connect => SOCKS5_CMD_TCP_CONNECT,
            SocksCommand::Bind => SOCKS5_CMD_TCP_BIND,
            SocksCommand::UdpAssociate => SOCKS5_CMD_UDP_ASSOCIATE,
        }
    }
}

impl fmt::Display for SocksCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SocksCommand::Connect => write!(f, "CONNECT"),
            SocksCommand::Bind => write!(f, "BIND"),
            SocksCommand::UdpAssociate => write!(f, "UDP ASSOCIATE"),
        }
    }
}

/// Address carried in commands, replies and UDP relay headers
///
/// Can be an IP address (v4 or v6) or a domain name, always with a port.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// IP address with port
    Ip(SocketAddr),
    /// Domain name with port
    Domain(String, u16),
}

impl Endpoint {
    /// Create a new Endpoint from an IPv4 address and port
    pub fn ipv4(ip: Ipv4Addr, port: u16) -> Self {
        Endpoint::Ip(SocketAddr::new(IpAddr::V4(ip), port))
    }

    /// Create a new Endpoint from an IPv6 address and port
    pub fn ipv6(ip: Ipv6Addr, port: u16) -> Self {
        Endpoint::Ip(SocketAddr::new(IpAddr::V6(ip), port))
    }

    /// Create a new Endpoint from a domain name and port
    pub fn domain(domain: impl Into<String>, port: u16) -> Self {
        Endpoint::Domain(domain.into(), port)
    }

    /// The `0.0.0.0:0` endpoint used in failure replies
    pub fn zero() -> Self {
        Endpoint::ipv4(Ipv4Addr::UNSPECIFIED, 0)
    }

    /// Get the port number
    pub fn port(&self) -> u16 {
        match self {
            Endpoint::Ip(addr) => addr.port(),
            Endpoint::Domain(_, port) => *port,
        }
    }

    /// Get the address type byte for SOCKS5 protocol
    pub fn addr_type(&self) -> u8 {
        match self {
            Endpoint::Ip(SocketAddr::V4(_)) => SOCKS5_ADDR_TYPE_IPV4,
            Endpoint::Ip(SocketAddr::V6(_)) => SOCKS5_ADDR_TYPE_IPV6,
            Endpoint::Domain(_, _) => SOCKS5_ADDR_TYPE_DOMAIN,
        }
    }

    /// Number of bytes `ATYP + ADDR + PORT` occupy on the wire
    pub fn encoded_len(&self) -> usize {
        match self {
            Endpoint::Ip(SocketAddr::V4(_)) => 1 + 4 + 2,
            Endpoint::Ip(SocketAddr::V6(_)) => 1 + 16 + 2,
            Endpoint::Domain(domain, _) => 1 + 1 + domain.len() + 2,
        }
    }

    /// Write `ATYP + ADDR + PORT` into `buf`, returning the bytes written
    pub fn write_to(&self, mut buf: &mut [u8]) -> Result<usize, Socks5Error> {
        let needed = self.encoded_len();
        if buf.len() < needed {
            return Err(Socks5Error::InsufficientSpace {
                needed,
                available: buf.len(),
            });
        }

        buf.put_u8(self.addr_type());
        match self {
            Endpoint::Ip(SocketAddr::V4(addr)) => {
                buf.put_slice(&addr.ip().octets());
                buf.put_u16(addr.port());
            }
            Endpoint::Ip(SocketAddr::V6(addr)) => {
                buf.put_slice(&addr.ip().octets());
                buf.put_u16(addr.port());
            }
            Endpoint::Domain(domain, port) => {
                if domain.is_empty() || domain.len() > MAX_DOMAIN_LEN {
                    return Err(Socks5Error::InvalidDomain(domain.clone()));
                }
                buf.put_u8(domain.len() as u8);
                buf.put_slice(domain.as_bytes());
                buf.put_u16(*port);
            }
        }

        Ok(needed)
    }

    /// Serialize the endpoint to a fresh vector
    pub fn to_bytes(&self) -> Result<Vec<u8>, Socks5Error> {
        let mut bytes = vec![0u8; self.encoded_len()];
        self.write_to(&mut bytes)?;
        Ok(bytes)
    }

    /// Decode `ADDR + PORT` for the given address type, advancing `buf`
    pub fn decode(addr_type: u8, buf: &mut &[u8]) -> Result<Self, Socks5Error> {
        match addr_type {
            SOCKS5_ADDR_TYPE_IPV4 => {
                ensure_remaining(buf, 4 + 2)?;
                let mut octets = [0u8; 4];
                buf.copy_to_slice(&mut octets);
                let port = buf.get_u16();
                Ok(Endpoint::Ip(SocketAddr::V4(SocketAddrV4::new(
                    Ipv4Addr::from(octets),
                    port,
                ))))
            }
            SOCKS5_ADDR_TYPE_IPV6 => {
                ensure_remaining(buf, 16 + 2)?;
                let mut octets = [0u8; 16];
                buf.copy_to_slice(&mut octets);
                let port = buf.get_u16();
                Ok(Endpoint::Ip(SocketAddr::V6(SocketAddrV6::new(
                    Ipv6Addr::from(octets),
                    port,
                    0,
                    0,
                ))))
            }
            SOCKS5_ADDR_TYPE_DOMAIN => {
                ensure_remaining(buf, 1)?;
                let len = buf.get_u8() as usize;
                ensure_remaining(buf, len + 2)?;
                let domain = parse_domain(&buf[..len])?;
                buf.advance(len);
                let port = buf.get_u16();
                Ok(Endpoint::Domain(domain, port))
            }
            other => Err(Socks5Error::AddressTypeNotSupported(other)),
        }
    }

    /// Resolve the endpoint to a socket address
    ///
    /// For IP addresses, this returns immediately.
    /// For domain names, this performs DNS resolution.
    pub async fn resolve(&self) -> io::Result<SocketAddr> {
        match self {
            Endpoint::Ip(addr) => Ok(*addr),
            Endpoint::Domain(domain, port) => tokio::net::lookup_host((domain.as_str(), *port))
                .await?
                .next()
                .ok_or_else(|| {
                    io::Error::new(
                        io::ErrorKind::NotFound,
                        format!("No addresses found for domain: {}", domain),
                    )
                }),
        }
    }
}

/// Parse domain bytes read from the wire
pub(crate) fn parse_domain(bytes: &[u8]) -> Result<String, Socks5Error> {
    if bytes.is_empty() {
        return Err(Socks5Error::InvalidDomain(String::new()));
    }
    String::from_utf8(bytes.to_vec())
        .map_err(|e| Socks5Error::InvalidDomain(String::from_utf8_lossy(e.as_bytes()).into_owned()))
}

fn ensure_remaining(buf: &[u8], needed: usize) -> Result<(), Socks5Error> {
    if buf.remaining() < needed {
        return Err(Socks5Error::Truncated("address"));
    }
    Ok(())
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Ip(addr) => write!(f, "{}", addr),
            Endpoint::Domain(domain, port) => write!(f, "{}:{}", domain, port),
        }
    }
}

impl From<SocketAddr> for Endpoint {
    fn from(addr: SocketAddr) -> Self {
        Endpoint::Ip(addr)
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Endpoint::zero()
    }
}
