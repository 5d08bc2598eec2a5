//! SOCKS5 UDP relay framing
//!
//! ```text
//! +----+------+------+----------+----------+----------+
//! |RSV | FRAG | ATYP | DST.ADDR | DST.PORT |   DATA   |
//! +----+------+------+----------+----------+----------+
//! | 2  |  1   |  1   | Variable |    2     | Variable |
//! +----+------+------+----------+----------+----------+
//! ```
//!
//! The high bit of FRAG marks the final fragment, the low seven bits carry
//! the 1-based fragment position. Position zero is a standalone datagram.

use crate::error::Socks5Error;
use crate::socks::consts::*;
use crate::socks::types::Endpoint;
use bytes::{Buf, BufMut};

/// Header preceding every relayed UDP payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatagramHeader {
    position: u8,
    is_final: bool,
    remote: Endpoint,
}

impl DatagramHeader {
    /// Header for a standalone (non-fragmented) datagram
    pub fn new(remote: Endpoint) -> Self {
        DatagramHeader {
            position: 0,
            is_final: false,
            remote,
        }
    }

    /// Header for fragment `position` of a sequence
    ///
    /// The final flag is dropped for position zero and positions above
    /// [`MAX_FRAGMENT_POSITION`] are masked to seven bits.
    pub fn fragment(position: u8, is_final: bool, remote: Endpoint) -> Self {
        let position = position & FRAG_POSITION_MASK;
        DatagramHeader {
            position,
            is_final: position != 0 && is_final,
            remote,
        }
    }

    /// Fragment position, zero when standalone
    pub fn position(&self) -> u8 {
        self.position
    }

    /// Whether this is the last fragment of its sequence
    pub fn is_final_fragment(&self) -> bool {
        self.is_final
    }

    /// Destination when relaying outbound, source when relaying inbound
    pub fn remote(&self) -> &Endpoint {
        &self.remote
    }

    /// Encoded length of the header
    pub fn byte_len(&self) -> usize {
        2 + 1 + self.remote.encoded_len()
    }

    fn frag_byte(&self) -> u8 {
        if self.is_final {
            self.position | FRAG_FINAL_FLAG
        } else {
            self.position
        }
    }

    /// Write the header into `buf`, returning the bytes written
    pub fn write_to(&self, mut buf: &mut [u8]) -> Result<usize, Socks5Error> {
        let needed = self.byte_len();
        if buf.len() < needed {
            return Err(Socks5Error::InsufficientSpace {
                needed,
                available: buf.len(),
            });
        }

        buf.put_u16(0);
        buf.put_u8(self.frag_byte());
        self.remote.write_to(buf)?;
        Ok(needed)
    }

    /// Decode a header from the front of `packet`
    ///
    /// Returns the header and the number of bytes it occupied.
    pub fn read_from(packet: &[u8]) -> Result<(Self, usize), Socks5Error> {
        let mut buf = packet;
        if buf.remaining() < 4 {
            return Err(Socks5Error::Truncated("datagram header"));
        }

        if buf.get_u16() != 0 {
            return Err(Socks5Error::Corrupt("datagram reserved field"));
        }

        let frag = buf.get_u8();
        let position = frag & FRAG_POSITION_MASK;
        let is_final = frag & FRAG_FINAL_FLAG != 0;
        if is_final && position == 0 {
            return Err(Socks5Error::Corrupt("datagram fragment field"));
        }

        let addr_type = buf.get_u8();
        let remote = Endpoint::decode(addr_type, &mut buf).map_err(|e| match e {
            Socks5Error::Truncated(_) => Socks5Error::Truncated("datagram header"),
            other => other,
        })?;

        let consumed = packet.len() - buf.len();
        Ok((
            DatagramHeader {
                position,
                is_final,
                remote,
            },
            consumed,
        ))
    }
}

/// A framed datagram borrowing its payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram<'a> {
    /// Frame header
    pub header: DatagramHeader,
    /// Payload bytes
    pub payload: &'a [u8],
}

impl<'a> Datagram<'a> {
    /// Create a datagram
    pub fn new(header: DatagramHeader, payload: &'a [u8]) -> Self {
        Datagram { header, payload }
    }

    /// Decode a complete packet
    pub fn read_from(packet: &'a [u8]) -> Result<Self, Socks5Error> {
        let (header, consumed) = DatagramHeader::read_from(packet)?;
        Ok(Datagram {
            header,
            payload: &packet[consumed..],
        })
    }

    /// Encoded length of header and payload
    pub fn byte_len(&self) -> usize {
        self.header.byte_len() + self.payload.len()
    }

    /// Write header and payload into `buf`, returning the bytes written
    pub fn write_to(&self, buf: &mut [u8]) -> Result<usize, Socks5Error> {
        let needed = self.byte_len();
        if buf.len() < needed {
            return Err(Socks5Error::InsufficientSpace {
                needed,
                available: buf.len(),
            });
        }

        let header_len = self.header.write_to(buf)?;
        buf[header_len..needed].copy_from_slice(self.payload);
        Ok(needed)
    }

    /// Encode into a fresh vector
    pub fn to_bytes(&self) -> Result<Vec<u8>, Socks5Error> {
        let mut bytes = vec![0u8; self.byte_len()];
        self.write_to(&mut bytes)?;
        Ok(bytes)
    }
}
