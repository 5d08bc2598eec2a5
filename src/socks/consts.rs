//! SOCKS5 protocol constants
//!
//! Defines all constants used in the SOCKS5 protocol implementation.

/// SOCKS5 protocol version
pub const SOCKS5_VERSION: u8 = 0x05;

// Authentication methods
/// No authentication required
pub const SOCKS5_AUTH_METHOD_NONE: u8 = 0x00;
/// GSSAPI authentication (not implemented)
pub const SOCKS5_AUTH_METHOD_GSSAPI: u8 = 0x01;
/// Username/password authentication (not implemented)
pub const SOCKS5_AUTH_METHOD_PASSWORD: u8 = 0x02;
/// No acceptable methods
pub const SOCKS5_AUTH_METHOD_NOT_ACCEPTABLE: u8 = 0xFF;

// Commands
/// TCP CONNECT command
pub const SOCKS5_CMD_TCP_CONNECT: u8 = 0x01;
/// TCP BIND command (parsed, never served)
pub const SOCKS5_CMD_TCP_BIND: u8 = 0x02;
/// UDP ASSOCIATE command
pub const SOCKS5_CMD_UDP_ASSOCIATE: u8 = 0x03;

// Address types
/// IPv4 address
pub const SOCKS5_ADDR_TYPE_IPV4: u8 = 0x01;
/// Domain name
pub const SOCKS5_ADDR_TYPE_DOMAIN: u8 = 0x03;
/// IPv6 address
pub const SOCKS5_ADDR_TYPE_IPV6: u8 = 0x04;

// Reserved byte
/// Reserved byte value (always 0x00)
pub const SOCKS5_RESERVED: u8 = 0x00;

/// Maximum domain name length
pub const MAX_DOMAIN_LEN: usize = 255;

// UDP relay framing
/// High bit of FRAG marks the final fragment of a sequence
pub const FRAG_FINAL_FLAG: u8 = 0x80;
/// Low seven bits of FRAG carry the fragment position
pub const FRAG_POSITION_MASK: u8 = 0x7F;
/// Highest fragment position encodable in FRAG
pub const MAX_FRAGMENT_POSITION: u8 = 127;
/// Largest datagram the relay will accept or emit
pub const MAX_UDP_SIZE: usize = 65536;
/// UDP relay header length for an IPv4 endpoint
pub const IPV4_DATAGRAM_HEADER_LEN: usize = 10;
/// UDP relay header length for an IPv6 endpoint
pub const IPV6_DATAGRAM_HEADER_LEN: usize = 22;

/// Buffer size for each TCP copy direction
pub const TCP_RELAY_BUFFER_SIZE: usize = 4096;

/// Default listen port
pub const DEFAULT_PORT: u16 = 1081;
