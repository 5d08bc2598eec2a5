//! Error types for MangleSocks
//!
//! This module defines the typed errors produced by the protocol codecs and
//! the proxy engine, and the SOCKS5 reply codes they map onto.

use std::io;
use thiserror::Error;

/// Main error type for MangleSocks operations
#[derive(Error, Debug)]
pub enum ProxyError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// SOCKS5 protocol error
    #[error("SOCKS5 error: {0}")]
    Socks5(#[from] Socks5Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Operation not valid in the current state
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Object already disposed
    #[error("Object disposed: {0}")]
    Disposed(&'static str),
}

/// SOCKS5 wire-level errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Socks5Error {
    /// Unsupported SOCKS version
    #[error("Unsupported SOCKS version: {0}")]
    UnsupportedVersion(u8),

    /// Reserved field carried a non-zero value
    #[error("Reserved field must be zero, got: {0}")]
    InvalidReserved(u8),

    /// Greeting offered zero authentication methods
    #[error("No authentication methods offered")]
    NoAuthenticationMethods,

    /// Command not supported
    #[error("Command not supported: {0}")]
    CommandNotSupported(u8),

    /// Address type not supported
    #[error("Address type not supported: {0}")]
    AddressTypeNotSupported(u8),

    /// Invalid domain name
    #[error("Invalid domain name: {0}")]
    InvalidDomain(String),

    /// Frame ended before all fields were read
    #[error("Truncated {0}")]
    Truncated(&'static str),

    /// Frame fields are inconsistent
    #[error("Corrupt {0}")]
    Corrupt(&'static str),

    /// Destination buffer too small for the encoded structure
    #[error("Insufficient buffer space: needed {needed} bytes, available {available}")]
    InsufficientSpace {
        /// Bytes required
        needed: usize,
        /// Bytes available
        available: usize,
    },
}

impl Socks5Error {
    /// Reply code to send back to the client, if the error maps onto one
    ///
    /// Malformed data has no dedicated code and returns `None`.
    pub fn reply_code(&self) -> Option<ReplyCode> {
        match self {
            Socks5Error::CommandNotSupported(_) => Some(ReplyCode::CommandNotSupported),
            Socks5Error::AddressTypeNotSupported(_) => Some(ReplyCode::AddressTypeNotSupported),
            _ => None,
        }
    }
}

/// Reply codes for SOCKS5 protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReplyCode {
    /// Command succeeded
    Succeeded = 0x00,
    /// General SOCKS server failure
    GeneralFailure = 0x01,
    /// Connection not allowed by ruleset
    ConnectionNotAllowed = 0x02,
    /// Network unreachable
    NetworkUnreachable = 0x03,
    /// Host unreachable
    HostUnreachable = 0x04,
    /// Connection refused
    ConnectionRefused = 0x05,
    /// TTL expired
    TtlExpired = 0x06,
    /// Command not supported
    CommandNotSupported = 0x07,
    /// Address type not supported
    AddressTypeNotSupported = 0x08,
}

impl From<ReplyCode> for u8 {
    fn from(code: ReplyCode) -> Self {
        code as u8
    }
}

impl TryFrom<u8> for ReplyCode {
    type Error = Socks5Error;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0x00 => Ok(ReplyCode::Succeeded),
            0x01 => Ok(ReplyCode::GeneralFailure),
            0x02 => Ok(ReplyCode::ConnectionNotAllowed),
            0x03 => Ok(ReplyCode::NetworkUnreachable),
            0x04 => Ok(ReplyCode::HostUnreachable),
            0x05 => Ok(ReplyCode::ConnectionRefused),
            0x06 => Ok(ReplyCode::TtlExpired),
            0x07 => Ok(ReplyCode::CommandNotSupported),
            0x08 => Ok(ReplyCode::AddressTypeNotSupported),
            _ => Err(Socks5Error::Corrupt("reply code")),
        }
    }
}

/// Result alias for codec and engine operations
pub type Result<T> = std::result::Result<T, ProxyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_code_from_u8_valid() {
        assert_eq!(ReplyCode::try_from(0x00).unwrap(), ReplyCode::Succeeded);
        assert_eq!(ReplyCode::try_from(0x01).unwrap(), ReplyCode::GeneralFailure);
        assert_eq!(
            ReplyCode::try_from(0x07).unwrap(),
            ReplyCode::CommandNotSupported
        );
        assert_eq!(
            ReplyCode::try_from(0x08).unwrap(),
            ReplyCode::AddressTypeNotSupported
        );
    }

    #[test]
    fn test_reply_code_from_u8_invalid() {
        assert!(ReplyCode::try_from(0x09).is_err());
        assert!(ReplyCode::try_from(0xFF).is_err());
    }

    #[test]
    fn test_reply_code_to_u8() {
        assert_eq!(u8::from(ReplyCode::Succeeded), 0x00);
        assert_eq!(u8::from(ReplyCode::HostUnreachable), 0x04);
        assert_eq!(u8::from(ReplyCode::AddressTypeNotSupported), 0x08);
    }

    #[test]
    fn test_socks5_error_reply_code() {
        assert_eq!(
            Socks5Error::CommandNotSupported(2).reply_code(),
            Some(ReplyCode::CommandNotSupported)
        );
        assert_eq!(
            Socks5Error::AddressTypeNotSupported(254).reply_code(),
            Some(ReplyCode::AddressTypeNotSupported)
        );
        assert_eq!(Socks5Error::UnsupportedVersion(4).reply_code(), None);
        assert_eq!(Socks5Error::Truncated("datagram").reply_code(), None);
    }

    #[test]
    fn test_socks5_error_display() {
        let err = Socks5Error::UnsupportedVersion(4);
        assert_eq!(format!("{}", err), "Unsupported SOCKS version: 4");

        let err = Socks5Error::CommandNotSupported(0xFF);
        assert_eq!(format!("{}", err), "Command not supported: 255");

        let err = Socks5Error::AddressTypeNotSupported(0x99);
        assert_eq!(format!("{}", err), "Address type not supported: 153");

        let err = Socks5Error::InsufficientSpace {
            needed: 10,
            available: 4,
        };
        assert_eq!(
            format!("{}", err),
            "Insufficient buffer space: needed 10 bytes, available 4"
        );
    }

    #[test]
    fn test_proxy_error_display() {
        let err = ProxyError::Config("bad listen address".to_string());
        assert_eq!(format!("{}", err), "Configuration error: bad listen address");

        let err = ProxyError::Disposed("server");
        assert_eq!(format!("{}", err), "Object disposed: server");
    }

    #[test]
    fn test_proxy_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::Other, "io error");
        let err: ProxyError = io_err.into();
        assert!(matches!(err, ProxyError::Io(_)));
    }

    #[test]
    fn test_proxy_error_from_socks5() {
        let err: ProxyError = Socks5Error::InvalidReserved(1).into();
        assert!(matches!(err, ProxyError::Socks5(Socks5Error::InvalidReserved(1))));
    }
}
