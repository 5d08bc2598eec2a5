//! SOCKS5 method negotiation
//!
//! Handles the greeting and the server's method selection reply.

use super::consts::*;
use crate::error::{Result, Socks5Error};
use crate::pool::BufferPool;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Authentication method codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    /// No authentication required
    None,
    /// GSSAPI
    Gssapi,
    /// Username/password
    Password,
    /// Sent by the server when nothing offered is acceptable
    NoAcceptableMethods,
    /// Any other method code
    Other(u8),
}

impl AuthMethod {
    /// Parse a method byte
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            SOCKS5_AUTH_METHOD_NONE => AuthMethod::None,
            SOCKS5_AUTH_METHOD_GSSAPI => AuthMethod::Gssapi,
            SOCKS5_AUTH_METHOD_PASSWORD => AuthMethod::Password,
            SOCKS5_AUTH_METHOD_NOT_ACCEPTABLE => AuthMethod::NoAcceptableMethods,
            other => AuthMethod::Other(other),
        }
    }

    /// Convert the method to its byte
    pub fn to_byte(self) -> u8 {
        match self {
            AuthMethod::None => SOCKS5_AUTH_METHOD_NONE,
            AuthMethod::Gssapi => SOCKS5_AUTH_METHOD_GSSAPI,
            AuthMethod::Password => SOCKS5_AUTH_METHOD_PASSWORD,
            AuthMethod::NoAcceptableMethods => SOCKS5_AUTH_METHOD_NOT_ACCEPTABLE,
            AuthMethod::Other(byte) => byte,
        }
    }
}

/// Client greeting listing the offered authentication methods
///
/// ```text
/// +----+----------+----------+
/// |VER | NMETHODS | METHODS  |
/// +----+----------+----------+
/// | 1  |    1     | 1 to 255 |
/// +----+----------+----------+
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Greeting {
    /// Offered methods, in client order
    pub methods: Vec<AuthMethod>,
}

impl Greeting {
    /// Create a greeting offering `methods`
    pub fn new(methods: Vec<AuthMethod>) -> Self {
        Greeting { methods }
    }

    /// Whether the client offered `method`
    pub fn offers(&self, method: AuthMethod) -> bool {
        self.methods.contains(&method)
    }

    /// Read a greeting from the stream
    pub async fn read_from<R>(stream: &mut R, pool: &BufferPool) -> Result<Self>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let mut scratch = pool.rent(u8::MAX as usize);

        stream.read_exact(&mut scratch[..2]).await?;
        if scratch[0] != SOCKS5_VERSION {
            return Err(Socks5Error::UnsupportedVersion(scratch[0]).into());
        }

        let nmethods = scratch[1] as usize;
        if nmethods == 0 {
            return Err(Socks5Error::NoAuthenticationMethods.into());
        }

        stream.read_exact(&mut scratch[..nmethods]).await?;
        let methods = scratch[..nmethods]
            .iter()
            .map(|&b| AuthMethod::from_byte(b))
            .collect();

        Ok(Greeting { methods })
    }

    /// Write the greeting to the stream
    pub async fn write_to<W>(&self, stream: &mut W, pool: &BufferPool) -> Result<()>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let count = self.methods.len();
        if count == 0 || count > u8::MAX as usize {
            return Err(Socks5Error::NoAuthenticationMethods.into());
        }

        let mut scratch = pool.rent(2 + count);
        scratch[0] = SOCKS5_VERSION;
        scratch[1] = count as u8;
        for (slot, method) in scratch[2..].iter_mut().zip(&self.methods) {
            *slot = method.to_byte();
        }

        stream.write_all(&scratch).await?;
        stream.flush().await?;
        Ok(())
    }
}

/// Server's method selection
///
/// ```text
/// +----+--------+
/// |VER | METHOD |
/// +----+--------+
/// | 1  |   1    |
/// +----+--------+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GreetingReply {
    /// Selected method
    pub method: AuthMethod,
}

impl GreetingReply {
    /// Create a reply selecting `method`
    pub fn new(method: AuthMethod) -> Self {
        GreetingReply { method }
    }

    /// Read a reply from the stream
    pub async fn read_from<R>(stream: &mut R, pool: &BufferPool) -> Result<Self>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let mut scratch = pool.rent(2);
        stream.read_exact(&mut scratch).await?;
        if scratch[0] != SOCKS5_VERSION {
            return Err(Socks5Error::UnsupportedVersion(scratch[0]).into());
        }
        Ok(GreetingReply::new(AuthMethod::from_byte(scratch[1])))
    }

    /// Write the reply to the stream
    pub async fn write_to<W>(&self, stream: &mut W, pool: &BufferPool) -> Result<()>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let mut scratch = pool.rent(2);
        scratch[0] = SOCKS5_VERSION;
        scratch[1] = self.method.to_byte();

        stream.write_all(&scratch).await?;
        stream.flush().await?;
        Ok(())
    }
}
