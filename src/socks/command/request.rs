//! SOCKS5 request decoding

use super::{read_endpoint, MAX_ENDPOINT_LEN};
use crate::error::{Result, Socks5Error};
use crate::pool::BufferPool;
use crate::socks::consts::*;
use crate::socks::types::{Endpoint, SocksCommand};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// A SOCKS5 request
///
/// ```text
/// +----+-----+-------+------+----------+----------+
/// |VER | CMD |  RSV  | ATYP | DST.ADDR | DST.PORT |
/// +----+-----+-------+------+----------+----------+
/// | 1  |  1  | X'00' |  1   | Variable |    2     |
/// +----+-----+-------+------+----------+----------+
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Requested command
    pub command: SocksCommand,
    /// Destination endpoint
    pub endpoint: Endpoint,
}

impl Command {
    /// Create a request
    pub fn new(command: SocksCommand, endpoint: Endpoint) -> Self {
        Command { command, endpoint }
    }

    /// Read a request from the stream
    ///
    /// Fields are validated in wire order. An unknown command or address
    /// type fails with an error carrying the matching reply code.
    pub async fn read_from<R>(stream: &mut R, pool: &BufferPool) -> Result<Self>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let mut scratch = pool.rent(MAX_ENDPOINT_LEN);

        stream.read_exact(&mut scratch[..4]).await?;
        let (version, cmd, reserved, addr_type) = (scratch[0], scratch[1], scratch[2], scratch[3]);

        if version != SOCKS5_VERSION {
            return Err(Socks5Error::UnsupportedVersion(version).into());
        }
        let command = SocksCommand::from_byte(cmd).ok_or(Socks5Error::CommandNotSupported(cmd))?;
        if reserved != SOCKS5_RESERVED {
            return Err(Socks5Error::InvalidReserved(reserved).into());
        }

        let endpoint = read_endpoint(stream, addr_type, &mut scratch).await?;
        Ok(Command { command, endpoint })
    }

    /// Write the request to the stream
    pub async fn write_to<W>(&self, stream: &mut W, pool: &BufferPool) -> Result<()>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let len = 3 + self.endpoint.encoded_len();
        let mut scratch = pool.rent(len);
        scratch[0] = SOCKS5_VERSION;
        scratch[1] = self.command.to_byte();
        scratch[2] = SOCKS5_RESERVED;
        self.endpoint.write_to(&mut scratch[3..])?;

        stream.write_all(&scratch).await?;
        stream.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProxyError;
    use std::io::Cursor;
    use std::net::{Ipv4Addr, Ipv6Addr};

    async fn read(bytes: Vec<u8>) -> Result<Command> {
        let pool = BufferPool::new();
        let result = Command::read_from(&mut Cursor::new(bytes), &pool).await;
        assert_eq!(pool.outstanding(), 0);
        result
    }

    #[tokio::test]
    async fn test_read_connect_ipv4() {
        let cmd = read(vec![5, 1, 0, 1, 1, 2, 3, 4, 0, 128]).await.unwrap();
        assert_eq!(cmd.command, SocksCommand::Connect);
        assert_eq!(cmd.endpoint, Endpoint::ipv4(Ipv4Addr::new(1, 2, 3, 4), 128));
    }

    #[tokio::test]
    async fn test_read_udp_associate_ipv6() {
        let mut bytes = vec![5, 3, 0, 4];
        bytes.extend_from_slice(&Ipv6Addr::LOCALHOST.octets());
        bytes.extend_from_slice(&[0x01, 0xBB]);

        let cmd = read(bytes).await.unwrap();
        assert_eq!(cmd.command, SocksCommand::UdpAssociate);
        assert_eq!(cmd.endpoint, Endpoint::ipv6(Ipv6Addr::LOCALHOST, 443));
    }

    #[tokio::test]
    async fn test_read_connect_domain() {
        let mut bytes = vec![5, 1, 0, 3, 11];
        bytes.extend_from_slice(b"example.com");
        bytes.extend_from_slice(&[0x00, 0x50]);

        let cmd = read(bytes).await.unwrap();
        assert_eq!(cmd.endpoint, Endpoint::domain("example.com", 80));
    }

    #[tokio::test]
    async fn test_read_bind_is_parsed() {
        let cmd = read(vec![5, 2, 0, 1, 0, 0, 0, 0, 0, 0]).await.unwrap();
        assert_eq!(cmd.command, SocksCommand::Bind);
    }

    #[tokio::test]
    async fn test_read_unsupported_command() {
        let err = read(vec![5, 255, 0, 1, 1, 2, 3, 4, 0, 255]).await.unwrap_err();
        assert!(matches!(
            err,
            ProxyError::Socks5(Socks5Error::CommandNotSupported(255))
        ));
    }

    #[tokio::test]
    async fn test_read_unsupported_address_type() {
        let err = read(vec![5, 1, 0, 254, 1, 2, 3, 4, 0, 255]).await.unwrap_err();
        assert!(matches!(
            err,
            ProxyError::Socks5(Socks5Error::AddressTypeNotSupported(254))
        ));
    }

    #[tokio::test]
    async fn test_read_wrong_version() {
        let err = read(vec![4, 1, 0, 1, 1, 2, 3, 4, 0, 80]).await.unwrap_err();
        assert!(matches!(
            err,
            ProxyError::Socks5(Socks5Error::UnsupportedVersion(4))
        ));
    }

    #[tokio::test]
    async fn test_read_nonzero_reserved() {
        let err = read(vec![5, 1, 1, 1, 1, 2, 3, 4, 0, 80]).await.unwrap_err();
        assert!(matches!(
            err,
            ProxyError::Socks5(Socks5Error::InvalidReserved(1))
        ));
    }

    #[tokio::test]
    async fn test_read_truncated_address() {
        let err = read(vec![5, 1, 0, 1, 1, 2]).await.unwrap_err();
        assert!(matches!(err, ProxyError::Io(_)));
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let pool = BufferPool::new();
        let cmd = Command::new(SocksCommand::Connect, Endpoint::domain("host.test", 9000));

        let mut buf = Vec::new();
        cmd.write_to(&mut buf, &pool).await.unwrap();
        assert_eq!(&buf[..5], &[5, 1, 0, 3, 9]);

        let decoded = Command::read_from(&mut Cursor::new(buf), &pool)
            .await
            .unwrap();
        assert_eq!(decoded, cmd);
        assert_eq!(pool.outstanding(), 0);
    }
}
