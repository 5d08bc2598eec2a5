//! SOCKS5 reply encoding

use super::{read_endpoint, MAX_ENDPOINT_LEN};
use crate::error::{ReplyCode, Result, Socks5Error};
use crate::pool::BufferPool;
use crate::socks::consts::*;
use crate::socks::types::Endpoint;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// A SOCKS5 reply
///
/// ```text
/// +----+-----+-------+------+----------+----------+
/// |VER | REP |  RSV  | ATYP | BND.ADDR | BND.PORT |
/// +----+-----+-------+------+----------+----------+
/// | 1  |  1  | X'00' |  1   | Variable |    2     |
/// +----+-----+-------+------+----------+----------+
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandReply {
    /// Reply status
    pub reply: ReplyCode,
    /// Bound endpoint
    pub bind: Endpoint,
}

impl CommandReply {
    /// Create a reply
    pub fn new(reply: ReplyCode, bind: Endpoint) -> Self {
        CommandReply { reply, bind }
    }

    /// Reply reporting failure with the zero IPv4 endpoint
    pub fn failure(reply: ReplyCode) -> Self {
        CommandReply::new(reply, Endpoint::zero())
    }

    /// Write the reply to the stream
    pub async fn write_to<W>(&self, stream: &mut W, pool: &BufferPool) -> Result<()>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let len = 3 + self.bind.encoded_len();
        let mut scratch = pool.rent(len);
        scratch[0] = SOCKS5_VERSION;
        scratch[1] = self.reply.into();
        scratch[2] = SOCKS5_RESERVED;
        self.bind.write_to(&mut scratch[3..])?;

        stream.write_all(&scratch).await?;
        stream.flush().await?;
        Ok(())
    }

    /// Read a reply from the stream
    pub async fn read_from<R>(stream: &mut R, pool: &BufferPool) -> Result<Self>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let mut scratch = pool.rent(MAX_ENDPOINT_LEN);

        stream.read_exact(&mut scratch[..4]).await?;
        if scratch[0] != SOCKS5_VERSION {
            return Err(Socks5Error::UnsupportedVersion(scratch[0]).into());
        }
        let reply = ReplyCode::try_from(scratch[1])?;
        if scratch[2] != SOCKS5_RESERVED {
            return Err(Socks5Error::InvalidReserved(scratch[2]).into());
        }
        let addr_type = scratch[3];

        let bind = read_endpoint(stream, addr_type, &mut scratch).await?;
        Ok(CommandReply { reply, bind })
    }
}
