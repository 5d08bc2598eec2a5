//! SOCKS5 command module
//!
//! Handles decoding SOCKS5 requests and encoding replies.

mod reply;
mod request;

pub use reply::CommandReply;
pub use request::Command;

use super::types::Endpoint;
use crate::error::{Result, Socks5Error};
use tokio::io::{AsyncRead, AsyncReadExt};

use super::consts::*;

/// Space for `ATYP + ADDR + PORT` with the longest domain
pub(crate) const MAX_ENDPOINT_LEN: usize = 1 + 1 + MAX_DOMAIN_LEN + 2;

/// Read `ADDR + PORT` for `addr_type` from the stream into `scratch` and decode it
///
/// `scratch` must hold at least `MAX_ENDPOINT_LEN` bytes.
pub(crate) async fn read_endpoint<R>(
    stream: &mut R,
    addr_type: u8,
    scratch: &mut [u8],
) -> Result<Endpoint>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let len = match addr_type {
        SOCKS5_ADDR_TYPE_IPV4 => 4 + 2,
        SOCKS5_ADDR_TYPE_IPV6 => 16 + 2,
        SOCKS5_ADDR_TYPE_DOMAIN => {
            stream.read_exact(&mut scratch[..1]).await?;
            let domain_len = scratch[0] as usize;
            stream.read_exact(&mut scratch[1..1 + domain_len + 2]).await?;
            1 + domain_len + 2
        }
        other => return Err(Socks5Error::AddressTypeNotSupported(other).into()),
    };

    if addr_type != SOCKS5_ADDR_TYPE_DOMAIN {
        stream.read_exact(&mut scratch[..len]).await?;
    }

    let mut rest = &scratch[..len];
    Ok(Endpoint::decode(addr_type, &mut rest)?)
}
