//! Helper utilities for MangleSocks
//!
//! This module provides common utility functions used throughout the application.

use std::future::pending;
use std::net::SocketAddr;
use tokio::time::Instant;

/// Default connection timeout in seconds
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Convert an IPv4-mapped IPv6 address back to plain IPv4
///
/// Dual-stack sockets report IPv4 peers as `::ffff:a.b.c.d`; comparing
/// and re-encoding them needs the IPv4 form.
pub fn unmap_socket_addr(addr: SocketAddr) -> SocketAddr {
    SocketAddr::new(addr.ip().to_canonical(), addr.port())
}

/// Sleep until `deadline`, or forever when there is none
pub async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};
    use std::time::Duration;

    #[test]
    fn test_unmap_ipv4_mapped() {
        let mapped = SocketAddr::new(Ipv4Addr::new(10, 1, 2, 3).to_ipv6_mapped().into(), 53);
        assert_eq!(
            unmap_socket_addr(mapped),
            SocketAddr::new(Ipv4Addr::new(10, 1, 2, 3).into(), 53)
        );
    }

    #[test]
    fn test_unmap_leaves_native_addresses() {
        let v4 = SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 1);
        let v6 = SocketAddr::new(Ipv6Addr::LOCALHOST.into(), 1);
        assert_eq!(unmap_socket_addr(v4), v4);
        assert_eq!(unmap_socket_addr(v6), v6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_until_deadline() {
        let deadline = Instant::now() + Duration::from_secs(10);
        sleep_until_deadline(Some(deadline)).await;
        assert!(Instant::now() >= deadline);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_without_deadline_never_completes() {
        let result =
            tokio::time::timeout(Duration::from_secs(60), sleep_until_deadline(None)).await;
        assert!(result.is_err());
    }
}
