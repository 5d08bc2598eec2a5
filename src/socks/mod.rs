//! SOCKS5 protocol codecs
//!
//! This module implements the SOCKS5 wire structures: the method
//! negotiation greeting, requests and replies, and the UDP relay frame.
//! Every codec borrows its scratch space from a [`BufferPool`](crate::pool::BufferPool).

mod auth;
mod command;
mod consts;
mod types;
pub mod udp;

pub use auth::{AuthMethod, Greeting, GreetingReply};
pub use command::{Command, CommandReply};
pub use consts::*;
pub use types::{Endpoint, SocksCommand};
pub use udp::{Datagram, DatagramHeader, DatagramReassembler};
