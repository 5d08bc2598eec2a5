//! SOCKS5 UDP relay support
//!
//! Framing of relayed datagrams and reassembly of fragment sequences.

mod datagram;
mod reassembler;

pub use datagram::{Datagram, DatagramHeader};
pub use reassembler::{CompletedSet, DatagramReassembler, MAX_FRAGMENTS, REASSEMBLY_TIMEOUT};
