//! Reassembly of fragmented UDP relay datagrams
//!
//! Fragments are accepted strictly in order. A gap, duplicate or regression
//! drops the whole in-flight set, and an idle set expires after
//! [`REASSEMBLY_TIMEOUT`].

use crate::error::{ProxyError, Result};
use crate::pool::{BufferPool, PooledBuffer};
use crate::socks::consts::MAX_FRAGMENT_POSITION;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Inactivity period after which a partial set is discarded
pub const REASSEMBLY_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum number of fragments in one set
pub const MAX_FRAGMENTS: usize = MAX_FRAGMENT_POSITION as usize;

/// Per-session fragment buffer
pub struct DatagramReassembler {
    state: Mutex<ReassemblyState>,
    pool: BufferPool,
    timeout: Duration,
}

#[derive(Default)]
struct ReassemblyState {
    fragments: Vec<PooledBuffer>,
    deadline: Option<Instant>,
    set_outstanding: bool,
}

impl ReassemblyState {
    fn discard(&mut self) {
        if !self.fragments.is_empty() {
            debug!("Discarding {} buffered fragments", self.fragments.len());
        }
        self.fragments.clear();
        self.deadline = None;
    }
}

impl DatagramReassembler {
    /// Create a reassembler using the default timeout
    pub fn new(pool: BufferPool) -> Self {
        Self::with_timeout(pool, REASSEMBLY_TIMEOUT)
    }

    /// Create a reassembler with a custom inactivity timeout
    pub fn with_timeout(pool: BufferPool, timeout: Duration) -> Self {
        DatagramReassembler {
            state: Mutex::new(ReassemblyState::default()),
            pool,
            timeout,
        }
    }

    /// Feed one fragment, returning the completed set if this finished one
    ///
    /// Position zero is a standalone datagram: any partial set is dropped
    /// and `fragment` itself is returned without copying. Otherwise the
    /// fragment must extend the current set by exactly one.
    ///
    /// The previously returned [`CompletedSet`] must be dropped first;
    /// calling again while one is alive fails with
    /// [`ProxyError::InvalidOperation`].
    pub fn get_completed_set_or_add<'a>(
        &'a self,
        fragment: &'a [u8],
        position: u8,
        is_final: bool,
    ) -> Result<Option<CompletedSet<'a>>> {
        let mut state = self.lock_state();
        if state.set_outstanding {
            return Err(ProxyError::InvalidOperation(
                "must dispose last set before reassembling the next".to_string(),
            ));
        }

        if matches!(state.deadline, Some(deadline) if Instant::now() >= deadline) {
            state.discard();
        }

        if position == 0 {
            state.discard();
            state.set_outstanding = true;
            return Ok(Some(CompletedSet {
                fragments: Fragments::Standalone(fragment),
                owner: self,
            }));
        }

        let expected = state.fragments.len() + 1;
        if position as usize != expected || expected > MAX_FRAGMENTS {
            debug!(
                "Out of order fragment {} (expected {}), dropping set",
                position, expected
            );
            state.discard();
            return Ok(None);
        }

        let mut copy = self.pool.rent(fragment.len());
        copy.copy_from_slice(fragment);
        state.fragments.push(copy);

        if !is_final {
            state.deadline = Some(Instant::now() + self.timeout);
            return Ok(None);
        }

        state.deadline = None;
        state.set_outstanding = true;
        let fragments = std::mem::take(&mut state.fragments);
        Ok(Some(CompletedSet {
            fragments: Fragments::Pooled(fragments),
            owner: self,
        }))
    }

    /// When the in-flight set expires, if one is pending
    pub fn deadline(&self) -> Option<Instant> {
        self.lock_state().deadline
    }

    /// Timer callback: discard the in-flight set
    pub fn on_timeout(&self) {
        self.lock_state().discard();
    }

    /// Number of fragments buffered in the in-flight set
    pub fn pending(&self) -> usize {
        self.lock_state().fragments.len()
    }

    fn lock_state(&self) -> MutexGuard<'_, ReassemblyState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

enum Fragments<'a> {
    Standalone(&'a [u8]),
    Pooled(Vec<PooledBuffer>),
}

/// A complete, ordered fragment set
///
/// Pooled copies are returned when the set is dropped, which also
/// re-arms the reassembler.
pub struct CompletedSet<'a> {
    fragments: Fragments<'a>,
    owner: &'a DatagramReassembler,
}

impl<'a> CompletedSet<'a> {
    /// Number of fragments
    pub fn len(&self) -> usize {
        match &self.fragments {
            Fragments::Standalone(_) => 1,
            Fragments::Pooled(buffers) => buffers.len(),
        }
    }

    /// Always false; a completed set has at least one fragment
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fragment at `index`
    pub fn get(&self, index: usize) -> Option<&[u8]> {
        match &self.fragments {
            Fragments::Standalone(fragment) if index == 0 => Some(*fragment),
            Fragments::Standalone(_) => None,
            Fragments::Pooled(buffers) => buffers.get(index).map(|b| &b[..]),
        }
    }

    /// Iterate fragments in order
    pub fn iter(&self) -> impl Iterator<Item = &[u8]> + '_ {
        (0..self.len()).filter_map(move |i| self.get(i))
    }

    /// Sum of fragment lengths
    pub fn total_len(&self) -> usize {
        self.iter().map(<[u8]>::len).sum()
    }

    /// The single fragment when the set was standalone or one long
    pub fn as_single(&self) -> Option<&[u8]> {
        if self.len() == 1 {
            self.get(0)
        } else {
            None
        }
    }

    /// Concatenate the fragments into `out`, returning the bytes written
    pub fn copy_to(&self, out: &mut [u8]) -> Result<usize> {
        let total = self.total_len();
        if out.len() < total {
            return Err(crate::error::Socks5Error::InsufficientSpace {
                needed: total,
                available: out.len(),
            }
            .into());
        }

        let mut offset = 0;
        for fragment in self.iter() {
            out[offset..offset + fragment.len()].copy_from_slice(fragment);
            offset += fragment.len();
        }
        Ok(offset)
    }
}

impl Drop for CompletedSet<'_> {
    fn drop(&mut self) {
        self.owner.lock_state().set_outstanding = false;
    }
}
