//! Sequence bookkeeping for the RELIABLE envelope
//!
//! Outbound reliable packets are numbered from [`SEQNUM_INITIAL`] upwards,
//! wrapping at 2^16. Sends are fire-and-forget: nothing is retransmitted and
//! nothing waits for the matching ack. The last ack seen is recorded for
//! observation only.

use std::sync::atomic::{AtomicU16, Ordering};

pub const SEQNUM_INITIAL: u16 = 0xFFDC;

#[derive(Debug)]
pub struct ReliableState {
    next_seq: AtomicU16,
    last_acked: AtomicU16,
}

impl Default for ReliableState {
    fn default() -> Self {
        Self::new()
    }
}

impl ReliableState {
    pub fn new() -> Self {
        Self::starting_at(SEQNUM_INITIAL)
    }

    pub fn starting_at(seq: u16) -> Self {
        Self {
            next_seq: AtomicU16::new(seq),
            last_acked: AtomicU16::new(0),
        }
    }

    /// Claims the sequence number for the next reliable send.
    ///
    /// Safe to call from several tasks at once; each caller gets a distinct
    /// number until the counter wraps.
    pub fn next_seq(&self) -> u16 {
        self.next_seq.fetch_add(1, Ordering::SeqCst)
    }

    /// The number the next reliable send will carry.
    pub fn peek_seq(&self) -> u16 {
        self.next_seq.load(Ordering::SeqCst)
    }

    pub fn record_ack(&self, seq: u16) {
        self.last_acked.store(seq, Ordering::SeqCst);
    }

    pub fn last_acked(&self) -> u16 {
        self.last_acked.load(Ordering::SeqCst)
    }
}
