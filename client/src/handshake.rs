//! Connection handshake gate
//!
//! The handshake runs INIT -> SET_PEER_ID -> INIT2. The task that opened the
//! connection waits on a one-shot signal which the receive loop fires exactly
//! once: with the assigned peer id after INIT2 went out, or with the server's
//! reason when ACCESS_DENIED arrives before any peer id.

use log::debug;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::oneshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// INIT sent, waiting for the server to assign a peer id
    InitSent,
    /// Peer id assigned, INIT2 being sent
    PeerAssigned,
    Ready,
    /// Access denied before a peer id was assigned
    Rejected,
}

/// What the waiting task learns: the peer id, or the rejection reason.
pub(crate) type HandshakeOutcome = Result<u16, String>;

struct Inner {
    state: HandshakeState,
    signal: Option<oneshot::Sender<HandshakeOutcome>>,
}

pub(crate) struct Handshake {
    inner: Mutex<Inner>,
}

impl Handshake {
    pub(crate) fn new() -> (Self, oneshot::Receiver<HandshakeOutcome>) {
        let (tx, rx) = oneshot::channel();
        let handshake = Self {
            inner: Mutex::new(Inner {
                state: HandshakeState::InitSent,
                signal: Some(tx),
            }),
        };
        (handshake, rx)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn state(&self) -> HandshakeState {
        self.lock().state
    }

    pub(crate) fn is_pending(&self) -> bool {
        self.state() == HandshakeState::InitSent
    }

    /// Moves to `PeerAssigned`. Returns false if a peer id was already
    /// assigned or the handshake is over, in which case the caller must not
    /// send INIT2 again.
    pub(crate) fn begin_assignment(&self) -> bool {
        let mut inner = self.lock();
        if inner.state != HandshakeState::InitSent {
            return false;
        }
        inner.state = HandshakeState::PeerAssigned;
        true
    }

    /// Marks the connection ready and releases the waiter.
    pub(crate) fn complete(&self, peer_id: u16) {
        let mut inner = self.lock();
        if inner.state != HandshakeState::PeerAssigned {
            return;
        }
        inner.state = HandshakeState::Ready;
        if let Some(signal) = inner.signal.take() {
            // The waiter may have given up already.
            let _ = signal.send(Ok(peer_id));
        }
    }

    /// Fails the handshake, but only while no peer id has been assigned.
    pub(crate) fn reject(&self, reason: String) -> bool {
        let mut inner = self.lock();
        if inner.state != HandshakeState::InitSent {
            return false;
        }
        inner.state = HandshakeState::Rejected;
        if let Some(signal) = inner.signal.take() {
            let _ = signal.send(Err(reason));
        }
        true
    }

    /// Drops the signal so a waiter still blocked learns the receive loop
    /// is gone.
    pub(crate) fn abandon(&self) {
        if self.lock().signal.take().is_some() {
            debug!("Handshake abandoned before completion");
        }
    }
}
