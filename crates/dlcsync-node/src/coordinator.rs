//! Reconnect-driven resend of the pending outbound message.
//!
//! Per peer connection, the coordinator runs the state machine
//!
//! ```text
//! Disconnected ──connect──▶ Connected ──pointer, sent──▶ AwaitingAck
//!                               │                             │
//!                               └──no pointer──▶ Idle ◀──inbound──┘
//! (any state) ──disconnect──▶ Disconnected
//! ```
//!
//! - On connect, the stored pointer body (if any) is re-transmitted
//!   exactly once. There is no timeout-based retry within a
//!   connection: if the peer never answers, the next connect event is
//!   the retry. A flapping link therefore cannot produce a resend
//!   storm.
//! - Any inbound message from the peer is the implicit acknowledgement
//!   — the protocol has no explicit ack; forward progress of the
//!   conversation is the signal.
//! - Disconnect abandons only the in-memory attempt. The pointer is
//!   read-only during resend and survives for the next connect.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use dlcsync_storage::outbound::OutboundCursor;
use dlcsync_types::{MessageHash, PeerId, Result};

use crate::gate::PeerGates;
use crate::transport::Transport;

// ---------------------------------------------------------------------------
// ConnState
// ---------------------------------------------------------------------------

/// Connection state of one peer, as tracked by the coordinator.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConnState {
    /// No live link. The default for peers never seen.
    Disconnected,
    /// Link is up; resend not (yet) completed on this connection.
    Connected,
    /// The pending message was re-transmitted; waiting for any inbound
    /// traffic as the implicit ack.
    AwaitingAck,
    /// Nothing pending, or the resend was acknowledged.
    Idle,
}

impl std::fmt::Display for ConnState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connected => write!(f, "connected"),
            Self::AwaitingAck => write!(f, "awaiting_ack"),
            Self::Idle => write!(f, "idle"),
        }
    }
}

// ---------------------------------------------------------------------------
// ResendOutcome
// ---------------------------------------------------------------------------

/// What a connect event resulted in.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ResendOutcome {
    /// The stored pointer body was handed to the transport.
    Resent {
        /// Hash of the re-transmitted message.
        message_hash: MessageHash,
    },
    /// No pointer exists for this peer; nothing to resend.
    NothingPending,
}

// ---------------------------------------------------------------------------
// ResendCoordinator
// ---------------------------------------------------------------------------

/// Orchestrates per-peer resend on reconnect and ack reconciliation.
pub struct ResendCoordinator {
    cursor: OutboundCursor,
    states: Mutex<HashMap<PeerId, ConnState>>,
}

impl ResendCoordinator {
    /// Creates a coordinator over the given cursor.
    pub fn new(cursor: OutboundCursor) -> Self {
        Self {
            cursor,
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the tracked state for a peer.
    pub fn state(&self, peer_id: &PeerId) -> ConnState {
        self.lock_states()
            .get(peer_id)
            .copied()
            .unwrap_or(ConnState::Disconnected)
    }

    /// Handles a transport connect event for `peer_id`.
    ///
    /// Reads the peer's pointer and, if one exists, re-transmits its
    /// stored body via `transport` — at most once per connect event.
    /// The pointer itself is never mutated here.
    ///
    /// # Errors
    ///
    /// - [`DlcSyncError::Busy`](dlcsync_types::DlcSyncError::Busy) if
    ///   an operation for this peer is already in flight; the state
    ///   stays `Connected` and no transmission happened.
    /// - [`DlcSyncError::Storage`](dlcsync_types::DlcSyncError::Storage)
    ///   if the pointer cannot be read.
    /// - [`DlcSyncError::Transport`](dlcsync_types::DlcSyncError::Transport)
    ///   if the transport refuses the send; the state stays
    ///   `Connected` and the next connect event retries.
    pub fn on_peer_connected(
        &self,
        peer_id: &PeerId,
        gates: &PeerGates,
        transport: &dyn Transport,
    ) -> Result<ResendOutcome> {
        self.set_state(peer_id, ConnState::Connected);

        // One in-flight operation per peer; holding the gate also
        // keeps a concurrent outbound send from interleaving with the
        // resend.
        let _gate = gates.try_acquire(peer_id)?;

        let pointer = match self.cursor.get(peer_id)? {
            Some(pointer) => pointer,
            None => {
                self.set_state(peer_id, ConnState::Idle);
                tracing::debug!(peer = %peer_id, "connected, nothing to resend");
                return Ok(ResendOutcome::NothingPending);
            }
        };

        transport.send(peer_id, &pointer.message_body)?;
        self.set_state(peer_id, ConnState::AwaitingAck);
        tracing::info!(
            peer = %peer_id,
            hash = %pointer.message_hash,
            "re-sent pending outbound message",
        );

        Ok(ResendOutcome::Resent {
            message_hash: pointer.message_hash,
        })
    }

    /// Handles a transport disconnect event for `peer_id`.
    ///
    /// Abandons any in-memory resend attempt; nothing stored changes.
    pub fn on_peer_disconnected(&self, peer_id: &PeerId) {
        self.set_state(peer_id, ConnState::Disconnected);
        tracing::debug!(peer = %peer_id, "peer disconnected");
    }

    /// Notes inbound traffic from `peer_id`.
    ///
    /// While `AwaitingAck`, any inbound message is the implicit
    /// acknowledgement and moves the peer to `Idle`. In every other
    /// state this is a no-op.
    pub fn on_inbound(&self, peer_id: &PeerId) {
        let mut states = self.lock_states();
        if states.get(peer_id) == Some(&ConnState::AwaitingAck) {
            states.insert(peer_id.clone(), ConnState::Idle);
            tracing::debug!(peer = %peer_id, "resend implicitly acknowledged");
        }
    }

    /// Returns the cursor, e.g. for teardown (`clear`) by the owner.
    pub fn cursor(&self) -> &OutboundCursor {
        &self.cursor
    }

    fn set_state(&self, peer_id: &PeerId, state: ConnState) {
        self.lock_states().insert(peer_id.clone(), state);
    }

    fn lock_states(&self) -> std::sync::MutexGuard<'_, HashMap<PeerId, ConnState>> {
        // State entries are replaced atomically; a panic elsewhere
        // cannot leave a torn entry. Recover instead of poisoning.
        self.states.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
