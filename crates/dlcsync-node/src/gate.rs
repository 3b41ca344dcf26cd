//! Per-peer in-flight operation gate.
//!
//! A peer may have at most one in-flight outbound send and at most one
//! active resend attempt at a time. Acquiring the gate for a peer that
//! is already held fails fast with `Busy` — the deterministic choice
//! here is reject-not-queue; callers retry after backoff. Peers are
//! independent: the registry lock is held only long enough to flip the
//! peer's membership in the busy set, so operations on different peers
//! never contend.

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use dlcsync_types::{DlcSyncError, PeerId, Result};

// ---------------------------------------------------------------------------
// PeerGates
// ---------------------------------------------------------------------------

/// Registry of peers with an operation in flight.
pub struct PeerGates {
    busy: Mutex<HashSet<PeerId>>,
}

impl PeerGates {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            busy: Mutex::new(HashSet::new()),
        }
    }

    /// Acquires the gate for `peer_id`.
    ///
    /// The returned guard releases the gate on drop.
    ///
    /// # Errors
    ///
    /// - [`DlcSyncError::Busy`] if an operation for this peer is
    ///   already in flight.
    pub fn try_acquire<'a>(&'a self, peer_id: &PeerId) -> Result<PeerGuard<'a>> {
        let mut busy = self.lock();
        if !busy.insert(peer_id.clone()) {
            return Err(DlcSyncError::Busy {
                peer_id: peer_id.to_string(),
            });
        }
        Ok(PeerGuard {
            gates: self,
            peer_id: peer_id.clone(),
        })
    }

    /// Returns whether the peer currently holds the gate.
    pub fn is_busy(&self, peer_id: &PeerId) -> bool {
        self.lock().contains(peer_id)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashSet<PeerId>> {
        // Membership in a HashSet cannot be left half-updated by a
        // panic; recover the inner value instead of propagating
        // poisoning.
        self.busy.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for PeerGates {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// PeerGuard
// ---------------------------------------------------------------------------

/// Holds a peer's gate; releases it on drop.
pub struct PeerGuard<'a> {
    gates: &'a PeerGates,
    peer_id: PeerId,
}

impl Drop for PeerGuard<'_> {
    fn drop(&mut self) {
        self.gates.lock().remove(&self.peer_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(id: &str) -> PeerId {
        PeerId::new(id).unwrap()
    }

    #[test]
    fn second_acquire_is_busy() {
        let gates = PeerGates::new();
        let guard = gates.try_acquire(&peer("peerA")).unwrap();

        let second = gates.try_acquire(&peer("peerA"));
        assert!(matches!(second, Err(DlcSyncError::Busy { .. })));

        drop(guard);
        assert!(gates.try_acquire(&peer("peerA")).is_ok());
    }

    #[test]
    fn peers_do_not_contend() {
        let gates = PeerGates::new();
        let _a = gates.try_acquire(&peer("peerA")).unwrap();
        let _b = gates.try_acquire(&peer("peerB")).unwrap();
        assert!(gates.is_busy(&peer("peerA")));
        assert!(gates.is_busy(&peer("peerB")));
    }

    #[test]
    fn drop_releases_gate() {
        let gates = PeerGates::new();
        {
            let _guard = gates.try_acquire(&peer("peerA")).unwrap();
            assert!(gates.is_busy(&peer("peerA")));
        }
        assert!(!gates.is_busy(&peer("peerA")));
    }
}
