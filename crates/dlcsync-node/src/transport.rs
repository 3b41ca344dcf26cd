//! The outbound transport seam.
//!
//! The peer link (Lightning message transport or equivalent) is an
//! external collaborator. This subsystem only ever needs its send
//! primitive; connection and inbound delivery arrive as
//! [`TransportEvent`](crate::events::TransportEvent)s.

use dlcsync_types::{PeerId, Result};

/// Narrow interface to the peer transport's send primitive.
///
/// Implementations enqueue `body` for delivery to `peer_id` and return
/// once the transport has accepted it. Acceptance is not delivery —
/// delivery confirmation is the contract protocol's concern; this
/// subsystem only guarantees the message is durably logged before any
/// send is attempted.
pub trait Transport: Send + Sync {
    /// Sends a serialized message to a peer.
    ///
    /// # Errors
    ///
    /// - [`DlcSyncError::Transport`](dlcsync_types::DlcSyncError::Transport)
    ///   if the transport cannot accept the message (peer gone, queue
    ///   closed). The stored pointer is unaffected; the next connect
    ///   event retries.
    fn send(&self, peer_id: &PeerId, body: &[u8]) -> Result<()>;
}
