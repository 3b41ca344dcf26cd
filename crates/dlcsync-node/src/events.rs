//! Transport events consumed by the event loop.
//!
//! [`TransportEvent`] is the unified event type the transport adapter
//! feeds into the service channel. Transport-specific connection state
//! is mapped into this enum before delivery, keeping higher layers
//! decoupled from the link implementation.

use dlcsync_types::{MessageHash, PeerId};

// ---------------------------------------------------------------------------
// TransportEvent
// ---------------------------------------------------------------------------

/// Events emitted by the peer transport layer.
#[derive(Clone, Debug)]
pub enum TransportEvent {
    /// A peer link came up. Triggers the resend check.
    PeerConnected(PeerId),

    /// A peer link went down. Abandons any in-memory resend attempt;
    /// stored state is untouched.
    PeerDisconnected(PeerId),

    /// A decoded protocol message arrived from a peer.
    ///
    /// The adapter has already decoded the wire bytes and derived the
    /// content hash; the event loop records it before the contract
    /// state machine sees it.
    MessageReceived {
        /// Sending peer.
        peer_id: PeerId,
        /// Content-derived identifier of the decoded message.
        hash: MessageHash,
        /// Protocol message kind (offer, accept, sign, ...).
        message_type: String,
        /// Sub-variant of the kind.
        message_sub_type: String,
    },
}
