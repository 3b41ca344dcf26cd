//! Per-peer "last outbound message" resend cursor.
//!
//! One [`OutboundPointer`] per peer, keyed by peer id — an upsert
//! replaces, never appends. The pointer is a back-reference into the
//! message log plus a denormalized copy of the serialized payload, so a
//! resend never has to re-derive the message from contract state that
//! may have since moved on.
//!
//! Referential integrity is enforced transactionally: a pointer can
//! only ever be set to a hash that exists in the log as an outbound
//! message. A dangling pointer is not observable.

use std::sync::Arc;

use dlcsync_types::{Direction, DlcSyncError, MessageHash, PeerId, Result, Timestamp};
use serde::{Deserialize, Serialize};
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::Transactional;

use crate::engine::{StorageEngine, TREE_MESSAGES, TREE_OUTBOUND};
use crate::messages::StoredMessage;
use crate::typed_tree::{decode, encode, run_transaction, TypedTree};

// ---------------------------------------------------------------------------
// OutboundPointer
// ---------------------------------------------------------------------------

/// The single pending-resend record for one peer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutboundPointer {
    /// The peer this pointer belongs to.
    pub peer_id: PeerId,
    /// Back-reference into the message log; always an existing
    /// outbound row.
    pub message_hash: MessageHash,
    /// Serialized payload, resent verbatim on reconnect.
    pub message_body: Vec<u8>,
    /// When this became the pending outbound message for the peer
    /// (epoch milliseconds).
    pub timestamp_millis: i64,
}

impl OutboundPointer {
    /// Returns the replacement stamp as a [`Timestamp`], or `None` if
    /// the stored value is outside the representable range.
    pub fn timestamp(&self) -> Option<Timestamp> {
        Timestamp::from_millis(self.timestamp_millis)
    }
}

// ---------------------------------------------------------------------------
// OutboundCursor
// ---------------------------------------------------------------------------

/// Per-peer record of the most recent outbound message.
pub struct OutboundCursor {
    engine: Arc<StorageEngine>,
    outbound: TypedTree<OutboundPointer>,
    messages: sled::Tree,
}

impl OutboundCursor {
    /// Creates an `OutboundCursor` backed by the engine.
    pub fn new(engine: Arc<StorageEngine>) -> Result<Self> {
        let outbound = TypedTree::new(engine.open_tree(TREE_OUTBOUND)?);
        let messages = engine.open_tree(TREE_MESSAGES)?;
        Ok(Self {
            engine,
            outbound,
            messages,
        })
    }

    /// Atomically replaces the peer's pointer.
    ///
    /// # Errors
    ///
    /// - [`DlcSyncError::DanglingReference`] if `message_hash` is not
    ///   recorded in the log as an outbound message. The prior pointer
    ///   (if any) is left unchanged.
    /// - [`DlcSyncError::Storage`] if the persistence layer fails.
    pub fn set(&self, peer_id: &PeerId, message_hash: &MessageHash, body: &[u8]) -> Result<()> {
        let pointer = OutboundPointer {
            peer_id: peer_id.clone(),
            message_hash: message_hash.clone(),
            message_body: body.to_vec(),
            timestamp_millis: self.engine.clock().now_millis(),
        };
        let pointer_bytes = encode(&pointer)?;
        let peer_key = peer_id.as_bytes();
        let hash_key = message_hash.as_bytes();

        let dangling = || DlcSyncError::DanglingReference {
            peer_id: peer_id.to_string(),
            message_hash: message_hash.to_string(),
        };

        let result: std::result::Result<(), TransactionError<DlcSyncError>> =
            (&self.messages, self.outbound.raw()).transaction(|(messages, outbound)| {
                let raw = match messages.get(hash_key)? {
                    Some(raw) => raw,
                    None => return Err(ConflictableTransactionError::Abort(dangling())),
                };

                let stored: StoredMessage =
                    decode(&raw).map_err(ConflictableTransactionError::Abort)?;
                if stored.direction != Direction::Outbound {
                    return Err(ConflictableTransactionError::Abort(dangling()));
                }

                outbound.insert(peer_key, pointer_bytes.as_slice())?;
                Ok(())
            });

        run_transaction(result)?;
        self.engine.maybe_flush()
    }

    /// Returns the peer's current pending-resend record, or `None` if
    /// no outbound message has ever been sent to this peer.
    pub fn get(&self, peer_id: &PeerId) -> Result<Option<OutboundPointer>> {
        self.outbound.get(peer_id.as_bytes())
    }

    /// Removes the peer's pointer. Idempotent — clearing an absent
    /// pointer is a no-op. Used when a peer relationship is torn down;
    /// log rows persist for audit.
    pub fn clear(&self, peer_id: &PeerId) -> Result<()> {
        let removed = self.outbound.delete(peer_id.as_bytes())?;
        if removed {
            self.engine.maybe_flush()?;
        }
        Ok(())
    }
}
