//! Inbound message processing.
//!
//! Handles messages the transport adapter has already decoded. This
//! layer is responsible for:
//!
//! 1. Recording the message to the log — the dedup point.
//! 2. Notifying the coordinator (inbound traffic is the implicit ack).
//! 3. Handing the outcome back so the contract state machine can
//!    discard replays.
//!
//! A duplicate hash is not an error: the caller receives
//! [`RecordOutcome::AlreadyRecorded`] and skips dispatch.

use dlcsync_storage::messages::{MessageLog, NewMessage, RecordOutcome};
use dlcsync_types::{Direction, MessageHash, PeerId, Result};

use crate::coordinator::ResendCoordinator;

/// Processes one decoded inbound message.
///
/// Records first, then notifies the coordinator — even a replayed
/// message proves the peer is live and processing, so it still counts
/// as the implicit acknowledgement.
///
/// # Errors
///
/// - [`DlcSyncError::Storage`](dlcsync_types::DlcSyncError::Storage)
///   if the log cannot be written; the message must not be dispatched
///   in that case (no dedup guarantee without the record).
pub fn handle_inbound(
    log: &MessageLog,
    coordinator: &ResendCoordinator,
    peer_id: &PeerId,
    hash: MessageHash,
    message_type: String,
    message_sub_type: String,
) -> Result<RecordOutcome> {
    let msg = NewMessage {
        hash,
        direction: Direction::Inbound,
        peer_id: peer_id.clone(),
        message_type,
        message_sub_type,
    };

    let outcome = log.record(&msg)?;
    coordinator.on_inbound(peer_id);

    match outcome {
        RecordOutcome::Inserted => {
            tracing::debug!(peer = %peer_id, hash = %msg.hash, "inbound message recorded");
        }
        RecordOutcome::AlreadyRecorded => {
            tracing::debug!(peer = %peer_id, hash = %msg.hash, "duplicate inbound message");
        }
    }

    Ok(outcome)
}
