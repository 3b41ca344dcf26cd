//! Outbound message orchestration.
//!
//! One call drives the full send path:
//!
//! 1. Acquire the peer gate (reject concurrent sends with `Busy`).
//! 2. Record the message and advance the resend cursor in one atomic
//!    unit of work.
//! 3. Hand the body to the transport.
//!
//! Persist before transmit: if the transport fails after the commit,
//! the pointer already covers the message and the next connect event
//! resends it. The reverse order could transmit a message the log
//! never saw.

use dlcsync_storage::messages::{MessageLog, NewMessage, RecordOutcome};
use dlcsync_types::{Direction, DlcSyncError, Result};

use crate::gate::PeerGates;
use crate::transport::Transport;

/// Records and transmits one outbound message.
///
/// # Errors
///
/// - [`DlcSyncError::Busy`] if an operation for this peer is already
///   in flight (never queued; retry after backoff).
/// - [`DlcSyncError::InvalidMessage`] if `msg.direction` is not
///   outbound.
/// - [`DlcSyncError::Storage`] if the atomic record+cursor commit
///   fails; nothing was transmitted.
/// - [`DlcSyncError::Transport`] if the transport refuses the send;
///   the message and cursor are already durable and the next connect
///   event resends.
pub fn send_outbound(
    log: &MessageLog,
    gates: &PeerGates,
    transport: &dyn Transport,
    msg: &NewMessage,
    body: &[u8],
) -> Result<RecordOutcome> {
    if msg.direction != Direction::Outbound {
        return Err(DlcSyncError::InvalidMessage {
            reason: format!("send_outbound requires an outbound message, got {}", msg.direction),
        });
    }

    let _gate = gates.try_acquire(&msg.peer_id)?;

    let outcome = log.record_outbound(msg, body)?;
    transport.send(&msg.peer_id, body)?;

    tracing::debug!(
        peer = %msg.peer_id,
        hash = %msg.hash,
        kind = %msg.message_type,
        "outbound message recorded and transmitted",
    );

    Ok(outcome)
}
