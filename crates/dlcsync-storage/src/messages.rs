//! Content-addressed, append-only message log.
//!
//! The `messages` tree carries two disjoint keyspaces:
//!
//! - message rows keyed by the decimal hash bytes (first byte is an
//!   ASCII digit, 0x30..=0x39);
//! - per-peer index entries keyed as
//!   `peer_len_be(2) || peer || timestamp_millis_be(8) || hash`, whose
//!   first byte is the high length byte (at most 0x01 since peer ids
//!   cap at 256 bytes), with the hash bytes as value.
//!
//! The keyspaces cannot collide, a peer's prefix scan never touches
//! message rows, and sled's lexicographic iterator yields index
//! entries in natural timestamp-ascending order. Keeping both in one
//! tree lets a row and its index entry commit in a single-tree
//! transaction, with the outbound pointer joining as the second tree
//! where required.
//!
//! Recording is idempotent: a hash that is already present is reported
//! as [`RecordOutcome::AlreadyRecorded`] and nothing is mutated — this
//! is the dedup point for replayed protocol messages, not an error.

use std::sync::Arc;

use dlcsync_types::{Direction, DlcSyncError, MessageHash, PeerId, Result, Timestamp};
use serde::{Deserialize, Serialize};
use sled::transaction::TransactionError;
use sled::Transactional;

use crate::engine::{StorageEngine, TREE_MESSAGES, TREE_OUTBOUND};
use crate::outbound::OutboundPointer;
use crate::typed_tree::{decode, encode, run_transaction};

// ---------------------------------------------------------------------------
// RecordOutcome
// ---------------------------------------------------------------------------

/// Result of an idempotent `record` call.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RecordOutcome {
    /// The message was new and has been durably recorded.
    Inserted,
    /// A row with this hash already existed; nothing was mutated.
    AlreadyRecorded,
}

// ---------------------------------------------------------------------------
// NewMessage / StoredMessage
// ---------------------------------------------------------------------------

/// A protocol message about to be recorded.
///
/// The caller supplies identity and classification; the log assigns the
/// timestamp from the process monotonic clock at insert time.
#[derive(Clone, Debug)]
pub struct NewMessage {
    /// Content-derived identifier.
    pub hash: MessageHash,
    /// Whether the message was sent or received.
    pub direction: Direction,
    /// The counterparty.
    pub peer_id: PeerId,
    /// Protocol message kind (offer, accept, sign, ...).
    pub message_type: String,
    /// Sub-variant of the kind.
    pub message_sub_type: String,
}

/// A message row as persisted in the log.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoredMessage {
    /// Content-derived identifier, immutable and globally unique.
    pub hash: MessageHash,
    /// Whether the message was sent or received.
    pub direction: Direction,
    /// The counterparty.
    pub peer_id: PeerId,
    /// Protocol message kind.
    pub message_type: String,
    /// Sub-variant of the kind.
    pub message_sub_type: String,
    /// Insert stamp in epoch milliseconds, strictly increasing per
    /// process. Orders the log; never part of identity.
    pub timestamp_millis: i64,
}

impl StoredMessage {
    /// Returns the insert stamp as a [`Timestamp`], or `None` if the
    /// stored value is outside the representable range.
    pub fn timestamp(&self) -> Option<Timestamp> {
        Timestamp::from_millis(self.timestamp_millis)
    }
}

// ---------------------------------------------------------------------------
// MessageLog
// ---------------------------------------------------------------------------

/// Append-only, hash-indexed store of every DLC protocol message ever
/// sent or received.
pub struct MessageLog {
    engine: Arc<StorageEngine>,
    log: sled::Tree,
    outbound: sled::Tree,
}

impl MessageLog {
    /// Creates a `MessageLog` backed by the engine.
    pub fn new(engine: Arc<StorageEngine>) -> Result<Self> {
        let log = engine.open_tree(TREE_MESSAGES)?;
        let outbound = engine.open_tree(TREE_OUTBOUND)?;
        Ok(Self {
            engine,
            log,
            outbound,
        })
    }

    /// Idempotently persists a message.
    ///
    /// The message row and its index entry are committed in one
    /// transaction. If the hash is already present the call is a no-op
    /// and returns [`RecordOutcome::AlreadyRecorded`].
    ///
    /// # Errors
    ///
    /// - [`DlcSyncError::Storage`] if the persistence layer fails.
    pub fn record(&self, msg: &NewMessage) -> Result<RecordOutcome> {
        let stored = self.stamp(msg);
        let encoded = encode(&stored)?;
        let index_key = build_index_key(&msg.peer_id, stored.timestamp_millis, &msg.hash);
        let hash_key = msg.hash.as_bytes();

        let result: std::result::Result<RecordOutcome, TransactionError<DlcSyncError>> =
            self.log.transaction(|log| {
                if log.get(hash_key)?.is_some() {
                    return Ok(RecordOutcome::AlreadyRecorded);
                }
                log.insert(hash_key, encoded.as_slice())?;
                log.insert(index_key.as_slice(), hash_key)?;
                Ok(RecordOutcome::Inserted)
            });

        let outcome = run_transaction(result)?;
        if outcome == RecordOutcome::Inserted {
            self.engine.maybe_flush()?;
        }
        Ok(outcome)
    }

    /// Persists an outbound message and advances the peer's resend
    /// cursor in the same unit of work.
    ///
    /// The message row, its index entry, and the replaced
    /// [`OutboundPointer`] commit atomically: no reader can observe the
    /// message without the cursor update or the cursor without the
    /// durably recorded message. If the hash is already present the
    /// whole call is a no-op — the cursor keeps whatever the first
    /// recording produced.
    ///
    /// # Errors
    ///
    /// - [`DlcSyncError::InvalidMessage`] if `msg.direction` is not
    ///   [`Direction::Outbound`].
    /// - [`DlcSyncError::Storage`] if the persistence layer fails.
    pub fn record_outbound(&self, msg: &NewMessage, body: &[u8]) -> Result<RecordOutcome> {
        if msg.direction != Direction::Outbound {
            return Err(DlcSyncError::InvalidMessage {
                reason: format!(
                    "record_outbound requires an outbound message, got {}",
                    msg.direction
                ),
            });
        }

        let stored = self.stamp(msg);
        let encoded = encode(&stored)?;
        let index_key = build_index_key(&msg.peer_id, stored.timestamp_millis, &msg.hash);
        let hash_key = msg.hash.as_bytes();

        let pointer = OutboundPointer {
            peer_id: msg.peer_id.clone(),
            message_hash: msg.hash.clone(),
            message_body: body.to_vec(),
            timestamp_millis: stored.timestamp_millis,
        };
        let pointer_bytes = encode(&pointer)?;
        let peer_key = msg.peer_id.as_bytes();

        let result: std::result::Result<RecordOutcome, TransactionError<DlcSyncError>> =
            (&self.log, &self.outbound).transaction(|(log, outbound)| {
                if log.get(hash_key)?.is_some() {
                    return Ok(RecordOutcome::AlreadyRecorded);
                }
                log.insert(hash_key, encoded.as_slice())?;
                log.insert(index_key.as_slice(), hash_key)?;
                outbound.insert(peer_key, pointer_bytes.as_slice())?;
                Ok(RecordOutcome::Inserted)
            });

        let outcome = run_transaction(result)?;
        if outcome == RecordOutcome::Inserted {
            self.engine.maybe_flush()?;
        }
        Ok(outcome)
    }

    /// Returns the stored message for a hash, or `None` if unknown.
    ///
    /// Used by the contract state machine to detect and discard replays.
    pub fn lookup(&self, hash: &MessageHash) -> Result<Option<StoredMessage>> {
        let raw = self.log.get(hash.as_bytes()).map_err(|e| DlcSyncError::Storage {
            reason: format!("sled get failed: {e}"),
        })?;
        match raw {
            None => Ok(None),
            Some(bytes) => Ok(Some(decode(&bytes)?)),
        }
    }

    /// Iterates a peer's messages in timestamp-ascending order.
    ///
    /// The iterator is lazy and restartable (call again for a fresh
    /// scan). Pass a direction to filter. Audit and debugging only —
    /// protocol correctness never depends on this.
    pub fn list_by_peer(&self, peer_id: &PeerId, direction: Option<Direction>) -> MessageIter {
        MessageIter {
            inner: self.log.scan_prefix(index_prefix(peer_id)),
            log: self.log.clone(),
            direction,
        }
    }

    /// Stamps an input message with the next monotonic timestamp.
    fn stamp(&self, msg: &NewMessage) -> StoredMessage {
        StoredMessage {
            hash: msg.hash.clone(),
            direction: msg.direction,
            peer_id: msg.peer_id.clone(),
            message_type: msg.message_type.clone(),
            message_sub_type: msg.message_sub_type.clone(),
            timestamp_millis: self.engine.clock().now_millis(),
        }
    }
}

// ---------------------------------------------------------------------------
// MessageIter
// ---------------------------------------------------------------------------

/// Lazy timestamp-ordered iterator over one peer's messages.
pub struct MessageIter {
    inner: sled::Iter,
    log: sled::Tree,
    direction: Option<Direction>,
}

impl Iterator for MessageIter {
    type Item = Result<StoredMessage>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let hash_bytes = match self.inner.next()? {
                Ok((_key, hash_bytes)) => hash_bytes,
                Err(e) => {
                    return Some(Err(DlcSyncError::Storage {
                        reason: format!("sled scan_prefix failed: {e}"),
                    }))
                }
            };

            let raw = match self.log.get(&hash_bytes) {
                Ok(Some(raw)) => raw,
                Ok(None) => {
                    // The index entry is only ever written in the same
                    // transaction as the message row.
                    return Some(Err(DlcSyncError::Storage {
                        reason: "peer index entry without a message row".into(),
                    }));
                }
                Err(e) => {
                    return Some(Err(DlcSyncError::Storage {
                        reason: format!("sled get failed: {e}"),
                    }))
                }
            };

            let msg: StoredMessage = match decode(&raw) {
                Ok(msg) => msg,
                Err(e) => return Some(Err(e)),
            };

            match self.direction {
                Some(wanted) if msg.direction != wanted => continue,
                _ => return Some(Ok(msg)),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Key construction
// ---------------------------------------------------------------------------

/// Length-framed peer prefix: `peer_len_be(2) || peer`.
///
/// The leading length byte is at most 0x01, below any ASCII digit, so
/// index keys and hash-keyed message rows occupy disjoint ranges of
/// the same tree. The framing also keeps one peer's scan range from
/// matching another peer whose id extends it.
fn index_prefix(peer_id: &PeerId) -> Vec<u8> {
    let peer = peer_id.as_bytes();
    let mut key = Vec::with_capacity(2 + peer.len());
    key.extend_from_slice(&(peer.len() as u16).to_be_bytes());
    key.extend_from_slice(peer);
    key
}

/// Builds a peer-index key:
/// `peer_len_be(2) || peer || timestamp_millis_be(8) || hash`.
fn build_index_key(peer_id: &PeerId, timestamp_millis: i64, hash: &MessageHash) -> Vec<u8> {
    let mut key = index_prefix(peer_id);
    key.extend_from_slice(&timestamp_millis.to_be_bytes());
    key.extend_from_slice(hash.as_bytes());
    key
}
