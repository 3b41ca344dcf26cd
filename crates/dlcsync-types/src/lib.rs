//! Core shared types for the dlcsync DLC message log.
//!
//! This crate defines all fundamental types used across the workspace.
//! No other crate should define shared types — everything lives here.

pub mod config;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

// ---------------------------------------------------------------------------
// PeerId
// ---------------------------------------------------------------------------

/// Stable identifier of a DLC counterparty.
///
/// The encoding is transport-defined (typically the hex form of the
/// peer's node public key). dlcsync treats it as an opaque key and only
/// requires it to be non-empty and bounded, so it can frame index keys.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct PeerId(String);

impl PeerId {
    /// Maximum byte length of a peer identifier.
    ///
    /// Bounded so composite storage keys can carry the length in a
    /// 16-bit prefix with room to spare.
    pub const MAX_LEN: usize = 256;

    /// Creates a new `PeerId`, validating the identifier.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(DlcSyncError::InvalidPeerId {
                reason: "peer id must not be empty".into(),
            });
        }
        if id.len() > Self::MAX_LEN {
            return Err(DlcSyncError::InvalidPeerId {
                reason: format!(
                    "peer id too long: {} bytes (max {})",
                    id.len(),
                    Self::MAX_LEN
                ),
            });
        }
        Ok(Self(id))
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the identifier bytes.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PeerId {
    type Err = DlcSyncError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::new(s)
    }
}

// ---------------------------------------------------------------------------
// MessageHash
// ---------------------------------------------------------------------------

/// Content-derived message identifier, rendered as a decimal string.
///
/// DLC protocol messages are identified by a wide unsigned hash of their
/// serialized bytes. The value routinely exceeds what a signed 64-bit
/// word can carry, so it is stored and passed around in its decimal
/// string form — identical messages map to identical hashes, and the
/// representation survives any storage backend without truncation.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct MessageHash(String);

impl MessageHash {
    /// Creates a `MessageHash` from its decimal string form.
    ///
    /// The string must be non-empty, contain only ASCII digits, and
    /// carry no leading zeros (`"0"` itself is allowed).
    pub fn new(hash: impl Into<String>) -> Result<Self> {
        let hash = hash.into();
        if hash.is_empty() {
            return Err(DlcSyncError::InvalidHash {
                reason: "message hash must not be empty".into(),
            });
        }
        if !hash.bytes().all(|b| b.is_ascii_digit()) {
            return Err(DlcSyncError::InvalidHash {
                reason: format!("message hash must be decimal digits: {hash:?}"),
            });
        }
        if hash.len() > 1 && hash.starts_with('0') {
            return Err(DlcSyncError::InvalidHash {
                reason: format!("message hash must not have leading zeros: {hash:?}"),
            });
        }
        Ok(Self(hash))
    }

    /// Derives the hash of a serialized message.
    ///
    /// Takes the first 128 bits of SHA-256 over the content bytes and
    /// renders them in decimal. Identical bytes always map to the same
    /// hash.
    pub fn digest(content: &[u8]) -> Self {
        let digest = Sha256::digest(content);
        let mut wide = [0u8; 16];
        wide.copy_from_slice(&digest.as_slice()[..16]);
        Self(u128::from_be_bytes(wide).to_string())
    }

    /// Returns the decimal string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the decimal string bytes.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for MessageHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MessageHash {
    type Err = DlcSyncError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::new(s)
    }
}

// ---------------------------------------------------------------------------
// Direction
// ---------------------------------------------------------------------------

/// Whether a logged message was sent to or received from the peer.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Received from the peer.
    Inbound,
    /// Sent to the peer.
    Outbound,
}

impl Direction {
    /// Returns the lowercase wire/schema name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inbound => "inbound",
            Self::Outbound => "outbound",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Timestamp
// ---------------------------------------------------------------------------

/// UTC timestamp with millisecond precision.
///
/// Used for ordering and audit, never for identity — message identity is
/// the content hash. Stored as epoch milliseconds.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Creates a `Timestamp` representing the current UTC time.
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Creates a `Timestamp` from a `DateTime<Utc>`.
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Creates a `Timestamp` from epoch milliseconds.
    ///
    /// Returns `None` if `millis` is outside chrono's representable
    /// range.
    pub fn from_millis(millis: i64) -> Option<Self> {
        DateTime::from_timestamp_millis(millis).map(Self)
    }

    /// Returns the inner `DateTime<Utc>`.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Returns the timestamp as epoch milliseconds.
    pub fn as_millis(&self) -> i64 {
        self.0.timestamp_millis()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

impl FromStr for Timestamp {
    type Err = DlcSyncError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let dt = DateTime::parse_from_rfc3339(s)
            .map_err(|e| DlcSyncError::Config {
                reason: format!("invalid ISO 8601 timestamp: {e}"),
            })?
            .with_timezone(&Utc);
        Ok(Self(dt))
    }
}

// ---------------------------------------------------------------------------
// DlcSyncError
// ---------------------------------------------------------------------------

/// Central error type for the dlcsync workspace.
///
/// All crates convert their internal errors into variants of this enum,
/// ensuring a unified error handling surface. A duplicate message hash
/// on `record` is deliberately NOT an error — idempotent re-recording is
/// the designed dedup path and reported as an outcome, not a failure.
#[derive(Debug, Error)]
pub enum DlcSyncError {
    /// The underlying persistence layer is unreachable or corrupt.
    #[error("storage error: {reason}")]
    Storage {
        /// Human-readable description of the storage failure.
        reason: String,
    },

    /// A cursor was pointed at a message not recorded as outbound.
    ///
    /// This is an integration error: the pointer is rejected and nothing
    /// is mutated, so a dangling reference is never observable.
    #[error("dangling reference: peer {peer_id} -> message {message_hash} is not a recorded outbound message")]
    DanglingReference {
        /// Peer whose cursor was being set.
        peer_id: String,
        /// The hash that has no matching outbound log row.
        message_hash: String,
    },

    /// An operation for this peer is already in flight.
    ///
    /// Retryable — callers should back off and try again. Operations for
    /// different peers never contend.
    #[error("operation already in flight for peer {peer_id}")]
    Busy {
        /// The contended peer.
        peer_id: String,
    },

    /// A peer identifier failed validation.
    #[error("invalid peer id: {reason}")]
    InvalidPeerId {
        /// Human-readable description of the validation failure.
        reason: String,
    },

    /// A message hash failed validation.
    #[error("invalid message hash: {reason}")]
    InvalidHash {
        /// Human-readable description of the validation failure.
        reason: String,
    },

    /// A message record is malformed for the requested operation.
    #[error("invalid message: {reason}")]
    InvalidMessage {
        /// Human-readable description of the message problem.
        reason: String,
    },

    /// The transport send primitive failed.
    #[error("transport error: {reason}")]
    Transport {
        /// Human-readable description of the transport failure.
        reason: String,
    },

    /// A configuration value is invalid or a lifecycle rule was violated.
    #[error("config error: {reason}")]
    Config {
        /// Human-readable description of the configuration problem.
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// Result alias
// ---------------------------------------------------------------------------

/// Convenience result type using [`DlcSyncError`].
pub type Result<T> = std::result::Result<T, DlcSyncError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
