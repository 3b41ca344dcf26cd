//! Core storage engine: database lifecycle and tree access.
//!
//! The [`StorageEngine`] owns the sled database, the durability policy,
//! and the process monotonic clock. On [`open`](StorageEngine::open) it
//! validates the configuration, opens the database, and creates all
//! required trees so later tree access cannot fail.

use std::path::Path;
use std::sync::Arc;

use dlcsync_types::config::SyncConfig;
use dlcsync_types::{DlcSyncError, Result};

use crate::clock::MonotonicClock;

// ---------------------------------------------------------------------------
// Tree names
// ---------------------------------------------------------------------------

/// Message rows keyed by content hash, plus the per-peer ordering
/// index (`peer_len_be || peer || ts_be || hash` -> hash). The two
/// keyspaces cannot collide: hash keys start with an ASCII digit
/// (0x30..=0x39), index keys with a length byte of at most 0x01.
pub(crate) const TREE_MESSAGES: &str = "messages";

/// Outbound resend pointers keyed by peer id.
pub(crate) const TREE_OUTBOUND: &str = "outbound_pointers";

// ---------------------------------------------------------------------------
// StorageEngine
// ---------------------------------------------------------------------------

/// Sled-backed storage engine for the message log and resend cursor.
///
/// # Trees
///
/// - `messages` — append-only message rows (primary key = content
///   hash) and the per-peer timestamp-ordered index entries pointing
///   at them
/// - `outbound_pointers` — at most one resend pointer per peer
pub struct StorageEngine {
    db: sled::Db,
    clock: MonotonicClock,
    flush_on_write: bool,
}

impl StorageEngine {
    /// Opens (or creates) the storage engine at `path`.
    ///
    /// # Errors
    ///
    /// - [`DlcSyncError::Config`] if `config` fails validation.
    /// - [`DlcSyncError::Storage`] if the database cannot be opened.
    pub fn open(path: &Path, config: &SyncConfig) -> Result<Arc<Self>> {
        config.validate()?;

        let db = sled::open(path).map_err(|e| DlcSyncError::Storage {
            reason: format!("failed to open database at {}: {e}", path.display()),
        })?;

        let engine = Self {
            db,
            clock: MonotonicClock::new(),
            flush_on_write: config.flush_on_write,
        };

        // Create all trees up front so stores cannot fail lazily.
        for name in [TREE_MESSAGES, TREE_OUTBOUND] {
            engine.open_tree(name)?;
        }

        Ok(Arc::new(engine))
    }

    /// Opens a named tree.
    pub(crate) fn open_tree(&self, name: &str) -> Result<sled::Tree> {
        self.db.open_tree(name).map_err(|e| DlcSyncError::Storage {
            reason: format!("failed to open tree {name}: {e}"),
        })
    }

    /// Returns the process monotonic clock used to stamp rows.
    pub(crate) fn clock(&self) -> &MonotonicClock {
        &self.clock
    }

    /// Flushes to disk if the durability policy asks for it.
    pub(crate) fn maybe_flush(&self) -> Result<()> {
        if self.flush_on_write {
            self.flush()?;
        }
        Ok(())
    }

    /// Forces all buffered writes to disk.
    pub fn flush(&self) -> Result<()> {
        self.db.flush().map_err(|e| DlcSyncError::Storage {
            reason: format!("sled flush failed: {e}"),
        })?;
        Ok(())
    }
}
