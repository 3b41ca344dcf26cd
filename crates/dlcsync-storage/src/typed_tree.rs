//! Generic bincode-typed sled tree wrapper.
//!
//! [`TypedTree<T>`] decodes values on read and frees callers from the
//! raw-byte plumbing for point lookups and deletes. Writes in this
//! crate always go through transactions, so the free
//! [`encode`]/[`decode`] helpers expose the same codec to transaction
//! closures, which operate on raw bytes.

use dlcsync_types::{DlcSyncError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::transaction::TransactionError;

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

/// Serializes a value with bincode.
pub(crate) fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    bincode::serialize(value).map_err(|e| DlcSyncError::Storage {
        reason: format!("bincode serialization failed: {e}"),
    })
}

/// Deserializes a value with bincode.
pub(crate) fn decode<T: DeserializeOwned>(raw: &[u8]) -> Result<T> {
    bincode::deserialize(raw).map_err(|e| DlcSyncError::Storage {
        reason: format!("bincode deserialization failed: {e}"),
    })
}

/// Collapses a sled transaction result into the crate error type.
///
/// `Abort` carries a [`DlcSyncError`] raised inside the closure (e.g. a
/// rejected dangling reference); `Storage` is a sled-level failure.
pub(crate) fn run_transaction<T>(
    result: std::result::Result<T, TransactionError<DlcSyncError>>,
) -> Result<T> {
    match result {
        Ok(value) => Ok(value),
        Err(TransactionError::Abort(e)) => Err(e),
        Err(TransactionError::Storage(e)) => Err(DlcSyncError::Storage {
            reason: format!("sled transaction failed: {e}"),
        }),
    }
}

// ---------------------------------------------------------------------------
// TypedTree
// ---------------------------------------------------------------------------

/// A sled tree whose values are bincode-serialized `T`.
pub struct TypedTree<T> {
    tree: sled::Tree,
    _marker: std::marker::PhantomData<T>,
}

impl<T> TypedTree<T>
where
    T: DeserializeOwned,
{
    /// Creates a new `TypedTree` wrapping the given sled tree.
    pub(crate) fn new(tree: sled::Tree) -> Self {
        Self {
            tree,
            _marker: std::marker::PhantomData,
        }
    }

    /// Retrieves and decodes a value by key.
    ///
    /// Returns `Ok(None)` if the key does not exist.
    pub fn get(&self, key: &[u8]) -> Result<Option<T>> {
        let raw = self.tree.get(key).map_err(|e| DlcSyncError::Storage {
            reason: format!("sled get failed: {e}"),
        })?;

        match raw {
            None => Ok(None),
            Some(bytes) => Ok(Some(decode(&bytes)?)),
        }
    }

    /// Removes a key from the tree.
    ///
    /// Returns `Ok(true)` if the key existed, `Ok(false)` if it did not.
    pub fn delete(&self, key: &[u8]) -> Result<bool> {
        let prev = self.tree.remove(key).map_err(|e| DlcSyncError::Storage {
            reason: format!("sled remove failed: {e}"),
        })?;
        Ok(prev.is_some())
    }

    /// Returns the underlying sled tree for transactional access.
    pub(crate) fn raw(&self) -> &sled::Tree {
        &self.tree
    }
}
