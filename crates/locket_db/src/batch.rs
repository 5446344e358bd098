//! Batch contract and the pending-operation buffer shared by adapters.

use crate::error::{check_key, DbError, DbResult};

/// A buffered set of writes committed atomically, at most once.
///
/// # Lifecycle
///
/// - `set`/`delete` enqueue operations; nothing is visible to readers yet.
/// - `write`/`write_sync` apply every operation in enqueue order (later
///   operations on the same key win) and close the batch.
/// - After a successful write, or after `close`, every mutating call fails
///   with [`DbError::BatchClosed`].
/// - `close` discards pending operations and may be called any number of
///   times, including after a successful write.
///
/// If a write fails inside the engine the batch stays open, so the caller
/// may retry or close it.
pub trait Batch: Send {
    /// Enqueues an upsert.
    ///
    /// # Errors
    ///
    /// Returns `KeyEmpty` for an empty key and `BatchClosed` once the batch
    /// has been written or closed.
    fn set(&mut self, key: &[u8], value: &[u8]) -> DbResult<()>;

    /// Enqueues a delete.
    ///
    /// # Errors
    ///
    /// Returns `KeyEmpty` for an empty key and `BatchClosed` once the batch
    /// has been written or closed.
    fn delete(&mut self, key: &[u8]) -> DbResult<()>;

    /// Applies the batch atomically and closes it.
    ///
    /// # Errors
    ///
    /// Returns `BatchClosed` if already written or closed, or the engine
    /// error if the commit fails.
    fn write(&mut self) -> DbResult<()>;

    /// Like [`write`](Self::write), but durable before returning.
    ///
    /// # Errors
    ///
    /// Same as [`write`](Self::write).
    fn write_sync(&mut self) -> DbResult<()>;

    /// Discards pending operations. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine fails to release batch resources.
    fn close(&mut self) -> DbResult<()>;
}

/// A single buffered mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    /// Upsert `key` to `value`.
    Set {
        /// Key to write.
        key: Vec<u8>,
        /// Value to write.
        value: Vec<u8>,
    },
    /// Remove `key` if present.
    Delete {
        /// Key to remove.
        key: Vec<u8>,
    },
}

impl BatchOp {
    /// Returns the key this operation touches.
    #[must_use]
    pub fn key(&self) -> &[u8] {
        match self {
            Self::Set { key, .. } | Self::Delete { key } => key,
        }
    }
}

/// Ordered operations plus the open/closed state of a batch.
///
/// `None` means closed, which keeps "closed" and "open but empty" distinct.
#[derive(Debug)]
pub(crate) struct PendingOps {
    ops: Option<Vec<BatchOp>>,
}

impl PendingOps {
    pub(crate) fn new() -> Self {
        Self {
            ops: Some(Vec::new()),
        }
    }

    pub(crate) fn set(&mut self, key: &[u8], value: &[u8]) -> DbResult<()> {
        check_key(key)?;
        let ops = self.ops.as_mut().ok_or(DbError::BatchClosed)?;
        ops.push(BatchOp::Set {
            key: key.to_vec(),
            value: value.to_vec(),
        });
        Ok(())
    }

    pub(crate) fn delete(&mut self, key: &[u8]) -> DbResult<()> {
        check_key(key)?;
        let ops = self.ops.as_mut().ok_or(DbError::BatchClosed)?;
        ops.push(BatchOp::Delete { key: key.to_vec() });
        Ok(())
    }

    /// Returns the operations to commit, or `BatchClosed`.
    pub(crate) fn pending(&self) -> DbResult<&[BatchOp]> {
        self.ops.as_deref().ok_or(DbError::BatchClosed)
    }

    pub(crate) fn close(&mut self) {
        self.ops = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_ops_keep_enqueue_order() {
        let mut ops = PendingOps::new();
        ops.set(b"k1", b"v1").unwrap();
        ops.delete(b"k2").unwrap();
        ops.set(b"k1", b"v2").unwrap();

        let pending = ops.pending().unwrap();
        assert_eq!(pending.len(), 3);
        assert_eq!(pending[1], BatchOp::Delete { key: b"k2".to_vec() });
        assert_eq!(pending[2].key(), b"k1");
    }

    #[test]
    fn pending_ops_reject_empty_key() {
        let mut ops = PendingOps::new();
        assert!(matches!(ops.set(b"", b"v"), Err(DbError::KeyEmpty)));
        assert!(matches!(ops.delete(b""), Err(DbError::KeyEmpty)));
        assert!(ops.pending().unwrap().is_empty());
    }

    #[test]
    fn pending_ops_closed() {
        let mut ops = PendingOps::new();
        ops.set(b"k", b"v").unwrap();
        ops.close();
        ops.close();
        assert!(matches!(ops.set(b"k", b"v"), Err(DbError::BatchClosed)));
        assert!(matches!(ops.delete(b"k"), Err(DbError::BatchClosed)));
        assert!(matches!(ops.pending(), Err(DbError::BatchClosed)));
    }

    #[test]
    fn pending_ops_empty_value_is_allowed() {
        let mut ops = PendingOps::new();
        ops.set(b"k", b"").unwrap();
        assert_eq!(
            ops.pending().unwrap()[0],
            BatchOp::Set {
                key: b"k".to_vec(),
                value: Vec::new()
            }
        );
    }
}
