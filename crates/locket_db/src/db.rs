//! Store contract definition.

use crate::batch::Batch;
use crate::error::DbResult;
use crate::iterator::DbIterator;
use crate::util::to_hex;
use std::collections::BTreeMap;
use std::io::Write;

/// A key-value store backed by some embedded engine.
///
/// Every adapter implements the same contract regardless of how the
/// underlying engine behaves natively.
///
/// # Invariants
///
/// - Keys are never empty. Every method taking a key (or a present range
///   bound) fails with `KeyEmpty` before touching the engine.
/// - An absent key reads as `Ok(None)`, never as an error. An empty value is
///   a stored value distinct from absence.
/// - Returned bytes are owned copies.
/// - Keys are ordered by plain byte comparison. Forward iteration yields
///   ascending keys, reverse iteration the same keys descending.
/// - Point operations and batch commits may be called concurrently from
///   several threads; the engine provides the synchronization.
///
/// # Implementors
///
/// - [`crate::MemDb`] - For testing and ephemeral data
/// - `RedbDb` - Copy-on-write B-tree file (feature `redb`)
/// - `SledDb` - Log-structured store (feature `sled`)
/// - [`crate::PrefixDb`] - A namespace inside another store
pub trait Db: Send + Sync {
    /// Returns a copy of the value stored under `key`, or `None`.
    ///
    /// # Errors
    ///
    /// Returns `KeyEmpty` for an empty key, or the engine error.
    fn get(&self, key: &[u8]) -> DbResult<Option<Vec<u8>>>;

    /// Returns true if `key` is present.
    ///
    /// # Errors
    ///
    /// Returns `KeyEmpty` for an empty key, or the engine error.
    fn has(&self, key: &[u8]) -> DbResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Upserts `key` in the engine's default durability mode.
    ///
    /// # Errors
    ///
    /// Returns `KeyEmpty` for an empty key, or the engine error.
    fn set(&self, key: &[u8], value: &[u8]) -> DbResult<()>;

    /// Upserts `key` and flushes it to stable storage before returning.
    ///
    /// # Errors
    ///
    /// Returns `KeyEmpty` for an empty key, or the engine error.
    fn set_sync(&self, key: &[u8], value: &[u8]) -> DbResult<()>;

    /// Removes `key`. Removing an absent key is not an error.
    ///
    /// # Errors
    ///
    /// Returns `KeyEmpty` for an empty key, or the engine error.
    fn delete(&self, key: &[u8]) -> DbResult<()>;

    /// Removes `key` and flushes the removal before returning.
    ///
    /// # Errors
    ///
    /// Returns `KeyEmpty` for an empty key, or the engine error.
    fn delete_sync(&self, key: &[u8]) -> DbResult<()>;

    /// Opens an ascending iterator over `[start, end)`.
    ///
    /// `None` bounds are unbounded.
    ///
    /// # Errors
    ///
    /// Returns `KeyEmpty` if a present bound is empty, or the engine error.
    fn iterator(&self, start: Option<&[u8]>, end: Option<&[u8]>) -> DbResult<Box<dyn DbIterator>>;

    /// Opens a descending iterator over `[start, end)`.
    ///
    /// Yields exactly the keys [`iterator`](Self::iterator) would, starting
    /// from the greatest key below `end`.
    ///
    /// # Errors
    ///
    /// Returns `KeyEmpty` if a present bound is empty, or the engine error.
    fn reverse_iterator(
        &self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
    ) -> DbResult<Box<dyn DbIterator>>;

    /// Creates an empty batch bound to this store.
    fn new_batch(&self) -> Box<dyn Batch>;

    /// Flushes pending writes and releases what the adapter can release.
    ///
    /// The store must not be used afterwards. The engine handle itself is
    /// released once the last owner drops it.
    ///
    /// # Errors
    ///
    /// Returns the engine error if the final flush fails.
    fn close(&self) -> DbResult<()>;

    /// Writes every pair as a `[KEY]:\t[VALUE]` line of uppercase hex.
    ///
    /// # Errors
    ///
    /// Returns an error if iteration or writing to `out` fails.
    fn print(&self, out: &mut dyn Write) -> DbResult<()> {
        let mut iter = self.iterator(None, None)?;
        while iter.valid() {
            writeln!(out, "[{}]:\t[{}]", to_hex(&iter.key()), to_hex(&iter.value()))?;
            iter.next();
        }
        iter.close()
    }

    /// Returns engine statistics as string pairs.
    fn stats(&self) -> BTreeMap<String, String>;
}
