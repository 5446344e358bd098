//! In-memory engine for tests and ephemeral data.

use crate::batch::{Batch, BatchOp, PendingOps};
use crate::db::Db;
use crate::error::{check_bounds, check_key, DbResult};
use crate::iterator::{range_bounds, DbIterator, KvPair, RangeIter, Source};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

type Tree = BTreeMap<Vec<u8>, Vec<u8>>;

/// An in-memory store over an ordered map.
///
/// This engine keeps everything in memory and is suitable for:
/// - Unit tests
/// - Conformance runs of code written against [`Db`]
/// - Ephemeral stores that don't need persistence
///
/// # Thread Safety
///
/// All operations go through one reader-writer lock. Batches apply under a
/// single write lock, so readers see all of a batch or none of it.
///
/// # Iterator caveat
///
/// Iterators copy their range when opened. Later writes are never visible to
/// an open iterator, and open iterators never block writers.
///
/// # Example
///
/// ```rust
/// use locket_db::{Db, MemDb};
///
/// let db = MemDb::new();
/// db.set(b"key", b"value").unwrap();
/// assert_eq!(db.get(b"key").unwrap(), Some(b"value".to_vec()));
/// ```
#[derive(Debug, Default)]
pub struct MemDb {
    data: Arc<RwLock<Tree>>,
}

impl MemDb {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding `pairs`.
    ///
    /// Useful for seeding test fixtures.
    #[must_use]
    pub fn with_data(pairs: impl IntoIterator<Item = KvPair>) -> Self {
        Self {
            data: Arc::new(RwLock::new(pairs.into_iter().collect())),
        }
    }

    /// Returns the number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Returns true if no keys are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    fn range_iter(
        &self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
        reverse: bool,
    ) -> DbResult<Box<dyn DbIterator>> {
        check_bounds(start, end)?;
        let snapshot: Vec<KvPair> = match range_bounds(start, end) {
            Some(bounds) => self
                .data
                .read()
                .range::<[u8], _>(bounds)
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            None => Vec::new(),
        };
        let source: Source = if reverse {
            Box::new(snapshot.into_iter().rev().map(Ok))
        } else {
            Box::new(snapshot.into_iter().map(Ok))
        };
        Ok(Box::new(RangeIter::new("memdb", source, start, end, reverse)))
    }
}

/// Constructor registered under [`crate::Engine::MemDb`].
///
/// The name and directory are ignored; every call yields a fresh store.
///
/// # Errors
///
/// Never fails; the signature matches the registry's constructor type.
pub fn new_db(_name: &str, _dir: &Path) -> DbResult<Box<dyn Db>> {
    Ok(Box::new(MemDb::new()))
}

impl Db for MemDb {
    fn get(&self, key: &[u8]) -> DbResult<Option<Vec<u8>>> {
        check_key(key)?;
        Ok(self.data.read().get(key).cloned())
    }

    fn has(&self, key: &[u8]) -> DbResult<bool> {
        check_key(key)?;
        Ok(self.data.read().contains_key(key))
    }

    fn set(&self, key: &[u8], value: &[u8]) -> DbResult<()> {
        check_key(key)?;
        self.data.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn set_sync(&self, key: &[u8], value: &[u8]) -> DbResult<()> {
        // Nothing to flush
        self.set(key, value)
    }

    fn delete(&self, key: &[u8]) -> DbResult<()> {
        check_key(key)?;
        self.data.write().remove(key);
        Ok(())
    }

    fn delete_sync(&self, key: &[u8]) -> DbResult<()> {
        self.delete(key)
    }

    fn iterator(&self, start: Option<&[u8]>, end: Option<&[u8]>) -> DbResult<Box<dyn DbIterator>> {
        self.range_iter(start, end, false)
    }

    fn reverse_iterator(
        &self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
    ) -> DbResult<Box<dyn DbIterator>> {
        self.range_iter(start, end, true)
    }

    fn new_batch(&self) -> Box<dyn Batch> {
        Box::new(MemBatch {
            data: Arc::clone(&self.data),
            ops: PendingOps::new(),
        })
    }

    fn close(&self) -> DbResult<()> {
        debug!(keys = self.len(), "closing memdb");
        Ok(())
    }

    fn stats(&self) -> BTreeMap<String, String> {
        let data = self.data.read();
        let key_bytes: usize = data.keys().map(Vec::len).sum();
        let value_bytes: usize = data.values().map(Vec::len).sum();

        let mut stats = BTreeMap::new();
        stats.insert("keys".to_string(), data.len().to_string());
        stats.insert("key_bytes".to_string(), key_bytes.to_string());
        stats.insert("value_bytes".to_string(), value_bytes.to_string());
        stats
    }
}

/// Batch for [`MemDb`], applied under one write lock.
#[derive(Debug)]
pub struct MemBatch {
    data: Arc<RwLock<Tree>>,
    ops: PendingOps,
}

impl Batch for MemBatch {
    fn set(&mut self, key: &[u8], value: &[u8]) -> DbResult<()> {
        self.ops.set(key, value)
    }

    fn delete(&mut self, key: &[u8]) -> DbResult<()> {
        self.ops.delete(key)
    }

    fn write(&mut self) -> DbResult<()> {
        let ops = self.ops.pending()?;
        {
            let mut data = self.data.write();
            for op in ops {
                match op {
                    BatchOp::Set { key, value } => {
                        data.insert(key.clone(), value.clone());
                    }
                    BatchOp::Delete { key } => {
                        data.remove(key);
                    }
                }
            }
        }
        debug!(ops = ops.len(), "memdb batch written");
        self.ops.close();
        Ok(())
    }

    fn write_sync(&mut self) -> DbResult<()> {
        self.write()
    }

    fn close(&mut self) -> DbResult<()> {
        self.ops.close();
        Ok(())
    }
}
