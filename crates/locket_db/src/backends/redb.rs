//! Adapter over redb, a copy-on-write B-tree in a single file.
//!
//! All pairs live in one table. Every write is its own transaction, committed
//! with [`Durability::Eventual`] unless the caller asked for a sync write.
//! Iterators read from a read transaction opened with the iterator, so they
//! see the store as of that moment.

use crate::batch::{Batch, BatchOp, PendingOps};
use crate::db::Db;
use crate::error::{check_bounds, check_key, DbError, DbResult};
use crate::iterator::{range_bounds, DbIterator, KvPair, RangeIter, Source};
use ::redb::{
    Database, Durability, ReadOnlyTable, ReadTransaction, TableDefinition, WriteTransaction,
};
use std::collections::{BTreeMap, VecDeque};
use std::fs;
use std::ops::Bound;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, trace};

const TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("locket");

/// File extension of a redb store.
pub const FILE_EXTENSION: &str = "db";

/// Pairs fetched per read while iterating.
const SCAN_CHUNK: usize = 256;

fn redb_err(e: impl Into<::redb::Error>) -> DbError {
    DbError::Redb(e.into())
}

/// Options for opening a [`RedbDb`].
#[derive(Debug, Clone, Default)]
pub struct RedbOptions {
    /// Page cache size in bytes. `None` keeps redb's default.
    pub cache_size: Option<usize>,
    /// Commit every write with [`Durability::Immediate`], as if every call
    /// were the sync variant.
    pub sync_writes: bool,
}

impl RedbOptions {
    /// Sets the page cache size.
    #[must_use]
    pub fn cache_size(mut self, bytes: usize) -> Self {
        self.cache_size = Some(bytes);
        self
    }

    /// Makes every write durable before returning.
    #[must_use]
    pub fn sync_writes(mut self, enabled: bool) -> Self {
        self.sync_writes = enabled;
        self
    }

    fn validate(&self) -> DbResult<()> {
        if self.cache_size == Some(0) {
            return Err(DbError::invalid_options("redb cache size must be non-zero"));
        }
        Ok(())
    }
}

/// A store in the file `<dir>/<name>.db`.
///
/// # Iterator caveat
///
/// Iterators hold a read transaction until closed or dropped. Writers are
/// never blocked by it, but pages it references cannot be reclaimed.
pub struct RedbDb {
    db: Arc<Database>,
    path: PathBuf,
    options: RedbOptions,
}

impl std::fmt::Debug for RedbDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbDb")
            .field("path", &self.path)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl RedbDb {
    /// Opens or creates the store `<dir>/<name>.db`, creating `dir` if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created, the options are
    /// invalid, or redb cannot open the file.
    pub fn open(name: &str, dir: &Path) -> DbResult<Self> {
        Self::open_with_options(name, dir, RedbOptions::default())
    }

    /// Opens with explicit options.
    ///
    /// # Errors
    ///
    /// See [`open`](Self::open).
    pub fn open_with_options(name: &str, dir: &Path, options: RedbOptions) -> DbResult<Self> {
        options.validate()?;
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("{name}.{FILE_EXTENSION}"));

        let mut builder = Database::builder();
        if let Some(bytes) = options.cache_size {
            builder.set_cache_size(bytes);
        }
        let db = builder.create(&path).map_err(redb_err)?;

        // Make sure the table exists so reads never hit TableDoesNotExist.
        let txn = db.begin_write().map_err(redb_err)?;
        txn.open_table(TABLE).map_err(redb_err)?;
        txn.commit().map_err(redb_err)?;

        debug!(path = %path.display(), "opened redb store");
        Ok(Self {
            db: Arc::new(db),
            path,
            options,
        })
    }

    /// Returns the path of the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn durability(&self, sync: bool) -> Durability {
        durability(sync || self.options.sync_writes)
    }

    fn begin_write(&self, sync: bool) -> DbResult<WriteTransaction> {
        let mut txn = self.db.begin_write().map_err(redb_err)?;
        txn.set_durability(self.durability(sync));
        Ok(txn)
    }

    fn put(&self, key: &[u8], value: &[u8], sync: bool) -> DbResult<()> {
        check_key(key)?;
        let txn = self.begin_write(sync)?;
        {
            let mut table = txn.open_table(TABLE).map_err(redb_err)?;
            table.insert(key, value).map_err(redb_err)?;
        }
        txn.commit().map_err(redb_err)
    }

    fn remove(&self, key: &[u8], sync: bool) -> DbResult<()> {
        check_key(key)?;
        let txn = self.begin_write(sync)?;
        {
            let mut table = txn.open_table(TABLE).map_err(redb_err)?;
            table.remove(key).map_err(redb_err)?;
        }
        txn.commit().map_err(redb_err)
    }

    fn range_iter(
        &self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
        reverse: bool,
    ) -> DbResult<Box<dyn DbIterator>> {
        check_bounds(start, end)?;
        let source: Source = match range_bounds(start, end) {
            Some((lower, upper)) => {
                let txn = self.db.begin_read().map_err(redb_err)?;
                let table = txn.open_table(TABLE).map_err(redb_err)?;
                Box::new(RedbScan {
                    table,
                    _txn: txn,
                    lower: owned_bound(lower),
                    upper: owned_bound(upper),
                    reverse,
                    buffer: VecDeque::new(),
                    exhausted: false,
                })
            }
            None => Box::new(std::iter::empty()),
        };
        trace!(reverse, "opened redb iterator");
        Ok(Box::new(RangeIter::new("redb", source, start, end, reverse)))
    }
}

fn durability(sync: bool) -> Durability {
    if sync {
        Durability::Immediate
    } else {
        Durability::Eventual
    }
}

fn owned_bound(bound: Bound<&[u8]>) -> Bound<Vec<u8>> {
    match bound {
        Bound::Included(k) => Bound::Included(k.to_vec()),
        Bound::Excluded(k) => Bound::Excluded(k.to_vec()),
        Bound::Unbounded => Bound::Unbounded,
    }
}

fn borrowed_bound(bound: &Bound<Vec<u8>>) -> Bound<&[u8]> {
    match bound {
        Bound::Included(k) => Bound::Included(k.as_slice()),
        Bound::Excluded(k) => Bound::Excluded(k.as_slice()),
        Bound::Unbounded => Bound::Unbounded,
    }
}

/// Constructor registered under [`crate::Engine::Redb`].
///
/// # Errors
///
/// See [`RedbDb::open`].
pub fn new_db(name: &str, dir: &Path) -> DbResult<Box<dyn Db>> {
    Ok(Box::new(RedbDb::open(name, dir)?))
}

impl Db for RedbDb {
    fn get(&self, key: &[u8]) -> DbResult<Option<Vec<u8>>> {
        check_key(key)?;
        let txn = self.db.begin_read().map_err(redb_err)?;
        let table = txn.open_table(TABLE).map_err(redb_err)?;
        let value = table.get(key).map_err(redb_err)?;
        Ok(value.map(|guard| guard.value().to_vec()))
    }

    fn set(&self, key: &[u8], value: &[u8]) -> DbResult<()> {
        self.put(key, value, false)
    }

    fn set_sync(&self, key: &[u8], value: &[u8]) -> DbResult<()> {
        self.put(key, value, true)
    }

    fn delete(&self, key: &[u8]) -> DbResult<()> {
        self.remove(key, false)
    }

    fn delete_sync(&self, key: &[u8]) -> DbResult<()> {
        self.remove(key, true)
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
        Box::new(RedbBatch {
            db: Arc::clone(&self.db),
            sync_writes: self.options.sync_writes,
            ops: PendingOps::new(),
        })
    }

    fn close(&self) -> DbResult<()> {
        // An empty immediate commit persists every earlier eventual commit.
        let txn = self.begin_write(true)?;
        txn.commit().map_err(redb_err)?;
        debug!(path = %self.path.display(), "closed redb store");
        Ok(())
    }

    fn stats(&self) -> BTreeMap<String, String> {
        let mut stats = BTreeMap::new();
        stats.insert("path".to_string(), self.path.display().to_string());

        let collected = self.db.begin_write().map_err(redb_err).and_then(|txn| {
            let result = txn.stats().map_err(redb_err);
            txn.abort().map_err(redb_err)?;
            result
        });
        match collected {
            Ok(s) => {
                stats.insert("tree_height".to_string(), s.tree_height().to_string());
                stats.insert("allocated_pages".to_string(), s.allocated_pages().to_string());
                stats.insert("leaf_pages".to_string(), s.leaf_pages().to_string());
                stats.insert("branch_pages".to_string(), s.branch_pages().to_string());
                stats.insert("stored_bytes".to_string(), s.stored_bytes().to_string());
                stats.insert("metadata_bytes".to_string(), s.metadata_bytes().to_string());
                stats.insert("fragmented_bytes".to_string(), s.fragmented_bytes().to_string());
                stats.insert("page_size".to_string(), s.page_size().to_string());
            }
            Err(e) => {
                stats.insert("error".to_string(), e.to_string());
            }
        }
        stats
    }
}

/// Batch for [`RedbDb`], committed as one write transaction.
pub struct RedbBatch {
    db: Arc<Database>,
    sync_writes: bool,
    ops: PendingOps,
}

impl std::fmt::Debug for RedbBatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbBatch")
            .field("ops", &self.ops)
            .finish_non_exhaustive()
    }
}

impl RedbBatch {
    fn commit(&mut self, sync: bool) -> DbResult<()> {
        let ops = self.ops.pending()?;
        let mut txn = self.db.begin_write().map_err(redb_err)?;
        txn.set_durability(durability(sync || self.sync_writes));
        {
            let mut table = txn.open_table(TABLE).map_err(redb_err)?;
            for op in ops {
                match op {
                    BatchOp::Set { key, value } => {
                        table.insert(key.as_slice(), value.as_slice()).map_err(redb_err)?;
                    }
                    BatchOp::Delete { key } => {
                        table.remove(key.as_slice()).map_err(redb_err)?;
                    }
                }
            }
        }
        txn.commit().map_err(redb_err)?;
        debug!(ops = ops.len(), sync, "redb batch written");
        self.ops.close();
        Ok(())
    }
}

impl Batch for RedbBatch {
    fn set(&mut self, key: &[u8], value: &[u8]) -> DbResult<()> {
        self.ops.set(key, value)
    }

    fn delete(&mut self, key: &[u8]) -> DbResult<()> {
        self.ops.delete(key)
    }

    fn write(&mut self) -> DbResult<()> {
        self.commit(false)
    }

    fn write_sync(&mut self) -> DbResult<()> {
        self.commit(true)
    }

    fn close(&mut self) -> DbResult<()> {
        self.ops.close();
        Ok(())
    }
}

/// Chunked scan over a read-only table.
///
/// Each refill reads up to [`SCAN_CHUNK`] pairs and narrows the remaining
/// range past the last key read.
struct RedbScan {
    table: ReadOnlyTable<&'static [u8], &'static [u8]>,
    _txn: ReadTransaction,
    lower: Bound<Vec<u8>>,
    upper: Bound<Vec<u8>>,
    reverse: bool,
    buffer: VecDeque<KvPair>,
    exhausted: bool,
}

impl RedbScan {
    fn refill(&mut self) -> DbResult<()> {
        let bounds = (borrowed_bound(&self.lower), borrowed_bound(&self.upper));
        let range = self.table.range::<&[u8]>(bounds).map_err(redb_err)?;
        let entries: Box<dyn Iterator<Item = _>> = if self.reverse {
            Box::new(range.rev())
        } else {
            Box::new(range)
        };
        for entry in entries.take(SCAN_CHUNK) {
            let (k, v) = entry.map_err(redb_err)?;
            self.buffer.push_back((k.value().to_vec(), v.value().to_vec()));
        }

        match self.buffer.back() {
            Some((last, _)) if self.buffer.len() == SCAN_CHUNK => {
                if self.reverse {
                    self.upper = Bound::Excluded(last.clone());
                } else {
                    self.lower = Bound::Excluded(last.clone());
                }
            }
            _ => self.exhausted = true,
        }
        Ok(())
    }
}

impl Iterator for RedbScan {
    type Item = DbResult<KvPair>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() && !self.exhausted {
            if let Err(e) = self.refill() {
                self.exhausted = true;
                return Some(Err(e));
            }
        }
        self.buffer.pop_front().map(Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn keys(iter: &mut Box<dyn DbIterator>) -> Vec<Vec<u8>> {
        iter.collect_pairs().into_iter().map(|(k, _)| k).collect()
    }

    #[test]
    fn redb_creates_file_in_dir() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let db = RedbDb::open("store", &nested).unwrap();
        assert_eq!(db.path(), nested.join("store.db"));
        assert!(db.path().exists());
    }

    #[test]
    fn redb_set_get_delete() {
        let dir = tempdir().unwrap();
        let db = RedbDb::open("t", dir.path()).unwrap();
        assert_eq!(db.get(b"k").unwrap(), None);
        db.set(b"k", b"v").unwrap();
        assert_eq!(db.get(b"k").unwrap(), Some(b"v".to_vec()));
        db.set_sync(b"k", b"").unwrap();
        assert_eq!(db.get(b"k").unwrap(), Some(Vec::new()));
        db.delete_sync(b"k").unwrap();
        assert!(!db.has(b"k").unwrap());
        db.delete(b"k").unwrap();
    }

    #[test]
    fn redb_persists_across_reopen() {
        let dir = tempdir().unwrap();
        {
            let db = RedbDb::open("t", dir.path()).unwrap();
            db.set(b"k", b"v").unwrap();
            db.close().unwrap();
        }
        let db = RedbDb::open("t", dir.path()).unwrap();
        assert_eq!(db.get(b"k").unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn redb_scan_crosses_chunk_boundaries() {
        let dir = tempdir().unwrap();
        let db = RedbDb::open("t", dir.path()).unwrap();
        let mut batch = db.new_batch();
        let count = SCAN_CHUNK * 2 + 7;
        for i in 0..count as u32 {
            batch.set(&i.to_be_bytes(), b"x").unwrap();
        }
        batch.write().unwrap();

        let mut iter = db.iterator(None, None).unwrap();
        let forward = keys(&mut iter);
        assert_eq!(forward.len(), count);
        assert!(forward.windows(2).all(|w| w[0] < w[1]));

        let mut rev = db.reverse_iterator(None, None).unwrap();
        let mut backward = keys(&mut rev);
        backward.reverse();
        assert_eq!(forward, backward);
    }

    #[test]
    fn redb_range_bounds() {
        let dir = tempdir().unwrap();
        let db = RedbDb::open("t", dir.path()).unwrap();
        for key in [b"a", b"b", b"c", b"d", b"e"] {
            db.set(key, key).unwrap();
        }
        let mut iter = db.iterator(Some(b"b"), Some(b"d")).unwrap();
        assert_eq!(keys(&mut iter), vec![b"b".to_vec(), b"c".to_vec()]);
        let mut rev = db.reverse_iterator(Some(b"b"), Some(b"d")).unwrap();
        assert_eq!(keys(&mut rev), vec![b"c".to_vec(), b"b".to_vec()]);
        let empty = db.iterator(Some(b"d"), Some(b"b")).unwrap();
        assert!(!empty.valid());
    }

    #[test]
    fn redb_iterator_sees_open_time_state() {
        let dir = tempdir().unwrap();
        let db = RedbDb::open("t", dir.path()).unwrap();
        db.set(b"a", b"1").unwrap();
        let mut iter = db.iterator(None, None).unwrap();
        db.set(b"b", b"2").unwrap();
        assert_eq!(keys(&mut iter), vec![b"a".to_vec()]);
        iter.close().unwrap();
    }

    #[test]
    fn redb_batch_write_sync() {
        let dir = tempdir().unwrap();
        let db = RedbDb::open("t", dir.path()).unwrap();
        let mut batch = db.new_batch();
        batch.set(b"k", b"v1").unwrap();
        batch.set(b"k", b"v2").unwrap();
        batch.write_sync().unwrap();
        assert_eq!(db.get(b"k").unwrap(), Some(b"v2".to_vec()));
        assert!(matches!(batch.set(b"k", b"v3"), Err(DbError::BatchClosed)));
    }

    #[test]
    fn redb_rejects_zero_cache() {
        let dir = tempdir().unwrap();
        let result = RedbDb::open_with_options("t", dir.path(), RedbOptions::default().cache_size(0));
        assert!(matches!(result, Err(DbError::InvalidOptions(_))));
    }

    #[test]
    fn redb_stats() {
        let dir = tempdir().unwrap();
        let db = RedbDb::open_with_options("t", dir.path(), RedbOptions::default().sync_writes(true))
            .unwrap();
        db.set(b"k", b"v").unwrap();
        let stats = db.stats();
        assert!(stats.contains_key("tree_height"));
        assert!(stats.contains_key("page_size"));
        assert!(!stats.contains_key("error"));
    }
}
