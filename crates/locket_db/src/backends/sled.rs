//! Adapter over sled, a log-structured embedded store.
//!
//! sled buffers writes and flushes them in the background every
//! `flush_every_ms`. The sync variants call `flush` before returning.

use crate::batch::{Batch, BatchOp, PendingOps};
use crate::db::Db;
use crate::error::{check_bounds, check_key, DbResult};
use crate::iterator::{range_bounds, DbIterator, KvPair, RangeIter, Source};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Directory suffix of a sled store.
pub const DIR_EXTENSION: &str = "db";

/// Options for opening a [`SledDb`].
#[derive(Debug, Clone)]
pub struct SledOptions {
    /// Page cache capacity in bytes.
    pub cache_capacity: u64,
    /// Background flush interval. `None` disables background flushing.
    pub flush_every_ms: Option<u64>,
    /// Favor write throughput over disk space.
    pub high_throughput: bool,
}

impl Default for SledOptions {
    fn default() -> Self {
        Self {
            cache_capacity: 64 * 1024 * 1024,
            flush_every_ms: Some(500),
            high_throughput: true,
        }
    }
}

impl SledOptions {
    /// Sets the page cache capacity.
    #[must_use]
    pub fn cache_capacity(mut self, bytes: u64) -> Self {
        self.cache_capacity = bytes;
        self
    }

    /// Sets the background flush interval.
    #[must_use]
    pub fn flush_every_ms(mut self, interval: Option<u64>) -> Self {
        self.flush_every_ms = interval;
        self
    }

    /// Chooses between throughput and space efficiency.
    #[must_use]
    pub fn high_throughput(mut self, enabled: bool) -> Self {
        self.high_throughput = enabled;
        self
    }
}

/// A store in the directory `<dir>/<name>.db`.
///
/// # Iterator caveat
///
/// sled iterators are not snapshots. A write made after the iterator was
/// opened may or may not be observed, depending on whether the iterator has
/// already passed the key.
#[derive(Debug, Clone)]
pub struct SledDb {
    db: sled::Db,
    path: PathBuf,
}

impl SledDb {
    /// Opens or creates the store `<dir>/<name>.db`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or sled fails to
    /// open it.
    pub fn open(name: &str, dir: &Path) -> DbResult<Self> {
        Self::open_with_options(name, dir, SledOptions::default())
    }

    /// Opens with explicit options.
    ///
    /// # Errors
    ///
    /// See [`open`](Self::open).
    pub fn open_with_options(name: &str, dir: &Path, options: SledOptions) -> DbResult<Self> {
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("{name}.{DIR_EXTENSION}"));
        let mode = if options.high_throughput {
            sled::Mode::HighThroughput
        } else {
            sled::Mode::LowSpace
        };
        let db = sled::Config::new()
            .path(&path)
            .cache_capacity(options.cache_capacity)
            .flush_every_ms(options.flush_every_ms)
            .mode(mode)
            .open()?;
        debug!(path = %path.display(), recovered = db.was_recovered(), "opened sled store");
        Ok(Self { db, path })
    }

    /// Returns the store directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn range_iter(
        &self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
        reverse: bool,
    ) -> DbResult<Box<dyn DbIterator>> {
        check_bounds(start, end)?;
        let source: Source = match range_bounds(start, end) {
            Some(bounds) => {
                let scan = self.db.range::<&[u8], _>(bounds);
                let owned = |entry: sled::Result<(sled::IVec, sled::IVec)>| -> DbResult<KvPair> {
                    let (k, v) = entry?;
                    Ok((k.to_vec(), v.to_vec()))
                };
                if reverse {
                    Box::new(scan.rev().map(owned))
                } else {
                    Box::new(scan.map(owned))
                }
            }
            None => Box::new(std::iter::empty()),
        };
        trace!(reverse, "opened sled iterator");
        Ok(Box::new(RangeIter::new("sled", source, start, end, reverse)))
    }
}

/// Constructor registered under [`crate::Engine::Sled`].
///
/// # Errors
///
/// See [`SledDb::open`].
pub fn new_db(name: &str, dir: &Path) -> DbResult<Box<dyn Db>> {
    Ok(Box::new(SledDb::open(name, dir)?))
}

impl Db for SledDb {
    fn get(&self, key: &[u8]) -> DbResult<Option<Vec<u8>>> {
        check_key(key)?;
        Ok(self.db.get(key)?.map(|v| v.to_vec()))
    }

    fn has(&self, key: &[u8]) -> DbResult<bool> {
        check_key(key)?;
        Ok(self.db.contains_key(key)?)
    }

    fn set(&self, key: &[u8], value: &[u8]) -> DbResult<()> {
        check_key(key)?;
        self.db.insert(key, value)?;
        Ok(())
    }

    fn set_sync(&self, key: &[u8], value: &[u8]) -> DbResult<()> {
        self.set(key, value)?;
        self.db.flush()?;
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> DbResult<()> {
        check_key(key)?;
        self.db.remove(key)?;
        Ok(())
    }

    fn delete_sync(&self, key: &[u8]) -> DbResult<()> {
        self.delete(key)?;
        self.db.flush()?;
        Ok(())
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
        Box::new(SledBatch {
            db: self.db.clone(),
            ops: PendingOps::new(),
        })
    }

    fn close(&self) -> DbResult<()> {
        let flushed = self.db.flush()?;
        debug!(path = %self.path.display(), flushed, "closed sled store");
        Ok(())
    }

    fn stats(&self) -> BTreeMap<String, String> {
        let mut stats = BTreeMap::new();
        stats.insert("path".to_string(), self.path.display().to_string());
        stats.insert("len".to_string(), self.db.len().to_string());
        stats.insert("trees".to_string(), self.db.tree_names().len().to_string());
        stats.insert("was_recovered".to_string(), self.db.was_recovered().to_string());
        match self.db.size_on_disk() {
            Ok(size) => stats.insert("size_on_disk".to_string(), size.to_string()),
            Err(e) => stats.insert("error".to_string(), e.to_string()),
        };
        stats
    }
}

/// Batch for [`SledDb`], applied with `apply_batch`.
#[derive(Debug)]
pub struct SledBatch {
    db: sled::Db,
    ops: PendingOps,
}

impl SledBatch {
    /// Applies the pending operations and closes the batch.
    ///
    /// The batch is closed once sled has accepted it, before any flush.
    fn apply(&mut self) -> DbResult<usize> {
        let ops = self.ops.pending()?;
        let mut batch = sled::Batch::default();
        for op in ops {
            match op {
                BatchOp::Set { key, value } => batch.insert(key.as_slice(), value.as_slice()),
                BatchOp::Delete { key } => batch.remove(key.as_slice()),
            }
        }
        let count = ops.len();
        self.db.apply_batch(batch)?;
        self.ops.close();
        Ok(count)
    }

    fn commit(&mut self, sync: bool) -> DbResult<()> {
        let count = self.apply()?;
        if sync {
            self.db.flush()?;
        }
        debug!(ops = count, sync, "sled batch written");
        Ok(())
    }
}

impl Batch for SledBatch {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use tempfile::tempdir;

    fn keys(iter: &mut Box<dyn DbIterator>) -> Vec<Vec<u8>> {
        iter.collect_pairs().into_iter().map(|(k, _)| k).collect()
    }

    #[test]
    fn sled_set_get_delete() {
        let dir = tempdir().unwrap();
        let db = SledDb::open("t", dir.path()).unwrap();
        assert_eq!(db.get(b"k").unwrap(), None);
        db.set(b"k", b"v").unwrap();
        assert_eq!(db.get(b"k").unwrap(), Some(b"v".to_vec()));
        assert!(db.has(b"k").unwrap());
        db.set_sync(b"k", b"").unwrap();
        assert_eq!(db.get(b"k").unwrap(), Some(Vec::new()));
        db.delete_sync(b"k").unwrap();
        assert!(!db.has(b"k").unwrap());
    }

    #[test]
    fn sled_opens_named_directory() {
        let dir = tempdir().unwrap();
        let db = SledDb::open("store", dir.path()).unwrap();
        assert_eq!(db.path(), dir.path().join("store.db"));
        assert!(db.path().is_dir());
    }

    #[test]
    fn sled_persists_across_reopen() {
        let dir = tempdir().unwrap();
        {
            let db = SledDb::open("t", dir.path()).unwrap();
            db.set(b"k", b"v").unwrap();
            db.close().unwrap();
        }
        let db = SledDb::open("t", dir.path()).unwrap();
        assert_eq!(db.get(b"k").unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn sled_range_both_directions() {
        let dir = tempdir().unwrap();
        let db = SledDb::open("t", dir.path()).unwrap();
        for key in [b"a", b"b", b"c", b"d", b"e"] {
            db.set(key, key).unwrap();
        }
        let mut iter = db.iterator(Some(b"b"), None).unwrap();
        assert_eq!(keys(&mut iter), vec![b"b".to_vec(), b"c".to_vec(), b"d".to_vec(), b"e".to_vec()]);
        let mut rev = db.reverse_iterator(None, Some(b"c")).unwrap();
        assert_eq!(keys(&mut rev), vec![b"b".to_vec(), b"a".to_vec()]);
        let empty = db.reverse_iterator(Some(b"c"), Some(b"c")).unwrap();
        assert!(!empty.valid());
    }

    #[test]
    fn sled_batch_atomic_write() {
        let dir = tempdir().unwrap();
        let db = SledDb::open("t", dir.path()).unwrap();
        db.set(b"gone", b"x").unwrap();
        let mut batch = db.new_batch();
        batch.set(b"k", b"v").unwrap();
        batch.delete(b"gone").unwrap();
        batch.write().unwrap();
        assert_eq!(db.get(b"k").unwrap(), Some(b"v".to_vec()));
        assert_eq!(db.get(b"gone").unwrap(), None);
        assert!(matches!(batch.write_sync(), Err(DbError::BatchClosed)));
    }

    #[test]
    fn sled_batch_closed_once_applied() {
        let dir = tempdir().unwrap();
        let db = SledDb::open("t", dir.path()).unwrap();
        let mut batch = SledBatch {
            db: db.db.clone(),
            ops: PendingOps::new(),
        };
        batch.set(b"k", b"v").unwrap();
        assert_eq!(batch.apply().unwrap(), 1);
        assert_eq!(db.get(b"k").unwrap(), Some(b"v".to_vec()));

        db.set(b"k", b"newer").unwrap();
        assert!(matches!(batch.write_sync(), Err(DbError::BatchClosed)));
        assert!(matches!(batch.write(), Err(DbError::BatchClosed)));
        assert_eq!(db.get(b"k").unwrap(), Some(b"newer".to_vec()));
    }

    #[test]
    fn sled_stats() {
        let dir = tempdir().unwrap();
        let options = SledOptions::default()
            .flush_every_ms(None)
            .high_throughput(false);
        let db = SledDb::open_with_options("t", dir.path(), options).unwrap();
        db.set(b"k", b"v").unwrap();
        let stats = db.stats();
        assert_eq!(stats["len"], "1");
        assert_eq!(stats["was_recovered"], "false");
        assert!(stats.contains_key("size_on_disk"));
    }
}
