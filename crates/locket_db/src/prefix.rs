//! Prefix namespacing over a shared store.
//!
//! A [`PrefixDb`] presents an independent logical store inside another
//! store's key space. Every logical key `k` lives at the physical key
//! `prefix ++ k`; keys coming back from iteration have the prefix stripped.
//!
//! ## Range translation
//!
//! A logical range `[start, end)` becomes `[prefix ++ start, prefix ++ end)`.
//! An unbounded end becomes the prefix successor (see [`prefix_successor`]),
//! which excludes every key outside the namespace. When the prefix is all
//! `0xFF` bytes there is no successor and the physical end stays unbounded.

use crate::batch::Batch;
use crate::db::Db;
use crate::error::{check_bounds, check_key, DbError, DbResult};
use crate::iterator::DbIterator;
use crate::util::to_hex;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::io::Write;
use std::sync::Arc;
use tracing::trace;

/// Returns the smallest byte string greater than every key starting with
/// `prefix`, or `None` if no such string exists.
///
/// Computed as a big-endian increment with carry over a copy of the prefix:
/// the last byte below `0xFF` is incremented and every byte after it is
/// zeroed. An all-`0xFF` prefix overflows and yields `None`, as does the
/// empty prefix, whose namespace is the whole key space.
#[must_use]
pub fn prefix_successor(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut next = prefix.to_vec();
    for i in (0..next.len()).rev() {
        if next[i] < 0xFF {
            next[i] += 1;
            return Some(next);
        }
        next[i] = 0x00;
    }
    None
}

/// A logical store occupying one prefix of another store.
///
/// Values are stored untouched; only keys are translated.
///
/// # Thread Safety
///
/// Operations on one `PrefixDb` are serialized by an internal lock held
/// while keys are translated and the call is delegated. The lock orders this
/// instance's own calls only; it does not make separate calls atomic and
/// does not change the wrapped engine's iterator semantics.
///
/// # Example
///
/// ```rust
/// use locket_db::{Db, MemDb, PrefixDb};
/// use std::sync::Arc;
///
/// let shared: Arc<dyn Db> = Arc::new(MemDb::new());
/// let users = PrefixDb::new(Arc::clone(&shared), b"users:".to_vec());
///
/// users.set(b"alice", b"1").unwrap();
/// assert_eq!(shared.get(b"users:alice").unwrap(), Some(b"1".to_vec()));
/// ```
pub struct PrefixDb {
    mtx: Mutex<()>,
    prefix: Vec<u8>,
    db: Arc<dyn Db>,
}

impl PrefixDb {
    /// Creates a namespace of `db` under `prefix`.
    pub fn new(db: Arc<dyn Db>, prefix: impl Into<Vec<u8>>) -> Self {
        Self {
            mtx: Mutex::new(()),
            prefix: prefix.into(),
            db,
        }
    }

    /// Returns the namespace prefix.
    #[must_use]
    pub fn prefix(&self) -> &[u8] {
        &self.prefix
    }

    /// Returns the wrapped store.
    #[must_use]
    pub fn inner(&self) -> &Arc<dyn Db> {
        &self.db
    }

    fn prefixed(&self, key: &[u8]) -> Vec<u8> {
        let mut physical = Vec::with_capacity(self.prefix.len() + key.len());
        physical.extend_from_slice(&self.prefix);
        physical.extend_from_slice(key);
        physical
    }

    /// Translates a logical range into the physical one.
    ///
    /// With an empty prefix and no start, the physical start stays `None`
    /// because an empty bound is not a valid key.
    fn physical_range(
        &self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
    ) -> (Option<Vec<u8>>, Option<Vec<u8>>) {
        let pstart = match start {
            Some(start) => Some(self.prefixed(start)),
            None if self.prefix.is_empty() => None,
            None => Some(self.prefix.clone()),
        };
        let pend = match end {
            Some(end) => Some(self.prefixed(end)),
            None => prefix_successor(&self.prefix),
        };
        (pstart, pend)
    }

    fn open_iterator(
        &self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
        reverse: bool,
    ) -> DbResult<Box<dyn DbIterator>> {
        check_bounds(start, end)?;
        let _guard = self.mtx.lock();

        let (pstart, pend) = self.physical_range(start, end);
        trace!(
            prefix = %to_hex(&self.prefix),
            start = ?pstart.as_deref().map(to_hex),
            end = ?pend.as_deref().map(to_hex),
            reverse,
            "opening prefix iterator"
        );
        let source = if reverse {
            self.db.reverse_iterator(pstart.as_deref(), pend.as_deref())?
        } else {
            self.db.iterator(pstart.as_deref(), pend.as_deref())?
        };
        Ok(Box::new(PrefixIterator::new(
            self.prefix.len(),
            start,
            end,
            source,
        )))
    }
}

impl Db for PrefixDb {
    fn get(&self, key: &[u8]) -> DbResult<Option<Vec<u8>>> {
        check_key(key)?;
        let _guard = self.mtx.lock();
        self.db.get(&self.prefixed(key))
    }

    fn has(&self, key: &[u8]) -> DbResult<bool> {
        check_key(key)?;
        let _guard = self.mtx.lock();
        self.db.has(&self.prefixed(key))
    }

    fn set(&self, key: &[u8], value: &[u8]) -> DbResult<()> {
        check_key(key)?;
        let _guard = self.mtx.lock();
        self.db.set(&self.prefixed(key), value)
    }

    fn set_sync(&self, key: &[u8], value: &[u8]) -> DbResult<()> {
        check_key(key)?;
        let _guard = self.mtx.lock();
        self.db.set_sync(&self.prefixed(key), value)
    }

    fn delete(&self, key: &[u8]) -> DbResult<()> {
        check_key(key)?;
        let _guard = self.mtx.lock();
        self.db.delete(&self.prefixed(key))
    }

    fn delete_sync(&self, key: &[u8]) -> DbResult<()> {
        check_key(key)?;
        let _guard = self.mtx.lock();
        self.db.delete_sync(&self.prefixed(key))
    }

    fn iterator(&self, start: Option<&[u8]>, end: Option<&[u8]>) -> DbResult<Box<dyn DbIterator>> {
        self.open_iterator(start, end, false)
    }

    fn reverse_iterator(
        &self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
    ) -> DbResult<Box<dyn DbIterator>> {
        self.open_iterator(start, end, true)
    }

    fn new_batch(&self) -> Box<dyn Batch> {
        let _guard = self.mtx.lock();
        Box::new(PrefixBatch::new(self.prefix.clone(), self.db.new_batch()))
    }

    fn close(&self) -> DbResult<()> {
        let _guard = self.mtx.lock();
        self.db.close()
    }

    fn print(&self, out: &mut dyn Write) -> DbResult<()> {
        writeln!(out, "prefix: {}", to_hex(&self.prefix))?;
        let mut iter = self.iterator(None, None)?;
        while iter.valid() {
            writeln!(out, "[{}]:\t[{}]", to_hex(&iter.key()), to_hex(&iter.value()))?;
            iter.next();
        }
        iter.close()
    }

    fn stats(&self) -> BTreeMap<String, String> {
        let mut stats = BTreeMap::new();
        stats.insert(
            "prefixdb.prefix.string".to_string(),
            String::from_utf8_lossy(&self.prefix).into_owned(),
        );
        stats.insert("prefixdb.prefix.hex".to_string(), to_hex(&self.prefix));
        for (key, value) in self.db.stats() {
            stats.insert(format!("prefixdb.source.{key}"), value);
        }
        stats
    }
}

impl std::fmt::Debug for PrefixDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrefixDb")
            .field("prefix", &to_hex(&self.prefix))
            .finish_non_exhaustive()
    }
}

/// Iterator over a namespace, stripping the prefix from returned keys.
pub struct PrefixIterator {
    prefix_len: usize,
    start: Option<Vec<u8>>,
    end: Option<Vec<u8>>,
    source: Box<dyn DbIterator>,
}

impl PrefixIterator {
    fn new(
        prefix_len: usize,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
        source: Box<dyn DbIterator>,
    ) -> Self {
        Self {
            prefix_len,
            start: start.map(<[u8]>::to_vec),
            end: end.map(<[u8]>::to_vec),
            source,
        }
    }
}

impl DbIterator for PrefixIterator {
    /// Returns the logical range, not the translated one.
    fn domain(&self) -> (Option<&[u8]>, Option<&[u8]>) {
        (self.start.as_deref(), self.end.as_deref())
    }

    fn valid(&self) -> bool {
        self.source.valid()
    }

    fn next(&mut self) {
        self.source.next();
    }

    fn key(&self) -> Vec<u8> {
        let mut key = self.source.key();
        key.drain(..self.prefix_len);
        key
    }

    fn value(&self) -> Vec<u8> {
        self.source.value()
    }

    fn error(&self) -> Option<&DbError> {
        self.source.error()
    }

    fn close(&mut self) -> DbResult<()> {
        self.source.close()
    }
}

/// Batch that prepends the namespace prefix to every key.
pub struct PrefixBatch {
    prefix: Vec<u8>,
    source: Box<dyn Batch>,
}

impl PrefixBatch {
    fn new(prefix: Vec<u8>, source: Box<dyn Batch>) -> Self {
        Self { prefix, source }
    }

    fn prefixed(&self, key: &[u8]) -> Vec<u8> {
        let mut physical = Vec::with_capacity(self.prefix.len() + key.len());
        physical.extend_from_slice(&self.prefix);
        physical.extend_from_slice(key);
        physical
    }
}

impl Batch for PrefixBatch {
    fn set(&mut self, key: &[u8], value: &[u8]) -> DbResult<()> {
        // Checked here: the prefixed key is never empty.
        check_key(key)?;
        let physical = self.prefixed(key);
        self.source.set(&physical, value)
    }

    fn delete(&mut self, key: &[u8]) -> DbResult<()> {
        check_key(key)?;
        let physical = self.prefixed(key);
        self.source.delete(&physical)
    }

    fn write(&mut self) -> DbResult<()> {
        self.source.write()
    }

    fn write_sync(&mut self) -> DbResult<()> {
        self.source.write_sync()
    }

    fn close(&mut self) -> DbResult<()> {
        self.source.close()
    }
}
