//! Test fixtures and store helpers.
//!
//! Provides convenience functions for opening throwaway stores on any engine
//! and seeding common test scenarios.

use locket_db::{open_db, Db, Engine, KvPair, PrefixDb};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// Prefix used by [`TestStore::prefixed`].
pub const TEST_PREFIX: &[u8] = b"ns:";

/// Keys written around [`TEST_PREFIX`] by [`TestStore::prefixed`].
///
/// None of them starts with the prefix. They sit on both sides of the
/// namespace and right next to its edges, including the prefix successor.
pub const NEIGHBOR_KEYS: &[&[u8]] = &[b"\x01", b"ns", b"ns2:b", b"ns;", b"ns;a", b"nt", b"\xFF\xFF"];

/// A store in a temporary directory, removed when dropped.
pub struct TestStore {
    db: Arc<dyn Db>,
    base: Arc<dyn Db>,
    engine: Engine,
    neighbors: Vec<KvPair>,
    // Declared last so the stores are dropped before the directory goes.
    temp_dir: TempDir,
}

impl std::fmt::Debug for TestStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestStore")
            .field("engine", &self.engine)
            .field("dir", &self.temp_dir.path())
            .field("prefixed", &!self.neighbors.is_empty())
            .finish_non_exhaustive()
    }
}

impl TestStore {
    /// Opens a fresh store of `engine`.
    pub fn open(engine: Engine) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let db: Arc<dyn Db> = Arc::from(
            open_db(engine, "test", temp_dir.path()).expect("Failed to open test store"),
        );
        Self {
            base: Arc::clone(&db),
            db,
            engine,
            neighbors: Vec::new(),
            temp_dir,
        }
    }

    /// Opens a fresh in-memory store.
    pub fn memory() -> Self {
        Self::open(Engine::MemDb)
    }

    /// Opens a fresh store of `engine` and exposes a [`PrefixDb`] over it.
    ///
    /// The underlying store is seeded with [`NEIGHBOR_KEYS`], which the
    /// namespace must never see or modify.
    pub fn prefixed(engine: Engine) -> Self {
        let mut store = Self::open(engine);
        for key in NEIGHBOR_KEYS {
            let value = [b"neighbor:".as_slice(), *key].concat();
            store
                .base
                .set(key, &value)
                .expect("Failed to seed neighbor key");
            store.neighbors.push((key.to_vec(), value));
        }
        store.db = Arc::new(PrefixDb::new(Arc::clone(&store.base), TEST_PREFIX));
        store
    }

    /// Returns the store under test.
    pub fn db(&self) -> &dyn Db {
        &*self.db
    }

    /// Returns a shared handle to the store under test.
    pub fn shared(&self) -> Arc<dyn Db> {
        Arc::clone(&self.db)
    }

    /// Returns the underlying store. Same as [`db`](Self::db) unless prefixed.
    pub fn base(&self) -> &dyn Db {
        &*self.base
    }

    /// Returns the engine this store was opened with.
    pub fn engine(&self) -> Engine {
        self.engine
    }

    /// Returns the temporary directory holding the store.
    pub fn dir(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Asserts that every neighbor key still holds its seeded value.
    pub fn assert_neighbors_intact(&self) {
        for (key, value) in &self.neighbors {
            assert_eq!(
                self.base.get(key).expect("Failed to read neighbor key").as_ref(),
                Some(value),
                "neighbor key {key:?} was modified through the namespace"
            );
        }
    }
}

impl AsRef<dyn Db> for TestStore {
    fn as_ref(&self) -> &(dyn Db + 'static) {
        &*self.db
    }
}

/// Runs a test against a fresh store of `engine`.
///
/// # Example
///
/// ```rust
/// use locket_db::Engine;
/// use locket_testkit::with_temp_store;
///
/// with_temp_store(Engine::MemDb, |db| {
///     db.set(b"k", b"v").unwrap();
///     assert!(db.has(b"k").unwrap());
/// });
/// ```
pub fn with_temp_store<F, R>(engine: Engine, f: F) -> R
where
    F: FnOnce(&dyn Db) -> R,
{
    let store = TestStore::open(engine);
    f(store.db())
}

/// Runs a test against a [`PrefixDb`] over a fresh store of `engine`, then
/// checks the neighbors around the namespace were left alone.
pub fn with_prefixed_store<F, R>(engine: Engine, f: F) -> R
where
    F: FnOnce(&dyn Db) -> R,
{
    let store = TestStore::prefixed(engine);
    let result = f(store.db());
    store.assert_neighbors_intact();
    result
}

/// Returns every engine compiled into `locket_db`.
pub fn compiled_engines() -> Vec<Engine> {
    locket_db::registry().engines()
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// Keys `A` through `E`, each holding its lowercase letter.
    pub const ALPHABET: &[(&[u8], &[u8])] = &[
        (b"A", b"a"),
        (b"B", b"b"),
        (b"C", b"c"),
        (b"D", b"d"),
        (b"E", b"e"),
    ];

    /// Writes [`ALPHABET`] into `db`.
    pub fn alphabet(db: &dyn Db) {
        for (key, value) in ALPHABET {
            db.set(key, value).expect("Failed to set key");
        }
    }

    /// Writes `count` keys `key-00000`, `key-00001`, ... in one batch.
    ///
    /// Returns the pairs written, in key order.
    pub fn populated(db: &dyn Db, count: usize) -> Vec<KvPair> {
        let pairs: Vec<KvPair> = (0..count)
            .map(|i| {
                (
                    format!("key-{i:05}").into_bytes(),
                    format!(r#"{{"index":{i}}}"#).into_bytes(),
                )
            })
            .collect();
        let mut batch = db.new_batch();
        for (key, value) in &pairs {
            batch.set(key, value).expect("Failed to enqueue key");
        }
        batch.write().expect("Failed to write batch");
        pairs
    }

    /// Drains an iterator over `[start, end)` into a vector of pairs.
    pub fn scan(db: &dyn Db, start: Option<&[u8]>, end: Option<&[u8]>, reverse: bool) -> Vec<KvPair> {
        let mut iter = if reverse {
            db.reverse_iterator(start, end)
        } else {
            db.iterator(start, end)
        }
        .expect("Failed to open iterator");
        let pairs = iter.collect_pairs();
        assert!(iter.error().is_none(), "iterator ended with an engine error");
        iter.close().expect("Failed to close iterator");
        pairs
    }

    /// Drains an iterator into its keys only.
    pub fn scan_keys(db: &dyn Db, start: Option<&[u8]>, end: Option<&[u8]>, reverse: bool) -> Vec<Vec<u8>> {
        scan(db, start, end, reverse).into_iter().map(|(k, _)| k).collect()
    }
}
