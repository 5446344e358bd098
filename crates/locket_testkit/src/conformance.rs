//! Backend-agnostic contract checks.
//!
//! Every check takes a fresh, empty store and panics on the first
//! violation. [`CHECKS`] lists them all so a suite can be generated for any
//! engine, bare or behind a [`locket_db::PrefixDb`].

use crate::fixtures::scenarios::{alphabet, scan, scan_keys};
use locket_db::{Db, DbError};
use std::panic::{catch_unwind, AssertUnwindSafe};

/// A named contract check.
pub type Check = (&'static str, fn(&dyn Db));

/// Every check in this module.
pub const CHECKS: &[Check] = &[
    ("get_after_set", get_after_set),
    ("get_after_delete", get_after_delete),
    ("has_matches_get", has_matches_get),
    ("empty_value_is_present", empty_value_is_present),
    ("empty_key_rejected", empty_key_rejected),
    ("sync_variants", sync_variants),
    ("forward_range", forward_range),
    ("reverse_range", reverse_range),
    ("open_ended_ranges", open_ended_ranges),
    ("empty_and_inverted_ranges", empty_and_inverted_ranges),
    ("binary_key_order", binary_key_order),
    ("iterator_invalid_is_permanent", iterator_invalid_is_permanent),
    ("iterator_reports_domain", iterator_reports_domain),
    ("iterator_misuse_panics", iterator_misuse_panics),
    ("batch_replays_in_order", batch_replays_in_order),
    ("batch_invisible_until_write", batch_invisible_until_write),
    ("batch_close_is_idempotent", batch_close_is_idempotent),
    ("batch_rejects_empty_key", batch_rejects_empty_key),
    ("batch_write_sync", batch_write_sync),
    ("print_lists_every_pair", print_lists_every_pair),
    ("stats_not_empty", stats_not_empty),
];

/// Runs every check, each against a fresh store from `open`.
pub fn run_all<S>(mut open: impl FnMut() -> S)
where
    S: AsRef<dyn Db>,
{
    for (name, check) in CHECKS {
        let store = open();
        if catch_unwind(AssertUnwindSafe(|| check(store.as_ref()))).is_err() {
            panic!("conformance check '{name}' failed");
        }
    }
}

/// `get` right after `set` returns an equal copy.
pub fn get_after_set(db: &dyn Db) {
    db.set(b"key", b"value").expect("set failed");
    let mut value = db.get(b"key").expect("get failed").expect("key missing");
    assert_eq!(value, b"value");

    // Mutating the returned copy must not reach the store.
    value[0] = b'X';
    assert_eq!(db.get(b"key").unwrap(), Some(b"value".to_vec()));

    db.set(b"key", b"other").expect("overwrite failed");
    assert_eq!(db.get(b"key").unwrap(), Some(b"other".to_vec()));
}

/// `get` after `delete` is absent; deleting an absent key succeeds.
pub fn get_after_delete(db: &dyn Db) {
    db.set(b"key", b"value").unwrap();
    db.delete(b"key").expect("delete failed");
    assert_eq!(db.get(b"key").unwrap(), None);
    assert!(!db.has(b"key").unwrap());
    db.delete(b"key").expect("deleting an absent key must succeed");
    db.delete(b"never-written").expect("deleting an absent key must succeed");
}

/// `has` agrees with `get`.
pub fn has_matches_get(db: &dyn Db) {
    assert!(!db.has(b"k").unwrap());
    db.set(b"k", b"v").unwrap();
    assert!(db.has(b"k").unwrap());
    assert!(!db.has(b"k2").unwrap());
}

/// An empty value is stored and distinct from absence.
pub fn empty_value_is_present(db: &dyn Db) {
    db.set(b"k", b"").unwrap();
    assert_eq!(db.get(b"k").unwrap(), Some(Vec::new()));
    assert!(db.has(b"k").unwrap());
    assert_eq!(scan(db, None, None, false), vec![(b"k".to_vec(), Vec::new())]);
}

/// Every entry point rejects an empty key or bound with `KeyEmpty`, and
/// leaves the store untouched.
pub fn empty_key_rejected(db: &dyn Db) {
    assert!(matches!(db.get(b""), Err(DbError::KeyEmpty)));
    assert!(matches!(db.has(b""), Err(DbError::KeyEmpty)));
    assert!(matches!(db.set(b"", b"v"), Err(DbError::KeyEmpty)));
    assert!(matches!(db.set_sync(b"", b"v"), Err(DbError::KeyEmpty)));
    assert!(matches!(db.delete(b""), Err(DbError::KeyEmpty)));
    assert!(matches!(db.delete_sync(b""), Err(DbError::KeyEmpty)));
    assert!(matches!(db.iterator(Some(b""), None), Err(DbError::KeyEmpty)));
    assert!(matches!(db.iterator(None, Some(b"")), Err(DbError::KeyEmpty)));
    assert!(matches!(db.reverse_iterator(Some(b""), None), Err(DbError::KeyEmpty)));
    assert!(matches!(db.reverse_iterator(None, Some(b"")), Err(DbError::KeyEmpty)));
    assert!(scan(db, None, None, false).is_empty());
}

/// Sync variants behave like their plain counterparts.
pub fn sync_variants(db: &dyn Db) {
    db.set_sync(b"k", b"v").expect("set_sync failed");
    assert_eq!(db.get(b"k").unwrap(), Some(b"v".to_vec()));
    db.delete_sync(b"k").expect("delete_sync failed");
    assert_eq!(db.get(b"k").unwrap(), None);
    db.delete_sync(b"k").expect("delete_sync of an absent key failed");
}

/// Forward iteration over `[A, D)` yields exactly `A, B, C`.
pub fn forward_range(db: &dyn Db) {
    alphabet(db);
    assert_eq!(
        scan(db, Some(b"A"), Some(b"D"), false),
        vec![
            (b"A".to_vec(), b"a".to_vec()),
            (b"B".to_vec(), b"b".to_vec()),
            (b"C".to_vec(), b"c".to_vec()),
        ]
    );
}

/// Reverse iteration over `[A, D)` yields exactly `C, B, A`.
pub fn reverse_range(db: &dyn Db) {
    alphabet(db);
    assert_eq!(
        scan_keys(db, Some(b"A"), Some(b"D"), true),
        vec![b"C".to_vec(), b"B".to_vec(), b"A".to_vec()]
    );
    // Bounds that fall between stored keys.
    assert_eq!(
        scan_keys(db, Some(b"AA"), Some(b"CC"), true),
        vec![b"C".to_vec(), b"B".to_vec()]
    );
}

/// Missing bounds extend to the first and last key.
pub fn open_ended_ranges(db: &dyn Db) {
    alphabet(db);
    let all: Vec<Vec<u8>> = [b"A", b"B", b"C", b"D", b"E"].iter().map(|k| k.to_vec()).collect();
    let mut all_rev = all.clone();
    all_rev.reverse();

    assert_eq!(scan_keys(db, None, None, false), all);
    assert_eq!(scan_keys(db, None, None, true), all_rev);
    assert_eq!(scan_keys(db, Some(b"C"), None, false), all[2..].to_vec());
    assert_eq!(scan_keys(db, Some(b"C"), None, true), all_rev[..3].to_vec());
    assert_eq!(scan_keys(db, None, Some(b"C"), false), all[..2].to_vec());
    assert_eq!(scan_keys(db, None, Some(b"C"), true), all_rev[3..].to_vec());
}

/// Empty, inverted and out-of-data ranges start invalid.
pub fn empty_and_inverted_ranges(db: &dyn Db) {
    let empty = db.iterator(None, None).unwrap();
    assert!(!empty.valid(), "iterator over an empty store must be invalid");

    alphabet(db);
    for (start, end) in [
        (&b"C"[..], &b"C"[..]),
        (&b"D"[..], &b"B"[..]),
        (&b"F"[..], &b"Z"[..]),
        (&b"0"[..], &b"A"[..]),
    ] {
        assert!(scan(db, Some(start), Some(end), false).is_empty());
        assert!(scan(db, Some(start), Some(end), true).is_empty());
    }
}

/// Keys are ordered by unsigned byte comparison, in both directions.
pub fn binary_key_order(db: &dyn Db) {
    let keys: Vec<Vec<u8>> = vec![
        vec![0x00],
        vec![0x00, 0x00],
        vec![0x00, 0x01],
        vec![0x01],
        vec![0x7F, 0xFF],
        vec![0x80],
        vec![0xFF],
        vec![0xFF, 0x00],
        vec![0xFF, 0xFF, 0xFF],
    ];
    // Insert out of order.
    for key in keys.iter().rev() {
        db.set(key, key).unwrap();
    }
    assert_eq!(scan_keys(db, None, None, false), keys);
    let mut reversed = keys.clone();
    reversed.reverse();
    assert_eq!(scan_keys(db, None, None, true), reversed);
    assert_eq!(scan_keys(db, Some(&[0x00, 0x01]), Some(&[0x80]), false), keys[2..5].to_vec());
}

/// Once invalid, an iterator stays invalid; close is idempotent.
pub fn iterator_invalid_is_permanent(db: &dyn Db) {
    db.set(b"a", b"1").unwrap();
    let mut iter = db.iterator(None, None).unwrap();
    assert!(iter.valid());
    let key = iter.key();
    iter.next();
    assert!(!iter.valid());
    assert!(iter.error().is_none());

    // Writes after exhaustion never revive the iterator.
    db.set(b"b", b"2").unwrap();
    assert!(!iter.valid());
    assert_eq!(key, b"a");

    iter.close().expect("close failed");
    iter.close().expect("second close failed");
    assert!(!iter.valid());

    let mut live = db.iterator(None, None).unwrap();
    live.close().expect("close of a valid iterator failed");
    assert!(!live.valid());
}

/// `domain` reports the logical bounds the iterator was opened with.
pub fn iterator_reports_domain(db: &dyn Db) {
    let iter = db.iterator(Some(b"b"), Some(b"d")).unwrap();
    assert_eq!(iter.domain(), (Some(&b"b"[..]), Some(&b"d"[..])));
    let rev = db.reverse_iterator(None, Some(b"d")).unwrap();
    assert_eq!(rev.domain(), (None, Some(&b"d"[..])));
}

/// `next`, `key` and `value` on an invalid iterator are contract violations.
pub fn iterator_misuse_panics(db: &dyn Db) {
    let mut iter = db.iterator(None, None).unwrap();
    assert!(!iter.valid());
    assert!(catch_unwind(AssertUnwindSafe(|| iter.next())).is_err());
    assert!(catch_unwind(AssertUnwindSafe(|| iter.key())).is_err());
    assert!(catch_unwind(AssertUnwindSafe(|| iter.value())).is_err());
}

/// A batch applies in enqueue order and commits at most once.
pub fn batch_replays_in_order(db: &dyn Db) {
    db.set(b"k2", b"old").unwrap();
    let mut batch = db.new_batch();
    batch.set(b"k1", b"v1").unwrap();
    batch.delete(b"k2").unwrap();
    batch.set(b"k1", b"v2").unwrap();
    batch.write().expect("write failed");

    assert_eq!(db.get(b"k1").unwrap(), Some(b"v2".to_vec()));
    assert_eq!(db.get(b"k2").unwrap(), None);

    assert!(matches!(batch.write(), Err(DbError::BatchClosed)));
    assert!(matches!(batch.write_sync(), Err(DbError::BatchClosed)));
    assert!(matches!(batch.set(b"k3", b"v"), Err(DbError::BatchClosed)));
    assert!(matches!(batch.delete(b"k1"), Err(DbError::BatchClosed)));
    batch.close().expect("close after write must be a no-op");
    assert_eq!(db.get(b"k3").unwrap(), None);
    assert_eq!(db.get(b"k1").unwrap(), Some(b"v2".to_vec()));
}

/// Enqueued operations are invisible before `write`.
pub fn batch_invisible_until_write(db: &dyn Db) {
    let mut batch = db.new_batch();
    batch.set(b"k", b"v").unwrap();
    assert_eq!(db.get(b"k").unwrap(), None);
    assert!(scan(db, None, None, false).is_empty());
    batch.write().unwrap();
    assert_eq!(db.get(b"k").unwrap(), Some(b"v".to_vec()));

    // An empty batch commits successfully.
    let mut empty = db.new_batch();
    empty.write().expect("empty batch write failed");
}

/// Closing an unwritten batch discards it, any number of times.
pub fn batch_close_is_idempotent(db: &dyn Db) {
    let mut batch = db.new_batch();
    batch.set(b"k", b"v").unwrap();
    batch.delete(b"other").unwrap();
    batch.close().expect("close failed");
    batch.close().expect("second close failed");
    assert!(matches!(batch.write(), Err(DbError::BatchClosed)));
    assert_eq!(db.get(b"k").unwrap(), None);
}

/// Empty keys fail in a batch without closing it.
pub fn batch_rejects_empty_key(db: &dyn Db) {
    let mut batch = db.new_batch();
    assert!(matches!(batch.set(b"", b"v"), Err(DbError::KeyEmpty)));
    assert!(matches!(batch.delete(b""), Err(DbError::KeyEmpty)));
    batch.set(b"k", b"v").expect("batch must stay open");
    batch.write().unwrap();
    assert_eq!(scan(db, None, None, false), vec![(b"k".to_vec(), b"v".to_vec())]);
}

/// `write_sync` has the same visibility semantics as `write`.
pub fn batch_write_sync(db: &dyn Db) {
    let mut batch = db.new_batch();
    batch.set(b"a", b"1").unwrap();
    batch.set(b"b", b"").unwrap();
    batch.write_sync().expect("write_sync failed");
    assert_eq!(
        scan(db, None, None, false),
        vec![(b"a".to_vec(), b"1".to_vec()), (b"b".to_vec(), Vec::new())]
    );
    assert!(matches!(batch.write_sync(), Err(DbError::BatchClosed)));
}

/// `print` writes one hex line per pair.
pub fn print_lists_every_pair(db: &dyn Db) {
    db.set(&[0x01, 0xAB], b"v").unwrap();
    db.set(b"z", b"").unwrap();
    let mut out = Vec::new();
    db.print(&mut out).expect("print failed");
    let text = String::from_utf8(out).expect("print output is not UTF-8");
    let lines: Vec<&str> = text.lines().filter(|line| line.starts_with('[')).collect();
    assert_eq!(lines, vec!["[01AB]:\t[76]", "[7A]:\t[]"]);
}

/// `stats` reports something.
pub fn stats_not_empty(db: &dyn Db) {
    db.set(b"k", b"v").unwrap();
    assert!(!db.stats().is_empty());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::TestStore;
    use locket_db::{Engine, MemDb};

    struct Bare(MemDb);

    impl AsRef<dyn Db> for Bare {
        fn as_ref(&self) -> &(dyn Db + 'static) {
            &self.0
        }
    }

    #[test]
    fn test_memdb_passes_all_checks() {
        run_all(|| Bare(MemDb::new()));
    }

    #[test]
    fn test_checks_have_unique_names() {
        let mut names: Vec<&str> = CHECKS.iter().map(|(name, _)| *name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), CHECKS.len());
    }

    #[test]
    fn test_prefixed_memdb_passes_all_checks() {
        for (_, check) in CHECKS {
            let store = TestStore::prefixed(Engine::MemDb);
            check(store.db());
            store.assert_neighbors_intact();
        }
    }
}
