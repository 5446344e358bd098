//! Ordered-map reference model.
//!
//! Any store, driven through the same operations as a [`Model`], must return
//! exactly what the model returns for every point read and range scan.

use crate::fixtures::scenarios::scan;
use locket_db::{Db, KvPair};
use std::collections::BTreeMap;

/// A mutation applied to both a store and the model.
#[derive(Debug, Clone)]
pub enum ModelOp {
    /// `set(key, value)`.
    Set {
        /// Key to write.
        key: Vec<u8>,
        /// Value to write.
        value: Vec<u8>,
    },
    /// `delete(key)`.
    Delete {
        /// Key to remove.
        key: Vec<u8>,
    },
    /// One batch; `None` values are deletes.
    Batch {
        /// Enqueued operations in order.
        ops: Vec<(Vec<u8>, Option<Vec<u8>>)>,
    },
}

/// The reference: a `BTreeMap` with the contract's range semantics.
#[derive(Debug, Default, Clone)]
pub struct Model {
    map: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl Model {
    /// Creates an empty model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies `op` to the model only.
    pub fn apply(&mut self, op: &ModelOp) {
        match op {
            ModelOp::Set { key, value } => {
                self.map.insert(key.clone(), value.clone());
            }
            ModelOp::Delete { key } => {
                self.map.remove(key);
            }
            ModelOp::Batch { ops } => {
                for (key, value) in ops {
                    match value {
                        Some(value) => self.map.insert(key.clone(), value.clone()),
                        None => self.map.remove(key),
                    };
                }
            }
        }
    }

    /// Returns the value under `key`.
    pub fn get(&self, key: &[u8]) -> Option<&Vec<u8>> {
        self.map.get(key)
    }

    /// Returns the pairs in `[start, end)`, descending if `reverse`.
    pub fn range(&self, start: Option<&[u8]>, end: Option<&[u8]>, reverse: bool) -> Vec<KvPair> {
        let mut pairs: Vec<KvPair> = self
            .map
            .iter()
            .filter(|(k, _)| start.map_or(true, |s| k.as_slice() >= s))
            .filter(|(k, _)| end.map_or(true, |e| k.as_slice() < e))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if reverse {
            pairs.reverse();
        }
        pairs
    }

    /// Returns every key in the model.
    pub fn keys(&self) -> impl Iterator<Item = &Vec<u8>> {
        self.map.keys()
    }
}

/// Applies `op` to `db`.
///
/// # Panics
///
/// Panics if the store rejects a valid operation.
pub fn apply_to_store(db: &dyn Db, op: &ModelOp) {
    match op {
        ModelOp::Set { key, value } => db.set(key, value).expect("set failed"),
        ModelOp::Delete { key } => db.delete(key).expect("delete failed"),
        ModelOp::Batch { ops } => {
            let mut batch = db.new_batch();
            for (key, value) in ops {
                match value {
                    Some(value) => batch.set(key, value).expect("batch set failed"),
                    None => batch.delete(key).expect("batch delete failed"),
                }
            }
            batch.write().expect("batch write failed");
            batch.close().expect("batch close failed");
        }
    }
}

/// Applies `ops` to both `db` and `model`.
pub fn apply_all(db: &dyn Db, model: &mut Model, ops: &[ModelOp]) {
    for op in ops {
        apply_to_store(db, op);
        model.apply(op);
    }
}

/// Asserts that point reads of every model key, and forward and reverse
/// scans of `[start, end)`, agree with the model.
pub fn assert_matches_model(db: &dyn Db, model: &Model, start: Option<&[u8]>, end: Option<&[u8]>) {
    for key in model.keys() {
        assert_eq!(db.get(key).expect("get failed").as_ref(), model.get(key), "get {key:?}");
    }
    assert_eq!(
        scan(db, start, end, false),
        model.range(start, end, false),
        "forward scan of [{start:?}, {end:?})"
    );
    assert_eq!(
        scan(db, start, end, true),
        model.range(start, end, true),
        "reverse scan of [{start:?}, {end:?})"
    );
}
