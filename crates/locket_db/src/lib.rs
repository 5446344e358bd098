//! # Locket DB
//!
//! A uniform key-value store contract over interchangeable embedded engines.
//!
//! Callers write against [`Db`] and pick the engine at open time by id. Every
//! adapter presents the same semantics: ordered byte keys, owned copies,
//! half-open range iteration in both directions, and atomic single-use
//! batches. [`PrefixDb`] carves an isolated namespace out of any store.
//!
//! ## Design Principles
//!
//! - Keys are never empty; absence is `Ok(None)`, never an error
//! - Precondition failures ([`DbError::KeyEmpty`], [`DbError::BatchClosed`])
//!   are reported identically by every engine
//! - Engine errors are carried untouched
//! - Stores are `Send + Sync` and can be shared across threads
//!
//! ## Available Engines
//!
//! | id      | type        | feature |
//! |---------|-------------|---------|
//! | `memdb` | [`MemDb`]   | always  |
//! | `redb`  | `RedbDb`    | `redb`  |
//! | `sled`  | `SledDb`    | `sled`  |
//!
//! ## Example
//!
//! ```rust
//! use locket_db::{open_db, Db, Engine, PrefixDb};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let db: Arc<dyn Db> = Arc::from(open_db(Engine::MemDb, "demo", Path::new(".")).unwrap());
//! let users = PrefixDb::new(Arc::clone(&db), b"users:".to_vec());
//! users.set(b"alice", b"1").unwrap();
//!
//! assert_eq!(db.get(b"users:alice").unwrap(), Some(b"1".to_vec()));
//! let mut iter = users.iterator(None, None).unwrap();
//! assert_eq!(iter.key(), b"alice");
//! iter.close().unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backends;
mod batch;
mod db;
mod error;
mod iterator;
mod prefix;
mod registry;
mod util;

pub use backends::{MemBatch, MemDb};
#[cfg(feature = "redb")]
pub use backends::{RedbBatch, RedbDb, RedbOptions};
#[cfg(feature = "sled")]
pub use backends::{SledBatch, SledDb, SledOptions};
pub use batch::{Batch, BatchOp};
pub use db::Db;
pub use error::{require_value, DbError, DbResult};
pub use iterator::{DbIterator, KvPair, RangeIter};
pub use prefix::{prefix_successor, PrefixBatch, PrefixDb, PrefixIterator};
pub use registry::{open_db, register_engine, registry, Engine, EngineConstructor, Registry};
pub use util::{is_key_in_domain, to_hex};
