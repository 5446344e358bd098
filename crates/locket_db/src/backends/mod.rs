//! Engine adapters.
//!
//! Each adapter exposes a `new_db(name, dir)` constructor matching
//! [`crate::EngineConstructor`], which the registry installs at startup.

pub mod mem;
#[cfg(feature = "redb")]
pub mod redb;
#[cfg(feature = "sled")]
pub mod sled;

pub use mem::{MemBatch, MemDb};
#[cfg(feature = "redb")]
pub use self::redb::{RedbBatch, RedbDb, RedbOptions};
#[cfg(feature = "sled")]
pub use self::sled::{SledBatch, SledDb, SledOptions};
