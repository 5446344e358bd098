//! # Locket Testkit
//!
//! Test utilities for locket_db engines.
//!
//! This crate provides:
//! - Conformance checks every [`locket_db::Db`] implementation must pass
//! - Temporary store fixtures for every engine, bare or prefixed
//! - Property-based generators and an ordered-map reference model
//! - Concurrent stress drivers
//!
//! ## Usage
//!
//! ```rust,ignore
//! use locket_testkit::prelude::*;
//! use locket_db::Engine;
//!
//! #[test]
//! fn redb_orders_keys() {
//!     with_temp_store(Engine::Redb, |db| {
//!         conformance::forward_range(db);
//!     });
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod conformance;
pub mod fixtures;
pub mod generators;
pub mod model;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::conformance;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::model::*;
    pub use crate::stress::*;
}

pub use fixtures::*;
pub use generators::*;
pub use model::*;
pub use stress::*;
