//! Engine registry.
//!
//! Maps an [`Engine`] id to the constructor that opens a store of that kind.
//! The process-wide registry is built once, on first use, with every engine
//! compiled into the crate; applications may register replacements.

use crate::backends;
use crate::db::Db;
use crate::error::{DbError, DbResult};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::OnceLock;
use tracing::debug;

/// Opens a store from a logical name and a directory.
///
/// Each engine decides how `(name, dir)` maps to files on disk.
pub type EngineConstructor = fn(&str, &Path) -> DbResult<Box<dyn Db>>;

/// Identifier of an engine adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Engine {
    /// Ordered map in memory.
    MemDb,
    /// redb single-file B-tree.
    Redb,
    /// sled log-structured store.
    Sled,
}

impl Engine {
    /// Every engine id, whether or not it is compiled in.
    pub const ALL: [Engine; 3] = [Engine::MemDb, Engine::Redb, Engine::Sled];

    /// Returns the stable string id.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MemDb => "memdb",
            Self::Redb => "redb",
            Self::Sled => "sled",
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Engine {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|engine| engine.as_str() == s)
            .ok_or_else(|| DbError::unknown_engine(s))
    }
}

/// A concurrency-safe map from engine id to constructor.
pub struct Registry {
    constructors: RwLock<HashMap<Engine, EngineConstructor>>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("engines", &self.engines())
            .finish()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            constructors: RwLock::new(HashMap::new()),
        }
    }

    /// Creates a registry holding every compiled-in engine.
    #[must_use]
    pub fn with_builtin_engines() -> Self {
        let registry = Self::new();
        registry.register(Engine::MemDb, backends::mem::new_db);
        #[cfg(feature = "redb")]
        registry.register(Engine::Redb, backends::redb::new_db);
        #[cfg(feature = "sled")]
        registry.register(Engine::Sled, backends::sled::new_db);
        registry
    }

    /// Installs `constructor` under `engine`, replacing any earlier one.
    pub fn register(&self, engine: Engine, constructor: EngineConstructor) {
        let replaced = self
            .constructors
            .write()
            .insert(engine, constructor)
            .is_some();
        debug!(%engine, replaced, "registered engine");
    }

    /// Returns true if a constructor is installed under `engine`.
    #[must_use]
    pub fn is_registered(&self, engine: Engine) -> bool {
        self.constructors.read().contains_key(&engine)
    }

    /// Returns the registered engines in id order.
    #[must_use]
    pub fn engines(&self) -> Vec<Engine> {
        let mut engines: Vec<Engine> = self.constructors.read().keys().copied().collect();
        engines.sort_unstable();
        engines
    }

    /// Opens a store with the constructor registered under `engine`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::UnknownEngine`] if nothing is registered under
    /// `engine`, otherwise whatever the constructor returns.
    pub fn open(&self, engine: Engine, name: &str, dir: &Path) -> DbResult<Box<dyn Db>> {
        // Copy the fn pointer out so the lock is not held while opening.
        let constructor = self
            .constructors
            .read()
            .get(&engine)
            .copied()
            .ok_or_else(|| DbError::unknown_engine(engine.as_str()))?;
        debug!(%engine, name, dir = %dir.display(), "opening store");
        constructor(name, dir)
    }
}

/// Returns the process-wide registry, built on first call.
pub fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(Registry::with_builtin_engines)
}

/// Installs `constructor` in the process-wide registry.
pub fn register_engine(engine: Engine, constructor: EngineConstructor) {
    registry().register(engine, constructor);
}

/// Opens a store through the process-wide registry.
///
/// # Errors
///
/// See [`Registry::open`].
pub fn open_db(engine: Engine, name: &str, dir: &Path) -> DbResult<Box<dyn Db>> {
    registry().open(engine, name, dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_ids_round_trip() {
        for engine in Engine::ALL {
            assert_eq!(engine.as_str().parse::<Engine>().unwrap(), engine);
            assert_eq!(engine.to_string(), engine.as_str());
        }
    }

    #[test]
    fn unknown_engine_id() {
        let err = "leveldb".parse::<Engine>().unwrap_err();
        assert!(matches!(&err, DbError::UnknownEngine(id) if id == "leveldb"));
        assert_eq!(err.to_string(), "unknown db engine: leveldb");
    }

    #[test]
    fn empty_registry_rejects_open() {
        let registry = Registry::new();
        assert!(registry.engines().is_empty());
        let result = registry.open(Engine::MemDb, "x", Path::new("."));
        assert!(matches!(result, Err(DbError::UnknownEngine(id)) if id == "memdb"));
    }

    #[test]
    fn builtin_registry_has_memdb() {
        let registry = Registry::with_builtin_engines();
        assert!(registry.is_registered(Engine::MemDb));
        assert_eq!(registry.engines()[0], Engine::MemDb);
        let db = registry.open(Engine::MemDb, "x", Path::new(".")).unwrap();
        db.set(b"k", b"v").unwrap();
        assert!(db.has(b"k").unwrap());
    }

    #[cfg(feature = "redb")]
    #[test]
    fn builtin_registry_has_redb() {
        assert!(Registry::with_builtin_engines().is_registered(Engine::Redb));
    }

    #[cfg(feature = "sled")]
    #[test]
    fn builtin_registry_has_sled() {
        assert!(Registry::with_builtin_engines().is_registered(Engine::Sled));
    }

    fn failing(_name: &str, _dir: &Path) -> DbResult<Box<dyn Db>> {
        Err(DbError::invalid_options("always fails"))
    }

    #[test]
    fn register_overwrites() {
        let registry = Registry::with_builtin_engines();
        registry.register(Engine::MemDb, failing);
        let result = registry.open(Engine::MemDb, "x", Path::new("."));
        assert!(matches!(result, Err(DbError::InvalidOptions(_))));
    }

    #[test]
    fn concurrent_register_and_open() {
        let registry = Registry::new();
        std::thread::scope(|scope| {
            for i in 0..8 {
                let registry = &registry;
                scope.spawn(move || {
                    for _ in 0..100 {
                        if i % 2 == 0 {
                            registry.register(Engine::MemDb, backends::mem::new_db);
                        } else if let Ok(db) = registry.open(Engine::MemDb, "x", Path::new(".")) {
                            db.set(b"k", b"v").unwrap();
                        }
                    }
                });
            }
        });
        assert_eq!(registry.engines(), vec![Engine::MemDb]);
        let db = registry.open(Engine::MemDb, "x", Path::new(".")).unwrap();
        assert_eq!(db.get(b"k").unwrap(), None);
    }

    #[test]
    fn global_registry_opens_memdb() {
        let db = open_db(Engine::MemDb, "global", Path::new(".")).unwrap();
        assert_eq!(db.get(b"missing").unwrap(), None);
    }
}
