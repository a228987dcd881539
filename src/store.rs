//! Embedded key-value storage abstraction
//!
//! One uniform get/put/close contract over two interchangeable embedded
//! engines, selected once at startup. sled is the engine with an explicit
//! namespace (a named tree that must exist before the service trusts the
//! store); RocksDB has none.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use rocksdb::{Options, DB};

use crate::error::{Error, Result};

/// Default name of the sled tree holding the title records.
pub const DEFAULT_TREE: &str = "imdb";

/// Key-value contract the rest of the crate is written against.
///
/// `get` returning `Ok(None)` is the normal negative outcome; engine faults
/// surface as `StorageRead`/`StorageWrite` without engine-specific subtypes.
pub trait Store: Send + Sync + std::fmt::Debug {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    fn put(&self, key: &str, value: &[u8]) -> Result<()>;
    /// Flush and release the engine. Idempotent.
    fn close(&self) -> Result<()>;
}

/// Which engine backs the store, and where.
#[derive(Debug, Clone)]
pub enum StoreConfig {
    Sled { path: PathBuf, tree: String },
    Rocks { path: PathBuf },
}

impl StoreConfig {
    /// Build a config from the two mutually exclusive CLI path flags.
    ///
    /// Neither or both is a configuration error, raised before any I/O.
    pub fn from_paths(sled: Option<PathBuf>, rocks: Option<PathBuf>) -> Result<Self> {
        match (sled, rocks) {
            (Some(path), None) => {
                if path.as_os_str().is_empty() {
                    return Err(Error::Config("--sled-path is empty".to_string()));
                }
                Ok(StoreConfig::Sled {
                    path,
                    tree: DEFAULT_TREE.to_string(),
                })
            }
            (None, Some(path)) => {
                if path.as_os_str().is_empty() {
                    return Err(Error::Config("--rocks-path is empty".to_string()));
                }
                Ok(StoreConfig::Rocks { path })
            }
            (None, None) => Err(Error::Config(
                "either --sled-path or --rocks-path is required".to_string(),
            )),
            (Some(_), Some(_)) => Err(Error::Config(
                "--sled-path and --rocks-path are mutually exclusive".to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Importer mode: create the store and its namespace when missing.
    ReadWrite,
    /// Service mode: the store must already be ingested.
    ReadOnly,
}

/// Open the configured engine. The one dynamic-dispatch point in the crate.
pub fn open(config: &StoreConfig, mode: OpenMode) -> Result<Box<dyn Store>> {
    match config {
        StoreConfig::Sled { path, tree } => Ok(Box::new(SledStore::open(path, tree, mode)?)),
        StoreConfig::Rocks { path } => Ok(Box::new(RocksStore::open(path, mode)?)),
    }
}

/// sled backend. Records live in a named tree, the analogue of a bucket.
#[derive(Debug)]
struct SledStore {
    db: sled::Db,
    tree: sled::Tree,
    closed: AtomicBool,
}

impl SledStore {
    fn open(path: &Path, tree: &str, mode: OpenMode) -> Result<Self> {
        let db = sled::open(path).map_err(|e| {
            Error::StorageOpen(format!("sled store at {}: {e}", path.display()))
        })?;
        if mode == OpenMode::ReadOnly {
            // A missing tree means the store was never ingested.
            let exists = db.tree_names().iter().any(|n| n.as_ref() == tree.as_bytes());
            if !exists {
                return Err(Error::Integrity(format!(
                    "sled tree {tree:?} doesn't exist; run imdb2meta-import first"
                )));
            }
        }
        let tree = db.open_tree(tree).map_err(|e| {
            Error::StorageOpen(format!("sled tree at {}: {e}", path.display()))
        })?;
        Ok(SledStore {
            db,
            tree,
            closed: AtomicBool::new(false),
        })
    }
}

impl Store for SledStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let value = self
            .tree
            .get(key)
            .map_err(|e| Error::StorageRead(e.to_string()))?;
        Ok(value.map(|ivec| ivec.to_vec()))
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        self.tree
            .insert(key, value)
            .map_err(|e| Error::StorageWrite(e.to_string()))?;
        Ok(())
    }

    fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.db
            .flush()
            .map_err(|e| Error::Internal(format!("couldn't flush sled store on close: {e}")))?;
        Ok(())
    }
}

/// RocksDB backend. No namespace; the default column family holds everything.
#[derive(Debug)]
struct RocksStore {
    db: DB,
    mode: OpenMode,
    closed: AtomicBool,
}

impl RocksStore {
    fn open(path: &Path, mode: OpenMode) -> Result<Self> {
        let db = match mode {
            OpenMode::ReadWrite => {
                let mut opts = Options::default();
                opts.create_if_missing(true);
                DB::open(&opts, path)
            }
            OpenMode::ReadOnly => DB::open_for_read_only(&Options::default(), path, false),
        }
        .map_err(|e| Error::StorageOpen(format!("RocksDB at {}: {e}", path.display())))?;
        Ok(RocksStore {
            db,
            mode,
            closed: AtomicBool::new(false),
        })
    }
}

impl Store for RocksStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.db
            .get(key)
            .map_err(|e| Error::StorageRead(e.to_string()))
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        self.db
            .put(key, value)
            .map_err(|e| Error::StorageWrite(e.to_string()))
    }

    fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        // flush is not supported on a read-only handle; dropping it is enough
        if self.mode == OpenMode::ReadWrite {
            self.db
                .flush()
                .map_err(|e| Error::Internal(format!("couldn't flush RocksDB on close: {e}")))?;
        }
        Ok(())
    }
}
