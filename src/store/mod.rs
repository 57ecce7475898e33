//! Local mirror of the engine configuration
//!
//! A single SQLite file holding schema-less JSON documents, one row per
//! record, grouped by collection.
//!
//! # Architecture
//!
//! ```text
//! ConfigService (only writer)
//!     │
//!     ├──→ upsert / delete ──→ collection RwLock (write) ──→ writer Connection
//!     │
//!     └──→ get_all / get_by_key ──→ collection RwLock (read) ──→ r2d2 pool
//!                                                                  (WAL readers)
//! ```
//!
//! A write on one collection blocks new reads of that collection until it
//! commits; other collections are unaffected.
//!
//! One process owns the file at a time: `open` takes an exclusive OS lock on
//! a sibling `<db>.lock` and holds it until the store is dropped. The
//! in-process locks above say nothing about other processes.

use crate::error::{ConfigError, Result};
use crate::models::{FeatureFlag, Setting, SourceConfig};
use chrono::Utc;
use fs2::FileExt;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

pub mod schema;

/// Maximum pooled reader connections
const MAX_READERS: u32 = 4;

// ─────────────────────────────────────────────────────────────────────────────
// Collections and records
// ─────────────────────────────────────────────────────────────────────────────

/// Top-level document collections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Sources,
    Features,
    Settings,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sources => "sources",
            Self::Features => "features",
            Self::Settings => "settings",
        }
    }

    fn index(&self) -> usize {
        match self {
            Self::Sources => 0,
            Self::Features => 1,
            Self::Settings => 2,
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A document that lives in exactly one collection under a unique key
pub trait Record: Serialize + DeserializeOwned {
    const COLLECTION: Collection;

    fn key(&self) -> &str;
}

impl Record for SourceConfig {
    const COLLECTION: Collection = Collection::Sources;

    fn key(&self) -> &str {
        &self.id
    }
}

impl Record for FeatureFlag {
    const COLLECTION: Collection = Collection::Features;

    fn key(&self) -> &str {
        &self.name
    }
}

impl Record for Setting {
    const COLLECTION: Collection = Collection::Settings;

    fn key(&self) -> &str {
        &self.key
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// LocalStore
// ─────────────────────────────────────────────────────────────────────────────

/// Embedded document store for the local configuration mirror
pub struct LocalStore {
    path: PathBuf,
    writer: Mutex<Connection>,
    readers: Pool<SqliteConnectionManager>,
    locks: [RwLock<()>; 3],
    /// Held for the store's lifetime; closing the file releases the lock
    _owner: File,
}

impl LocalStore {
    /// Open (creating or upgrading as needed) the store at `path`
    ///
    /// Any I/O, permission or corruption problem is fatal and reported as
    /// [`ConfigError::StoreUnavailable`]; there is no in-memory fallback.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                ConfigError::StoreUnavailable(format!(
                    "cannot create directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        // Lock before touching the database so a second process never
        // races the migrations
        let owner = acquire_owner_lock(&path)?;

        let writer = Connection::open(&path)?;
        schema::init_schema(&writer)?;

        let manager = SqliteConnectionManager::file(&path)
            .with_init(|c| c.execute_batch("PRAGMA busy_timeout=5000;"));
        let readers = Pool::builder().max_size(MAX_READERS).build(manager)?;

        tracing::debug!("Local store opened at {}", path.display());

        Ok(Self {
            path,
            writer: Mutex::new(writer),
            readers,
            locks: [RwLock::new(()), RwLock::new(()), RwLock::new(())],
            _owner: owner,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_lock(&self, collection: Collection) -> Result<RwLockReadGuard<'_, ()>> {
        self.locks[collection.index()]
            .read()
            .map_err(|_| ConfigError::StoreUnavailable(format!("{collection} lock poisoned")))
    }

    fn write_lock(&self, collection: Collection) -> Result<RwLockWriteGuard<'_, ()>> {
        self.locks[collection.index()]
            .write()
            .map_err(|_| ConfigError::StoreUnavailable(format!("{collection} lock poisoned")))
    }

    fn writer(&self) -> Result<MutexGuard<'_, Connection>> {
        self.writer
            .lock()
            .map_err(|_| ConfigError::StoreUnavailable("writer connection poisoned".into()))
    }

    /// Insert the record, or fully replace the one with the same key
    pub fn upsert<R: Record>(&self, record: &R) -> Result<()> {
        let body = serde_json::to_string(record).map_err(|e| {
            ConfigError::StoreUnavailable(format!("cannot encode {} document: {e}", R::COLLECTION))
        })?;

        let _guard = self.write_lock(R::COLLECTION)?;
        self.writer()?.execute(
            "INSERT INTO documents (collection, key, body, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(collection, key) DO UPDATE SET
                body = excluded.body,
                updated_at = excluded.updated_at",
            params![
                R::COLLECTION.as_str(),
                record.key(),
                body,
                Utc::now().to_rfc3339()
            ],
        )?;

        tracing::trace!(collection = %R::COLLECTION, key = record.key(), "Upserted document");
        Ok(())
    }

    /// Every record of the collection, in insertion order
    pub fn get_all<R: Record>(&self) -> Result<Vec<R>> {
        let _guard = self.read_lock(R::COLLECTION)?;
        let conn = self.readers.get()?;

        let mut stmt = conn
            .prepare("SELECT key, body FROM documents WHERE collection = ?1 ORDER BY rowid")?;
        let rows = stmt.query_map(params![R::COLLECTION.as_str()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (key, body) = row?;
            records.push(decode::<R>(&key, &body)?);
        }
        Ok(records)
    }

    pub fn get_by_key<R: Record>(&self, key: &str) -> Result<Option<R>> {
        let _guard = self.read_lock(R::COLLECTION)?;
        let conn = self.readers.get()?;

        let body: Option<String> = conn
            .query_row(
                "SELECT body FROM documents WHERE collection = ?1 AND key = ?2",
                params![R::COLLECTION.as_str(), key],
                |row| row.get(0),
            )
            .optional()?;

        body.map(|b| decode::<R>(key, &b)).transpose()
    }

    /// Keys of the collection, in insertion order
    pub fn keys(&self, collection: Collection) -> Result<Vec<String>> {
        let _guard = self.read_lock(collection)?;
        let conn = self.readers.get()?;

        let mut stmt =
            conn.prepare("SELECT key FROM documents WHERE collection = ?1 ORDER BY rowid")?;
        let keys = stmt
            .query_map(params![collection.as_str()], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(keys)
    }

    /// Remove a record; removing an absent key is a no-op
    pub fn delete<R: Record>(&self, key: &str) -> Result<()> {
        self.delete_key(R::COLLECTION, key)
    }

    pub fn delete_key(&self, collection: Collection, key: &str) -> Result<()> {
        let _guard = self.write_lock(collection)?;
        let removed = self.writer()?.execute(
            "DELETE FROM documents WHERE collection = ?1 AND key = ?2",
            params![collection.as_str(), key],
        )?;

        if removed > 0 {
            tracing::trace!(%collection, key, "Deleted document");
        }
        Ok(())
    }
}

/// Path of the ownership lock for a database file: `data.db` -> `data.db.lock`
fn lock_path(db: &Path) -> PathBuf {
    let mut name = db.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}

fn acquire_owner_lock(db: &Path) -> Result<File> {
    let path = lock_path(db);
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&path)
        .map_err(|e| {
            ConfigError::StoreUnavailable(format!("cannot open lock {}: {e}", path.display()))
        })?;

    file.try_lock_exclusive().map_err(|e| {
        ConfigError::StoreUnavailable(format!(
            "{} is in use by another cupboard process ({e})",
            db.display()
        ))
    })?;

    Ok(file)
}

fn decode<R: Record>(key: &str, body: &str) -> Result<R> {
    serde_json::from_str(body).map_err(|e| {
        ConfigError::StoreUnavailable(format!(
            "corrupt {} document '{}': {}",
            R::COLLECTION,
            key,
            e
        ))
    })
}
