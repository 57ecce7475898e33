//! On-disk layout and upgrade-on-open migrations
//!
//! The version lives in `metadata.schema_version`. Every migration is
//! idempotent: if the process dies between the DDL and the version bump,
//! the next open simply runs it again.

use crate::error::{ConfigError, Result};
use rusqlite::Connection;

/// Schema version written by this build
pub const CURRENT_VERSION: i32 = 2;

/// Apply pragmas and bring the schema up to [`CURRENT_VERSION`]
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode=WAL;
        PRAGMA synchronous=NORMAL;
        PRAGMA busy_timeout=5000;
        "#,
    )?;

    let current = current_version(conn)?;
    if current > CURRENT_VERSION {
        return Err(ConfigError::StoreUnavailable(format!(
            "store schema v{current} was written by a newer build (this build knows v{CURRENT_VERSION})"
        )));
    }

    if current < 1 {
        apply_schema_v1(conn)?;
    }
    if current < 2 {
        migrate_v1_to_v2(conn)?;
    }

    Ok(())
}

/// Read the schema version; a fresh file reports 0
pub fn current_version(conn: &Connection) -> Result<i32> {
    let has_metadata: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = 'metadata'",
        [],
        |row| row.get(0),
    )?;
    if !has_metadata {
        return Ok(0);
    }

    Ok(conn.query_row(
        "SELECT COALESCE(
            (SELECT CAST(value AS INTEGER) FROM metadata WHERE key = 'schema_version'),
            0
        )",
        [],
        |row| row.get(0),
    )?)
}

/// Initial schema (v1): one schema-less document table
fn apply_schema_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS metadata (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS documents (
            collection TEXT NOT NULL,
            key TEXT NOT NULL,
            body TEXT NOT NULL,
            PRIMARY KEY (collection, key)
        );

        INSERT OR REPLACE INTO metadata (key, value) VALUES ('schema_version', '1');
        "#,
    )?;

    tracing::debug!("Created local store schema v1");
    Ok(())
}

/// Migration from v1 to v2 (adds updated_at to documents)
fn migrate_v1_to_v2(conn: &Connection) -> Result<()> {
    let has_column: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM pragma_table_info('documents') WHERE name = 'updated_at'",
        [],
        |row| row.get(0),
    )?;

    if !has_column {
        conn.execute("ALTER TABLE documents ADD COLUMN updated_at TEXT", [])?;
    }

    conn.execute(
        "UPDATE metadata SET value = '2' WHERE key = 'schema_version'",
        [],
    )?;

    tracing::info!("Migrated local store from v1 to v2");
    Ok(())
}
