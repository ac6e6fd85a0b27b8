//! `documents` schema migrations.
//!
//! # Invariants
//! - Versions are strictly increasing and never renumbered.
//! - Pending steps apply in one transaction; a failed step leaves the
//!   schema at its previous version.

use crate::db::{DbError, DbResult};
use log::{error, info};
use rusqlite::{Connection, Transaction};
use std::time::Instant;

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "documents",
        sql: include_str!("0001_documents.sql"),
    },
    Migration {
        version: 2,
        name: "contact_indexes",
        sql: include_str!("0002_contact_indexes.sql"),
    },
];

/// Latest schema version known by this build.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Brings the schema up to `latest_version()`.
///
/// Returns the versions applied by this call, empty when already current.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<Vec<u32>> {
    let current = schema_version(conn)?;
    let latest = latest_version();
    if current > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: current,
            latest_supported: latest,
        });
    }

    let pending: Vec<&Migration> = MIGRATIONS
        .iter()
        .filter(|migration| migration.version > current)
        .collect();
    if pending.is_empty() {
        return Ok(Vec::new());
    }

    let tx = conn.transaction()?;
    for migration in &pending {
        apply_step(&tx, migration)?;
    }
    tx.commit()?;

    Ok(pending.iter().map(|migration| migration.version).collect())
}

fn apply_step(tx: &Transaction<'_>, migration: &Migration) -> DbResult<()> {
    let started_at = Instant::now();
    let result = tx
        .execute_batch(migration.sql)
        .and_then(|()| tx.pragma_update(None, "user_version", migration.version));

    match result {
        Ok(()) => {
            info!(
                "event=db_migrate module=db status=ok version={} name={} duration_ms={}",
                migration.version,
                migration.name,
                started_at.elapsed().as_millis()
            );
            Ok(())
        }
        Err(err) => {
            error!(
                "event=db_migrate module=db status=error version={} name={} error={}",
                migration.version, migration.name, err
            );
            Err(err.into())
        }
    }
}

/// Schema version recorded in the database header.
pub fn schema_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?)
}
