//! Table layout installer.
//!
//! # Invariants
//! - Layout versions are strictly increasing.
//! - The installed version is mirrored to `PRAGMA user_version`.

use crate::db::{DbError, DbResult};
use rusqlite::Connection;

#[derive(Debug, Clone, Copy)]
struct Layout {
    version: u32,
    sql: &'static str,
}

const LAYOUTS: &[Layout] = &[Layout {
    version: 1,
    sql: include_str!("0001_shopping.sql"),
}];

/// Returns the newest layout version known by this build.
pub fn latest_version() -> u32 {
    LAYOUTS.last().map_or(0, |layout| layout.version)
}

/// Installs any missing layout steps in one transaction.
pub fn install_schema(conn: &mut Connection) -> DbResult<()> {
    let current_version = current_user_version(conn)?;
    let latest = latest_version();

    if current_version > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: current_version,
            latest_supported: latest,
        });
    }
    if current_version == latest {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for layout in LAYOUTS
        .iter()
        .filter(|layout| layout.version > current_version)
    {
        tx.execute_batch(layout.sql)?;
        tx.execute_batch(&format!("PRAGMA user_version = {};", layout.version))?;
    }
    tx.commit()?;
    Ok(())
}

/// Reads `PRAGMA user_version`.
pub fn current_user_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}
