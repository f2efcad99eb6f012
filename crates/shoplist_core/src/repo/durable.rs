//! Commit boundary between the in-memory graph and durable storage.
//!
//! # Responsibility
//! - Load the full graph when a store is opened.
//! - Persist one accumulated change set atomically.
//!
//! # Invariants
//! - A commit either writes the whole change set or nothing.
//! - Location upserts are written before item upserts; item deletes before
//!   location deletes.

use super::item_repo::{ItemListQuery, ItemRepository, SqliteItemRepository};
use super::location_repo::{LocationListQuery, LocationRepository, SqliteLocationRepository};
use super::{RepoError, RepoResult};
use crate::db::open_db;
use crate::store::change_set::ChangeSet;
use crate::store::GraphSnapshot;
use rusqlite::Connection;
use std::path::Path;

/// Durable backend consumed by the persistence scheduler.
pub trait DurableStore: Send {
    /// Reads every persisted record.
    fn load_graph(&mut self) -> RepoResult<GraphSnapshot>;
    /// Persists one change set.
    fn commit(&mut self, changes: &ChangeSet) -> RepoResult<()>;
}

/// SQLite-backed durable store owning its connection.
pub struct SqliteDurableStore {
    conn: Connection,
}

impl SqliteDurableStore {
    /// Wraps a connection returned by `open_db`/`open_db_in_memory`.
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    /// Opens (or creates) the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> RepoResult<Self> {
        Ok(Self::new(open_db(path)?))
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl DurableStore for SqliteDurableStore {
    fn load_graph(&mut self) -> RepoResult<GraphSnapshot> {
        let locations = SqliteLocationRepository::new(&self.conn)
            .list_locations(&LocationListQuery::default())?;
        let items = SqliteItemRepository::new(&self.conn)
            .list_items(&ItemListQuery::default())?
            .into_iter()
            .map(|stored| stored.item)
            .collect();
        Ok(GraphSnapshot { locations, items })
    }

    fn commit(&mut self, changes: &ChangeSet) -> RepoResult<()> {
        if changes.is_empty() {
            return Ok(());
        }

        let tx = self.conn.transaction()?;
        {
            let locations = SqliteLocationRepository::new(&tx);
            let items = SqliteItemRepository::new(&tx);
            for location in &changes.locations {
                locations.upsert_location(location)?;
            }
            for item in &changes.items {
                items.upsert_item(item)?;
            }
            for id in &changes.deleted_items {
                match items.delete_item(*id) {
                    Ok(()) | Err(RepoError::NotFound(_)) => {}
                    Err(err) => return Err(err),
                }
            }
            for id in &changes.deleted_locations {
                match locations.delete_location(*id) {
                    Ok(()) | Err(RepoError::NotFound(_)) => {}
                    Err(err) => return Err(err),
                }
            }
        }
        tx.commit()?;
        Ok(())
    }
}
