//! Shopping list use-case service.
//!
//! # Responsibility
//! - Load the graph from durable storage at open.
//! - Apply mutations to the entity store and schedule their commit.
//! - Expose read-only queries and archive import/export.
//!
//! # Invariants
//! - The store lock is released before any commit is started.
//! - Deletes commit immediately; every other mutation is debounced.
//! - Observers run under the store lock and must not call back into the
//!   service.

use crate::archive::{self, ArchiveError, ImportReport};
use crate::clock::{system_clock, SharedClock};
use crate::config::{ConfigError, CoreConfig};
use crate::lock;
use crate::model::draft::{ItemDraft, LocationDraft};
use crate::model::item::{Item, ItemId};
use crate::model::location::{Location, LocationId};
use crate::model::EntityRef;
use crate::persistence::{
    CommitOutcome, PersistenceScheduler, SharedDurableStore, SharedStore, StorageCommitError,
};
use crate::repo::durable::SqliteDurableStore;
use crate::repo::RepoError;
use crate::store::entity_store::EntityStore;
use crate::store::error::StoreError;
use crate::store::propagator::{ChangeNotice, SubscriptionId};
use crate::store::sections::{ItemSection, PurchasedSections};
use chrono::{Local, TimeZone};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::sync::{Arc, Mutex};

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Error returned by service entry points.
#[derive(Debug)]
pub enum ServiceError {
    Store(StoreError),
    Commit(StorageCommitError),
    Repo(RepoError),
    Archive(ArchiveError),
    Config(ConfigError),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(err) => write!(f, "{err}"),
            Self::Commit(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "storage error: {err}"),
            Self::Archive(err) => write!(f, "{err}"),
            Self::Config(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            Self::Commit(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::Archive(err) => Some(err),
            Self::Config(err) => Some(err),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<StorageCommitError> for ServiceError {
    fn from(value: StorageCommitError) -> Self {
        Self::Commit(value)
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<ArchiveError> for ServiceError {
    fn from(value: ArchiveError) -> Self {
        Self::Archive(value)
    }
}

impl From<ConfigError> for ServiceError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

/// Facade over the entity store and its persistence scheduler.
pub struct ShoppingService {
    store: SharedStore,
    scheduler: PersistenceScheduler,
    clock: SharedClock,
    purchase_history_days: u32,
}

impl ShoppingService {
    /// Loads the graph from `durable` and wires the scheduler to it.
    ///
    /// Records healed during load are scheduled for a debounced commit.
    pub fn open(
        durable: SharedDurableStore,
        config: &CoreConfig,
        clock: SharedClock,
    ) -> ServiceResult<Self> {
        config.validate()?;
        let snapshot = lock(&durable).load_graph()?;
        let store = EntityStore::load(snapshot, Arc::clone(&clock));
        let dirty = store.has_changes();
        let store: SharedStore = Arc::new(Mutex::new(store));
        let scheduler =
            PersistenceScheduler::new(Arc::clone(&store), durable, config.save_delay());
        if dirty {
            scheduler.schedule();
        }
        info!(
            "event=service_open module=service status=ok save_delay_ms={} healed={}",
            config.save_delay_ms, dirty
        );

        Ok(Self {
            store,
            scheduler,
            clock,
            purchase_history_days: config.purchase_history_days,
        })
    }

    /// Opens a SQLite-backed service at `path` on the system clock.
    pub fn open_sqlite(path: impl AsRef<Path>, config: &CoreConfig) -> ServiceResult<Self> {
        let durable: SharedDurableStore = Arc::new(Mutex::new(SqliteDurableStore::open(path)?));
        Self::open(durable, config, system_clock())
    }

    /// Runs `f` against the store under its lock.
    pub fn with_store<R>(&self, f: impl FnOnce(&EntityStore) -> R) -> R {
        f(&lock(&self.store))
    }

    pub fn scheduler(&self) -> &PersistenceScheduler {
        &self.scheduler
    }

    /// Clock the store stamps purchases with.
    pub fn clock(&self) -> SharedClock {
        Arc::clone(&self.clock)
    }

    // --- factories -------------------------------------------------------

    pub fn create_item(&self) -> ItemDraft {
        lock(&self.store).create_item()
    }

    pub fn create_location(&self) -> LocationDraft {
        lock(&self.store).create_location()
    }

    // --- routine edits (debounced) ---------------------------------------

    pub fn upsert_item(&self, draft: &ItemDraft) -> ServiceResult<ItemId> {
        let id = lock(&self.store).upsert_item(draft)?;
        self.scheduler.schedule();
        Ok(id)
    }

    pub fn upsert_location(&self, draft: &LocationDraft) -> ServiceResult<LocationId> {
        let id = lock(&self.store).upsert_location(draft)?;
        self.scheduler.schedule();
        Ok(id)
    }

    pub fn toggle_on_list(&self, id: ItemId) -> ServiceResult<bool> {
        let on_list = lock(&self.store).toggle_on_list(id)?;
        self.scheduler.schedule();
        Ok(on_list)
    }

    pub fn toggle_available(&self, id: ItemId) -> ServiceResult<bool> {
        let available = lock(&self.store).toggle_available(id)?;
        self.scheduler.schedule();
        Ok(available)
    }

    pub fn mark_available(&self, id: ItemId) -> ServiceResult<bool> {
        let changed = lock(&self.store).mark_available(id)?;
        if changed {
            self.scheduler.schedule();
        }
        Ok(changed)
    }

    /// Checks out the whole list. Returns how many items moved off it.
    pub fn move_all_items_off_list(&self) -> usize {
        let moved = lock(&self.store).move_all_items_off_list();
        if moved > 0 {
            self.scheduler.schedule();
        }
        moved
    }

    // --- destructive edits (immediate) -----------------------------------

    /// Deletes an item and commits right away.
    ///
    /// The in-memory delete stands even if the commit fails; the failed
    /// change set stays queued for the next commit.
    pub fn delete_item(&self, id: ItemId) -> ServiceResult<Item> {
        let removed = lock(&self.store).delete_item(id)?;
        self.scheduler.commit_now()?;
        Ok(removed)
    }

    /// Deletes a user location and commits right away.
    ///
    /// Returns the number of items moved to the unknown location, or `None`
    /// when `id` is the unknown location, which is never deleted.
    pub fn delete_location(&self, id: LocationId) -> ServiceResult<Option<usize>> {
        let result = lock(&self.store).delete_location(id);
        let moved = match result {
            Ok(moved) => moved,
            Err(StoreError::InvariantViolation(violation)) => {
                warn!(
                    "event=location_delete module=service status=skipped reason=unknown_location error={violation}"
                );
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };
        self.scheduler.commit_now()?;
        Ok(Some(moved))
    }

    /// Commits pending edits now.
    pub fn flush(&self) -> ServiceResult<CommitOutcome> {
        Ok(self.scheduler.flush()?)
    }

    pub fn has_pending_commit(&self) -> bool {
        self.scheduler.has_pending_commit()
    }

    // --- queries ---------------------------------------------------------

    pub fn item(&self, id: ItemId) -> ServiceResult<Item> {
        Ok(lock(&self.store).get_item(id)?.clone())
    }

    pub fn location(&self, id: LocationId) -> ServiceResult<Location> {
        Ok(lock(&self.store).get_location(id)?.clone())
    }

    /// Items with `on_list` equal to the argument, by name.
    pub fn items(&self, on_list: bool) -> Vec<Item> {
        lock(&self.store).query_items(on_list)
    }

    /// All locations by visitation order, unknown location last.
    pub fn locations(&self) -> Vec<Location> {
        lock(&self.store).query_locations()
    }

    pub fn shopping_list_sections(&self, grouped_by_location: bool) -> Vec<ItemSection> {
        lock(&self.store).shopping_list_sections(grouped_by_location)
    }

    /// Off-list items split at the configured purchase history window.
    pub fn purchased_sections(&self) -> PurchasedSections {
        let now_ms = self.clock.now_epoch_ms();
        let now = Local
            .timestamp_millis_opt(now_ms)
            .single()
            .unwrap_or_else(Local::now);
        lock(&self.store).purchased_sections(self.purchase_history_days, now)
    }

    // --- observers -------------------------------------------------------

    pub fn subscribe(
        &self,
        entity: EntityRef,
        observer: impl Fn(&ChangeNotice) + Send + 'static,
    ) -> SubscriptionId {
        lock(&self.store).subscribe(entity, observer)
    }

    pub fn subscribe_all(
        &self,
        observer: impl Fn(&ChangeNotice) + Send + 'static,
    ) -> SubscriptionId {
        lock(&self.store).subscribe_all(observer)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        lock(&self.store).unsubscribe(id)
    }

    // --- archive ---------------------------------------------------------

    /// Writes the whole graph to `path`. Returns the number of locations.
    pub fn export_to_path(&self, path: impl AsRef<Path>) -> ServiceResult<usize> {
        Ok(archive::export_to_path(&lock(&self.store), path)?)
    }

    /// Merges the archive at `path` and schedules a commit when it changed
    /// the graph.
    pub fn import_from_path(&self, path: impl AsRef<Path>) -> ServiceResult<ImportReport> {
        let (result, dirty) = {
            let mut store = lock(&self.store);
            let result = archive::import_from_path(&mut store, path);
            (result, store.has_changes())
        };
        if dirty {
            self.scheduler.schedule();
        }
        Ok(result?)
    }
}

impl std::fmt::Debug for ShoppingService {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShoppingService")
            .field("save_delay", &self.scheduler.delay())
            .field("purchase_history_days", &self.purchase_history_days)
            .finish_non_exhaustive()
    }
}
