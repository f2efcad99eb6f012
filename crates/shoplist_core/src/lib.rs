//! Consistency core for a shopping list.
//!
//! Owns the item/location graph, keeps observers in sync with it, and
//! schedules writes to durable storage. Every business invariant lives here.

pub mod archive;
pub mod clock;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod persistence;
pub mod repo;
pub mod service;
pub mod store;
pub mod timer;

pub use archive::{ArchiveError, ArchiveResult, ImportReport, ItemRecord, LocationRecord};
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use config::{ConfigError, CoreConfig, TimerConfig};
pub use logging::{default_log_level, init_logging, init_logging_from_config, logging_status};
pub use model::draft::{ItemDraft, LocationDraft};
pub use model::item::{Item, ItemId};
pub use model::location::{Location, LocationId, Rgba, UNKNOWN_LOCATION_VISITATION_ORDER};
pub use model::{EntityKind, EntityRef, ValidationError};
pub use persistence::{CommitOutcome, PersistenceScheduler, StorageCommitError};
pub use repo::durable::{DurableStore, SqliteDurableStore};
pub use repo::{RepoError, RepoResult};
pub use service::lifecycle::AppLifecycle;
pub use service::shopping_service::{ServiceError, ServiceResult, ShoppingService};
pub use store::entity_store::EntityStore;
pub use store::error::{InvariantViolation, StoreError, StoreResult};
pub use store::propagator::{ChangeKind, ChangeNotice, SubscriptionId};
pub use store::GraphSnapshot;
pub use timer::{ElapsedTimer, TimerPolicy, TimerState};

use std::sync::{Mutex, MutexGuard};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Locks `mutex`, taking the data back from a poisoned lock.
///
/// A panicking observer must not wedge the graph for every later caller.
pub(crate) fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}
