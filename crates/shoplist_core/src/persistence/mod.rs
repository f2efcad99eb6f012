//! Commit scheduling between the in-memory graph and durable storage.
//!
//! # Responsibility
//! - Commit immediately after destructive edits.
//! - Debounce routine edits into one trailing-edge commit.
//! - Flush pending edits on demand (app backgrounding).
//!
//! # See also
//! - `repo::durable` for the commit boundary itself.

pub mod scheduler;

pub use scheduler::{
    CommitMode, CommitOutcome, PersistenceScheduler, SharedDurableStore, SharedStore,
    StorageCommitError, DEFAULT_SAVE_DELAY,
};
