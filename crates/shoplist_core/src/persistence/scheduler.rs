//! Debounced and immediate commit scheduling.
//!
//! # Invariants
//! - At most one pending-commit task is held; arming a new one cancels the
//!   previous one first, so two debounce timers are never armed together.
//! - Every arm or cancel bumps the debounce generation. A task whose timer
//!   already fired commits only if its generation is still current once it
//!   holds both locks, so a replaced task never writes.
//! - A commit with no pending changes is skipped.
//! - Commits are serialized on the durable store lock, and the change set is
//!   taken under that lock, so commits land in the order they were taken.
//! - A failed commit re-queues its change set; nothing retries it except the
//!   next natural trigger.
//! - Lock order is durable store, then entity store.

use crate::lock;
use crate::repo::durable::DurableStore;
use crate::repo::RepoError;
use crate::store::entity_store::EntityStore;
use crossbeam_channel::{after, bounded, select, Sender};
use log::{debug, error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Quiet period before a debounced commit runs.
pub const DEFAULT_SAVE_DELAY: Duration = Duration::from_secs(5);

/// Entity store handle shared by the owner and the debounce task.
pub type SharedStore = Arc<Mutex<EntityStore>>;

/// Durable store handle shared by the owner and the debounce task.
pub type SharedDurableStore = Arc<Mutex<dyn DurableStore>>;

/// Why a commit ran. Used for diagnostics only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitMode {
    Immediate,
    Debounced,
    Flush,
}

impl CommitMode {
    fn as_str(self) -> &'static str {
        match self {
            Self::Immediate => "immediate",
            Self::Debounced => "debounced",
            Self::Flush => "flush",
        }
    }
}

/// Result of a commit attempt that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed { writes: usize },
    Skipped,
}

/// A durable write failed. The in-memory graph stays authoritative.
#[derive(Debug)]
pub struct StorageCommitError {
    mode: CommitMode,
    source: RepoError,
}

impl StorageCommitError {
    pub fn mode(&self) -> CommitMode {
        self.mode
    }

    pub fn repo_error(&self) -> &RepoError {
        &self.source
    }
}

impl Display for StorageCommitError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} commit failed: {}", self.mode.as_str(), self.source)
    }
}

impl Error for StorageCommitError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.source)
    }
}

struct PendingCommit {
    cancel: Sender<()>,
    handle: JoinHandle<()>,
}

impl PendingCommit {
    fn cancel(self) {
        // A task already past its delay misses this; the generation check
        // stops it instead.
        let _ = self.cancel.try_send(());
    }
}

/// Debounce generation a task was armed under.
struct Ticket<'a> {
    current: &'a AtomicU64,
    armed: u64,
}

impl Ticket<'_> {
    fn is_stale(&self) -> bool {
        self.current.load(Ordering::SeqCst) != self.armed
    }
}

/// Schedules commits of the entity store's pending delta.
pub struct PersistenceScheduler {
    store: SharedStore,
    durable: SharedDurableStore,
    delay: Duration,
    pending: Mutex<Option<PendingCommit>>,
    generation: Arc<AtomicU64>,
}

impl PersistenceScheduler {
    pub fn new(store: SharedStore, durable: SharedDurableStore, delay: Duration) -> Self {
        Self {
            store,
            durable,
            delay,
            pending: Mutex::new(None),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Whether a debounce task is armed and has not finished yet.
    pub fn has_pending_commit(&self) -> bool {
        lock(&self.pending)
            .as_ref()
            .is_some_and(|pending| !pending.handle.is_finished())
    }

    /// Arms the debounce timer, replacing any armed one.
    ///
    /// The commit runs detached once `delay` passes without another call.
    /// Its failures are logged only.
    pub fn schedule(&self) {
        let mut pending = lock(&self.pending);
        let armed = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(previous) = pending.take() {
            previous.cancel();
            debug!("event=commit_debounce module=persistence status=cancelled");
        }

        let (cancel_tx, cancel_rx) = bounded::<()>(1);
        let store = Arc::clone(&self.store);
        let durable = Arc::clone(&self.durable);
        let generation = Arc::clone(&self.generation);
        let delay = self.delay;
        let spawned = thread::Builder::new()
            .name("shoplist-commit".to_string())
            .spawn(move || {
                select! {
                    recv(cancel_rx) -> _ => {}
                    recv(after(delay)) -> _ => {
                        let ticket = Ticket { current: &generation, armed };
                        // Already logged; nobody is waiting on this result.
                        let _ = commit_pending(
                            &store,
                            &durable,
                            CommitMode::Debounced,
                            Some(ticket),
                        );
                    }
                }
            });

        match spawned {
            Ok(handle) => {
                debug!(
                    "event=commit_debounce module=persistence status=scheduled delay_ms={}",
                    delay.as_millis()
                );
                *pending = Some(PendingCommit {
                    cancel: cancel_tx,
                    handle,
                });
            }
            Err(err) => error!(
                "event=commit_debounce module=persistence status=error error_code=spawn_failed error={err}"
            ),
        }
    }

    /// Cancels any armed timer and commits synchronously.
    ///
    /// Used right after destructive edits; the caller sees storage failures.
    pub fn commit_now(&self) -> Result<CommitOutcome, StorageCommitError> {
        self.cancel_pending();
        commit_pending(&self.store, &self.durable, CommitMode::Immediate, None)
    }

    /// Commits pending debounced changes right away, regardless of the timer.
    pub fn flush(&self) -> Result<CommitOutcome, StorageCommitError> {
        self.cancel_pending();
        commit_pending(&self.store, &self.durable, CommitMode::Flush, None)
    }

    fn cancel_pending(&self) {
        let mut pending = lock(&self.pending);
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(previous) = pending.take() {
            previous.cancel();
        }
    }
}

impl Drop for PersistenceScheduler {
    fn drop(&mut self) {
        // Dropping the held task cancels it, so write its changes out now.
        let armed = lock(&self.pending).is_some();
        if armed {
            let _ = self.flush();
        }
    }
}

fn commit_pending(
    store: &SharedStore,
    durable: &SharedDurableStore,
    mode: CommitMode,
    ticket: Option<Ticket<'_>>,
) -> Result<CommitOutcome, StorageCommitError> {
    let started_at = Instant::now();
    let mut durable = lock(durable);
    let changes = {
        let mut store = lock(store);
        if ticket.as_ref().is_some_and(|ticket| ticket.is_stale()) {
            debug!(
                "event=commit module=persistence status=skipped mode={} reason=superseded",
                mode.as_str()
            );
            return Ok(CommitOutcome::Skipped);
        }
        if !store.has_changes() {
            debug!(
                "event=commit module=persistence status=skipped mode={} reason=no_changes",
                mode.as_str()
            );
            return Ok(CommitOutcome::Skipped);
        }
        store.take_changes()
    };

    match durable.commit(&changes) {
        Ok(()) => {
            info!(
                "event=commit module=persistence status=ok mode={} writes={} duration_ms={}",
                mode.as_str(),
                changes.len(),
                started_at.elapsed().as_millis()
            );
            Ok(CommitOutcome::Committed {
                writes: changes.len(),
            })
        }
        Err(err) => {
            lock(store).requeue_changes(&changes);
            error!(
                "event=commit module=persistence status=error mode={} writes={} duration_ms={} error={}",
                mode.as_str(),
                changes.len(),
                started_at.elapsed().as_millis(),
                err
            );
            Err(StorageCommitError { mode, source: err })
        }
    }
}
