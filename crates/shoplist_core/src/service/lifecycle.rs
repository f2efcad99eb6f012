//! Host background/foreground hooks.
//!
//! # Invariants
//! - Backgrounding always attempts a flush, even when the timer is idle.
//! - A flush failure leaves the changes queued; it never blocks suspension.
//! - Foregrounding only resumes a timer that backgrounding suspended.

use super::shopping_service::{ServiceResult, ShoppingService};
use crate::config::CoreConfig;
use crate::lock;
use crate::persistence::CommitOutcome;
use crate::timer::ElapsedTimer;
use log::{error, info};
use std::sync::{Arc, Mutex};

/// Routes the two host lifecycle hooks to the service and the timer.
#[derive(Debug, Clone)]
pub struct AppLifecycle {
    service: Arc<ShoppingService>,
    timer: Arc<Mutex<ElapsedTimer>>,
}

impl AppLifecycle {
    pub fn new(service: Arc<ShoppingService>, timer: Arc<Mutex<ElapsedTimer>>) -> Self {
        Self { service, timer }
    }

    /// Pairs `service` with a fresh timer built from `config.timer` on the
    /// service's clock.
    pub fn from_config(service: Arc<ShoppingService>, config: &CoreConfig) -> Self {
        let timer = ElapsedTimer::from_config(&config.timer, service.clock());
        Self::new(service, Arc::new(Mutex::new(timer)))
    }

    pub fn service(&self) -> &Arc<ShoppingService> {
        &self.service
    }

    pub fn timer(&self) -> &Arc<Mutex<ElapsedTimer>> {
        &self.timer
    }

    /// Suspends the timer per its policy, then flushes pending edits.
    pub fn on_background(&self) -> ServiceResult<CommitOutcome> {
        let suspended = lock(&self.timer).suspend_for_background();
        let flushed = self.service.flush();
        match &flushed {
            Ok(outcome) => info!(
                "event=app_background module=service status=ok timer_suspended={} committed={}",
                suspended,
                matches!(outcome, CommitOutcome::Committed { .. })
            ),
            Err(err) => error!(
                "event=app_background module=service status=error timer_suspended={} error={}",
                suspended, err
            ),
        }
        flushed
    }

    /// Resumes a timer suspended by `on_background`. Returns whether it did.
    pub fn on_foreground(&self) -> bool {
        let mut timer = lock(&self.timer);
        let resumed = timer.is_suspended() && timer.start();
        info!(
            "event=app_foreground module=service status=ok timer_resumed={}",
            resumed
        );
        resumed
    }
}

#[cfg(test)]
mod tests {
    use super::AppLifecycle;
    use crate::clock::ManualClock;
    use crate::config::{CoreConfig, TimerConfig};
    use crate::db::open_db_in_memory;
    use crate::persistence::{CommitOutcome, SharedDurableStore};
    use crate::repo::durable::SqliteDurableStore;
    use crate::service::shopping_service::ShoppingService;
    use crate::timer::{ElapsedTimer, TimerPolicy};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn fixture(policy: TimerPolicy) -> (AppLifecycle, Arc<Mutex<SqliteDurableStore>>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let sqlite = Arc::new(Mutex::new(SqliteDurableStore::new(
            open_db_in_memory().unwrap(),
        )));
        let durable: SharedDurableStore = sqlite.clone();
        let config = CoreConfig {
            save_delay_ms: 60_000,
            ..CoreConfig::default()
        };
        let service = ShoppingService::open(durable, &config, clock.clone()).unwrap();
        let timer = ElapsedTimer::with_clock(policy, clock.clone());
        (
            AppLifecycle::new(Arc::new(service), Arc::new(Mutex::new(timer))),
            sqlite,
            clock,
        )
    }

    fn stored_items(sqlite: &Mutex<SqliteDurableStore>) -> i64 {
        sqlite
            .lock()
            .unwrap()
            .connection()
            .query_row("SELECT COUNT(*) FROM items", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn background_flushes_debounced_edits() {
        let (lifecycle, sqlite, _clock) = fixture(TimerPolicy::default());
        let service = lifecycle.service();
        let mut draft = service.create_item();
        draft.name = "Bread".to_string();
        service.upsert_item(&draft).unwrap();
        assert!(service.has_pending_commit());
        assert_eq!(stored_items(&sqlite), 0);

        let outcome = lifecycle.on_background().unwrap();
        assert!(matches!(outcome, CommitOutcome::Committed { .. }));
        assert_eq!(stored_items(&sqlite), 1);
        assert!(!service.has_pending_commit());

        assert_eq!(lifecycle.on_background().unwrap(), CommitOutcome::Skipped);
    }

    #[test]
    fn background_and_foreground_drive_the_timer() {
        let policy = TimerPolicy {
            suspend_in_background: true,
            ..TimerPolicy::default()
        };
        let (lifecycle, _sqlite, clock) = fixture(policy);
        lifecycle.timer().lock().unwrap().start();
        clock.advance(Duration::from_secs(2));

        lifecycle.on_background().unwrap();
        assert!(lifecycle.timer().lock().unwrap().is_suspended());
        clock.advance(Duration::from_secs(30));

        assert!(lifecycle.on_foreground());
        clock.advance(Duration::from_secs(1));
        let mut timer = lifecycle.timer().lock().unwrap();
        timer.stop();
        assert_eq!(timer.accumulated(), Duration::from_secs(3));
    }

    #[test]
    fn foreground_leaves_stopped_timer_alone() {
        let (lifecycle, _sqlite, _clock) = fixture(TimerPolicy::default());
        assert!(!lifecycle.on_foreground());
        assert!(lifecycle.timer().lock().unwrap().is_stopped());
    }

    #[test]
    fn config_timer_section_drives_background_suspension() {
        let clock = Arc::new(ManualClock::new());
        let durable: SharedDurableStore = Arc::new(Mutex::new(SqliteDurableStore::new(
            open_db_in_memory().unwrap(),
        )));
        let config = CoreConfig {
            timer: TimerConfig {
                suspend_in_background: true,
                ..TimerConfig::default()
            },
            ..CoreConfig::default()
        };
        let service = ShoppingService::open(durable, &config, clock.clone()).unwrap();
        let lifecycle = AppLifecycle::from_config(Arc::new(service), &config);

        lifecycle.timer().lock().unwrap().start();
        clock.advance(Duration::from_secs(4));
        lifecycle.on_background().unwrap();
        assert!(lifecycle.timer().lock().unwrap().is_suspended());
        assert_eq!(
            lifecycle.timer().lock().unwrap().accumulated(),
            Duration::from_secs(4)
        );
        assert!(lifecycle.on_foreground());
    }
}
