//! Elapsed-time stopwatch with background-suspend semantics.
//!
//! # Responsibility
//! - Track committed elapsed time across `Stopped`/`Running`/`Suspended`.
//! - Republish the running total on a periodic tick while `Running`.
//!
//! # Invariants
//! - `run_start` is present only while `Running`.
//! - Every exit from `Running` folds the current interval into
//!   `accumulated`, records `last_stop`, and publishes `accumulated`.
//! - The tick task is stopped and joined before any transition out of
//!   `Running` completes, so no tick observes a state that already changed.
//! - `reset` only applies while `Stopped`.

use crate::clock::{system_clock, SharedClock};
use crate::config::TimerConfig;
use crate::lock;
use crossbeam_channel::{bounded, select, tick, Sender};
use log::{error, info};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Period of the running-total republish tick.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Stopped,
    Running,
    Suspended,
}

impl TimerState {
    fn as_str(self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Running => "running",
            Self::Suspended => "suspended",
        }
    }
}

/// Background behaviour of the timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerPolicy {
    /// Backgrounding a running timer suspends it. Otherwise backgrounding
    /// leaves the timer alone.
    pub suspend_in_background: bool,
    /// Time spent suspended is credited when the timer resumes.
    pub count_background_time: bool,
    pub tick_interval: Duration,
}

impl Default for TimerPolicy {
    fn default() -> Self {
        Self {
            suspend_in_background: false,
            count_background_time: false,
            tick_interval: DEFAULT_TICK_INTERVAL,
        }
    }
}

/// Callback receiving every published total.
pub type TotalObserver = Arc<dyn Fn(Duration) + Send + Sync>;

/// Total and observer slot shared with the tick task.
#[derive(Clone)]
struct Publisher {
    total: Arc<Mutex<Duration>>,
    observer: Arc<Mutex<Option<TotalObserver>>>,
}

impl Publisher {
    fn publish(&self, total: Duration) {
        *lock(&self.total) = total;
        let observer = lock(&self.observer).clone();
        if let Some(observer) = observer {
            observer(total);
        }
    }
}

struct Ticker {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

impl Ticker {
    fn spawn(
        interval: Duration,
        accumulated: Duration,
        run_start: Instant,
        clock: SharedClock,
        publisher: Publisher,
    ) -> std::io::Result<Self> {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let handle = thread::Builder::new()
            .name("shoplist-timer-tick".to_string())
            .spawn(move || {
                let ticks = tick(interval);
                loop {
                    select! {
                        recv(stop_rx) -> _ => break,
                        recv(ticks) -> _ => {
                            let now = clock.now();
                            publisher.publish(accumulated + now.saturating_duration_since(run_start));
                        }
                    }
                }
            })?;
        Ok(Self {
            stop: stop_tx,
            handle,
        })
    }

    /// Stops the tick task and waits for it to exit.
    fn shutdown(self) {
        let _ = self.stop.send(());
        if self.handle.join().is_err() {
            error!("event=timer_tick module=timer status=error error_code=tick_task_panicked");
        }
    }
}

/// Stopwatch owned by one caller.
pub struct ElapsedTimer {
    state: TimerState,
    accumulated: Duration,
    run_start: Option<Instant>,
    last_stop: Option<Instant>,
    policy: TimerPolicy,
    clock: SharedClock,
    publisher: Publisher,
    ticker: Option<Ticker>,
}

impl ElapsedTimer {
    pub fn new(policy: TimerPolicy) -> Self {
        Self::with_clock(policy, system_clock())
    }

    /// Builds a stopped timer from the `timer` config section.
    pub fn from_config(config: &TimerConfig, clock: SharedClock) -> Self {
        Self::with_clock(config.policy(), clock)
    }

    pub fn with_clock(policy: TimerPolicy, clock: SharedClock) -> Self {
        Self {
            state: TimerState::Stopped,
            accumulated: Duration::ZERO,
            run_start: None,
            last_stop: None,
            policy,
            clock,
            publisher: Publisher {
                total: Arc::new(Mutex::new(Duration::ZERO)),
                observer: Arc::new(Mutex::new(None)),
            },
            ticker: None,
        }
    }

    /// Registers a callback for every published total, replacing any
    /// previous one. Applies from the next publish, including ticks of an
    /// already running timer.
    pub fn set_observer(&mut self, observer: impl Fn(Duration) + Send + Sync + 'static) {
        *lock(&self.publisher.observer) = Some(Arc::new(observer));
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == TimerState::Running
    }

    pub fn is_suspended(&self) -> bool {
        self.state == TimerState::Suspended
    }

    pub fn is_stopped(&self) -> bool {
        self.state == TimerState::Stopped
    }

    pub fn policy(&self) -> TimerPolicy {
        self.policy
    }

    /// Committed elapsed time, excluding the current running interval.
    pub fn accumulated(&self) -> Duration {
        self.accumulated
    }

    /// Last published total.
    pub fn total(&self) -> Duration {
        *lock(&self.publisher.total)
    }

    /// Total computed now, including the current running interval.
    pub fn elapsed(&self) -> Duration {
        match self.run_start {
            Some(run_start) => {
                self.accumulated + self.clock.now().saturating_duration_since(run_start)
            }
            None => self.accumulated,
        }
    }

    /// Enters `Running` from `Stopped` or `Suspended`. Returns whether the
    /// state changed.
    pub fn start(&mut self) -> bool {
        let now = self.clock.now();
        let run_start = match self.state {
            TimerState::Running => return false,
            TimerState::Stopped => now,
            TimerState::Suspended if self.policy.count_background_time => {
                self.last_stop.unwrap_or(now)
            }
            TimerState::Suspended => now,
        };
        let from = self.state;

        self.run_start = Some(run_start);
        self.state = TimerState::Running;
        self.publisher
            .publish(self.accumulated + now.saturating_duration_since(run_start));

        match Ticker::spawn(
            self.policy.tick_interval,
            self.accumulated,
            run_start,
            Arc::clone(&self.clock),
            self.publisher.clone(),
        ) {
            Ok(ticker) => self.ticker = Some(ticker),
            Err(err) => error!(
                "event=timer_tick module=timer status=error error_code=spawn_failed error={err}"
            ),
        }
        info!(
            "event=timer_transition module=timer status=ok from={} to=running",
            from.as_str()
        );
        true
    }

    /// Leaves `Running` for `Stopped`. Returns whether the state changed.
    pub fn stop(&mut self) -> bool {
        if self.state != TimerState::Running {
            return false;
        }
        self.exit_running(TimerState::Stopped);
        true
    }

    /// Suspends a running timer when the policy asks for it. Otherwise a
    /// no-op. Returns whether the state changed.
    pub fn suspend_for_background(&mut self) -> bool {
        if !self.policy.suspend_in_background || self.state != TimerState::Running {
            return false;
        }
        self.exit_running(TimerState::Suspended);
        true
    }

    /// Zeroes the accumulator. Only valid while `Stopped`.
    pub fn reset(&mut self) -> bool {
        if self.state != TimerState::Stopped {
            return false;
        }
        self.accumulated = Duration::ZERO;
        self.publisher.publish(Duration::ZERO);
        true
    }

    fn exit_running(&mut self, to: TimerState) {
        if let Some(ticker) = self.ticker.take() {
            ticker.shutdown();
        }

        let now = self.clock.now();
        if let Some(run_start) = self.run_start.take() {
            self.accumulated += now.saturating_duration_since(run_start);
        }
        self.last_stop = Some(now);
        self.state = to;
        self.publisher.publish(self.accumulated);
        info!(
            "event=timer_transition module=timer status=ok from=running to={} accumulated_ms={}",
            to.as_str(),
            self.accumulated.as_millis()
        );
    }
}

impl Drop for ElapsedTimer {
    fn drop(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.shutdown();
        }
    }
}

impl std::fmt::Debug for ElapsedTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElapsedTimer")
            .field("state", &self.state)
            .field("accumulated", &self.accumulated)
            .field("policy", &self.policy)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{ElapsedTimer, TimerPolicy, TimerState};
    use crate::clock::ManualClock;
    use crate::config::TimerConfig;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn timer_with(policy: TimerPolicy) -> (ElapsedTimer, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        (ElapsedTimer::with_clock(policy, clock.clone()), clock)
    }

    #[test]
    fn start_stop_accumulates_each_interval() {
        let (mut timer, clock) = timer_with(TimerPolicy::default());
        assert!(timer.start());
        clock.advance(Duration::from_secs(2));
        assert!(timer.stop());
        assert_eq!(timer.accumulated(), Duration::from_secs(2));
        assert_eq!(timer.total(), Duration::from_secs(2));

        assert!(timer.start());
        clock.advance(Duration::from_secs(1));
        assert!(timer.stop());
        assert_eq!(timer.accumulated(), Duration::from_secs(3));
    }

    #[test]
    fn repeated_start_and_stop_are_no_ops() {
        let (mut timer, _clock) = timer_with(TimerPolicy::default());
        assert!(!timer.stop());
        assert!(timer.start());
        assert!(!timer.start());
        assert_eq!(timer.state(), TimerState::Running);
    }

    #[test]
    fn reset_only_applies_when_stopped() {
        let (mut timer, clock) = timer_with(TimerPolicy::default());
        timer.start();
        clock.advance(Duration::from_secs(4));
        assert!(!timer.reset());
        timer.stop();
        assert!(timer.reset());
        assert_eq!(timer.accumulated(), Duration::ZERO);
        assert_eq!(timer.total(), Duration::ZERO);
    }

    #[test]
    fn backgrounding_without_suspend_policy_keeps_running() {
        let (mut timer, clock) = timer_with(TimerPolicy::default());
        timer.start();
        assert!(!timer.suspend_for_background());
        clock.advance(Duration::from_secs(5));
        assert!(timer.is_running());
        assert_eq!(timer.elapsed(), Duration::from_secs(5));
    }

    #[test]
    fn suspended_time_is_skipped_unless_policy_counts_it() {
        let policy = TimerPolicy {
            suspend_in_background: true,
            ..TimerPolicy::default()
        };
        let (mut timer, clock) = timer_with(policy);
        timer.start();
        clock.advance(Duration::from_secs(2));
        assert!(timer.suspend_for_background());
        assert!(timer.is_suspended());
        clock.advance(Duration::from_secs(10));
        assert!(timer.start());
        clock.advance(Duration::from_secs(1));
        timer.stop();
        assert_eq!(timer.accumulated(), Duration::from_secs(3));
    }

    #[test]
    fn suspended_time_is_credited_when_policy_counts_it() {
        let policy = TimerPolicy {
            suspend_in_background: true,
            count_background_time: true,
            ..TimerPolicy::default()
        };
        let (mut timer, clock) = timer_with(policy);
        timer.start();
        clock.advance(Duration::from_secs(2));
        timer.suspend_for_background();
        clock.advance(Duration::from_secs(10));
        timer.start();
        clock.advance(Duration::from_secs(1));
        timer.stop();
        assert_eq!(timer.accumulated(), Duration::from_secs(13));
    }

    #[test]
    fn tick_republishes_running_total() {
        let policy = TimerPolicy {
            tick_interval: Duration::from_millis(10),
            ..TimerPolicy::default()
        };
        let (mut timer, clock) = timer_with(policy);
        timer.start();
        clock.advance(Duration::from_secs(7));
        std::thread::sleep(Duration::from_millis(200));
        assert_eq!(timer.total(), Duration::from_secs(7));

        clock.advance(Duration::from_secs(1));
        timer.stop();
        assert_eq!(timer.total(), Duration::from_secs(8));
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(timer.total(), Duration::from_secs(8));
    }

    #[test]
    fn observer_set_while_running_receives_ticks() {
        let policy = TimerPolicy {
            tick_interval: Duration::from_millis(10),
            ..TimerPolicy::default()
        };
        let (mut timer, clock) = timer_with(policy);
        timer.start();
        clock.advance(Duration::from_secs(5));

        let seen: Arc<Mutex<Vec<Duration>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        timer.set_observer(move |total| sink.lock().unwrap().push(total));
        std::thread::sleep(Duration::from_millis(200));

        assert!(seen.lock().unwrap().contains(&Duration::from_secs(5)));
        timer.stop();
        assert_eq!(seen.lock().unwrap().last(), Some(&Duration::from_secs(5)));
    }

    #[test]
    fn from_config_applies_timer_section() {
        let config = TimerConfig {
            suspend_in_background: true,
            count_background_time: true,
            tick_interval_ms: 250,
        };
        let timer = ElapsedTimer::from_config(&config, Arc::new(ManualClock::new()));
        let policy = timer.policy();
        assert!(policy.suspend_in_background);
        assert!(policy.count_background_time);
        assert_eq!(policy.tick_interval, Duration::from_millis(250));
        assert!(timer.is_stopped());
    }
}
