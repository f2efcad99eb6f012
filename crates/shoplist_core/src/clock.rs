//! Time sources shared by the entity store and the elapsed timer.
//!
//! # Responsibility
//! - Provide monotonic instants for interval arithmetic.
//! - Provide wall-clock epoch milliseconds for purchase stamps.
//!
//! # Invariants
//! - `ManualClock` only moves forward, and only when `advance` is called.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Monotonic "now" for elapsed-time arithmetic.
    fn now(&self) -> Instant;
    /// Wall-clock "now" as Unix epoch milliseconds.
    fn now_epoch_ms(&self) -> i64;
}

/// Clock handle shared between owners and background tasks.
pub type SharedClock = Arc<dyn Clock>;

/// The process clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn now_epoch_ms(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as i64)
            .unwrap_or(0)
    }
}

/// Returns the process clock as a shared handle.
pub fn system_clock() -> SharedClock {
    Arc::new(SystemClock)
}

/// Clock that only advances when told to.
#[derive(Debug)]
pub struct ManualClock {
    base_instant: Instant,
    base_epoch_ms: i64,
    offset: Mutex<Duration>,
}

impl ManualClock {
    /// Starts at the current process time.
    pub fn new() -> Self {
        Self::starting_at(SystemClock.now_epoch_ms())
    }

    /// Starts at a fixed wall-clock time.
    pub fn starting_at(epoch_ms: i64) -> Self {
        Self {
            base_instant: Instant::now(),
            base_epoch_ms: epoch_ms,
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(|err| err.into_inner());
        *offset += by;
    }

    fn offset(&self) -> Duration {
        *self.offset.lock().unwrap_or_else(|err| err.into_inner())
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base_instant + self.offset()
    }

    fn now_epoch_ms(&self) -> i64 {
        self.base_epoch_ms + self.offset().as_millis() as i64
    }
}
