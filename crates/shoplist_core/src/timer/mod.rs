//! Three-state elapsed-time stopwatch bound to foreground/background hooks.

pub mod elapsed;

pub use elapsed::{ElapsedTimer, TimerPolicy, TimerState, DEFAULT_TICK_INTERVAL};
