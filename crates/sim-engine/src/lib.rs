//! Discrete-Event Simulation Kernel
//!
//! Provides the scheduling core shared by every simulated node:
//! - Integer-nanosecond simulation clock ([`SimTime`], [`SimDuration`])
//! - A future-event set ordered by (timestamp, insertion) ([`EventQueue`])
//! - Cancellable timers ([`TimerHandle`])
//! - A run-to-horizon dispatch loop ([`run_until`])
//!
//! The kernel is strictly single-threaded: handlers run to completion and
//! may schedule or cancel further events, but nothing runs concurrently.

pub mod queue;
pub mod time;

pub use queue::{run_until, EventQueue, TimerHandle};
pub use time::{SimDuration, SimTime};

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("cannot schedule an event at {time} before current time {now}")]
    ScheduledInPast { time: SimTime, now: SimTime },
}

pub type Result<T> = std::result::Result<T, EngineError>;
