// src/runner/mod.rs

//! Command runner orchestration.
//!
//! This module ties together:
//! - the process handle (spawn, signals, exit observation)
//! - the output collector (stdout/stderr capture)
//! - the progress ticker
//! - the optional FIFO side channel
//!
//! into [`CommandRunner`], whose `run()` drives a single dispatch loop: every
//! async source (stream reads, ticks, process exit) reports through one
//! channel, so handlers never run concurrently with each other or with the
//! body of `run()`. Consumers observe the run through [`RunnerEvent`]s.

use crate::types::ExitKind;

/// Default estimated completion time in deciseconds (one second).
pub const DEFAULT_EST_DURATION: u64 = 10;

/// Sentinel exit code returned when a run is rejected (a child is already
/// active) or the shell subprocess could not be spawned.
pub const RUN_REJECTED: i32 = -1;

/// Options recognised by [`CommandRunner::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Suppress the diagnostic echo of the command line and exit status.
    /// A debug level above 0 on the runner wins over this.
    pub quiet: bool,
    /// Tick once per second instead of every 100ms.
    pub slow_tick: bool,
}

/// Events published to consumers (e.g. a progress-bar UI).
///
/// Ordering per run: `Started` always precedes the first tick or output
/// event; `Finished` is always last and emitted exactly once; `RunTime`
/// counters are strictly increasing and cease the instant the process
/// reaches a terminal state. `FifoChangeAvailable` flows independently of
/// any run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunnerEvent {
    /// The shell subprocess was spawned.
    Started,
    /// A chunk arrived on the child's stdout.
    OutputAvailable(String),
    /// A chunk arrived on the child's stderr.
    ErrorAvailable(String),
    /// Periodic progress: elapsed tick counter vs. estimated duration.
    RunTime { elapsed: u64, estimated: u64 },
    /// The process reached a terminal state.
    Finished { exit_code: i32, exit_status: ExitKind },
    /// An external writer put text into the connected FIFO.
    FifoChangeAvailable(String),
}

pub mod command_runner;

pub use command_runner::CommandRunner;
