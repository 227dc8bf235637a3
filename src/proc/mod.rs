// src/proc/mod.rs

//! Child process layer.
//!
//! This module owns everything that touches the OS process:
//! - [`handle`] holds the `ProcessHandle`: spawn, lifecycle state, pid
//!   bookkeeping, stdin writes, and the background exit-wait task.
//! - [`collector`] accumulates stdout/stderr chunks and forwards them into
//!   the runner's dispatch loop.
//! - [`ticker`] emits the periodic progress tick while the process is active.
//! - [`signals`] provides the `SignalBackend` seam used for pause/resume and
//!   kill/terminate delivery.
//!
//! All async sources report back to the runner through [`ChildEvent`]s on a
//! single mpsc channel, so the runner's dispatch loop is the only place where
//! per-run state is mutated.

use std::process::ExitStatus;

pub mod collector;
pub mod handle;
pub mod signals;
pub mod ticker;

pub use collector::OutputCollector;
pub use handle::{ProcState, ProcessHandle};
pub use signals::{ControlSignal, PosixSignals, SignalBackend};
pub use ticker::Ticker;

/// Events flowing from the child's async sources into the runner loop.
#[derive(Debug)]
pub enum ChildEvent {
    /// A chunk of bytes became available on the child's stdout.
    Stdout(String),
    /// A chunk of bytes became available on the child's stderr.
    Stderr(String),
    /// One progress tick elapsed.
    Tick,
    /// The child process reached a terminal state (or waiting for it failed).
    Exited(std::io::Result<ExitStatus>),
}
