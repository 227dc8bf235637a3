// src/proc/signals.rs

//! Pluggable signal delivery abstraction.
//!
//! Pause/resume deliberately operate at the OS-signal level (STOP/CONT)
//! rather than through any cooperative protocol with the child, because the
//! child is an arbitrary shell command that cannot be assumed to handle an
//! application-level pause request. That makes the capability
//! platform-dependent, so the runner talks to a `SignalBackend` instead of
//! calling `nix` directly:
//!
//! - `PosixSignals` is the production implementation.
//! - Tests (and platforms without equivalent signals) can substitute their
//!   own recording or no-op backend.

use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tracing::{debug, warn};

/// Control signals the runner can deliver to its child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    /// Suspend execution (POSIX STOP).
    Suspend,
    /// Continue a suspended process (POSIX CONT).
    Resume,
    /// Ask the process to stop gracefully (POSIX TERM).
    Terminate,
    /// Stop the process forcefully (POSIX KILL).
    Kill,
}

/// Trait abstracting how control signals reach the child process.
pub trait SignalBackend: Send + Sync {
    /// Deliver `signal` to the process identified by `pid`.
    ///
    /// Returns whether delivery succeeded. Failure is never fatal; the
    /// runner reports it through its boolean control-operation contracts.
    fn deliver(&self, pid: u32, signal: ControlSignal) -> bool;
}

/// Production backend delivering real POSIX signals via `nix`.
#[derive(Debug, Default)]
pub struct PosixSignals;

impl SignalBackend for PosixSignals {
    fn deliver(&self, pid: u32, signal: ControlSignal) -> bool {
        let sig = match signal {
            ControlSignal::Suspend => Signal::SIGSTOP,
            ControlSignal::Resume => Signal::SIGCONT,
            ControlSignal::Terminate => Signal::SIGTERM,
            ControlSignal::Kill => Signal::SIGKILL,
        };

        match signal::kill(Pid::from_raw(pid as i32), sig) {
            Ok(()) => {
                debug!(pid, signal = ?sig, "signal delivered");
                true
            }
            Err(Errno::ESRCH) => {
                // Process already gone; common when the child exits between
                // the state check and the delivery.
                debug!(pid, signal = ?sig, "no such process");
                false
            }
            Err(err) => {
                warn!(pid, signal = ?sig, error = %err, "signal delivery failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivery_to_unknown_pid_fails() {
        // Pid numbers this high are not handed out on test systems.
        assert!(!PosixSignals.deliver(u32::MAX / 2, ControlSignal::Resume));
    }
}
