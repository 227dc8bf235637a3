// src/proc/handle.rs

//! Ownership of the OS child process.

use std::process::Stdio;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::{Mutex, mpsc, watch};
use tracing::debug;

use crate::proc::ChildEvent;

/// Lifecycle state of the owned child process.
///
/// `is_running` treats anything other than `NotRunning` as active, so a
/// second `run()` is rejected from the moment the slot is claimed, not just
/// once the spawn has completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcState {
    NotRunning,
    Starting,
    Running,
}

/// Pieces of a freshly spawned child handed back to the runner: the child
/// itself (for the exit-wait task) and its output pipes (for the collector).
pub struct SpawnedChild {
    pub child: Child,
    pub stdout: Option<ChildStdout>,
    pub stderr: Option<ChildStderr>,
}

/// Owns the OS child process: start, lifecycle state, exit observation.
///
/// One instance is reused across sequential `run()` calls; the state watch
/// channel is how bounded waits (`kill`/`terminate`) observe termination
/// without holding the `Child` itself.
pub struct ProcessHandle {
    state: watch::Sender<ProcState>,
    pid: AtomicU32,
    stdin: Mutex<Option<ChildStdin>>,
}

impl std::fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("state", &*self.state.borrow())
            .field("pid", &self.pid.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl Default for ProcessHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessHandle {
    pub fn new() -> Self {
        let (state, _) = watch::channel(ProcState::NotRunning);
        Self {
            state,
            pid: AtomicU32::new(0),
            stdin: Mutex::new(None),
        }
    }

    /// Claim the single-child slot.
    ///
    /// Returns false if a child is already active; in that case nothing is
    /// modified.
    pub fn try_claim(&self) -> bool {
        self.state.send_if_modified(|state| {
            if *state == ProcState::NotRunning {
                *state = ProcState::Starting;
                true
            } else {
                false
            }
        })
    }

    /// Spawn `sh -c <cmd>` with piped stdin/stdout/stderr.
    ///
    /// Must only be called after a successful [`try_claim`](Self::try_claim).
    pub async fn spawn(&self, cmd: &str) -> std::io::Result<SpawnedChild> {
        let mut command = Command::new("sh");
        command
            .arg("-c")
            .arg(cmd)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn()?;

        // Stdin is parked before the pid is published, so a caller that has
        // observed the pid can immediately write to the child.
        *self.stdin.lock().await = child.stdin.take();
        let pid = child.id().unwrap_or(0);
        self.pid.store(pid, Ordering::SeqCst);

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        self.state.send_replace(ProcState::Running);
        debug!(pid, "child process spawned");

        Ok(SpawnedChild {
            child,
            stdout,
            stderr,
        })
    }

    /// Spawn the background task that reaps the child and forwards its exit
    /// status into the runner loop.
    pub fn watch_exit(&self, mut child: Child, tx: mpsc::Sender<ChildEvent>) {
        tokio::spawn(async move {
            let status = child.wait().await;
            let _ = tx.send(ChildEvent::Exited(status)).await;
        });
    }

    /// Release the slot after the child reached a terminal state (or the
    /// spawn failed). Clears the pid and closes the child's stdin pipe.
    pub async fn mark_not_running(&self) {
        self.pid.store(0, Ordering::SeqCst);
        *self.stdin.lock().await = None;
        self.state.send_replace(ProcState::NotRunning);
    }

    pub fn is_running(&self) -> bool {
        *self.state.borrow() != ProcState::NotRunning
    }

    pub fn state(&self) -> ProcState {
        *self.state.borrow()
    }

    /// OS pid of the active child, if one is known.
    pub fn pid(&self) -> Option<u32> {
        match self.pid.load(Ordering::SeqCst) {
            0 => None,
            pid => Some(pid),
        }
    }

    /// Bounded wait for the child to reach `NotRunning`.
    ///
    /// Returns true if the state was observed within `timeout`.
    pub async fn wait_not_running(&self, timeout: Duration) -> bool {
        let mut rx = self.state.subscribe();
        matches!(
            tokio::time::timeout(timeout, rx.wait_for(|s| *s == ProcState::NotRunning)).await,
            Ok(Ok(_))
        )
    }

    /// Write UTF-8 text directly to the child's stdin. Errors are logged and
    /// swallowed; the child may have closed its end at any time.
    pub async fn write_stdin(&self, text: &str) {
        let mut guard = self.stdin.lock().await;
        let Some(stdin) = guard.as_mut() else {
            debug!("no child stdin available");
            return;
        };
        if let Err(err) = stdin.write_all(text.as_bytes()).await {
            debug!(error = %err, "stdin write failed");
            return;
        }
        if let Err(err) = stdin.flush().await {
            debug!(error = %err, "stdin flush failed");
        }
    }
}
