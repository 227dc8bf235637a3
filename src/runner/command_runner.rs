// src/runner/command_runner.rs

//! The `CommandRunner` itself.

use std::path::Path;
use std::process::ExitStatus;
use std::sync::Mutex;
use std::sync::atomic::{AtomicI32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::fifo::FifoChannel;
use crate::proc::{
    ChildEvent, ControlSignal, OutputCollector, PosixSignals, ProcessHandle, SignalBackend, Ticker,
};
use crate::runner::{DEFAULT_EST_DURATION, RUN_REJECTED, RunOptions, RunnerEvent};
use crate::types::{ExitKind, TickInterval, reconcile_exit_code};

/// Capacity of the per-run internal event channel.
const CHILD_EVENT_CAPACITY: usize = 64;

/// Bounded wait applied by `kill`/`terminate` for the signal to take effect.
const STOP_WAIT: Duration = Duration::from_secs(1);

/// Runs one external shell command at a time, capturing its output,
/// reporting progress ticks, and offering pause/resume/kill control plus an
/// optional FIFO side channel.
///
/// Cheap to clone; clones share the same underlying runner, which is how
/// control calls (`pause`, `kill`, ...) reach a child while another task is
/// blocked in [`run`](Self::run). Callers needing concurrent commands must
/// use separate runners: a second `run()` on a busy instance is rejected
/// with [`RUN_REJECTED`].
#[derive(Clone)]
pub struct CommandRunner {
    shared: Arc<RunnerShared>,
}

struct RunnerShared {
    handle: ProcessHandle,
    collector: OutputCollector,
    ticker: Mutex<Option<Ticker>>,
    fifo: Mutex<Option<FifoChannel>>,
    signals: Box<dyn SignalBackend>,
    elapsed: AtomicU64,
    est_duration: AtomicU64,
    debug_level: AtomicI32,
    exit: Mutex<Option<(i32, ExitKind)>>,
    events_tx: mpsc::UnboundedSender<RunnerEvent>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<RunnerEvent>>>,
}

impl std::fmt::Debug for CommandRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRunner")
            .field("handle", &self.shared.handle)
            .field("elapsed", &self.shared.elapsed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl Default for CommandRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRunner {
    /// Create a runner delivering real POSIX signals.
    pub fn new() -> Self {
        Self::with_signal_backend(PosixSignals)
    }

    /// Create a runner with a custom signal backend (tests, non-POSIX
    /// platforms).
    pub fn with_signal_backend(signals: impl SignalBackend + 'static) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            shared: Arc::new(RunnerShared {
                handle: ProcessHandle::new(),
                collector: OutputCollector::new(),
                ticker: Mutex::new(None),
                fifo: Mutex::new(None),
                signals: Box::new(signals),
                elapsed: AtomicU64::new(0),
                est_duration: AtomicU64::new(DEFAULT_EST_DURATION),
                debug_level: AtomicI32::new(0),
                exit: Mutex::new(None),
                events_tx,
                events_rx: Mutex::new(Some(events_rx)),
            }),
        }
    }

    /// Take the event receiver. Returns `None` if it was already taken by an
    /// earlier call (there is a single consumer per runner).
    pub fn take_events(&self) -> Option<mpsc::UnboundedReceiver<RunnerEvent>> {
        self.shared.events_rx.lock().unwrap().take()
    }

    /// Run `cmd` as `sh -c <cmd>` to completion and return the reconciled
    /// exit code.
    ///
    /// Only one child per runner: if a child is already active this returns
    /// [`RUN_REJECTED`] immediately without touching any state. The same
    /// sentinel is returned when the shell subprocess cannot be spawned.
    /// `est_duration` is advisory, in deciseconds; it only feeds the
    /// `RunTime` events and never causes termination.
    pub async fn run(&self, cmd: &str, options: RunOptions, est_duration: u64) -> i32 {
        let shared = &self.shared;

        if !shared.handle.try_claim() {
            warn!("process already running");
            return RUN_REJECTED;
        }

        // Reset per-run state so a runner instance can be reused sequentially.
        shared.collector.clear();
        shared.elapsed.store(0, Ordering::Relaxed);
        shared.est_duration.store(est_duration, Ordering::Relaxed);
        *shared.exit.lock().unwrap() = None;

        let quiet = options.quiet && self.debug_level() <= 0;

        let spawned = match shared.handle.spawn(cmd).await {
            Ok(spawned) => spawned,
            Err(err) => {
                warn!(error = %err, "failed to spawn shell subprocess");
                shared.handle.mark_not_running().await;
                return RUN_REJECTED;
            }
        };

        if !quiet {
            info!(command = %cmd, pid = ?shared.handle.pid(), "running command");
        }
        self.emit(RunnerEvent::Started);

        let (tx, mut rx) = mpsc::channel::<ChildEvent>(CHILD_EVENT_CAPACITY);

        let interval = if options.slow_tick {
            TickInterval::Slow
        } else {
            TickInterval::Fast
        };
        *shared.ticker.lock().unwrap() = Some(Ticker::spawn(interval, tx.clone()));

        crate::proc::collector::spawn_readers(spawned.stdout, spawned.stderr, tx.clone());
        shared.handle.watch_exit(spawned.child, tx);

        // Single dispatch loop, the run's one suspension point. It ends when
        // every producer (ticker, readers, exit watcher) has dropped its
        // sender, which guarantees Finished is the last event of the run.
        let mut exit: Option<(i32, ExitKind)> = None;
        while let Some(event) = rx.recv().await {
            match event {
                ChildEvent::Stdout(chunk) => {
                    self.emit(RunnerEvent::OutputAvailable(chunk.clone()));
                    shared.collector.append_stdout(&chunk);
                }
                ChildEvent::Stderr(chunk) => {
                    self.emit(RunnerEvent::ErrorAvailable(chunk.clone()));
                    shared.collector.append_stderr(&chunk);
                }
                ChildEvent::Tick => {
                    // Ticks already in flight when the child exits are dropped.
                    if exit.is_none() {
                        let elapsed = shared.elapsed.fetch_add(1, Ordering::Relaxed) + 1;
                        self.emit(RunnerEvent::RunTime {
                            elapsed,
                            estimated: est_duration,
                        });
                    }
                }
                ChildEvent::Exited(status) => {
                    exit = Some(reconcile_status(status));
                    if let Some(ticker) = shared.ticker.lock().unwrap().take() {
                        ticker.stop();
                    }
                    shared.handle.mark_not_running().await;
                }
            }
        }

        // The exit watcher always reports before closing its sender, but if
        // the handle still claims an active child, stop it before reporting.
        if shared.handle.is_running() && !self.terminate().await {
            self.kill().await;
        }

        let (exit_code, exit_status) = exit.unwrap_or((RUN_REJECTED, ExitKind::Crashed));
        *shared.exit.lock().unwrap() = Some((exit_code, exit_status));
        self.emit(RunnerEvent::Finished {
            exit_code,
            exit_status,
        });

        if !quiet {
            match exit_status {
                ExitKind::Normal => info!(exit_code, "command finished"),
                ExitKind::Crashed => info!(exit_status = ?exit_status, "command crashed"),
            }
        }

        reconcile_exit_code(exit_code, exit_status)
    }

    /// Run `cmd` to completion and return its trimmed stdout.
    pub async fn output_of(&self, cmd: &str) -> String {
        self.run(cmd, RunOptions::default(), DEFAULT_EST_DURATION)
            .await;
        self.output()
    }

    /// Forcefully stop the child. No-op success when idle; otherwise sends
    /// KILL and waits up to one second for the process to go inactive.
    pub async fn kill(&self) -> bool {
        self.stop_with(ControlSignal::Kill).await
    }

    /// Gracefully stop the child. Same contract as [`kill`](Self::kill) with
    /// TERM instead of KILL.
    pub async fn terminate(&self) -> bool {
        self.stop_with(ControlSignal::Terminate).await
    }

    async fn stop_with(&self, signal: ControlSignal) -> bool {
        let shared = &self.shared;
        if !shared.handle.is_running() {
            return true;
        }
        let Some(pid) = shared.handle.pid() else {
            return !shared.handle.is_running();
        };

        debug!(pid, ?signal, "stopping child process");
        shared.signals.deliver(pid, signal);
        shared.handle.wait_not_running(STOP_WAIT).await;
        !shared.handle.is_running()
    }

    /// Suspend the child (POSIX STOP) and halt tick emission. Fails when no
    /// child is running or the signal cannot be delivered.
    pub fn pause(&self) -> bool {
        let shared = &self.shared;
        if !shared.handle.is_running() {
            debug!("process not running");
            return false;
        }
        let Some(pid) = shared.handle.pid() else {
            return false;
        };

        debug!(pid, "pausing child process");
        if let Some(ticker) = shared.ticker.lock().unwrap().as_ref() {
            ticker.pause();
        }
        shared.signals.deliver(pid, ControlSignal::Suspend)
    }

    /// Continue a suspended child (POSIX CONT) and restart tick emission
    /// without resetting the elapsed counter. Fails when no process
    /// identifier is known.
    pub fn resume(&self) -> bool {
        let shared = &self.shared;
        let Some(pid) = shared.handle.pid() else {
            debug!("process id not found");
            return false;
        };

        debug!(pid, "resuming child process");
        if let Some(ticker) = shared.ticker.lock().unwrap().as_ref() {
            ticker.resume();
        }
        shared.signals.deliver(pid, ControlSignal::Resume)
    }

    /// Write UTF-8 text directly to the child's stdin. No-op when idle.
    pub async fn write_to_proc(&self, text: &str) {
        if !self.shared.handle.is_running() {
            return;
        }
        self.shared.handle.write_stdin(text).await;
    }

    pub fn is_running(&self) -> bool {
        self.shared.handle.is_running()
    }

    /// OS pid of the active child, if one is known.
    pub fn pid(&self) -> Option<u32> {
        self.shared.handle.pid()
    }

    /// Accumulated stdout of the last run, trimmed.
    pub fn output(&self) -> String {
        self.shared.collector.output()
    }

    /// Accumulated stderr of the last run, trimmed.
    pub fn error_output(&self) -> String {
        self.shared.collector.error_output()
    }

    /// Exit code reported by the last completed run.
    pub fn exit_code(&self) -> Option<i32> {
        self.shared.exit.lock().unwrap().map(|(code, _)| code)
    }

    /// Exit status of the last completed run.
    pub fn exit_kind(&self) -> Option<ExitKind> {
        self.shared.exit.lock().unwrap().map(|(_, kind)| kind)
    }

    /// Elapsed tick counter of the current (or last) run.
    pub fn elapsed_ticks(&self) -> u64 {
        self.shared.elapsed.load(Ordering::Relaxed)
    }

    /// Estimated duration recorded by the current (or last) run, in
    /// deciseconds.
    pub fn est_duration(&self) -> u64 {
        self.shared.est_duration.load(Ordering::Relaxed)
    }

    /// Diagnostic verbosity. A level above 0 surfaces the command echo and
    /// exit diagnostics even when a run asks for `quiet`.
    pub fn set_debug_level(&self, level: i32) {
        self.shared.debug_level.store(level, Ordering::Relaxed);
    }

    pub fn debug_level(&self) -> i32 {
        self.shared.debug_level.load(Ordering::Relaxed)
    }

    /// Attach a pre-existing FIFO (or openable read/write file) for duplex
    /// messaging. Idempotent when already connected on the same path; a
    /// different path replaces the previous channel. Returns false, without
    /// raising, when the path cannot be opened.
    pub fn connect_fifo(&self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        let mut guard = self.shared.fifo.lock().unwrap();

        if let Some(existing) = guard.as_ref()
            && existing.path() == path
        {
            return true;
        }

        match FifoChannel::connect(path, self.shared.events_tx.clone()) {
            Ok(channel) => {
                *guard = Some(channel);
                true
            }
            Err(err) => {
                debug!(path = ?path, error = %err, "could not connect fifo");
                false
            }
        }
    }

    /// Stop watching and close the FIFO. No-op when not connected.
    pub fn disconnect_fifo(&self) {
        self.shared.fifo.lock().unwrap().take();
    }

    /// Write text (plus a trailing newline) to the connected FIFO. The
    /// channel's own change notification is suppressed so only external
    /// writers trigger [`RunnerEvent::FifoChangeAvailable`].
    pub fn write_to_fifo(&self, text: &str) {
        let guard = self.shared.fifo.lock().unwrap();
        match guard.as_ref() {
            Some(channel) => channel.write(text),
            None => debug!("no fifo connected; dropping write"),
        }
    }

    fn emit(&self, event: RunnerEvent) {
        // Emission never blocks; without a consumer the event is dropped
        // with the channel.
        let _ = self.shared.events_tx.send(event);
    }
}

impl Drop for RunnerShared {
    fn drop(&mut self) {
        // Last handle gone: no process or file handle may outlive the
        // runner. The FIFO disconnects when its field drops; a live child
        // gets terminate-then-kill, failures swallowed.
        if self.handle.is_running()
            && let Some(pid) = self.handle.pid()
        {
            debug!(pid, "tearing down live child process");
            self.signals.deliver(pid, ControlSignal::Terminate);
            self.signals.deliver(pid, ControlSignal::Kill);
        }
    }
}

/// Translate the OS exit status into the (exit code, exit kind) pair carried
/// by `Finished` events.
fn reconcile_status(status: std::io::Result<ExitStatus>) -> (i32, ExitKind) {
    match status {
        Ok(status) => match status.code() {
            Some(code) => (code, ExitKind::Normal),
            // No code means the child was killed by a signal.
            None => (RUN_REJECTED, ExitKind::Crashed),
        },
        Err(err) => {
            warn!(error = %err, "failed waiting for child process");
            (RUN_REJECTED, ExitKind::Crashed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signaled_status_reconciles_to_crashed() {
        let (code, kind) = reconcile_status(Err(std::io::Error::other("wait failed")));
        assert_eq!(code, RUN_REJECTED);
        assert_eq!(kind, ExitKind::Crashed);
    }

    #[tokio::test]
    async fn take_events_yields_the_receiver_once() {
        let runner = CommandRunner::new();
        assert!(runner.take_events().is_some());
        assert!(runner.take_events().is_none());
    }
}
