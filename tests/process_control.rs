// tests/process_control.rs
mod common;
use crate::common::init_tracing;

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use runtick::proc::{ControlSignal, SignalBackend};
use runtick::runner::{CommandRunner, RunOptions, RunnerEvent};

async fn wait_until_running(runner: &CommandRunner) {
    for _ in 0..100 {
        if runner.pid().is_some() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("runner never reported a running child");
}

fn spawn_run(runner: &CommandRunner, cmd: &str) -> tokio::task::JoinHandle<i32> {
    let runner = runner.clone();
    let cmd = cmd.to_string();
    tokio::spawn(async move { runner.run(&cmd, RunOptions::default(), 50).await })
}

#[tokio::test]
async fn kill_stops_a_long_lived_child_within_the_bound() {
    init_tracing();

    let runner = CommandRunner::new();
    let background = spawn_run(&runner, "sleep 5");
    wait_until_running(&runner).await;

    let start = Instant::now();
    assert!(runner.kill().await);
    assert!(start.elapsed() < Duration::from_secs(2));
    assert!(!runner.is_running());

    assert_eq!(background.await.unwrap(), 1);
}

#[tokio::test]
async fn terminate_stops_a_long_lived_child() {
    init_tracing();

    let runner = CommandRunner::new();
    let background = spawn_run(&runner, "sleep 5");
    wait_until_running(&runner).await;

    assert!(runner.terminate().await);
    assert!(!runner.is_running());

    // SIGTERM is still an abnormal termination.
    assert_eq!(background.await.unwrap(), 1);
}

#[tokio::test]
async fn kill_and_terminate_are_noop_success_when_idle() {
    init_tracing();

    let runner = CommandRunner::new();
    assert!(runner.kill().await);
    assert!(runner.terminate().await);
}

#[tokio::test]
async fn pause_fails_when_idle_and_resume_fails_without_a_pid() {
    init_tracing();

    let runner = CommandRunner::new();
    assert!(!runner.pause());
    assert!(!runner.resume());
}

#[tokio::test]
async fn pause_stops_ticks_and_resume_continues_the_counter() {
    init_tracing();

    let runner = CommandRunner::new();
    let mut events = runner.take_events().unwrap();
    let background = spawn_run(&runner, "sleep 10");
    wait_until_running(&runner).await;

    // Let a couple of ticks through first.
    let mut last_elapsed = 0;
    while last_elapsed < 2 {
        match tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("timed out waiting for ticks")
            .expect("event channel closed")
        {
            RunnerEvent::RunTime { elapsed, .. } => last_elapsed = elapsed,
            _ => {}
        }
    }

    assert!(runner.pause());

    // Drain whatever was already in flight, then expect silence.
    tokio::time::sleep(Duration::from_millis(300)).await;
    while let Ok(event) = events.try_recv() {
        if let RunnerEvent::RunTime { elapsed, .. } = event {
            last_elapsed = elapsed;
        }
    }
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(
        events.try_recv().is_err(),
        "ticks kept flowing while paused"
    );

    assert!(runner.resume());

    // The counter continues from where it stopped instead of restarting.
    let next_elapsed = loop {
        match tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("timed out waiting for resumed ticks")
            .expect("event channel closed")
        {
            RunnerEvent::RunTime { elapsed, .. } => break elapsed,
            _ => {}
        }
    };
    assert_eq!(next_elapsed, last_elapsed + 1);

    assert!(runner.kill().await);
    background.await.unwrap();
}

/// Recording backend: delivery always "succeeds" and is remembered.
#[derive(Clone, Default)]
struct RecordingSignals {
    delivered: Arc<Mutex<Vec<ControlSignal>>>,
}

impl SignalBackend for RecordingSignals {
    fn deliver(&self, _pid: u32, signal: ControlSignal) -> bool {
        self.delivered.lock().unwrap().push(signal);
        true
    }
}

#[tokio::test]
async fn pause_and_resume_go_through_the_signal_backend() {
    init_tracing();

    let recorder = RecordingSignals::default();
    let runner = CommandRunner::with_signal_backend(recorder.clone());
    let background = spawn_run(&runner, "sleep 0.3");
    wait_until_running(&runner).await;

    assert!(runner.pause());
    assert!(runner.resume());

    // The fake backend never suspends anything, so the child finishes on
    // its own.
    assert_eq!(background.await.unwrap(), 0);

    let delivered = recorder.delivered.lock().unwrap().clone();
    assert_eq!(
        delivered,
        vec![ControlSignal::Suspend, ControlSignal::Resume]
    );
}
