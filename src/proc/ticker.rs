// src/proc/ticker.rs

//! Periodic progress tick.

use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::proc::ChildEvent;
use crate::types::TickInterval;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TickerState {
    Running,
    Paused,
    Stopped,
}

/// Periodic timer emitting [`ChildEvent::Tick`] into the runner loop while
/// the child process is active.
///
/// The ticker itself carries no counter; the runner loop owns the elapsed
/// count, which is why pause/resume cannot reset it. Dropping the `Ticker`
/// stops the background task, so the timer can never outlive the run that
/// started it.
#[derive(Debug)]
pub struct Ticker {
    ctrl: watch::Sender<TickerState>,
}

impl Ticker {
    /// Spawn the ticker task at the given interval.
    ///
    /// The first tick fires one full interval after start, not immediately.
    pub fn spawn(interval: TickInterval, tx: mpsc::Sender<ChildEvent>) -> Self {
        let (ctrl, mut state_rx) = watch::channel(TickerState::Running);

        tokio::spawn(async move {
            let period = interval.duration();
            let mut timer = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                let state = *state_rx.borrow();
                if state == TickerState::Stopped {
                    break;
                }

                tokio::select! {
                    _ = timer.tick() => {
                        if state == TickerState::Running
                            && tx.send(ChildEvent::Tick).await.is_err()
                        {
                            break;
                        }
                    }
                    changed = state_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
            debug!("ticker task finished");
        });

        Self { ctrl }
    }

    /// Stop tick emission without tearing the task down.
    pub fn pause(&self) {
        let _ = self.ctrl.send(TickerState::Paused);
    }

    /// Resume tick emission after a pause.
    pub fn resume(&self) {
        let _ = self.ctrl.send(TickerState::Running);
    }

    /// Permanently stop the ticker. Wired to the process-terminal event in
    /// the runner loop so ticks cease the instant the child exits.
    pub fn stop(&self) {
        let _ = self.ctrl.send(TickerState::Stopped);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn recv_tick(rx: &mut mpsc::Receiver<ChildEvent>, within: Duration) -> bool {
        matches!(
            tokio::time::timeout(within, rx.recv()).await,
            Ok(Some(ChildEvent::Tick))
        )
    }

    #[tokio::test]
    async fn ticks_arrive_while_running() {
        let (tx, mut rx) = mpsc::channel(8);
        let ticker = Ticker::spawn(TickInterval::Fast, tx);

        assert!(recv_tick(&mut rx, Duration::from_millis(500)).await);
        assert!(recv_tick(&mut rx, Duration::from_millis(500)).await);

        ticker.stop();
    }

    #[tokio::test]
    async fn pause_stops_emission_and_resume_restarts_it() {
        let (tx, mut rx) = mpsc::channel(8);
        let ticker = Ticker::spawn(TickInterval::Fast, tx);

        assert!(recv_tick(&mut rx, Duration::from_millis(500)).await);

        ticker.pause();
        // Drain anything already in flight, then expect silence.
        while rx.try_recv().is_ok() {}
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(rx.try_recv().is_err());

        ticker.resume();
        assert!(recv_tick(&mut rx, Duration::from_millis(500)).await);

        ticker.stop();
    }

    #[tokio::test]
    async fn stop_ends_the_task() {
        let (tx, mut rx) = mpsc::channel(8);
        let ticker = Ticker::spawn(TickInterval::Fast, tx);
        ticker.stop();

        // Once the task breaks, its sender is dropped and the channel closes.
        loop {
            match tokio::time::timeout(Duration::from_secs(1), rx.recv()).await {
                Ok(Some(ChildEvent::Tick)) => continue,
                Ok(None) => break,
                other => panic!("expected channel close, got {other:?}"),
            }
        }
    }
}
