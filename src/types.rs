use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

/// How the child process reached its terminal state.
///
/// - `Normal`: the process exited on its own and reported an exit code.
/// - `Crashed`: the process was killed by a signal (or otherwise terminated
///   abnormally). A crashed process can still report a misleading exit code
///   of 0, which is why the runner prefers the status over the code when
///   reconciling the final result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitKind {
    Normal,
    Crashed,
}

impl ExitKind {
    /// Numeric status value carried in `Finished` events and preferred over
    /// the exit code when the process ended abnormally.
    pub fn status_value(self) -> i32 {
        match self {
            ExitKind::Normal => 0,
            ExitKind::Crashed => 1,
        }
    }
}

/// Final exit code reported by a completed run: a crashed/signaled process
/// reports its status value in preference to a possibly-misleading exit
/// code.
pub fn reconcile_exit_code(exit_code: i32, exit_status: ExitKind) -> i32 {
    if exit_status != ExitKind::Normal {
        exit_status.status_value()
    } else {
        exit_code
    }
}

/// Progress tick interval.
///
/// `Fast` is the default 100ms tick; `Slow` is the 1000ms tick selected by
/// the `slow_tick` run option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TickInterval {
    Fast,
    Slow,
}

impl TickInterval {
    pub fn duration(self) -> Duration {
        match self {
            TickInterval::Fast => Duration::from_millis(100),
            TickInterval::Slow => Duration::from_millis(1000),
        }
    }
}

impl Default for TickInterval {
    fn default() -> Self {
        TickInterval::Fast
    }
}

impl FromStr for TickInterval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fast" => Ok(TickInterval::Fast),
            "slow" => Ok(TickInterval::Slow),
            other => Err(format!(
                "invalid tick interval: {other} (expected \"fast\" or \"slow\")"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_interval_durations() {
        assert_eq!(TickInterval::Fast.duration(), Duration::from_millis(100));
        assert_eq!(TickInterval::Slow.duration(), Duration::from_millis(1000));
    }

    #[test]
    fn tick_interval_from_str() {
        assert_eq!("fast".parse::<TickInterval>().unwrap(), TickInterval::Fast);
        assert_eq!(" Slow ".parse::<TickInterval>().unwrap(), TickInterval::Slow);
        assert!("quick".parse::<TickInterval>().is_err());
    }

    #[test]
    fn crashed_status_value_is_nonzero() {
        assert_eq!(ExitKind::Normal.status_value(), 0);
        assert_eq!(ExitKind::Crashed.status_value(), 1);
    }

    #[test]
    fn normal_exit_reports_the_code() {
        assert_eq!(reconcile_exit_code(0, ExitKind::Normal), 0);
        assert_eq!(reconcile_exit_code(7, ExitKind::Normal), 7);
    }

    #[test]
    fn crashed_exit_prefers_the_status() {
        // A crashed process can still report code 0; the status wins.
        assert_eq!(reconcile_exit_code(0, ExitKind::Crashed), 1);
        assert_eq!(reconcile_exit_code(-1, ExitKind::Crashed), 1);
    }
}
