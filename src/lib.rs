// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod fifo;
pub mod logging;
pub mod proc;
pub mod runner;
pub mod types;

use std::io::Write as _;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::RunnerDefaults;
use crate::runner::{CommandRunner, RunOptions, RunnerEvent};

pub use crate::runner::{DEFAULT_EST_DURATION, RUN_REJECTED};
pub use crate::types::{ExitKind, TickInterval};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - defaults-file loading (CLI flags win)
/// - the runner and its event stream
/// - the optional FIFO channel
///
/// and returns the reconciled exit code of the command.
pub async fn run(args: CliArgs) -> Result<i32> {
    let defaults = load_defaults(&args)?;

    let options = RunOptions {
        quiet: args.quiet || defaults.quiet,
        slow_tick: args.slow_tick || defaults.slow_tick,
    };
    let est_duration = args.est.unwrap_or(defaults.est_duration);
    let fifo_path = args.fifo.clone().or(defaults.fifo);

    let runner = CommandRunner::new();

    if let Some(path) = fifo_path
        && !runner.connect_fifo(&path)
    {
        warn!(path = ?path, "could not connect fifo; continuing without it");
    }

    let mut events = runner
        .take_events()
        .context("event receiver already taken")?;

    // Event consumer: command output goes to stdout/stderr as it arrives,
    // everything else is log-only.
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                RunnerEvent::Started => debug!("command started"),
                RunnerEvent::OutputAvailable(chunk) => {
                    print!("{chunk}");
                    let _ = std::io::stdout().flush();
                }
                RunnerEvent::ErrorAvailable(chunk) => {
                    eprint!("{chunk}");
                }
                RunnerEvent::RunTime { elapsed, estimated } => {
                    debug!(elapsed, estimated, "tick");
                }
                RunnerEvent::Finished {
                    exit_code,
                    exit_status,
                } => {
                    debug!(exit_code, ?exit_status, "command finished");
                }
                RunnerEvent::FifoChangeAvailable(text) => {
                    info!(%text, "fifo message");
                }
            }
        }
    });

    let code = runner.run(&args.command, options, est_duration).await;

    // Dropping the runner closes the event channel (and any FIFO watcher),
    // which lets the printer drain and finish.
    drop(runner);
    let _ = printer.await;

    Ok(code)
}

/// Resolve CLI defaults: an explicitly given config path must exist, the
/// implicit `Runtick.toml` is skipped silently when absent.
fn load_defaults(args: &CliArgs) -> Result<RunnerDefaults> {
    match &args.config {
        Some(path) => {
            let defaults = config::load_and_validate(path)
                .with_context(|| format!("loading config {}", path.display()))?;
            Ok(defaults)
        }
        None => {
            let path = config::default_config_path();
            if path.exists() {
                let defaults = config::load_and_validate(&path)
                    .with_context(|| format!("loading config {}", path.display()))?;
                Ok(defaults)
            } else {
                Ok(RunnerDefaults::default())
            }
        }
    }
}
