// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `runtick`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "runtick",
    version,
    about = "Run a shell command with progress ticks, pause/resume control and an optional FIFO side channel.",
    long_about = None
)]
pub struct CliArgs {
    /// Shell command to run (passed to `sh -c`).
    pub command: String,

    /// Suppress the diagnostic echo of the command line and exit status.
    #[arg(long)]
    pub quiet: bool,

    /// Tick once per second instead of every 100ms.
    #[arg(long)]
    pub slow_tick: bool,

    /// Estimated duration in deciseconds (progress display only).
    #[arg(long, value_name = "DECISECONDS")]
    pub est: Option<u64>,

    /// Pre-existing FIFO to connect for duplex messaging with the child.
    #[arg(long, value_name = "PATH")]
    pub fifo: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `RUNTICK_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Path to the defaults file (TOML).
    ///
    /// Default: `Runtick.toml` in the current working directory; a missing
    /// default file is silently skipped, an explicitly given one must exist.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
