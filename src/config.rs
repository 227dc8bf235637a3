// src/config.rs

//! Optional TOML defaults file for the CLI.
//!
//! `runtick` itself takes every knob as an argument; this module only feeds
//! the binary, so users can keep per-project defaults in a `Runtick.toml`
//! instead of repeating flags:
//!
//! ```toml
//! quiet = false
//! slow_tick = true
//! est_duration = 50
//! fifo = "/tmp/runtick.fifo"
//! ```
//!
//! CLI flags always override file values.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::errors::{Result, RuntickError};

/// Defaults loaded from `Runtick.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunnerDefaults {
    /// Suppress the diagnostic echo of the command line and exit status.
    #[serde(default)]
    pub quiet: bool,

    /// Use the 1000ms tick interval instead of 100ms.
    #[serde(default)]
    pub slow_tick: bool,

    /// Estimated command duration in deciseconds, used for progress display.
    #[serde(default = "default_est_duration")]
    pub est_duration: u64,

    /// Pre-existing FIFO path to connect before running.
    #[serde(default)]
    pub fifo: Option<PathBuf>,
}

fn default_est_duration() -> u64 {
    crate::runner::DEFAULT_EST_DURATION
}

impl Default for RunnerDefaults {
    fn default() -> Self {
        Self {
            quiet: false,
            slow_tick: false,
            est_duration: default_est_duration(),
            fifo: None,
        }
    }
}

/// Load a defaults file from a given path.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RunnerDefaults> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let defaults: RunnerDefaults = toml::from_str(&contents)?;

    Ok(defaults)
}

/// Load a defaults file from path and run basic validation.
///
/// This is the recommended entry point for the CLI:
///
/// - Reads TOML.
/// - Applies defaults (handled by `serde` + `Default` impls).
/// - Checks that `est_duration` is at least 1 decisecond.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<RunnerDefaults> {
    let defaults = load_from_path(&path)?;

    if defaults.est_duration == 0 {
        return Err(RuntickError::ConfigError(
            "est_duration must be >= 1 decisecond (got 0)".to_string(),
        ));
    }

    Ok(defaults)
}

/// Helper to resolve the default config path.
///
/// Currently this just returns `Runtick.toml` in the current working
/// directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Runtick.toml")
}
