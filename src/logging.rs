//! Structured logging setup.
//!
//! The library only emits `tracing` events; binaries call [`init`] once.
//! `RUST_LOG` takes precedence over the verbosity passed in.

use crate::error::{Error, Result};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    /// Errors only.
    Quiet,
    /// Warnings, including fallback restarts and skipped objects.
    #[default]
    Normal,
    /// Per-file and per-part progress.
    Verbose,
    /// Per-chunk detail.
    Trace,
}

impl Verbosity {
    /// Map `-v` occurrences and `-q` to a verbosity.
    #[must_use]
    pub fn from_flags(verbose: u8, quiet: bool) -> Self {
        match (quiet, verbose) {
            (true, _) => Self::Quiet,
            (false, 0) => Self::Normal,
            (false, 1) => Self::Verbose,
            (false, _) => Self::Trace,
        }
    }

    /// Filter directive for this verbosity. Dependencies stay at `warn`.
    #[must_use]
    pub fn directive(self) -> &'static str {
        match self {
            Self::Quiet => "error",
            Self::Normal => "warn",
            Self::Verbose => "warn,parquetify=info",
            Self::Trace => "warn,parquetify=trace",
        }
    }
}

/// Install the global subscriber, writing to stderr.
///
/// # Errors
///
/// Returns [`Error::Config`] if a subscriber is already installed.
pub fn init(verbosity: Verbosity) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.directive()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| Error::Config(format!("logging already initialised: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_map_to_verbosity() {
        assert_eq!(Verbosity::from_flags(0, false), Verbosity::Normal);
        assert_eq!(Verbosity::from_flags(1, false), Verbosity::Verbose);
        assert_eq!(Verbosity::from_flags(3, false), Verbosity::Trace);
        assert_eq!(Verbosity::from_flags(2, true), Verbosity::Quiet);
    }
}
