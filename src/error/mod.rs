pub mod mapper;

use serde::Serialize;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Execution failed: {0}")]
    Execution(String),

    #[error("Install target {path} is locked by another ladder run (pid {holder})")]
    TargetBusy { path: String, holder: String },

    #[error("All {attempts} install strategies exhausted for {package}")]
    AllStrategiesExhausted { package: String, attempts: usize },

    /// Ctrl-C or SIGTERM; the running command was told to stop first
    #[error("Interrupted")]
    Interrupted,

    /// `verify` or `doctor` found a problem; details were already printed
    #[error("{0}")]
    CheckFailed(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Why a single rung of the ladder did not produce a verified install.
///
/// Every variant except `AllStrategiesExhausted` is recoverable: the ladder
/// records it and moves on to the next strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The install action itself failed (non-zero exit, timeout, no distribution)
    StrategyFailed,
    /// The install action succeeded but the package does not load
    ProbeFailed,
    /// No compiler or headers for a source build
    ToolchainUnavailable,
    /// Nothing left to try
    AllStrategiesExhausted,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::StrategyFailed => "strategy_failed",
            FailureKind::ProbeFailed => "probe_failed",
            FailureKind::ToolchainUnavailable => "toolchain_unavailable",
            FailureKind::AllStrategiesExhausted => "all_strategies_exhausted",
        }
    }

    /// Terminal kinds end the ladder; the rest trigger the next fallback
    pub fn is_terminal(&self) -> bool {
        matches!(self, FailureKind::AllStrategiesExhausted)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
