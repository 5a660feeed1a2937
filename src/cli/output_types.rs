//! Output types for CLI commands
//!
//! These types keep JSON output consistent across commands. Each command
//! constructs its output struct and serializes it through `CommandOutput`.

use crate::ladder::{InstallOutcome, InstallResult};
use serde::Serialize;
use std::path::PathBuf;

/// Trait for command outputs that can be serialized to JSON
pub trait CommandOutput: Serialize {
    /// Get the command name
    fn command_name(&self) -> &'static str;

    /// Serialize to pretty-printed JSON string
    fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}

// =============================================================================
// InstallOutput
// =============================================================================

/// Output for `ladder install`
#[derive(Debug, Serialize)]
pub struct InstallOutput {
    pub status: &'static str,
    pub exit_code: i32,
    pub target: PathBuf,
    pub version: Option<String>,
    pub duration_secs: f64,
    #[serde(flatten)]
    pub result: InstallResult,
}

impl InstallOutput {
    pub fn new(result: InstallResult, target: PathBuf, exit_code: i32) -> Self {
        Self {
            status: if result.verified { "success" } else { "exhausted" },
            exit_code,
            target,
            version: result.version().map(str::to_string),
            duration_secs: result.total_duration().as_secs_f64(),
            result,
        }
    }
}

impl CommandOutput for InstallOutput {
    fn command_name(&self) -> &'static str {
        "install"
    }
}

// =============================================================================
// PlanOutput
// =============================================================================

/// One rung as shown by `ladder plan`
#[derive(Debug, Serialize)]
pub struct PlannedRung {
    pub strategy: String,
    pub kind: &'static str,
    pub action: String,
    pub needs_toolchain: bool,
}

/// Output for `ladder plan`
#[derive(Debug, Serialize)]
pub struct PlanOutput {
    pub package: String,
    pub module: String,
    pub target: PathBuf,
    pub timeout_secs: u64,
    pub rungs: Vec<PlannedRung>,
}

impl CommandOutput for PlanOutput {
    fn command_name(&self) -> &'static str {
        "plan"
    }
}

// =============================================================================
// VerifyOutput
// =============================================================================

/// Output for `ladder verify`
#[derive(Debug, Serialize)]
pub struct VerifyOutput {
    pub package: String,
    pub module: String,
    pub verified: bool,
    pub version: Option<String>,
    pub error: Option<String>,
    /// Version recorded in the target's dist-info, if any
    pub installed_version: Option<String>,
}

impl CommandOutput for VerifyOutput {
    fn command_name(&self) -> &'static str {
        "verify"
    }
}

// =============================================================================
// DoctorOutput
// =============================================================================

/// One diagnostic check
#[derive(Debug, Serialize)]
pub struct DoctorCheck {
    pub name: String,
    pub status: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

/// Output for `ladder doctor`
#[derive(Debug, Serialize)]
pub struct DoctorOutput {
    pub ready: bool,
    pub passed: usize,
    pub warnings: usize,
    pub failed: usize,
    pub checks: Vec<DoctorCheck>,
}

impl CommandOutput for DoctorOutput {
    fn command_name(&self) -> &'static str {
        "doctor"
    }
}

/// Single-line summary of a rung for human output
pub fn outcome_line(outcome: &InstallOutcome) -> String {
    match (&outcome.error_detail, &outcome.version) {
        (Some(detail), _) => {
            let first = detail.lines().next().unwrap_or_default();
            format!("{} ({})", outcome.strategy_name, first)
        }
        (None, Some(version)) => format!("{} ({})", outcome.strategy_name, version),
        (None, None) => outcome.strategy_name.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use std::time::Duration;

    fn exhausted() -> InstallResult {
        InstallResult {
            package: "aiohttp".to_string(),
            chosen_strategy: None,
            verified: false,
            attempted_strategies: vec![InstallOutcome::failure(
                "prebuilt-binary",
                FailureKind::StrategyFailed,
                "no compatible distribution: none\nsecond line",
                Duration::from_secs(2),
            )],
        }
    }

    #[test]
    fn test_install_output_json_is_flat() {
        let output = InstallOutput::new(exhausted(), PathBuf::from("/srv/venv"), 1);
        let json: serde_json::Value = serde_json::from_str(&output.to_json()).unwrap();
        assert_eq!(json["status"], "exhausted");
        assert_eq!(json["exit_code"], 1);
        assert_eq!(json["package"], "aiohttp");
        assert_eq!(json["verified"], false);
        assert!(json["chosen_strategy"].is_null());
        assert_eq!(json["attempted_strategies"].as_array().unwrap().len(), 1);
        assert_eq!(json["duration_secs"], 2.0);
    }

    #[test]
    fn test_outcome_line_uses_first_detail_line() {
        let result = exhausted();
        assert_eq!(
            outcome_line(&result.attempted_strategies[0]),
            "prebuilt-binary (no compatible distribution: none)"
        );
        let ok = InstallOutcome::success("pinned-source@1.9", "1.9".to_string(), Duration::ZERO);
        assert_eq!(outcome_line(&ok), "pinned-source@1.9 (1.9)");
    }
}
