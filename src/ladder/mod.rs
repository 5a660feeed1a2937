//! The install ladder
//!
//! A dependency is resolved by walking an ordered list of strategies, from
//! least to most risky, until one installs the package *and* the package
//! passes its verification probe:
//! - `prebuilt-binary`: wheels only
//! - `pinned-source@<version>`: one rung per preferred version
//! - `compiled-source`: source-only build with the native toolchain
//! - `split-dependencies`: sub-dependencies one by one, then the package alone

pub mod installer;
pub mod probe;
pub mod strategy;
pub mod toolchain;

pub use installer::DependencyInstaller;
pub use probe::{ImportProbe, VerificationProbe};
pub use strategy::{default_ladder, Strategy, StrategyKind};
pub use toolchain::{SystemToolchain, Toolchain, ToolchainInfo};

use crate::error::{Error, FailureKind};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// What to install and how the caller prefers it installed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageSpec {
    /// Distribution name on the index
    pub name: String,
    /// Versions to try, most preferred first. Never re-sorted.
    pub pinned_versions: Vec<String>,
    /// Whether a wheels-only install may be attempted
    pub allow_binary_only: bool,
    /// Import name for the probe; defaults to `name` with `-` replaced by `_`
    pub module: Option<String>,
    /// Sub-dependencies installed one at a time by `split-dependencies`
    pub dependencies: Vec<String>,
    /// Environment for source builds
    pub build_env: BTreeMap<String, String>,
    /// Extra installer arguments for source builds
    pub build_flags: Vec<String>,
}

impl PackageSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pinned_versions: Vec::new(),
            allow_binary_only: true,
            module: None,
            dependencies: Vec::new(),
            build_env: BTreeMap::new(),
            build_flags: Vec::new(),
        }
    }

    pub fn with_pinned_versions<I, S>(mut self, versions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pinned_versions = versions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_allow_binary_only(mut self, allow: bool) -> Self {
        self.allow_binary_only = allow;
        self
    }

    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    pub fn with_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_build_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.build_env.insert(key.into(), value.into());
        self
    }

    /// Name used to import the package
    pub fn module_name(&self) -> String {
        self.module
            .clone()
            .unwrap_or_else(|| self.name.replace('-', "_"))
    }

    /// Reject import names the probe cannot place in Python source
    pub fn check_module_name(&self) -> Result<(), Error> {
        let module = self.module_name();
        if is_module_name(&module) {
            Ok(())
        } else {
            Err(Error::Config(format!(
                "'{}' is not a valid import name for {}; set --module or `module =`",
                module, self.name
            )))
        }
    }
}

/// Dotted Python identifier such as `fyers_apiv3.fyersModel`
pub fn is_module_name(name: &str) -> bool {
    !name.is_empty()
        && name.split('.').all(|part| {
            let mut chars = part.chars();
            matches!(chars.next(), Some(c) if c == '_' || c.is_alphabetic())
                && chars.all(|c| c == '_' || c.is_alphanumeric())
        })
}

/// Record of one rung of the ladder
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallOutcome {
    pub strategy_name: String,
    pub succeeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
    /// Version reported by the probe on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(serialize_with = "serialize_secs")]
    pub duration: Duration,
}

impl InstallOutcome {
    pub fn success(strategy_name: &str, version: String, duration: Duration) -> Self {
        Self {
            strategy_name: strategy_name.to_string(),
            succeeded: true,
            error_detail: None,
            failure: None,
            version: Some(version).filter(|v| !v.is_empty()),
            duration,
        }
    }

    pub fn failure(
        strategy_name: &str,
        kind: FailureKind,
        detail: impl Into<String>,
        duration: Duration,
    ) -> Self {
        Self {
            strategy_name: strategy_name.to_string(),
            succeeded: false,
            error_detail: Some(detail.into()),
            failure: Some(kind),
            version: None,
            duration,
        }
    }
}

fn serialize_secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

/// Outcome of a whole ladder run; immutable once returned
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallResult {
    pub package: String,
    pub chosen_strategy: Option<String>,
    pub verified: bool,
    pub attempted_strategies: Vec<InstallOutcome>,
}

impl InstallResult {
    /// The successful rung, if any
    pub fn chosen(&self) -> Option<&InstallOutcome> {
        self.attempted_strategies.iter().find(|o| o.succeeded)
    }

    /// Version reported by the probe of the chosen rung
    pub fn version(&self) -> Option<&str> {
        self.chosen().and_then(|o| o.version.as_deref())
    }

    pub fn total_duration(&self) -> Duration {
        self.attempted_strategies.iter().map(|o| o.duration).sum()
    }

    /// Convert an exhausted ladder into the terminal error
    pub fn ensure_verified(&self) -> crate::error::Result<&Self> {
        if self.verified {
            Ok(self)
        } else {
            Err(Error::AllStrategiesExhausted {
                package: self.package.clone(),
                attempts: self.attempted_strategies.len(),
            })
        }
    }

    /// Attempt history as plain text, one rung per line
    pub fn diagnostic(&self) -> String {
        let mut lines = Vec::new();
        for (i, outcome) in self.attempted_strategies.iter().enumerate() {
            let status = if outcome.succeeded { "ok" } else { "failed" };
            let mut line = format!(
                "{}. {} [{}] ({:.1}s)",
                i + 1,
                outcome.strategy_name,
                status,
                outcome.duration.as_secs_f64()
            );
            if let Some(kind) = outcome.failure {
                line.push_str(&format!(" {}", kind));
            }
            if let Some(detail) = &outcome.error_detail {
                for (j, detail_line) in detail.lines().enumerate() {
                    let sep = if j == 0 { ": " } else { "\n     " };
                    line.push_str(sep);
                    line.push_str(detail_line);
                }
            }
            lines.push(line);
        }
        lines.join("\n")
    }
}
