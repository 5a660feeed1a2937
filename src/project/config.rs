//! ladder.toml configuration file parsing and validation
//!
//! Handles loading, parsing, and validating project configuration from `ladder.toml`.
//! All fields have sensible defaults, so an empty config file works.
//!
//! ```toml
//! [target]
//! path = "venv"
//!
//! [settings]
//! timeout_secs = 900
//! retry_network = true
//!
//! [packages.aiohttp]
//! pinned_versions = ["3.9.1", "3.8.6"]
//! dependencies = ["multidict", "yarl", "frozenlist", "aiosignal", "async-timeout"]
//! build_env = { AIOHTTP_NO_EXTENSIONS = "1" }
//! ```

use crate::error::{Error, Result};
use crate::ladder::strategy::{build_ladder, Strategy, StrategyKind};
use crate::ladder::{is_module_name, PackageSpec};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::root::CONFIG_FILE_NAME;

/// Project configuration loaded from ladder.toml
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Where packages get installed
    pub target: TargetSection,
    /// Ladder behaviour shared by all packages
    pub settings: SettingsSection,
    /// Per-package ladder configuration
    pub packages: BTreeMap<String, PackageConfig>,
}

/// Install target settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct TargetSection {
    /// Virtual environment or package directory (relative to project root)
    pub path: PathBuf,
    /// Install with `pip --target` into a bare directory instead of a venv
    pub site_dir: bool,
    /// Custom package index
    pub index_url: Option<String>,
}

impl Default for TargetSection {
    fn default() -> Self {
        Self {
            path: PathBuf::from(".venv"),
            site_dir: false,
            index_url: None,
        }
    }
}

/// Ladder settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SettingsSection {
    /// Hard bound on each strategy attempt, in seconds
    pub timeout_secs: u64,
    /// Retry a rung once after a transient network error
    pub retry_network: bool,
}

impl Default for SettingsSection {
    fn default() -> Self {
        Self {
            timeout_secs: 900,
            retry_network: false,
        }
    }
}

/// One `[packages.<name>]` table
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct PackageConfig {
    /// Versions to try, most preferred first
    pub pinned_versions: Vec<String>,
    /// Allow the wheels-only rung
    pub allow_binary_only: bool,
    /// Import name, if different from the distribution name
    pub module: Option<String>,
    /// Statement run after import as an extra sanity check
    pub check: Option<String>,
    /// Sub-dependencies for split-dependencies
    pub dependencies: Vec<String>,
    /// Environment for source builds
    pub build_env: BTreeMap<String, String>,
    /// Extra pip arguments for source builds
    pub build_flags: Vec<String>,
    /// Explicit strategy order (tags); default order when absent
    pub strategies: Option<Vec<String>>,
    /// Per-package override of settings.timeout_secs
    pub timeout_secs: Option<u64>,
}

impl Default for PackageConfig {
    fn default() -> Self {
        Self {
            pinned_versions: Vec::new(),
            allow_binary_only: true,
            module: None,
            check: None,
            dependencies: Vec::new(),
            build_env: BTreeMap::new(),
            build_flags: Vec::new(),
            strategies: None,
            timeout_secs: None,
        }
    }
}

impl PackageConfig {
    /// Build the package spec the installer consumes
    pub fn to_spec(&self, name: &str) -> PackageSpec {
        PackageSpec {
            name: name.to_string(),
            pinned_versions: self.pinned_versions.clone(),
            allow_binary_only: self.allow_binary_only,
            module: self.module.clone(),
            dependencies: self.dependencies.clone(),
            build_env: self.build_env.clone(),
            build_flags: self.build_flags.clone(),
        }
    }

    /// Strategy tags in configured order
    pub fn strategy_order(&self) -> Result<Vec<StrategyKind>> {
        match &self.strategies {
            None => Ok(StrategyKind::DEFAULT_ORDER.to_vec()),
            Some(tags) => tags
                .iter()
                .map(|t| t.parse::<StrategyKind>().map_err(Error::Config))
                .collect(),
        }
    }

    /// Concrete ladder for this package
    pub fn ladder(&self, name: &str) -> Result<Vec<Strategy>> {
        Ok(build_ladder(&self.to_spec(name), &self.strategy_order()?))
    }
}

impl Config {
    /// Per-strategy timeout for a package
    pub fn timeout_for(&self, package: &str) -> Duration {
        let secs = self
            .packages
            .get(package)
            .and_then(|p| p.timeout_secs)
            .unwrap_or(self.settings.timeout_secs);
        Duration::from_secs(secs)
    }

    /// Package config, or defaults for packages not listed in ladder.toml
    pub fn package(&self, name: &str) -> PackageConfig {
        self.packages.get(name).cloned().unwrap_or_default()
    }

    /// Check invariants serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.settings.timeout_secs == 0 {
            return Err(Error::Config(
                "settings.timeout_secs must be greater than zero".to_string(),
            ));
        }

        for (name, package) in &self.packages {
            if package.timeout_secs == Some(0) {
                return Err(Error::Config(format!(
                    "packages.{}.timeout_secs must be greater than zero",
                    name
                )));
            }
            if let Some(module) = &package.module {
                if !is_module_name(module) {
                    return Err(Error::Config(format!(
                        "packages.{}.module '{}' is not a dotted Python identifier",
                        name, module
                    )));
                }
            }
            package.strategy_order().map_err(|e| match e {
                Error::Config(msg) => Error::Config(format!("packages.{}: {}", name, msg)),
                other => other,
            })?;

            let mut seen = Vec::new();
            for version in &package.pinned_versions {
                if version.trim().is_empty() {
                    return Err(Error::Config(format!(
                        "packages.{}.pinned_versions contains an empty version",
                        name
                    )));
                }
                if seen.contains(&version) {
                    return Err(Error::Config(format!(
                        "packages.{}.pinned_versions lists {} twice",
                        name, version
                    )));
                }
                seen.push(version);
            }
        }

        Ok(())
    }
}

/// Parse and validate configuration text
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", CONFIG_FILE_NAME, e)))?;
    config.validate()?;
    Ok(config)
}

/// Load configuration from `<project_root>/ladder.toml`
///
/// Returns `None` if the file doesn't exist.
pub fn load_config(project_root: &Path) -> Result<Option<Config>> {
    let path = project_root.join(CONFIG_FILE_NAME);
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(&path).map_err(|e| {
        Error::Config(format!("Failed to read {}: {}", path.display(), e))
    })?;
    parse_config(&content).map(Some)
}
