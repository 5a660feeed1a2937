//! Package repository collaborator
//!
//! The ladder treats the package index plus installer as a black box that
//! either installs a requirement or explains, in coarse categories, why it
//! could not.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Which kinds of distribution the installer may use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildMode {
    /// Wheels only, never build (`--only-binary=:all:`)
    BinaryOnly,
    /// Prefer an older wheel over a newer sdist (`--prefer-binary`)
    PreferBinary,
    /// Installer default
    Any,
    /// Always build this package from its sdist (`--no-binary <name>`)
    SourceOnly,
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BuildMode::BinaryOnly => "binary-only",
            BuildMode::PreferBinary => "prefer-binary",
            BuildMode::Any => "any",
            BuildMode::SourceOnly => "source-only",
        };
        f.write_str(s)
    }
}

/// One install action against the repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallRequest {
    /// Distribution name, used for `--no-binary`
    pub package: String,
    /// Requirement string, e.g. `aiohttp` or `aiohttp==3.8.6`
    pub requirement: String,
    pub mode: BuildMode,
    /// Install only this distribution, not its dependencies
    pub no_deps: bool,
    /// Reinstall even if the requirement is already satisfied
    pub force_reinstall: bool,
    /// Extra installer arguments (build flags)
    pub extra_args: Vec<String>,
    /// Extra environment for the installer process (build environment)
    pub env: Vec<(String, String)>,
}

impl InstallRequest {
    pub fn new(package: &str, requirement: impl Into<String>, mode: BuildMode) -> Self {
        Self {
            package: package.to_string(),
            requirement: requirement.into(),
            mode,
            no_deps: false,
            force_reinstall: false,
            extra_args: Vec::new(),
            env: Vec::new(),
        }
    }

    pub fn with_no_deps(mut self, no_deps: bool) -> Self {
        self.no_deps = no_deps;
        self
    }

    pub fn with_force_reinstall(mut self, force: bool) -> Self {
        self.force_reinstall = force;
        self
    }

    pub fn with_extra_args(mut self, args: &[String]) -> Self {
        self.extra_args.extend(args.iter().cloned());
        self
    }

    pub fn with_env<'a, I>(mut self, env: I) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        self.env
            .extend(env.into_iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }
}

/// Why an install action failed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepoError {
    /// The index has nothing installable for this platform/interpreter
    #[error("no compatible distribution: {0}")]
    NoCompatibleDistribution(String),

    /// Transient network or index error
    #[error("network error: {0}")]
    Network(String),

    /// The installer ran and failed (build error, resolver conflict, ...)
    #[error("installer exited with code {exit_code}: {detail}")]
    Failed { exit_code: i32, detail: String },

    /// The installer exceeded the strategy's time bound and was killed
    #[error("timed out after {}s", .0.as_secs())]
    TimedOut(Duration),

    /// The installer could not be started at all
    #[error("could not start installer: {0}")]
    Spawn(String),
}

impl RepoError {
    /// Worth one more try within the same strategy
    pub fn is_transient(&self) -> bool {
        matches!(self, RepoError::Network(_))
    }
}

/// The package index plus installer, as seen by the ladder
pub trait PackageRepository {
    /// Run one install action, bounded by `timeout`
    fn install(&self, request: &InstallRequest, timeout: Duration) -> Result<(), RepoError>;

    /// Human-readable description for diagnostics
    fn describe(&self) -> String {
        "package repository".to_string()
    }
}
