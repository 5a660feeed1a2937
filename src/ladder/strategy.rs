//! Install strategies
//!
//! Each strategy is a tagged variant with one install action. The ladder
//! dispatches on the tag; the collaborators (repository, toolchain) are what
//! varies between environments and tests.

use crate::ladder::toolchain::Toolchain;
use crate::ladder::PackageSpec;
use crate::packages::repository::{BuildMode, InstallRequest, PackageRepository, RepoError};
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Capability tag of a strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    PrebuiltBinary,
    PinnedSource,
    CompiledSource,
    SplitDependencies,
}

impl StrategyKind {
    /// Least risky first
    pub const DEFAULT_ORDER: [StrategyKind; 4] = [
        StrategyKind::PrebuiltBinary,
        StrategyKind::PinnedSource,
        StrategyKind::CompiledSource,
        StrategyKind::SplitDependencies,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::PrebuiltBinary => "prebuilt-binary",
            StrategyKind::PinnedSource => "pinned-source",
            StrategyKind::CompiledSource => "compiled-source",
            StrategyKind::SplitDependencies => "split-dependencies",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "prebuilt-binary" | "binary" | "wheel" => Ok(StrategyKind::PrebuiltBinary),
            "pinned-source" | "pinned" => Ok(StrategyKind::PinnedSource),
            "compiled-source" | "source" | "compile" => Ok(StrategyKind::CompiledSource),
            "split-dependencies" | "split" => Ok(StrategyKind::SplitDependencies),
            other => Err(format!(
                "unknown strategy '{}' (expected prebuilt-binary, pinned-source, compiled-source or split-dependencies)",
                other
            )),
        }
    }
}

/// One rung of the ladder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    /// Wheels only; never touches the compiler
    PrebuiltBinary,
    /// One preferred version, any distribution type
    PinnedSource { version: String },
    /// Source-only build after checking the toolchain
    CompiledSource,
    /// Install sub-dependencies individually, then the package without its deps
    SplitDependencies,
}

/// Why a rung's install action failed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StrategyError {
    #[error("{0}")]
    Install(#[from] RepoError),

    #[error("toolchain unavailable: {0}")]
    ToolchainUnavailable(String),

    /// The rung has nothing to do for this package
    #[error("not applicable: {0}")]
    NotApplicable(String),
}

/// Everything a strategy may touch while it runs
pub struct StrategyContext<'a> {
    pub repository: &'a dyn PackageRepository,
    pub toolchain: &'a dyn Toolchain,
    /// Hard deadline for the whole rung
    pub deadline: Instant,
    /// Reinstall even when already satisfied
    pub force: bool,
    /// Retry one transient network failure within the rung
    pub retry_network: bool,
}

impl StrategyContext<'_> {
    fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Run one install action within what is left of the rung's time budget
    fn install(&self, request: &InstallRequest) -> Result<(), RepoError> {
        let remaining = self.remaining();
        if remaining.is_zero() {
            return Err(RepoError::TimedOut(Duration::ZERO));
        }

        tracing::debug!(
            requirement = %request.requirement,
            mode = %request.mode,
            remaining_secs = remaining.as_secs(),
            "install action"
        );
        match self.repository.install(request, remaining) {
            Err(err) if err.is_transient() && self.retry_network => {
                let remaining = self.remaining();
                if remaining.is_zero() {
                    return Err(err);
                }
                tracing::info!(requirement = %request.requirement, error = %err, "retrying after network error");
                self.repository.install(request, remaining)
            }
            other => other,
        }
    }
}

impl Strategy {
    pub fn kind(&self) -> StrategyKind {
        match self {
            Strategy::PrebuiltBinary => StrategyKind::PrebuiltBinary,
            Strategy::PinnedSource { .. } => StrategyKind::PinnedSource,
            Strategy::CompiledSource => StrategyKind::CompiledSource,
            Strategy::SplitDependencies => StrategyKind::SplitDependencies,
        }
    }

    /// Name recorded in the attempt history, e.g. `pinned-source@1.9`
    pub fn name(&self) -> String {
        match self {
            Strategy::PinnedSource { version } => format!("pinned-source@{}", version),
            other => other.kind().as_str().to_string(),
        }
    }

    /// Whether this rung needs the native compiler toolchain
    pub fn needs_toolchain(&self) -> bool {
        matches!(self, Strategy::CompiledSource)
    }

    /// Short description of what the rung will run, for `ladder plan`
    pub fn describe(&self, spec: &PackageSpec) -> String {
        match self {
            Strategy::PrebuiltBinary => format!("install {} from wheels only", spec.name),
            Strategy::PinnedSource { version } => format!("install {}=={}", spec.name, version),
            Strategy::CompiledSource => {
                format!("check compiler and headers, build {} from source", requirement(spec))
            }
            Strategy::SplitDependencies if spec.dependencies.is_empty() => {
                "skipped: no sub-dependencies configured".to_string()
            }
            Strategy::SplitDependencies => format!(
                "install {} one by one, then {} --no-deps",
                spec.dependencies.join(", "),
                requirement(spec)
            ),
        }
    }

    /// Execute the install action. Verification is the installer's job.
    pub fn run(&self, spec: &PackageSpec, ctx: &StrategyContext<'_>) -> Result<(), StrategyError> {
        match self {
            Strategy::PrebuiltBinary => {
                let request = InstallRequest::new(&spec.name, spec.name.clone(), BuildMode::BinaryOnly)
                    .with_force_reinstall(ctx.force);
                ctx.install(&request)?;
            }
            Strategy::PinnedSource { version } => {
                let request = InstallRequest::new(
                    &spec.name,
                    format!("{}=={}", spec.name, version),
                    BuildMode::Any,
                )
                .with_force_reinstall(ctx.force);
                ctx.install(&request)?;
            }
            Strategy::CompiledSource => {
                let info = ctx
                    .toolchain
                    .check()
                    .map_err(StrategyError::ToolchainUnavailable)?;
                tracing::debug!(compiler = %info.compiler.display(), "toolchain available");

                // Source distributions only; an existing install is kept unless forced
                let request = InstallRequest::new(&spec.name, requirement(spec), BuildMode::SourceOnly)
                    .with_force_reinstall(ctx.force)
                    .with_extra_args(&spec.build_flags)
                    .with_env(&spec.build_env);
                ctx.install(&request)?;
            }
            Strategy::SplitDependencies => {
                if spec.dependencies.is_empty() {
                    return Err(StrategyError::NotApplicable(
                        "no sub-dependencies configured".to_string(),
                    ));
                }

                let mut dep_failures = Vec::new();
                for dep in &spec.dependencies {
                    let request = InstallRequest::new(dep, dep.clone(), BuildMode::PreferBinary)
                        .with_force_reinstall(ctx.force)
                        .with_env(&spec.build_env);
                    if let Err(err) = ctx.install(&request) {
                        // Timeouts end the rung; other failures may still leave a usable set
                        if matches!(err, RepoError::TimedOut(_)) {
                            return Err(err.into());
                        }
                        tracing::info!(dependency = %dep, error = %err, "sub-dependency failed");
                        dep_failures.push(format!("{}: {}", dep, err));
                    }
                }

                let request = InstallRequest::new(&spec.name, requirement(spec), BuildMode::Any)
                    .with_no_deps(true)
                    .with_force_reinstall(ctx.force)
                    .with_env(&spec.build_env);
                if let Err(err) = ctx.install(&request) {
                    if dep_failures.is_empty() {
                        return Err(err.into());
                    }
                    let exit_code = match &err {
                        RepoError::Failed { exit_code, .. } => *exit_code,
                        _ => 1,
                    };
                    return Err(StrategyError::Install(RepoError::Failed {
                        exit_code,
                        detail: format!("{}; sub-dependencies failed: {}", err, dep_failures.join("; ")),
                    }));
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Requirement used by rungs that are not tied to one version: the caller's
/// most preferred pin if there is one, otherwise whatever the index resolves
fn requirement(spec: &PackageSpec) -> String {
    match spec.pinned_versions.first() {
        Some(version) => format!("{}=={}", spec.name, version),
        None => spec.name.clone(),
    }
}

/// Expand an order of strategy tags into concrete rungs for one package
///
/// - `pinned-source` becomes one rung per pinned version, in the caller's
///   order, and disappears when there are no pins
/// - `prebuilt-binary` is dropped when the package does not allow wheels-only installs
/// - a tag listed twice only contributes its rungs once
pub fn build_ladder(spec: &PackageSpec, order: &[StrategyKind]) -> Vec<Strategy> {
    let mut ladder = Vec::new();
    let mut seen = Vec::new();

    for kind in order {
        if seen.contains(kind) {
            continue;
        }
        seen.push(*kind);

        match kind {
            StrategyKind::PrebuiltBinary if spec.allow_binary_only => {
                ladder.push(Strategy::PrebuiltBinary)
            }
            StrategyKind::PrebuiltBinary => {}
            StrategyKind::PinnedSource => ladder.extend(
                spec.pinned_versions
                    .iter()
                    .map(|v| Strategy::PinnedSource { version: v.clone() }),
            ),
            StrategyKind::CompiledSource => ladder.push(Strategy::CompiledSource),
            StrategyKind::SplitDependencies => ladder.push(Strategy::SplitDependencies),
        }
    }

    ladder
}

/// prebuilt-binary → pinned-source per version → compiled-source → split-dependencies
pub fn default_ladder(spec: &PackageSpec) -> Vec<Strategy> {
    build_ladder(spec, &StrategyKind::DEFAULT_ORDER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ladder_expands_pins_in_caller_order() {
        let spec = PackageSpec::new("aiohttp").with_pinned_versions(["3.9.1", "3.8.6"]);
        let names: Vec<String> = default_ladder(&spec).iter().map(Strategy::name).collect();
        assert_eq!(
            names,
            vec![
                "prebuilt-binary",
                "pinned-source@3.9.1",
                "pinned-source@3.8.6",
                "compiled-source",
                "split-dependencies",
            ]
        );
    }

    #[test]
    fn test_binary_only_disallowed_drops_first_rung() {
        let spec = PackageSpec::new("aiohttp").with_allow_binary_only(false);
        let ladder = default_ladder(&spec);
        assert_eq!(ladder[0], Strategy::CompiledSource);
        assert!(!ladder.contains(&Strategy::PrebuiltBinary));
    }

    #[test]
    fn test_custom_order_and_duplicates() {
        let spec = PackageSpec::new("x").with_pinned_versions(["2.0"]);
        let ladder = build_ladder(
            &spec,
            &[
                StrategyKind::CompiledSource,
                StrategyKind::PinnedSource,
                StrategyKind::CompiledSource,
            ],
        );
        assert_eq!(
            ladder,
            vec![
                Strategy::CompiledSource,
                Strategy::PinnedSource {
                    version: "2.0".to_string()
                }
            ]
        );
    }

    #[test]
    fn test_parse_kinds() {
        assert_eq!("prebuilt-binary".parse::<StrategyKind>(), Ok(StrategyKind::PrebuiltBinary));
        assert_eq!("Pinned_Source".parse::<StrategyKind>(), Ok(StrategyKind::PinnedSource));
        assert_eq!("split".parse::<StrategyKind>(), Ok(StrategyKind::SplitDependencies));
        assert!("conda".parse::<StrategyKind>().is_err());
    }

    #[test]
    fn test_only_compiled_source_needs_toolchain() {
        assert!(Strategy::CompiledSource.needs_toolchain());
        assert!(!Strategy::PrebuiltBinary.needs_toolchain());
        assert!(!Strategy::SplitDependencies.needs_toolchain());
    }

    #[test]
    fn test_describe_uses_first_pin_for_source_build() {
        let spec = PackageSpec::new("aiohttp")
            .with_pinned_versions(["3.8.6"])
            .with_dependencies(["multidict", "yarl"]);
        assert!(Strategy::CompiledSource
            .describe(&spec)
            .contains("aiohttp==3.8.6"));
        assert_eq!(
            Strategy::SplitDependencies.describe(&spec),
            "install multidict, yarl one by one, then aiohttp==3.8.6 --no-deps"
        );
    }
}
