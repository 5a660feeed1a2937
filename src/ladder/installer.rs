//! DependencyInstaller: walks the ladder
//!
//! Strategies run strictly in sequence because each one mutates the same
//! install target. A rung counts only if its install action succeeds *and*
//! the verification probe passes afterwards; a package that installs but
//! cannot be imported is recorded exactly like an install failure.

use crate::error::FailureKind;
use crate::executor::runner::interrupted;
use crate::ladder::probe::VerificationProbe;
use crate::ladder::strategy::{Strategy, StrategyContext, StrategyError};
use crate::ladder::toolchain::Toolchain;
use crate::ladder::{InstallOutcome, InstallResult, PackageSpec};
use crate::packages::repository::{PackageRepository, RepoError};
use std::time::{Duration, Instant};

/// Default hard bound on one strategy attempt
pub const DEFAULT_STRATEGY_TIMEOUT: Duration = Duration::from_secs(900);

/// Bound on a single verification probe, separate from the install budget
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(60);

/// Hooks for reporting ladder progress (spinners, status lines)
pub trait LadderObserver {
    fn attempt_started(&self, _strategy: &Strategy, _index: usize, _total: usize) {}
    fn attempt_finished(&self, _outcome: &InstallOutcome) {}
}

/// Resolves one package by trying strategies until one installs and verifies
pub struct DependencyInstaller<'a> {
    repository: &'a dyn PackageRepository,
    toolchain: &'a dyn Toolchain,
    probe: &'a dyn VerificationProbe,
    timeout: Duration,
    probe_timeout: Duration,
    force: bool,
    retry_network: bool,
    observer: Option<&'a dyn LadderObserver>,
}

impl<'a> DependencyInstaller<'a> {
    pub fn new(
        repository: &'a dyn PackageRepository,
        toolchain: &'a dyn Toolchain,
        probe: &'a dyn VerificationProbe,
    ) -> Self {
        Self {
            repository,
            toolchain,
            probe,
            timeout: DEFAULT_STRATEGY_TIMEOUT,
            probe_timeout: PROBE_TIMEOUT,
            force: false,
            retry_network: false,
            observer: None,
        }
    }

    /// Hard bound on each strategy attempt
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Reinstall even when the package is already present
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Retry a rung once when its install action hits a transient network error
    pub fn with_retry_network(mut self, retry: bool) -> Self {
        self.retry_network = retry;
        self
    }

    pub fn with_observer(mut self, observer: &'a dyn LadderObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Walk `ladder` for `spec` and return the full attempt history
    ///
    /// Never fails: an exhausted ladder is a normal result with
    /// `verified == false`, and the caller decides whether it is fatal
    /// (see [`InstallResult::ensure_verified`]).
    pub fn install(&self, spec: &PackageSpec, ladder: &[Strategy]) -> InstallResult {
        let mut attempts = Vec::with_capacity(ladder.len());
        let mut chosen = None;

        tracing::info!(
            package = %spec.name,
            rungs = ladder.len(),
            repository = %self.repository.describe(),
            "starting install ladder"
        );

        for (index, strategy) in ladder.iter().enumerate() {
            if interrupted() {
                tracing::warn!(package = %spec.name, "interrupted, not trying further strategies");
                break;
            }
            if let Some(observer) = self.observer {
                observer.attempt_started(strategy, index, ladder.len());
            }

            let outcome = self.attempt(spec, strategy);

            if let Some(observer) = self.observer {
                observer.attempt_finished(&outcome);
            }

            let succeeded = outcome.succeeded;
            attempts.push(outcome);
            if succeeded {
                chosen = Some(strategy.name());
                break;
            }
        }

        let verified = chosen.is_some();
        if !verified && !interrupted() {
            tracing::error!(
                package = %spec.name,
                attempts = attempts.len(),
                failure = %FailureKind::AllStrategiesExhausted,
                "no strategy produced a working install"
            );
        }

        InstallResult {
            package: spec.name.clone(),
            chosen_strategy: chosen,
            verified,
            attempted_strategies: attempts,
        }
    }

    /// One rung: install action, then probe
    fn attempt(&self, spec: &PackageSpec, strategy: &Strategy) -> InstallOutcome {
        let name = strategy.name();
        let start = Instant::now();

        let ctx = StrategyContext {
            repository: self.repository,
            toolchain: self.toolchain,
            deadline: start + self.timeout,
            force: self.force,
            retry_network: self.retry_network,
        };

        tracing::debug!(package = %spec.name, strategy = %name, "attempting strategy");

        if let Err(err) = strategy.run(spec, &ctx) {
            let elapsed = start.elapsed();
            let (kind, detail) = match &err {
                StrategyError::ToolchainUnavailable(reason) => {
                    (FailureKind::ToolchainUnavailable, reason.clone())
                }
                StrategyError::Install(RepoError::TimedOut(_)) => (
                    FailureKind::StrategyFailed,
                    format!("timed out after {}s", self.timeout.as_secs()),
                ),
                other => (FailureKind::StrategyFailed, other.to_string()),
            };
            tracing::info!(
                package = %spec.name,
                strategy = %name,
                failure = %kind,
                elapsed_ms = elapsed.as_millis() as u64,
                "{}",
                detail
            );
            return InstallOutcome::failure(&name, kind, detail, elapsed);
        }

        // Probe after every successful action, "already satisfied" included
        match self.probe.verify(spec, self.probe_timeout) {
            Ok(version) => {
                let elapsed = start.elapsed();
                tracing::info!(
                    package = %spec.name,
                    strategy = %name,
                    version = %version,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "install verified"
                );
                InstallOutcome::success(&name, version, elapsed)
            }
            Err(reason) => {
                let elapsed = start.elapsed();
                tracing::warn!(
                    package = %spec.name,
                    strategy = %name,
                    failure = %FailureKind::ProbeFailed,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "install succeeded but verification failed: {}",
                    reason
                );
                InstallOutcome::failure(
                    &name,
                    FailureKind::ProbeFailed,
                    format!("install succeeded but verification failed: {}", reason),
                    elapsed,
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ladder::strategy::default_ladder;
    use crate::ladder::toolchain::{NoToolchain, ToolchainInfo};
    use crate::packages::repository::InstallRequest;
    use std::cell::RefCell;
    use std::path::PathBuf;

    /// Repository that answers from a script of results, recording requests
    struct ScriptedRepository {
        results: RefCell<Vec<Result<(), RepoError>>>,
        requests: RefCell<Vec<InstallRequest>>,
    }

    impl ScriptedRepository {
        fn new(results: Vec<Result<(), RepoError>>) -> Self {
            Self {
                results: RefCell::new(results),
                requests: RefCell::new(Vec::new()),
            }
        }
    }

    impl PackageRepository for ScriptedRepository {
        fn install(&self, request: &InstallRequest, _timeout: Duration) -> Result<(), RepoError> {
            self.requests.borrow_mut().push(request.clone());
            let mut results = self.results.borrow_mut();
            if results.is_empty() {
                Ok(())
            } else {
                results.remove(0)
            }
        }
    }

    struct FakeToolchain;

    impl Toolchain for FakeToolchain {
        fn check(&self) -> Result<ToolchainInfo, String> {
            Ok(ToolchainInfo {
                compiler: PathBuf::from("/usr/bin/cc"),
                include_dir: PathBuf::from("/usr/include/python3.10"),
            })
        }
    }

    fn always_ok(_: &PackageSpec) -> Result<String, String> {
        Ok("1.0".to_string())
    }

    #[test]
    fn test_first_rung_success_stops_ladder() {
        let repo = ScriptedRepository::new(vec![]);
        let spec = PackageSpec::new("aiohttp").with_pinned_versions(["3.9.1"]);
        let installer = DependencyInstaller::new(&repo, &NoToolchain, &always_ok);

        let result = installer.install(&spec, &default_ladder(&spec));

        assert!(result.verified);
        assert_eq!(result.chosen_strategy.as_deref(), Some("prebuilt-binary"));
        assert_eq!(result.attempted_strategies.len(), 1);
        assert_eq!(result.version(), Some("1.0"));
        assert_eq!(repo.requests.borrow().len(), 1);
    }

    #[test]
    fn test_toolchain_unavailable_only_skips_that_rung() {
        let repo = ScriptedRepository::new(vec![Err(RepoError::NoCompatibleDistribution(
            "none".to_string(),
        ))]);
        let spec = PackageSpec::new("aiohttp").with_dependencies(["multidict"]);
        let installer = DependencyInstaller::new(&repo, &NoToolchain, &always_ok);

        let result = installer.install(&spec, &default_ladder(&spec));

        let names: Vec<&str> = result
            .attempted_strategies
            .iter()
            .map(|o| o.strategy_name.as_str())
            .collect();
        assert_eq!(
            names,
            vec!["prebuilt-binary", "compiled-source", "split-dependencies"]
        );
        assert_eq!(
            result.attempted_strategies[1].failure,
            Some(FailureKind::ToolchainUnavailable)
        );
        assert_eq!(result.chosen_strategy.as_deref(), Some("split-dependencies"));
    }

    #[test]
    fn test_compiled_source_reinstalls_only_when_forced() {
        let spec = PackageSpec::new("aiohttp")
            .with_allow_binary_only(false)
            .with_build_env("AIOHTTP_NO_EXTENSIONS", "1");

        let repo = ScriptedRepository::new(vec![]);
        let result = DependencyInstaller::new(&repo, &FakeToolchain, &always_ok)
            .install(&spec, &[Strategy::CompiledSource]);
        assert!(result.verified);
        {
            let requests = repo.requests.borrow();
            assert!(!requests[0].force_reinstall);
            assert_eq!(
                requests[0].env,
                vec![("AIOHTTP_NO_EXTENSIONS".to_string(), "1".to_string())]
            );
        }

        let repo = ScriptedRepository::new(vec![]);
        DependencyInstaller::new(&repo, &FakeToolchain, &always_ok)
            .with_force(true)
            .install(&spec, &[Strategy::CompiledSource]);
        assert!(repo.requests.borrow()[0].force_reinstall);
    }

    #[test]
    fn test_network_retry_is_opt_in_and_single() {
        let network = || Err(RepoError::Network("Connection reset".to_string()));
        let spec = PackageSpec::new("aiohttp");

        let repo = ScriptedRepository::new(vec![network(), Ok(())]);
        let without = DependencyInstaller::new(&repo, &NoToolchain, &always_ok)
            .install(&spec, &[Strategy::PrebuiltBinary]);
        assert!(!without.verified);
        assert_eq!(repo.requests.borrow().len(), 1);

        let repo = ScriptedRepository::new(vec![network(), Ok(())]);
        let with = DependencyInstaller::new(&repo, &NoToolchain, &always_ok)
            .with_retry_network(true)
            .install(&spec, &[Strategy::PrebuiltBinary]);
        assert!(with.verified);
        assert_eq!(repo.requests.borrow().len(), 2);

        let repo = ScriptedRepository::new(vec![network(), network(), Ok(())]);
        let twice = DependencyInstaller::new(&repo, &NoToolchain, &always_ok)
            .with_retry_network(true)
            .install(&spec, &[Strategy::PrebuiltBinary]);
        assert!(!twice.verified);
        assert_eq!(repo.requests.borrow().len(), 2);
    }

    #[test]
    fn test_split_dependencies_continues_past_failed_dep() {
        let repo = ScriptedRepository::new(vec![
            Err(RepoError::Failed {
                exit_code: 1,
                detail: "Failed building wheel for frozenlist".to_string(),
            }),
            Ok(()),
            Ok(()),
        ]);
        let spec = PackageSpec::new("aiohttp").with_dependencies(["frozenlist", "yarl"]);
        let installer = DependencyInstaller::new(&repo, &NoToolchain, &always_ok);

        let result = installer.install(&spec, &[Strategy::SplitDependencies]);

        assert!(result.verified);
        let requests = repo.requests.borrow();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[2].requirement, "aiohttp");
        assert!(requests[2].no_deps);
    }

    #[test]
    fn test_split_dependencies_without_deps_is_not_applicable() {
        let repo = ScriptedRepository::new(vec![]);
        let spec = PackageSpec::new("aiohttp");
        let result = DependencyInstaller::new(&repo, &NoToolchain, &always_ok)
            .install(&spec, &[Strategy::SplitDependencies]);

        assert!(!result.verified);
        assert!(repo.requests.borrow().is_empty());
        assert_eq!(
            result.attempted_strategies[0].failure,
            Some(FailureKind::StrategyFailed)
        );
    }

    #[test]
    fn test_empty_ladder_is_exhausted() {
        let repo = ScriptedRepository::new(vec![]);
        let result = DependencyInstaller::new(&repo, &NoToolchain, &always_ok)
            .install(&PackageSpec::new("x"), &[]);
        assert!(!result.verified);
        assert!(result.chosen_strategy.is_none());
        assert!(result.attempted_strategies.is_empty());
    }

    #[test]
    fn test_observer_sees_every_attempt() {
        struct Recorder(RefCell<Vec<String>>);
        impl LadderObserver for Recorder {
            fn attempt_started(&self, strategy: &Strategy, index: usize, total: usize) {
                self.0
                    .borrow_mut()
                    .push(format!("start {} {}/{}", strategy, index + 1, total));
            }
            fn attempt_finished(&self, outcome: &InstallOutcome) {
                self.0
                    .borrow_mut()
                    .push(format!("end {} {}", outcome.strategy_name, outcome.succeeded));
            }
        }

        let repo = ScriptedRepository::new(vec![Err(RepoError::NoCompatibleDistribution(
            "none".to_string(),
        ))]);
        let spec = PackageSpec::new("x").with_pinned_versions(["2.0"]);
        let recorder = Recorder(RefCell::new(Vec::new()));
        DependencyInstaller::new(&repo, &NoToolchain, &always_ok)
            .with_observer(&recorder)
            .install(&spec, &default_ladder(&spec));

        assert_eq!(
            *recorder.0.borrow(),
            vec![
                "start prebuilt-binary 1/4",
                "end prebuilt-binary false",
                "start pinned-source@2.0 2/4",
                "end pinned-source@2.0 true",
            ]
        );
    }
}
