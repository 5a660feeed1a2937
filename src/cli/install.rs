//! `ladder install` command implementation
//!
//! Resolves the package's ladder from ladder.toml plus CLI overrides, locks
//! the install target, walks the ladder and reports every attempt.

use crate::cli::context::{CommandContext, TargetArgs};
use crate::cli::output_format::OutputFormat;
use crate::cli::output_types::{outcome_line, CommandOutput, InstallOutput};
use crate::error::mapper::{EXIT_EXHAUSTED, EXIT_SUCCESS};
use crate::error::{Error, FailureKind, Result};
use crate::executor::runner::interrupted;
use crate::ladder::installer::{DependencyInstaller, LadderObserver, DEFAULT_STRATEGY_TIMEOUT};
use crate::ladder::strategy::Strategy;
use crate::ladder::{InstallOutcome, InstallResult, PackageSpec};
use crate::project::config::PackageConfig;
use crate::project::user_config::load_user_config;
use crate::project::TargetLock;
use crate::utils::output::{print_error, print_info, print_success, print_warning};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::IsTerminal;
use std::time::Duration;

/// Flags that shape a package's ladder, shared with `ladder plan`
#[derive(Args, Debug, Clone, Default)]
pub struct PackageArgs {
    /// Version to try, most preferred first (repeatable; replaces ladder.toml pins)
    #[arg(long = "pin", value_name = "VERSION")]
    pub pins: Vec<String>,

    /// Skip the wheels-only rung
    #[arg(long)]
    pub no_binary_only: bool,

    /// Sub-dependency for split-dependencies (repeatable)
    #[arg(long = "dep", value_name = "PACKAGE")]
    pub deps: Vec<String>,

    /// Import name, if different from the package name
    #[arg(long)]
    pub module: Option<String>,

    /// Strategy order (repeatable): prebuilt-binary, pinned-source, compiled-source, split-dependencies
    #[arg(long = "strategy", value_name = "TAG")]
    pub strategies: Vec<String>,

    /// Hard timeout for each strategy attempt, in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,
}

#[derive(Args)]
#[command(after_help = "\
Examples:
  ladder install aiohttp                          Use the ladder from ladder.toml
  ladder install aiohttp --pin 3.9.1 --pin 3.8.6  Try these versions in this order
  ladder install aiohttp --dep multidict --dep yarl
  ladder install fyers-apiv3 --module fyers_apiv3 --format json")]
pub struct InstallArgs {
    /// Package (distribution name) to install
    pub package: String,

    #[command(flatten)]
    pub package_args: PackageArgs,

    /// Reinstall even if the package is already present
    #[arg(long)]
    pub force: bool,

    /// Retry a strategy once after a transient network error
    #[arg(long)]
    pub retry_network: bool,

    #[command(flatten)]
    pub common: TargetArgs,
}

/// A package's configuration after CLI overrides
pub struct ResolvedPackage {
    pub config: PackageConfig,
    pub spec: PackageSpec,
    pub ladder: Vec<Strategy>,
    pub timeout: Duration,
}

/// Merge ladder.toml with CLI flags; CLI wins field by field
pub fn resolve_package(
    ctx: &CommandContext,
    package: &str,
    args: &PackageArgs,
) -> Result<ResolvedPackage> {
    let config = &ctx.project.config;
    let mut package_config = config.package(package);

    if !args.pins.is_empty() {
        for (i, pin) in args.pins.iter().enumerate() {
            if pin.trim().is_empty() || args.pins[..i].contains(pin) {
                return Err(Error::Config(format!(
                    "--pin {:?} is empty or given twice",
                    pin
                )));
            }
        }
        package_config.pinned_versions = args.pins.clone();
    }
    if args.no_binary_only {
        package_config.allow_binary_only = false;
    }
    if !args.deps.is_empty() {
        package_config.dependencies = args.deps.clone();
    }
    if let Some(module) = &args.module {
        package_config.module = Some(module.clone());
    }
    if !args.strategies.is_empty() {
        package_config.strategies = Some(args.strategies.clone());
    }

    let ladder = package_config.ladder(package)?;
    let spec = package_config.to_spec(package);
    spec.check_module_name()?;

    let timeout = match args.timeout {
        Some(0) => {
            return Err(Error::Config(
                "--timeout must be greater than zero".to_string(),
            ))
        }
        Some(secs) => Duration::from_secs(secs),
        None if ctx.project.has_config_file => config.timeout_for(package),
        None => load_user_config()?
            .and_then(|c| c.timeout_secs)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_STRATEGY_TIMEOUT),
    };

    Ok(ResolvedPackage {
        config: package_config,
        spec,
        ladder,
        timeout,
    })
}

/// Spinner showing the rung in progress
struct SpinnerObserver {
    bar: ProgressBar,
    package: String,
}

impl SpinnerObserver {
    fn new(package: &str) -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner} {msg} [{elapsed}]")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.enable_steady_tick(Duration::from_millis(120));
        Self {
            bar,
            package: package.to_string(),
        }
    }
}

impl LadderObserver for SpinnerObserver {
    fn attempt_started(&self, strategy: &Strategy, index: usize, total: usize) {
        self.bar.reset_elapsed();
        self.bar.set_message(format!(
            "{} [{}/{}] {}",
            self.package,
            index + 1,
            total,
            strategy
        ));
    }

    fn attempt_finished(&self, outcome: &InstallOutcome) {
        let status = if outcome.succeeded { "PASS" } else { "FAIL" };
        self.bar.println(format!("{} {}", status, outcome.strategy_name));
    }
}

pub fn execute(args: &InstallArgs) -> Result<()> {
    let format = args.common.format;
    let mut ctx = CommandContext::prepare(&args.common)?;
    let resolved = resolve_package(&ctx, &args.package, &args.package_args)?;

    // The ladder mutates the target; one run per target at a time
    let _lock = TargetLock::acquire(&ctx.target)?;
    ctx.ensure_virtualenv()?;

    let repository = ctx.repository();
    let toolchain = ctx.toolchain();
    let probe = ctx.probe(resolved.config.check.as_deref());
    let retry_network = args.retry_network || ctx.project.config.settings.retry_network;

    if !format.is_machine_readable() {
        print_info(&format!(
            "Installing {} into {} ({} strategies, {}s limit each)",
            resolved.spec.name,
            ctx.target.root().display(),
            resolved.ladder.len(),
            resolved.timeout.as_secs()
        ));
    }

    let spinner = (!format.is_machine_readable() && std::io::stderr().is_terminal())
        .then(|| SpinnerObserver::new(&resolved.spec.name));

    let mut installer = DependencyInstaller::new(&repository, &toolchain, &probe)
        .with_timeout(resolved.timeout)
        .with_force(args.force)
        .with_retry_network(retry_network);
    if let Some(observer) = &spinner {
        installer = installer.with_observer(observer);
    }

    let result = installer.install(&resolved.spec, &resolved.ladder);

    if let Some(observer) = spinner {
        observer.bar.finish_and_clear();
    }

    if interrupted() {
        if !format.is_machine_readable() {
            print_warning(&format!(
                "Interrupted after {} attempt(s); {} may be partially installed",
                result.attempted_strategies.len(),
                resolved.spec.name
            ));
        }
        return Err(Error::Interrupted);
    }

    let exit_code = if result.verified {
        EXIT_SUCCESS
    } else {
        EXIT_EXHAUSTED
    };

    match format {
        OutputFormat::Human => print_human_output(&result, &ctx),
        OutputFormat::Json => {
            let output = InstallOutput::new(result.clone(), ctx.target.root().to_path_buf(), exit_code);
            println!("{}", output.to_json());
        }
    }

    result.ensure_verified()?;
    Ok(())
}

fn print_human_output(result: &InstallResult, ctx: &CommandContext) {
    for outcome in &result.attempted_strategies {
        let line = outcome_line(outcome);
        match outcome.failure {
            None => print_success(&line),
            Some(FailureKind::ProbeFailed) | Some(FailureKind::ToolchainUnavailable) => {
                print_warning(&line)
            }
            Some(_) => print_error(&line),
        }
    }

    println!();
    match &result.chosen_strategy {
        Some(strategy) => {
            let version = result
                .version()
                .map(|v| format!(" {}", v))
                .unwrap_or_default();
            println!(
                "Installed {}{} into {} via {} ({:.1}s)",
                result.package,
                version,
                ctx.target.root().display(),
                strategy,
                result.total_duration().as_secs_f64()
            );
        }
        None => {
            eprintln!(
                "All {} strategies exhausted for {}. Attempts:",
                result.attempted_strategies.len(),
                result.package
            );
            eprintln!("{}", result.diagnostic());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::Project;
    use std::path::PathBuf;

    fn context(config: &str) -> (tempfile::TempDir, CommandContext) {
        let temp = tempfile::TempDir::new().unwrap();
        std::fs::write(temp.path().join("ladder.toml"), config).unwrap();
        let project = Project::discover_from(temp.path()).unwrap();
        let target = project.target(None);
        let ctx = CommandContext {
            project,
            target,
            python: PathBuf::from("python3"),
        };
        (temp, ctx)
    }

    #[test]
    fn test_cli_pins_replace_config_pins() {
        let (_temp, ctx) = context("[packages.aiohttp]\npinned_versions = [\"3.9.1\"]\n");
        let args = PackageArgs {
            pins: vec!["3.8.6".to_string(), "3.8.5".to_string()],
            ..Default::default()
        };
        let resolved = resolve_package(&ctx, "aiohttp", &args).unwrap();
        let names: Vec<String> = resolved.ladder.iter().map(Strategy::name).collect();
        assert_eq!(
            names,
            vec![
                "prebuilt-binary",
                "pinned-source@3.8.6",
                "pinned-source@3.8.5",
                "compiled-source",
                "split-dependencies"
            ]
        );
    }

    #[test]
    fn test_timeout_precedence() {
        let (_temp, ctx) = context(
            "[settings]\ntimeout_secs = 120\n[packages.aiohttp]\ntimeout_secs = 600\n",
        );
        let from_package = resolve_package(&ctx, "aiohttp", &PackageArgs::default()).unwrap();
        assert_eq!(from_package.timeout, Duration::from_secs(600));

        let from_settings = resolve_package(&ctx, "yarl", &PackageArgs::default()).unwrap();
        assert_eq!(from_settings.timeout, Duration::from_secs(120));

        let args = PackageArgs {
            timeout: Some(30),
            ..Default::default()
        };
        let from_cli = resolve_package(&ctx, "aiohttp", &args).unwrap();
        assert_eq!(from_cli.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_strategy_flags_and_binary_opt_out() {
        let (_temp, ctx) = context("");
        let args = PackageArgs {
            no_binary_only: true,
            strategies: vec!["prebuilt-binary".to_string(), "split".to_string()],
            deps: vec!["multidict".to_string()],
            ..Default::default()
        };
        let resolved = resolve_package(&ctx, "aiohttp", &args).unwrap();
        assert_eq!(resolved.ladder, vec![Strategy::SplitDependencies]);
        assert_eq!(resolved.spec.dependencies, vec!["multidict"]);
    }

    #[test]
    fn test_module_flag_must_be_an_identifier() {
        let (_temp, ctx) = context("");
        let args = PackageArgs {
            module: Some("aiohttp'); import os; ('".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            resolve_package(&ctx, "aiohttp", &args),
            Err(Error::Config(_))
        ));

        let args = PackageArgs {
            module: Some("fyers_apiv3.fyersModel".to_string()),
            ..Default::default()
        };
        assert!(resolve_package(&ctx, "fyers-apiv3", &args).is_ok());
    }

    #[test]
    fn test_zero_timeout_flag_rejected() {
        let (_temp, ctx) = context("");
        let args = PackageArgs {
            timeout: Some(0),
            ..Default::default()
        };
        assert!(matches!(
            resolve_package(&ctx, "aiohttp", &args),
            Err(Error::Config(_))
        ));
    }
}
