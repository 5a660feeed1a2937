//! `ladder doctor` command implementation
//!
//! Runs diagnostics for everything the ladder depends on:
//! - Python interpreter and pip
//! - Build toolchain for the source rungs
//! - Project configuration
//! - Install target and its lock

use crate::cli::output_format::OutputFormat;
use crate::cli::output_types::{CommandOutput, DoctorCheck, DoctorOutput};
use crate::error::{Error, Result};
use crate::executor::python::detect_python;
use crate::executor::runner::interrupted;
use crate::executor::{run_command, CommandSpec};
use crate::ladder::{SystemToolchain, Toolchain};
use crate::project::user_config::{get_config_path, load_user_config};
use crate::project::{Config, InstallTarget, Project, TargetLock};
use clap::Args;
use std::path::{Path, PathBuf};
use std::time::Duration;

const PIP_CHECK_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Args)]
#[command(after_help = "\
Examples:
  ladder doctor                           Check the default target
  ladder doctor --target /srv/app/.venv   Check a specific environment")]
pub struct DoctorArgs {
    /// Virtual environment or package directory (default: from ladder.toml, else .venv)
    #[arg(long, value_name = "DIR")]
    pub target: Option<PathBuf>,

    /// Python interpreter to check
    #[arg(long, value_name = "PATH")]
    pub python: Option<String>,

    /// Output format: human (default) or json
    #[arg(long, value_enum, default_value = "human")]
    pub format: OutputFormat,
}

/// Result of a diagnostic check
struct DiagnosticResult {
    name: &'static str,
    status: CheckStatus,
    message: String,
    suggestion: Option<String>,
}

impl DiagnosticResult {
    fn pass(name: &'static str, message: impl Into<String>) -> Self {
        Self {
            name,
            status: CheckStatus::Pass,
            message: message.into(),
            suggestion: None,
        }
    }

    fn warn(name: &'static str, message: impl Into<String>, suggestion: &str) -> Self {
        Self {
            name,
            status: CheckStatus::Warn,
            message: message.into(),
            suggestion: Some(suggestion.to_string()),
        }
    }

    fn fail(name: &'static str, message: impl Into<String>, suggestion: &str) -> Self {
        Self {
            name,
            status: CheckStatus::Fail,
            message: message.into(),
            suggestion: Some(suggestion.to_string()),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

impl CheckStatus {
    fn as_str(&self) -> &'static str {
        match self {
            CheckStatus::Pass => "pass",
            CheckStatus::Warn => "warn",
            CheckStatus::Fail => "fail",
        }
    }

    fn icon(&self) -> &'static str {
        match self {
            CheckStatus::Pass => "PASS",
            CheckStatus::Warn => "WARN",
            CheckStatus::Fail => "FAIL",
        }
    }
}

pub fn execute(args: &DoctorArgs) -> Result<()> {
    let cwd = std::env::current_dir()?;
    let checks = run_all_checks(&cwd, args);
    if interrupted() {
        return Err(Error::Interrupted);
    }
    let output = summarize(checks);

    match args.format {
        OutputFormat::Human => print_human_output(&output),
        OutputFormat::Json => println!("{}", output.to_json()),
    }

    if output.failed > 0 {
        return Err(Error::CheckFailed(format!(
            "{} of {} checks failed",
            output.failed,
            output.checks.len()
        )));
    }
    Ok(())
}

fn run_all_checks(cwd: &Path, args: &DoctorArgs) -> Vec<DiagnosticResult> {
    // A broken ladder.toml is reported, not fatal; later checks use defaults
    let (config_check, project) = check_config(cwd);
    let target = project.target(args.target.as_deref());
    let python = detect_python(args.python.as_deref(), Some(&target));

    let mut checks = vec![config_check, check_user_config()];
    match &python {
        Ok(python) => {
            checks.push(DiagnosticResult::pass(
                "Python Interpreter",
                format!("Found: {}", python.display()),
            ));
            checks.push(check_pip(python));
            checks.push(check_toolchain(&SystemToolchain::new(python)));
        }
        Err(e) => checks.push(DiagnosticResult::fail(
            "Python Interpreter",
            e.to_string(),
            "Install Python 3, pass --python, or set $LADDER_PYTHON",
        )),
    }
    checks.push(check_target(&target, project.config.target.site_dir));
    checks.push(check_lock(&target));
    checks
}

fn check_config(cwd: &Path) -> (DiagnosticResult, Project) {
    match Project::discover_from(cwd) {
        Ok(project) if project.has_config_file => {
            let packages = project.config.packages.len();
            let check = DiagnosticResult::pass(
                "Configuration",
                format!(
                    "{} valid ({} package{} configured)",
                    project.config_path().display(),
                    packages,
                    if packages == 1 { "" } else { "s" }
                ),
            );
            (check, project)
        }
        Ok(project) => (
            DiagnosticResult::pass("Configuration", "No ladder.toml (using defaults)"),
            project,
        ),
        Err(e) => {
            let check = DiagnosticResult::fail(
                "Configuration",
                e.to_string(),
                "Fix ladder.toml; see `ladder plan <package>` to check the result",
            );
            let project = Project {
                root: cwd.to_path_buf(),
                config: Config::default(),
                has_config_file: false,
            };
            (check, project)
        }
    }
}

fn check_user_config() -> DiagnosticResult {
    let location = get_config_path()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "~/.config/ladder/config.toml".to_string());
    match load_user_config() {
        Ok(Some(_)) => DiagnosticResult::pass("User Config", format!("{} valid", location)),
        Ok(None) => DiagnosticResult::pass("User Config", format!("{} not present", location)),
        Err(e) => DiagnosticResult::fail("User Config", e.to_string(), "Fix or remove the file"),
    }
}

fn check_pip(python: &Path) -> DiagnosticResult {
    let cmd = CommandSpec::new(python)
        .args(["-m", "pip", "--version"])
        .with_timeout(PIP_CHECK_TIMEOUT);
    match run_command(&cmd) {
        Ok(output) if output.success() => {
            let version = output.stdout.lines().next().unwrap_or_default().trim();
            DiagnosticResult::pass("pip", version.to_string())
        }
        Ok(output) => DiagnosticResult::fail(
            "pip",
            format!("pip is not usable: {}", output.tail(1)),
            "Run `python -m ensurepip --upgrade`",
        ),
        Err(e) => DiagnosticResult::fail("pip", e.to_string(), "Check the interpreter path"),
    }
}

fn check_toolchain(toolchain: &dyn Toolchain) -> DiagnosticResult {
    match toolchain.check() {
        Ok(info) => DiagnosticResult::pass(
            "Build Toolchain",
            format!(
                "{} (headers in {})",
                info.compiler.display(),
                info.include_dir.display()
            ),
        ),
        Err(reason) => DiagnosticResult::warn(
            "Build Toolchain",
            reason,
            "Source rungs will be skipped; install a C compiler and the Python headers",
        ),
    }
}

fn check_target(target: &InstallTarget, site_dir: bool) -> DiagnosticResult {
    let root = target.root().display();
    if !target.exists() {
        return DiagnosticResult::pass(
            "Install Target",
            format!("{} (will be created on first install)", root),
        );
    }

    let installed = target.installed_distributions().len();
    if site_dir {
        DiagnosticResult::pass(
            "Install Target",
            format!("{} ({} distributions)", root, installed),
        )
    } else if target.is_virtualenv() && target.interpreter().is_some() {
        DiagnosticResult::pass(
            "Install Target",
            format!("{} (virtualenv, {} distributions)", root, installed),
        )
    } else {
        DiagnosticResult::warn(
            "Install Target",
            format!("{} exists but is not a virtual environment", root),
            "Set `site_dir = true` under [target] to install into a plain directory",
        )
    }
}

fn check_lock(target: &InstallTarget) -> DiagnosticResult {
    match TargetLock::holder(target) {
        Ok(None) => DiagnosticResult::pass("Target Lock", "Not held"),
        Ok(Some(holder)) => DiagnosticResult::warn(
            "Target Lock",
            format!("Held by pid {} ({})", holder, target.lock_path().display()),
            "Another ladder run is installing into this target; wait for it to finish",
        ),
        Err(e) => DiagnosticResult::warn(
            "Target Lock",
            format!("Could not check {}: {}", target.lock_path().display(), e),
            "Check permissions on the install target",
        ),
    }
}

fn summarize(checks: Vec<DiagnosticResult>) -> DoctorOutput {
    let count = |status: CheckStatus| checks.iter().filter(|c| c.status == status).count();
    let passed = count(CheckStatus::Pass);
    let warnings = count(CheckStatus::Warn);
    let failed = count(CheckStatus::Fail);

    DoctorOutput {
        ready: failed == 0,
        passed,
        warnings,
        failed,
        checks: checks
            .into_iter()
            .map(|c| DoctorCheck {
                name: c.name.to_string(),
                status: c.status.as_str(),
                message: c.message,
                suggestion: c.suggestion,
            })
            .collect(),
    }
}

fn print_human_output(output: &DoctorOutput) {
    println!("ladder System Diagnostics");
    println!("=========================");
    println!();

    for check in &output.checks {
        let icon = match check.status {
            "pass" => CheckStatus::Pass.icon(),
            "warn" => CheckStatus::Warn.icon(),
            _ => CheckStatus::Fail.icon(),
        };
        println!("[{}] {}", icon, check.name);
        println!("      {}", check.message);
        if let Some(ref suggestion) = check.suggestion {
            println!("      Tip: {}", suggestion);
        }
        println!();
    }

    println!(
        "Summary: {} passed, {} warnings, {} failed",
        output.passed, output.warnings, output.failed
    );

    if output.ready {
        println!();
        println!("ladder is ready to use.");
    }
}
