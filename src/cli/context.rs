//! Shared command setup: project, install target, interpreter, collaborators

use crate::cli::output_format::OutputFormat;
use crate::error::{Error, Result};
use crate::executor::python::detect_python;
use crate::executor::{run_command, CommandSpec};
use crate::ladder::{ImportProbe, SystemToolchain};
use crate::packages::PipRepository;
use crate::project::{InstallTarget, Project};
use clap::Args;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Bound on `python -m venv`
const VENV_TIMEOUT: Duration = Duration::from_secs(300);

/// Arguments shared by every command that touches an install target
#[derive(Args, Debug, Clone)]
pub struct TargetArgs {
    /// Virtual environment or package directory (default: from ladder.toml, else .venv)
    #[arg(long, value_name = "DIR")]
    pub target: Option<PathBuf>,

    /// Python interpreter (default: the target's own, then $LADDER_PYTHON, then PATH)
    #[arg(long, value_name = "PATH")]
    pub python: Option<String>,

    /// Output format: human (default) or json
    #[arg(long, value_enum, default_value = "human")]
    pub format: OutputFormat,
}

/// Everything a command needs to drive the ladder against one target
pub struct CommandContext {
    pub project: Project,
    pub target: InstallTarget,
    pub python: PathBuf,
}

impl CommandContext {
    pub fn prepare(args: &TargetArgs) -> Result<Self> {
        let project = Project::discover()?;
        Self::prepare_in(project, args)
    }

    pub fn prepare_in(project: Project, args: &TargetArgs) -> Result<Self> {
        let target = project.target(args.target.as_deref());
        let python = detect_python(args.python.as_deref(), Some(&target))?;

        tracing::debug!(
            root = %project.root.display(),
            target = %target.root().display(),
            python = %python.display(),
            "command context"
        );

        Ok(Self {
            project,
            target,
            python,
        })
    }

    /// Create the target's virtual environment if it has no interpreter yet
    ///
    /// Afterwards the target's own interpreter is used for pip, the toolchain
    /// check and the probe. Bare `--target` directories are left alone.
    pub fn ensure_virtualenv(&mut self) -> Result<()> {
        if self.site_dir().is_some() {
            return Ok(());
        }
        if let Some(python) = self.target.interpreter() {
            self.python = python;
            return Ok(());
        }

        tracing::info!(
            target = %self.target.root().display(),
            python = %self.python.display(),
            "creating virtual environment"
        );
        let cmd = CommandSpec::new(&self.python)
            .args(["-m", "venv"])
            .arg(self.target.root().as_os_str().to_os_string())
            .with_timeout(VENV_TIMEOUT);
        let output = run_command(&cmd)?;
        if !output.success() {
            return Err(Error::Execution(format!(
                "Failed to create virtual environment at {}: {}",
                self.target.root().display(),
                output.tail(3)
            )));
        }

        self.python = self.target.interpreter().ok_or_else(|| {
            Error::Execution(format!(
                "Virtual environment at {} has no interpreter after creation",
                self.target.root().display()
            ))
        })?;
        Ok(())
    }

    /// Directory passed to `pip --target`, when the target is not a venv
    fn site_dir(&self) -> Option<&Path> {
        if self.project.config.target.site_dir {
            Some(self.target.root())
        } else {
            None
        }
    }

    pub fn repository(&self) -> PipRepository {
        let mut repo = PipRepository::new(&self.python);
        if let Some(dir) = self.site_dir() {
            repo = repo.with_site_dir(dir);
        }
        if let Some(url) = &self.project.config.target.index_url {
            repo = repo.with_index_url(url);
        }
        repo
    }

    pub fn toolchain(&self) -> SystemToolchain {
        SystemToolchain::new(&self.python)
    }

    pub fn probe(&self, check: Option<&str>) -> ImportProbe {
        let mut probe = ImportProbe::new(&self.python);
        if let Some(dir) = self.site_dir() {
            probe = probe.with_site_dir(dir);
        }
        if let Some(check) = check {
            probe = probe.with_check(check);
        }
        probe
    }
}
