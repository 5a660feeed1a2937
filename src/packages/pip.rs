//! pip-backed package repository
//!
//! Runs `<python> -m pip install ...` for every install action. When the
//! interpreter belongs to the install target's virtual environment, pip
//! installs into it directly; for a bare package directory, `--target` is
//! used instead.

use crate::executor::{run_command, CommandSpec};
use crate::packages::classify::classify_pip_output;
use crate::packages::repository::{BuildMode, InstallRequest, PackageRepository, RepoError};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Package repository that shells out to pip
#[derive(Debug, Clone)]
pub struct PipRepository {
    python: PathBuf,
    /// Install into this directory with `--target` instead of the interpreter's site-packages
    site_dir: Option<PathBuf>,
    /// Extra index arguments (`--index-url`, `--extra-index-url`, ...)
    index_args: Vec<String>,
}

impl PipRepository {
    pub fn new(python: impl Into<PathBuf>) -> Self {
        Self {
            python: python.into(),
            site_dir: None,
            index_args: Vec::new(),
        }
    }

    pub fn with_site_dir(mut self, dir: &Path) -> Self {
        self.site_dir = Some(dir.to_path_buf());
        self
    }

    pub fn with_index_url(mut self, url: &str) -> Self {
        self.index_args.push("--index-url".to_string());
        self.index_args.push(url.to_string());
        self
    }

    /// Build the pip command line for a request
    pub fn command_for(&self, request: &InstallRequest, timeout: Duration) -> CommandSpec {
        let mut cmd = CommandSpec::new(&self.python)
            .args(["-m", "pip", "install"])
            .args(["--disable-pip-version-check", "--no-input"])
            .env("PIP_NO_INPUT", "1")
            .with_timeout(timeout);

        match request.mode {
            BuildMode::BinaryOnly => cmd = cmd.arg("--only-binary=:all:"),
            BuildMode::PreferBinary => cmd = cmd.arg("--prefer-binary"),
            BuildMode::Any => {}
            BuildMode::SourceOnly => cmd = cmd.args(["--no-binary", request.package.as_str()]),
        }

        if request.no_deps {
            cmd = cmd.arg("--no-deps");
        }
        if request.force_reinstall {
            cmd = cmd.arg("--force-reinstall");
        }
        if let Some(dir) = &self.site_dir {
            cmd = cmd.arg("--target").arg(dir.as_os_str().to_os_string());
            // --target refuses to overwrite existing packages without --upgrade
            if request.force_reinstall {
                cmd = cmd.arg("--upgrade");
            }
        }

        cmd = cmd.args(self.index_args.iter().cloned());
        cmd = cmd.args(request.extra_args.iter().cloned());
        for (key, value) in &request.env {
            cmd = cmd.env(key.clone(), value.clone());
        }

        cmd.arg(request.requirement.as_str())
    }
}

impl PackageRepository for PipRepository {
    fn install(&self, request: &InstallRequest, timeout: Duration) -> Result<(), RepoError> {
        let cmd = self.command_for(request, timeout);
        tracing::debug!(command = %cmd.display(), "running pip");

        let output = run_command(&cmd).map_err(|e| RepoError::Spawn(e.to_string()))?;
        classify_pip_output(&output)
    }

    fn describe(&self) -> String {
        match &self.site_dir {
            Some(dir) => format!("pip ({}) --target {}", self.python.display(), dir.display()),
            None => format!("pip ({})", self.python.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(cmd: &CommandSpec) -> Vec<String> {
        cmd.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_binary_only_command() {
        let repo = PipRepository::new("/srv/app/venv/bin/python");
        let request = InstallRequest::new("aiohttp", "aiohttp", BuildMode::BinaryOnly);
        let cmd = repo.command_for(&request, Duration::from_secs(60));

        let args = args(&cmd);
        assert_eq!(&args[..3], &["-m", "pip", "install"]);
        assert!(args.contains(&"--only-binary=:all:".to_string()));
        assert!(!args.contains(&"--force-reinstall".to_string()));
        assert_eq!(args.last().unwrap(), "aiohttp");
        assert_eq!(cmd.timeout, Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_source_only_command_with_build_env() {
        let repo = PipRepository::new("python3");
        let request = InstallRequest {
            env: vec![("AIOHTTP_NO_EXTENSIONS".to_string(), "1".to_string())],
            extra_args: vec!["--no-build-isolation".to_string()],
            ..InstallRequest::new("aiohttp", "aiohttp", BuildMode::SourceOnly)
        }
        .with_force_reinstall(true);
        let cmd = repo.command_for(&request, Duration::from_secs(60));

        let args = args(&cmd);
        let pos = args.iter().position(|a| a == "--no-binary").unwrap();
        assert_eq!(args[pos + 1], "aiohttp");
        assert!(args.contains(&"--force-reinstall".to_string()));
        assert!(args.contains(&"--no-build-isolation".to_string()));
        assert!(cmd
            .env
            .contains(&("AIOHTTP_NO_EXTENSIONS".to_string(), "1".to_string())));
    }

    #[test]
    fn test_site_dir_uses_target_flag() {
        let repo = PipRepository::new("python3")
            .with_site_dir(Path::new("/opt/pkgs"))
            .with_index_url("https://pypi.example.org/simple");
        let request = InstallRequest::new("yarl", "yarl", BuildMode::PreferBinary).with_no_deps(true);
        let args = args(&repo.command_for(&request, Duration::from_secs(5)));

        let pos = args.iter().position(|a| a == "--target").unwrap();
        assert_eq!(args[pos + 1], "/opt/pkgs");
        assert!(args.contains(&"--prefer-binary".to_string()));
        assert!(args.contains(&"--no-deps".to_string()));
        assert!(args.contains(&"https://pypi.example.org/simple".to_string()));
        assert!(repo.describe().contains("--target"));
    }

    #[test]
    fn test_missing_interpreter_is_spawn_error() {
        let repo = PipRepository::new("/nonexistent/bin/python");
        let request = InstallRequest::new("aiohttp", "aiohttp", BuildMode::Any);
        assert!(matches!(
            repo.install(&request, Duration::from_secs(5)),
            Err(RepoError::Spawn(_))
        ));
    }
}
