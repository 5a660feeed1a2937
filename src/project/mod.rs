pub mod config;
pub mod root;
pub mod target;
pub mod user_config;

// Re-export main types
pub use config::Config;
pub use target::{InstallTarget, TargetLock};

use crate::error::Result;
use std::path::{Path, PathBuf};

/// A directory with an optional ladder.toml
#[derive(Debug)]
pub struct Project {
    /// Path to the project root directory
    pub root: PathBuf,
    /// Configuration loaded from ladder.toml (defaults if no config file)
    pub config: Config,
    /// Whether ladder.toml was found
    pub has_config_file: bool,
}

impl Project {
    /// Find project root by walking up from the current working directory.
    ///
    /// Falls back to the working directory with default configuration when
    /// no ladder.toml exists, so one-off installs work without a project.
    pub fn discover() -> Result<Project> {
        let cwd = std::env::current_dir()?;
        Self::discover_from(&cwd)
    }

    /// Find project root starting from a specific directory.
    pub fn discover_from(start_dir: &Path) -> Result<Project> {
        match root::find_project_root(start_dir)? {
            Some(root) => {
                let config = config::load_config(&root)?.unwrap_or_default();
                Ok(Project {
                    root,
                    config,
                    has_config_file: true,
                })
            }
            None => Ok(Project {
                root: start_dir.to_path_buf(),
                config: Config::default(),
                has_config_file: false,
            }),
        }
    }

    /// Install target from config, or from an explicit override
    ///
    /// Relative paths are resolved against the project root.
    pub fn target(&self, override_path: Option<&Path>) -> InstallTarget {
        let path = override_path.unwrap_or(&self.config.target.path);
        if path.is_absolute() {
            InstallTarget::new(path)
        } else {
            InstallTarget::new(self.root.join(path))
        }
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join(root::CONFIG_FILE_NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_discover_without_config_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let project = Project::discover_from(temp.path()).unwrap();
        // An unrelated ladder.toml above the temp dir would be found instead
        if !project.has_config_file {
            assert_eq!(project.root, temp.path());
            assert_eq!(project.target(None).root(), temp.path().join(".venv"));
        }
    }

    #[test]
    fn test_target_resolved_against_root() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("ladder.toml"),
            "[target]\npath = \"venv\"\n",
        )
        .unwrap();
        let sub = temp.path().join("app");
        fs::create_dir_all(&sub).unwrap();

        let project = Project::discover_from(&sub).unwrap();
        assert!(project.has_config_file);
        let root = temp.path().canonicalize().unwrap();
        assert_eq!(project.target(None).root(), root.join("venv"));
        assert_eq!(
            project.target(Some(Path::new("/opt/venv"))).root(),
            Path::new("/opt/venv")
        );
    }

    #[test]
    fn test_invalid_config_is_error() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("ladder.toml"), "[settings]\ntimeout_secs = \"x\"\n").unwrap();
        assert!(Project::discover_from(temp.path()).is_err());
    }
}
