//! User-level configuration (~/.config/ladder/config.toml)
//!
//! Machine-specific settings that should NOT be committed to version control,
//! such as the interpreter used to bootstrap a target.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// User configuration loaded from ~/.config/ladder/config.toml
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct UserConfig {
    /// Python interpreter path (machine-specific)
    pub python: Option<String>,
    /// Default per-strategy timeout in seconds
    pub timeout_secs: Option<u64>,
}

/// Get the user config directory path.
///
/// Returns `~/.config/ladder/` on Unix and `%APPDATA%\ladder\` on Windows.
pub fn get_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("ladder"))
}

/// Get the user config file path.
pub fn get_config_path() -> Option<PathBuf> {
    get_config_dir().map(|p| p.join("config.toml"))
}

/// Load user configuration from ~/.config/ladder/config.toml
///
/// Returns `None` if the config file doesn't exist.
/// Returns an error if the file exists but is invalid TOML.
pub fn load_user_config() -> Result<Option<UserConfig>> {
    let config_path = match get_config_path() {
        Some(path) => path,
        None => return Ok(None),
    };

    if !config_path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(&config_path).map_err(|e| {
        Error::Config(format!(
            "Failed to read user config at {}: {}",
            config_path.display(),
            e
        ))
    })?;

    parse_user_config(&content)
        .map(Some)
        .map_err(|e| Error::Config(format!("{} ({})", e, config_path.display())))
}

fn parse_user_config(content: &str) -> Result<UserConfig> {
    let config: UserConfig = toml::from_str(content)
        .map_err(|e| Error::Config(format!("Failed to parse user config: {}", e)))?;

    if config.timeout_secs == Some(0) {
        return Err(Error::Config(
            "timeout_secs must be greater than zero".to_string(),
        ));
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_user_config() {
        let config = UserConfig::default();
        assert!(config.python.is_none());
        assert!(config.timeout_secs.is_none());
    }

    #[test]
    fn test_get_config_dir() {
        // May be None in some test environments
        if let Some(d) = get_config_dir() {
            assert!(d.ends_with("ladder"));
        }
    }

    #[test]
    fn test_parse_fields() {
        let config = parse_user_config("python = \"/usr/bin/python3\"\ntimeout_secs = 120\n").unwrap();
        assert_eq!(config.python.as_deref(), Some("/usr/bin/python3"));
        assert_eq!(config.timeout_secs, Some(120));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        assert!(parse_user_config("timeout_secs = 0").is_err());
    }
}
