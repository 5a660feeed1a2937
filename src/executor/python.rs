/// Python interpreter detection with precedence chain
///
/// # Precedence Order
///
/// 1. CLI flag `--python` (highest priority)
/// 2. Environment variable `$LADDER_PYTHON`
/// 3. The install target's own interpreter (`<venv>/bin/python`)
/// 4. User config `~/.config/ladder/config.toml` (python field)
/// 5. Auto-detection via PATH search (lowest priority)
///
/// The interpreter is NOT in project config (ladder.toml) because its
/// location is machine-specific; the venv path is what gets committed.
use crate::error::{Error, Result};
use crate::project::target::InstallTarget;
use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Interpreter names in preference order for PATH search
const INTERPRETER_NAMES: &[&str] = &["python3", "python"];

/// Environment variable overriding interpreter detection
pub const PYTHON_ENV_VAR: &str = "LADDER_PYTHON";

/// Detect the interpreter that owns the install target
///
/// # Errors
///
/// Returns a configuration error if an explicitly requested interpreter does
/// not exist, or if nothing is found at all.
pub fn detect_python(cli_python: Option<&str>, target: Option<&InstallTarget>) -> Result<PathBuf> {
    // 1. CLI flag (highest priority)
    if let Some(python) = cli_python {
        return verified(python, "--python");
    }

    // 2. Environment variable ($LADDER_PYTHON)
    if let Ok(python) = env::var(PYTHON_ENV_VAR) {
        if !python.trim().is_empty() {
            return verified(&python, "$LADDER_PYTHON");
        }
    }

    // 3. The target's venv interpreter
    if let Some(target) = target {
        if let Some(python) = target.interpreter() {
            return Ok(python);
        }
    }

    // 4. User config (~/.config/ladder/config.toml)
    if let Some(python) = get_user_config_python()? {
        return verified(&python, "~/.config/ladder/config.toml");
    }

    // 5. Auto-detection
    auto_detect_python()
}

fn verified(python: &str, origin: &str) -> Result<PathBuf> {
    if is_executable(Path::new(python)) {
        return Ok(PathBuf::from(python));
    }
    // Bare names like "python3.11" are resolved through PATH
    if !python.contains(std::path::MAIN_SEPARATOR) {
        if let Some(found) = find_in_path(python) {
            return Ok(found);
        }
    }
    Err(Error::Config(format!(
        "Python interpreter from {} not found or not executable: {}",
        origin, python
    )))
}

/// Get python from user config if available
fn get_user_config_python() -> Result<Option<String>> {
    use crate::project::user_config::load_user_config;

    Ok(load_user_config()?.and_then(|config| config.python))
}

fn auto_detect_python() -> Result<PathBuf> {
    for name in INTERPRETER_NAMES {
        if let Some(path) = find_in_path(name) {
            return Ok(path);
        }
    }

    Err(Error::Config(
        "Python interpreter not found. Tried:\n\
         - The install target's bin/python\n\
         - PATH search for: python3, python\n\n\
         Fix: create the virtual environment, set LADDER_PYTHON, or use --python"
            .to_string(),
    ))
}

/// Find binary in PATH
pub fn find_in_path(binary_name: &str) -> Option<PathBuf> {
    // Use `which` command on Unix, `where` on Windows
    #[cfg(not(target_os = "windows"))]
    let which_cmd = "which";
    #[cfg(target_os = "windows")]
    let which_cmd = "where";

    let output = Command::new(which_cmd).arg(binary_name).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let stdout = String::from_utf8(output.stdout).ok()?;
    let path = stdout.lines().next()?.trim();
    if !path.is_empty() && Path::new(path).is_file() {
        Some(PathBuf::from(path))
    } else {
        None
    }
}

/// Check that a path is an executable file
pub fn is_executable(path: &Path) -> bool {
    if !path.is_file() {
        return false;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        path.metadata()
            .map(|m| m.permissions().mode() & 0o111 != 0)
            .unwrap_or(false)
    }

    #[cfg(not(unix))]
    {
        true
    }
}
