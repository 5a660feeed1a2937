//! Native build toolchain detection
//!
//! A source build of a C-extension package needs a C compiler and the
//! interpreter's development headers (`Python.h`). Both are checked before a
//! compiled-source rung runs so that a missing `build-essential` or
//! `python3-dev` is reported as such instead of as a wall of pip output.

use crate::executor::python::{find_in_path, is_executable};
use crate::executor::{run_command, CommandSpec};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Compilers searched on PATH when `$CC` is not set
const COMPILER_NAMES: &[&str] = &["cc", "gcc", "clang"];

/// Time allowed for asking the interpreter where its headers live
const HEADER_QUERY_TIMEOUT: Duration = Duration::from_secs(30);

/// A usable native toolchain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolchainInfo {
    pub compiler: PathBuf,
    /// Directory containing `Python.h`
    pub include_dir: PathBuf,
}

/// Compiler toolchain collaborator
pub trait Toolchain {
    /// Probe for a compiler and headers; `Err` explains what is missing
    fn check(&self) -> Result<ToolchainInfo, String>;
}

/// The host's compiler plus the target interpreter's headers
#[derive(Debug, Clone)]
pub struct SystemToolchain {
    python: PathBuf,
}

impl SystemToolchain {
    pub fn new(python: impl Into<PathBuf>) -> Self {
        Self {
            python: python.into(),
        }
    }

    fn find_compiler(&self) -> Option<PathBuf> {
        if let Ok(cc) = std::env::var("CC") {
            // $CC may carry flags ("gcc -m64"); the first word is the program
            if let Some(program) = cc.split_whitespace().next() {
                let path = Path::new(program);
                if is_executable(path) {
                    return Some(path.to_path_buf());
                }
                if let Some(found) = find_in_path(program) {
                    return Some(found);
                }
            }
        }

        COMPILER_NAMES.iter().find_map(|name| find_in_path(name))
    }

    fn find_include_dir(&self) -> Result<PathBuf, String> {
        let cmd = CommandSpec::new(&self.python)
            .args([
                "-c",
                "import sysconfig; print(sysconfig.get_paths()['include'])",
            ])
            .with_timeout(HEADER_QUERY_TIMEOUT);

        let output = run_command(&cmd).map_err(|e| {
            format!(
                "could not run {} to locate headers: {}",
                self.python.display(),
                e
            )
        })?;
        if !output.success() {
            return Err(format!(
                "{} could not report its include directory: {}",
                self.python.display(),
                output.tail(3)
            ));
        }

        let include_dir = PathBuf::from(output.stdout.trim());
        if include_dir.join("Python.h").is_file() {
            Ok(include_dir)
        } else {
            Err(format!(
                "Python.h not found in {} (install the python3-dev package)",
                include_dir.display()
            ))
        }
    }
}

impl Toolchain for SystemToolchain {
    fn check(&self) -> Result<ToolchainInfo, String> {
        let compiler = self
            .find_compiler()
            .ok_or_else(|| "no C compiler found ($CC, cc, gcc, clang); install build-essential".to_string())?;
        let include_dir = self.find_include_dir()?;

        Ok(ToolchainInfo {
            compiler,
            include_dir,
        })
    }
}

/// A toolchain that is known to be absent, for hosts that must never compile
#[derive(Debug, Clone, Default)]
pub struct NoToolchain;

impl Toolchain for NoToolchain {
    fn check(&self) -> Result<ToolchainInfo, String> {
        Err("source builds disabled".to_string())
    }
}
