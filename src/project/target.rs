//! Install target handle and caller-side exclusive lock
//!
//! An install target is a virtual environment directory. The installer only
//! ever receives it explicitly; nothing depends on which environment happens
//! to be activated in the invoking shell.

use crate::error::{Error, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Lock file created inside the target while a ladder runs against it
pub const LOCK_FILE_NAME: &str = ".ladder.lock";

/// A virtual environment (or bare package directory) that packages are installed into
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallTarget {
    root: PathBuf,
}

/// A distribution found in the target's site-packages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledDistribution {
    pub name: String,
    pub version: String,
}

impl InstallTarget {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn exists(&self) -> bool {
        self.root.is_dir()
    }

    /// The target's own interpreter, if it is a virtual environment
    pub fn interpreter(&self) -> Option<PathBuf> {
        let candidates = if cfg!(windows) {
            vec![self.root.join("Scripts").join("python.exe")]
        } else {
            vec![
                self.root.join("bin").join("python"),
                self.root.join("bin").join("python3"),
            ]
        };
        candidates.into_iter().find(|p| p.is_file())
    }

    /// Whether `pyvenv.cfg` marks this directory as a virtual environment
    pub fn is_virtualenv(&self) -> bool {
        self.root.join("pyvenv.cfg").is_file()
    }

    /// Scan `*.dist-info` directories under the target
    ///
    /// Only the directory names are read (`{name}-{version}.dist-info`), which
    /// is enough for diagnostics; the verification probe is the source of
    /// truth for whether a package actually works.
    pub fn installed_distributions(&self) -> Vec<InstalledDistribution> {
        let mut found = Vec::new();
        if !self.exists() {
            return found;
        }

        for entry in WalkDir::new(&self.root)
            .max_depth(5)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_dir())
        {
            let name = entry.file_name().to_string_lossy();
            if let Some(stem) = name.strip_suffix(".dist-info") {
                if let Some((dist, version)) = stem.rsplit_once('-') {
                    found.push(InstalledDistribution {
                        name: normalize_name(dist),
                        version: version.to_string(),
                    });
                }
            }
        }

        found.sort_by(|a, b| a.name.cmp(&b.name));
        found
    }

    /// Installed version of one distribution, by normalized name
    pub fn installed_version(&self, name: &str) -> Option<String> {
        let wanted = normalize_name(name);
        self.installed_distributions()
            .into_iter()
            .find(|d| d.name == wanted)
            .map(|d| d.version)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.root.join(LOCK_FILE_NAME)
    }
}

/// PEP 503 name normalization: lowercase, runs of `-_.` collapse to `-`
pub fn normalize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_sep = false;
    for c in name.chars() {
        if matches!(c, '-' | '_' | '.') {
            if !last_sep {
                out.push('-');
            }
            last_sep = true;
        } else {
            out.extend(c.to_lowercase());
            last_sep = false;
        }
    }
    out
}

/// Exclusive lock on an install target, released on drop
///
/// The ladder mutates the target in place, so two runs against the same
/// environment must never overlap. The lock is an OS advisory lock on
/// `.ladder.lock`, so it also goes away when the holder is killed; the pid
/// written into the file is only there for error messages.
#[derive(Debug)]
pub struct TargetLock {
    // Closing the descriptor releases the lock
    #[allow(dead_code)]
    file: File,
    path: PathBuf,
}

impl TargetLock {
    /// Acquire the lock, failing with `TargetBusy` if another run holds it
    pub fn acquire(target: &InstallTarget) -> Result<Self> {
        fs::create_dir_all(target.root()).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to create install target {}: {}",
                    target.root().display(),
                    e
                ),
            ))
        })?;

        let path = target.lock_path();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                file.set_len(0)?;
                writeln!(file, "{}", std::process::id())?;
                file.flush()?;
                Ok(Self { file, path })
            }
            Err(e) if is_contended(&e) => Err(Error::TargetBusy {
                path: target.root().display().to_string(),
                holder: read_holder(&path),
            }),
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// Pid of the run holding the target's lock, or `None` if it is free
    ///
    /// A lock file left behind by a killed run is not held.
    pub fn holder(target: &InstallTarget) -> Result<Option<String>> {
        let path = target.lock_path();
        let file = match OpenOptions::new().read(true).write(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::Io(e)),
        };

        match file.try_lock_exclusive() {
            Ok(()) => {
                file.unlock()?;
                Ok(None)
            }
            Err(e) if is_contended(&e) => Ok(Some(read_holder(&path))),
            Err(e) => Err(Error::Io(e)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn is_contended(err: &std::io::Error) -> bool {
    err.kind() == std::io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

fn read_holder(path: &Path) -> String {
    fs::read_to_string(path)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}
