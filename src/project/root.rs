//! Project root detection
//!
//! Walks up the directory tree looking for `ladder.toml`.

use crate::error::Result;
use std::path::{Path, PathBuf};

/// Project configuration file name
pub const CONFIG_FILE_NAME: &str = "ladder.toml";

/// Find project root by walking up from the given directory.
///
/// Returns the first directory containing `ladder.toml`, or None if no
/// project is found before the filesystem root.
pub fn find_project_root(start_dir: &Path) -> Result<Option<PathBuf>> {
    // Canonicalize the start directory to resolve symlinks and get absolute path
    let mut current = start_dir
        .canonicalize()
        .unwrap_or_else(|_| start_dir.to_path_buf());

    loop {
        if current.join(CONFIG_FILE_NAME).is_file() {
            return Ok(Some(current));
        }

        match current.parent() {
            Some(parent) if parent != current => current = parent.to_path_buf(),
            _ => break,
        }
    }

    Ok(None)
}
