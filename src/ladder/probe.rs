//! Verification probes
//!
//! A probe decides whether a nominally successful install is actually usable.
//! The installer knows nothing about package internals; it only calls the
//! probe supplied for the package.

use crate::executor::{run_command, CommandSpec};
use crate::ladder::{is_module_name, PackageSpec};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Load-and-sanity-check callback for one package
pub trait VerificationProbe {
    /// `Ok` carries the version the package reports (possibly empty)
    fn verify(&self, spec: &PackageSpec, timeout: Duration) -> Result<String, String>;
}

impl<F> VerificationProbe for F
where
    F: Fn(&PackageSpec) -> Result<String, String>,
{
    fn verify(&self, spec: &PackageSpec, _timeout: Duration) -> Result<String, String> {
        self(spec)
    }
}

/// Imports the module in the target interpreter and reads its version
///
/// Importing is what catches a C extension that was installed but cannot be
/// loaded (missing shared library, ABI mismatch, half-written build).
#[derive(Debug, Clone)]
pub struct ImportProbe {
    python: PathBuf,
    /// Prepended to PYTHONPATH when packages live in a `--target` directory
    site_dir: Option<PathBuf>,
    /// Extra statements run after the import, e.g. `aiohttp.ClientSession`
    check: Option<String>,
}

impl ImportProbe {
    pub fn new(python: impl Into<PathBuf>) -> Self {
        Self {
            python: python.into(),
            site_dir: None,
            check: None,
        }
    }

    pub fn with_site_dir(mut self, dir: &Path) -> Self {
        self.site_dir = Some(dir.to_path_buf());
        self
    }

    pub fn with_check(mut self, check: impl Into<String>) -> Self {
        self.check = Some(check.into());
        self
    }

    /// Python source executed by the probe
    pub fn script_for(&self, module: &str) -> String {
        let top = module.split('.').next().unwrap_or(module);
        let mut script = format!("import importlib\nm = importlib.import_module('{}')\n", module);
        if let Some(check) = &self.check {
            script.push_str(&format!("import {}\n{}\n", top, check));
        }
        script.push_str(&format!(
            "import sys\ntop = sys.modules['{}']\nprint(getattr(top, '__version__', '') or getattr(m, '__version__', ''))\n",
            top
        ));
        script
    }
}

impl VerificationProbe for ImportProbe {
    fn verify(&self, spec: &PackageSpec, timeout: Duration) -> Result<String, String> {
        let module = spec.module_name();
        if !is_module_name(&module) {
            return Err(format!("'{}' is not an importable module name", module));
        }
        let mut cmd = CommandSpec::new(&self.python)
            .arg("-c")
            .arg(self.script_for(&module))
            .with_timeout(timeout);

        if let Some(dir) = &self.site_dir {
            let mut path = dir.display().to_string();
            if let Ok(existing) = std::env::var("PYTHONPATH") {
                if !existing.is_empty() {
                    path.push(if cfg!(windows) { ';' } else { ':' });
                    path.push_str(&existing);
                }
            }
            cmd = cmd.env("PYTHONPATH", path);
        }

        let output = run_command(&cmd).map_err(|e| format!("could not run probe: {}", e))?;
        if output.timed_out {
            return Err(format!("import of {} timed out", module));
        }
        if !output.success() {
            // The last traceback line is the exception, which is all a human needs
            let reason = output
                .stderr
                .lines()
                .rev()
                .find(|l| !l.trim().is_empty())
                .unwrap_or("import failed")
                .trim()
                .to_string();
            return Err(reason);
        }

        Ok(output.stdout.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_probe() {
        let probe = |spec: &PackageSpec| -> Result<String, String> {
            if spec.name == "ok" {
                Ok("1.0".to_string())
            } else {
                Err("ImportError".to_string())
            }
        };
        assert_eq!(
            probe.verify(&PackageSpec::new("ok"), Duration::from_secs(1)),
            Ok("1.0".to_string())
        );
        assert!(probe
            .verify(&PackageSpec::new("broken"), Duration::from_secs(1))
            .is_err());
    }

    #[test]
    fn test_script_imports_submodule_and_reads_top_version() {
        let probe = ImportProbe::new("python3").with_check("aiohttp.ClientSession");
        let script = probe.script_for("aiohttp.web");
        assert!(script.contains("import_module('aiohttp.web')"));
        assert!(script.contains("import aiohttp\naiohttp.ClientSession"));
        assert!(script.contains("sys.modules['aiohttp']"));
    }

    #[test]
    fn test_invalid_module_name_never_reaches_python() {
        let probe = ImportProbe::new("/nonexistent/python");
        let err = probe
            .verify(
                &PackageSpec::new("x").with_module("x'"),
                Duration::from_secs(1),
            )
            .unwrap_err();
        assert!(err.contains("not an importable module name"), "{}", err);
    }

    #[cfg(unix)]
    fn fake_python(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join("python");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[test]
    fn test_import_probe_reports_version() {
        let temp = tempfile::TempDir::new().unwrap();
        let python = fake_python(temp.path(), "echo 3.9.1");
        let probe = ImportProbe::new(python);
        assert_eq!(
            probe.verify(&PackageSpec::new("aiohttp"), Duration::from_secs(10)),
            Ok("3.9.1".to_string())
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_import_probe_returns_last_traceback_line() {
        let temp = tempfile::TempDir::new().unwrap();
        let python = fake_python(
            temp.path(),
            "echo 'Traceback (most recent call last):' >&2\n\
             echo \"ImportError: libssl.so.1.1: cannot open shared object file\" >&2\n\
             exit 1",
        );
        let err = ImportProbe::new(python)
            .verify(&PackageSpec::new("aiohttp"), Duration::from_secs(10))
            .unwrap_err();
        assert!(err.starts_with("ImportError: libssl"), "{}", err);
    }

    #[cfg(unix)]
    #[test]
    fn test_import_probe_sets_pythonpath_for_site_dir() {
        let temp = tempfile::TempDir::new().unwrap();
        let python = fake_python(temp.path(), "printf '%s' \"$PYTHONPATH\" | cut -d: -f1");
        let site = temp.path().join("site");
        let version = ImportProbe::new(python)
            .with_site_dir(&site)
            .verify(&PackageSpec::new("x"), Duration::from_secs(10))
            .unwrap();
        assert_eq!(version, site.display().to_string());
    }
}
