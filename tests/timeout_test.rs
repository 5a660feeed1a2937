//! Integration tests for per-strategy timeouts
//!
//! A shell script that hangs stands in for pip, so the real subprocess
//! watchdog has to kill it and the ladder has to move on.

#![cfg(unix)]

use ladder_cli::error::FailureKind;
use ladder_cli::ladder::toolchain::NoToolchain;
use ladder_cli::ladder::{DependencyInstaller, PackageSpec, Strategy};
use ladder_cli::packages::PipRepository;
use serial_test::serial;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// pip hangs for everything except version 1.9
const HANGING_PIP: &str = r#"#!/bin/sh
for a in "$@"; do last="$a"; done
case "$last" in
  *==1.9) exit 0 ;;
esac
sleep 30 &
sleep 30
"#;

fn write_script(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("python3");
    fs::write(&path, body).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn imports(_: &PackageSpec) -> Result<String, String> {
    Ok("1.9".to_string())
}

#[test]
#[serial]
fn test_hung_strategy_is_killed_and_ladder_continues() {
    let temp = TempDir::new().unwrap();
    let python = write_script(temp.path(), HANGING_PIP);
    let repo = PipRepository::new(&python);
    let spec = PackageSpec::new("slowpkg").with_pinned_versions(["2.0", "1.9"]);
    let ladder = vec![
        Strategy::PinnedSource {
            version: "2.0".to_string(),
        },
        Strategy::PinnedSource {
            version: "1.9".to_string(),
        },
    ];

    let start = Instant::now();
    let result = DependencyInstaller::new(&repo, &NoToolchain, &imports)
        .with_timeout(Duration::from_secs(1))
        .install(&spec, &ladder);
    let elapsed = start.elapsed();

    assert!(result.verified);
    assert_eq!(result.chosen_strategy.as_deref(), Some("pinned-source@1.9"));

    let hung = &result.attempted_strategies[0];
    assert_eq!(hung.failure, Some(FailureKind::StrategyFailed));
    assert_eq!(hung.error_detail.as_deref(), Some("timed out after 1s"));
    assert!(hung.duration >= Duration::from_secs(1));

    // Killed well before the 30s sleep; the background sleep must not hold us either
    assert!(elapsed < Duration::from_secs(15), "took {:?}", elapsed);
}

#[test]
#[serial]
fn test_every_rung_timing_out_exhausts_the_ladder() {
    let temp = TempDir::new().unwrap();
    let python = write_script(temp.path(), "#!/bin/sh\nsleep 30\n");
    let repo = PipRepository::new(&python);
    let spec = PackageSpec::new("slowpkg");

    let result = DependencyInstaller::new(&repo, &NoToolchain, &imports)
        .with_timeout(Duration::from_millis(500))
        .install(&spec, &[Strategy::PrebuiltBinary, Strategy::CompiledSource]);

    assert!(!result.verified);
    assert_eq!(result.attempted_strategies.len(), 2);
    assert_eq!(
        result.attempted_strategies[0].failure,
        Some(FailureKind::StrategyFailed)
    );
    // No toolchain: the source rung is skipped without running pip
    assert_eq!(
        result.attempted_strategies[1].failure,
        Some(FailureKind::ToolchainUnavailable)
    );
}
