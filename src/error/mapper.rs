//! Error to exit code mapping
//!
//! Implements the stable exit code contract of the `ladder` binary.

use super::Error;

/// Verified install
pub const EXIT_SUCCESS: i32 = 0;
/// Ladder exhausted without a verified install
pub const EXIT_EXHAUSTED: i32 = 1;
/// Invalid configuration or arguments
pub const EXIT_CONFIG: i32 = 2;
/// Install target locked by another run
pub const EXIT_TARGET_BUSY: i32 = 3;
/// ladder itself failed (IO, serialization, spawning)
pub const EXIT_INTERNAL: i32 = 5;
/// Interrupted by SIGINT or SIGTERM (128 + SIGINT)
pub const EXIT_INTERRUPTED: i32 = 130;

/// Map an Error to an exit code
///
/// # Exit Code Contract (NEVER BREAK)
///
/// | Code | Meaning | Usage |
/// |------|---------|-------|
/// | 0 | Success | Package installed and verified |
/// | 1 | Exhausted | Every strategy failed, or verify/doctor found a problem |
/// | 2 | Config error | Bad ladder.toml, unknown strategy, no interpreter |
/// | 3 | Target busy | Another run holds the install target lock |
/// | 5 | Internal error | ladder itself failed |
/// | 130 | Interrupted | Ctrl-C or SIGTERM during a run |
///
/// # Examples
///
/// ```
/// use ladder_cli::error::Error;
/// use ladder_cli::error::mapper::error_to_exit_code;
///
/// let err = Error::Config("unknown strategy".to_string());
/// assert_eq!(error_to_exit_code(&err), 2);
/// ```
pub fn error_to_exit_code(error: &Error) -> i32 {
    match error {
        Error::AllStrategiesExhausted { .. } | Error::CheckFailed(_) => EXIT_EXHAUSTED,
        Error::Config(_) | Error::Toml(_) => EXIT_CONFIG,
        Error::TargetBusy { .. } => EXIT_TARGET_BUSY,
        Error::Io(_) | Error::Json(_) | Error::Execution(_) => EXIT_INTERNAL,
        Error::Interrupted => EXIT_INTERRUPTED,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhausted_mapping() {
        let err = Error::AllStrategiesExhausted {
            package: "aiohttp".to_string(),
            attempts: 3,
        };
        assert_eq!(error_to_exit_code(&err), 1);
    }

    #[test]
    fn test_config_mapping() {
        let err = Error::Config("bad".to_string());
        assert_eq!(error_to_exit_code(&err), 2);
    }

    #[test]
    fn test_target_busy_mapping() {
        let err = Error::TargetBusy {
            path: "/srv/app/.venv".to_string(),
            holder: "4242".to_string(),
        };
        assert_eq!(error_to_exit_code(&err), 3);
    }

    #[test]
    fn test_interrupted_mapping() {
        assert_eq!(error_to_exit_code(&Error::Interrupted), 130);
    }

    #[test]
    fn test_io_mapping() {
        let err = Error::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk"));
        assert_eq!(error_to_exit_code(&err), 5);
    }
}
