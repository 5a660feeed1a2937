//! Classification of pip failures
//!
//! pip exits with status 1 for nearly everything, so the category of a
//! failure has to be read from its output.

use crate::executor::CommandOutput;
use crate::packages::repository::RepoError;
use regex::Regex;

lazy_static::lazy_static! {
    /// Connection-level failures reported by pip/urllib3
    static ref NETWORK_PATTERN: Regex = Regex::new(
        r"(?i)(NewConnectionError|ConnectTimeoutError|ReadTimeoutError|Max retries exceeded|Connection (refused|reset|aborted)|Temporary failure in name resolution|Name or service not known|Network is unreachable|SSLError|ProxyError|HTTP error 5\d\d)"
    ).unwrap();

    /// Nothing on the index matches the platform / interpreter / constraints
    static ref NO_DISTRIBUTION_PATTERN: Regex = Regex::new(
        r"(?i)(No matching distribution found for|Could not find a version that satisfies the requirement)"
    ).unwrap();

    /// Native build failures, kept in the detail for a human to read
    static ref BUILD_FAILURE_PATTERN: Regex = Regex::new(
        r"(?im)^.*(Failed building wheel for \S+|error: command '[^']*' failed.*|fatal error: Python\.h: No such file or directory|Microsoft Visual C\+\+ [\d.]+ or greater is required).*$"
    ).unwrap();
}

/// Number of output lines kept in a failure detail
const DETAIL_LINES: usize = 6;

/// Turn a finished pip process into `Ok` or a categorized `RepoError`
pub fn classify_pip_output(output: &CommandOutput) -> Result<(), RepoError> {
    if output.timed_out {
        return Err(RepoError::TimedOut(output.duration));
    }
    if output.success() {
        return Ok(());
    }

    let text = output.combined();

    // Offline pip also prints "Could not find a version", so network wins
    if let Some(m) = NETWORK_PATTERN.find(&text) {
        return Err(RepoError::Network(m.as_str().to_string()));
    }

    if NO_DISTRIBUTION_PATTERN.is_match(&text) {
        let line = text
            .lines()
            .find(|l| NO_DISTRIBUTION_PATTERN.is_match(l))
            .unwrap_or_default()
            .trim()
            .trim_start_matches("ERROR: ")
            .to_string();
        return Err(RepoError::NoCompatibleDistribution(line));
    }

    let detail = match BUILD_FAILURE_PATTERN.find(&text) {
        Some(m) => m.as_str().trim().to_string(),
        None => output.tail(DETAIL_LINES),
    };

    Err(RepoError::Failed {
        exit_code: output.exit_code,
        detail,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn failed(stderr: &str) -> CommandOutput {
        CommandOutput {
            exit_code: 1,
            stdout: String::new(),
            stderr: stderr.to_string(),
            duration: Duration::from_secs(2),
            timed_out: false,
        }
    }

    #[test]
    fn test_success() {
        let mut output = failed("");
        output.exit_code = 0;
        assert_eq!(classify_pip_output(&output), Ok(()));
    }

    #[test]
    fn test_no_wheel_for_platform() {
        let output = failed(
            "ERROR: Could not find a version that satisfies the requirement aiohttp (from versions: none)\n\
             ERROR: No matching distribution found for aiohttp\n",
        );
        match classify_pip_output(&output) {
            Err(RepoError::NoCompatibleDistribution(line)) => {
                assert!(line.starts_with("Could not find a version"), "{}", line)
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_offline_is_network_not_missing_wheel() {
        let output = failed(
            "WARNING: Retrying (Retry(total=4)) after connection broken by \
             'NewConnectionError(...: Failed to establish a new connection: [Errno -3] \
             Temporary failure in name resolution')': /simple/aiohttp/\n\
             ERROR: Could not find a version that satisfies the requirement aiohttp (from versions: none)\n",
        );
        assert!(matches!(
            classify_pip_output(&output),
            Err(RepoError::Network(_))
        ));
    }

    #[test]
    fn test_build_failure_detail() {
        let mut output = failed("ERROR: Failed building wheel for multidict\nERROR: Could not build wheels\n");
        output.stdout = "  multidict/_multidict.c:1:10: fatal error: Python.h: No such file or directory\n".to_string();
        match classify_pip_output(&output) {
            Err(RepoError::Failed { exit_code, detail }) => {
                assert_eq!(exit_code, 1);
                assert!(detail.contains("Python.h"), "{}", detail);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_failure_keeps_tail() {
        let output = failed("something odd\nERROR: resolver gave up\n");
        match classify_pip_output(&output) {
            Err(RepoError::Failed { detail, .. }) => assert!(detail.contains("resolver gave up")),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_timeout() {
        let mut output = failed("");
        output.timed_out = true;
        output.exit_code = 143;
        assert!(matches!(
            classify_pip_output(&output),
            Err(RepoError::TimedOut(_))
        ));
    }
}
