//! Diagnostic logging to stderr
//!
//! Ladder transitions are emitted as `tracing` events. The default level is
//! `warn` so a plain run only shows probe failures and exhaustion; `-v` and
//! `-vv` widen it, `-q` narrows it, and `LADDER_LOG` overrides all of them
//! with an `EnvFilter` directive such as `ladder_cli::ladder=debug`.

use tracing_subscriber::EnvFilter;

/// Environment variable holding an `EnvFilter` directive
pub const LOG_ENV_VAR: &str = "LADDER_LOG";

/// Level directive for the given `-v` count and `-q` flag
pub fn level_for(verbose: u8, quiet: bool) -> &'static str {
    if quiet {
        return "error";
    }
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Install the global subscriber; later calls are no-ops
pub fn init(verbose: u8, quiet: bool) {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR)
        .unwrap_or_else(|_| EnvFilter::new(level_for(verbose, quiet)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .try_init();
}
