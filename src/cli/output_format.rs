//! Output format handling for CLI commands

use clap::ValueEnum;

/// Output format for CLI commands
///
/// - `Human`: Colored, human-readable output (default)
/// - `Json`: Machine-readable JSON output for deployment scripts
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable colored output (default)
    #[default]
    Human,
    /// Machine-readable JSON output
    Json,
}

impl OutputFormat {
    /// Returns true if this format should suppress human-friendly messages
    pub fn is_machine_readable(&self) -> bool {
        matches!(self, OutputFormat::Json)
    }
}
