use clap::error::{ContextKind, ContextValue, ErrorKind};
use clap::{Parser, Subcommand};
use ladder_cli::cli;
use ladder_cli::error::mapper::error_to_exit_code;
use ladder_cli::executor::runner;
use ladder_cli::utils::logging;
use std::process;

#[derive(Parser)]
#[command(name = "ladder")]
#[command(version)]
#[command(about = "Install Python dependencies with native extensions, falling back until one works")]
#[command(
    long_about = "ladder installs a Python package by trying an ordered list of strategies \
(prebuilt wheels, pinned source versions, a source-only build, dependencies one by one) \
and verifies every install by importing the package."
)]
#[command(after_help = "\
Getting started:
  ladder doctor                  Check interpreter, pip and toolchain
  ladder plan aiohttp            Show the strategies that would run
  ladder install aiohttp         Install with fallback and verification
  ladder verify aiohttp          Check that the package imports

Exit codes: 0 installed, 1 exhausted, 2 config error, 3 target busy, 5 internal error, 130 interrupted")]
struct Cli {
    /// More diagnostics on stderr (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install a package, walking the fallback ladder
    #[command(display_order = 1)]
    Install(cli::install::InstallArgs),
    /// Show the ladder for a package without running it
    #[command(display_order = 2)]
    Plan(cli::plan::PlanArgs),
    /// Run only the verification probe
    #[command(display_order = 3)]
    Verify(cli::verify::VerifyArgs),
    /// Check system readiness for source builds and installs
    #[command(display_order = 10)]
    Doctor(cli::doctor::DoctorArgs),
}

/// Handle clap parse errors with custom suggestions for common mistakes
fn handle_parse_error(mut err: clap::Error) -> ! {
    match err.kind() {
        ErrorKind::UnknownArgument => {
            if let Some(ContextValue::String(arg)) = err.get(ContextKind::InvalidArg) {
                let suggestions = match arg.as_str() {
                    // pip habits
                    "--no-binary" | "--only-binary" => Some(vec![
                        "use '--strategy' to choose rungs: ladder install pkg --strategy compiled-source".into(),
                    ]),
                    "--version-pin" | "--versions" => Some(vec![
                        "use '--pin' once per version: ladder install pkg --pin 2.0 --pin 1.9".into(),
                    ]),
                    _ => None,
                };
                if let Some(suggestions) = suggestions {
                    err.insert(
                        ContextKind::Suggested,
                        ContextValue::StyledStrs(suggestions),
                    );
                }
            }
        }
        ErrorKind::InvalidSubcommand => {
            if let Some(ContextValue::String(cmd)) = err.get(ContextKind::InvalidSubcommand) {
                let suggestions = match cmd.as_str() {
                    "add" | "i" => Some(vec![
                        "use 'ladder install' to install a package: ladder install aiohttp".into(),
                    ]),
                    "check" | "test" => Some(vec![
                        "use 'ladder verify' to check a package imports: ladder verify aiohttp".into(),
                        "use 'ladder doctor' to check the system: ladder doctor".into(),
                    ]),
                    _ => None,
                };
                if let Some(suggestions) = suggestions {
                    err.insert(
                        ContextKind::Suggested,
                        ContextValue::StyledStrs(suggestions),
                    );
                }
            }
        }
        _ => {}
    }
    // clap exits 2 on usage errors, matching the config-error exit code
    err.exit()
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => handle_parse_error(e),
    };

    logging::init(cli.verbose, cli.quiet);
    if let Err(e) = runner::install_interrupt_handler() {
        tracing::warn!("{}", e);
    }

    let result = match &cli.command {
        Commands::Install(args) => cli::install::execute(args),
        Commands::Plan(args) => cli::plan::execute(args),
        Commands::Verify(args) => cli::verify::execute(args),
        Commands::Doctor(args) => cli::doctor::execute(args),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(error_to_exit_code(&e));
    }
}
