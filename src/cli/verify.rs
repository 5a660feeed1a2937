//! `ladder verify` command implementation
//!
//! Runs only the verification probe against the install target. Useful as a
//! deployment health check and for telling "not installed" apart from
//! "installed but broken".

use crate::cli::context::{CommandContext, TargetArgs};
use crate::cli::output_format::OutputFormat;
use crate::cli::output_types::{CommandOutput, VerifyOutput};
use crate::error::{Error, Result};
use crate::executor::runner::interrupted;
use crate::ladder::installer::PROBE_TIMEOUT;
use crate::ladder::VerificationProbe;
use crate::utils::output::{print_error, print_success};
use clap::Args;

#[derive(Args)]
#[command(after_help = "\
Examples:
  ladder verify aiohttp
  ladder verify fyers-apiv3 --module fyers_apiv3")]
pub struct VerifyArgs {
    /// Package (distribution name)
    pub package: String,

    /// Import name, if different from the package name
    #[arg(long)]
    pub module: Option<String>,

    #[command(flatten)]
    pub common: TargetArgs,
}

pub fn execute(args: &VerifyArgs) -> Result<()> {
    let ctx = CommandContext::prepare(&args.common)?;

    let package_config = ctx.project.config.package(&args.package);
    let mut spec = package_config.to_spec(&args.package);
    if let Some(module) = &args.module {
        spec.module = Some(module.clone());
    }
    spec.check_module_name()?;

    let probe = ctx.probe(package_config.check.as_deref());
    let outcome = probe.verify(&spec, PROBE_TIMEOUT);
    if interrupted() {
        return Err(Error::Interrupted);
    }

    let output = VerifyOutput {
        package: spec.name.clone(),
        module: spec.module_name(),
        verified: outcome.is_ok(),
        version: outcome.as_ref().ok().filter(|v| !v.is_empty()).cloned(),
        error: outcome.as_ref().err().cloned(),
        installed_version: ctx.target.installed_version(&spec.name),
    };

    match args.common.format {
        OutputFormat::Human => {
            if output.verified {
                let version = output.version.as_deref().unwrap_or("unknown version");
                print_success(&format!("{} imports ({})", output.module, version));
            } else {
                print_error(&format!(
                    "{} does not import: {}",
                    output.module,
                    output.error.as_deref().unwrap_or("unknown error")
                ));
                if let Some(installed) = &output.installed_version {
                    eprintln!(
                        "  {} {} is installed in {} but cannot be loaded",
                        output.package,
                        installed,
                        ctx.target.root().display()
                    );
                }
            }
        }
        OutputFormat::Json => println!("{}", output.to_json()),
    }

    if output.verified {
        Ok(())
    } else {
        Err(Error::CheckFailed(format!(
            "{} is not importable from {}",
            output.module,
            ctx.target.root().display()
        )))
    }
}
