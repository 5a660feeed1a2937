//! `ladder plan` command implementation
//!
//! Shows the rungs `ladder install` would try, in order, without running them.

use crate::cli::context::{CommandContext, TargetArgs};
use crate::cli::install::{resolve_package, PackageArgs};
use crate::cli::output_format::OutputFormat;
use crate::cli::output_types::{CommandOutput, PlanOutput, PlannedRung};
use crate::error::Result;
use clap::Args;
use colored::Colorize;

#[derive(Args)]
#[command(after_help = "\
Examples:
  ladder plan aiohttp                     Show the configured ladder
  ladder plan aiohttp --pin 3.8.6         Show the ladder with a different pin")]
pub struct PlanArgs {
    /// Package (distribution name)
    pub package: String,

    #[command(flatten)]
    pub package_args: PackageArgs,

    #[command(flatten)]
    pub common: TargetArgs,
}

pub fn execute(args: &PlanArgs) -> Result<()> {
    let ctx = CommandContext::prepare(&args.common)?;
    let resolved = resolve_package(&ctx, &args.package, &args.package_args)?;

    let output = PlanOutput {
        package: resolved.spec.name.clone(),
        module: resolved.spec.module_name(),
        target: ctx.target.root().to_path_buf(),
        timeout_secs: resolved.timeout.as_secs(),
        rungs: resolved
            .ladder
            .iter()
            .map(|strategy| PlannedRung {
                strategy: strategy.name(),
                kind: strategy.kind().as_str(),
                action: strategy.describe(&resolved.spec),
                needs_toolchain: strategy.needs_toolchain(),
            })
            .collect(),
    };

    match args.common.format {
        OutputFormat::Human => print_human_output(&output),
        OutputFormat::Json => println!("{}", output.to_json()),
    }

    Ok(())
}

fn print_human_output(output: &PlanOutput) {
    println!(
        "{} (import {}) into {}",
        output.package.bold(),
        output.module,
        output.target.display()
    );
    println!("Each strategy is limited to {}s", output.timeout_secs);
    println!();

    if output.rungs.is_empty() {
        println!("  No strategies apply; install would fail immediately.");
        return;
    }

    let width = output
        .rungs
        .iter()
        .map(|r| r.strategy.len())
        .max()
        .unwrap_or(0);
    for (i, rung) in output.rungs.iter().enumerate() {
        println!(
            "  {}. {:<width$}  {}",
            i + 1,
            rung.strategy.cyan(),
            rung.action,
            width = width
        );
    }
}
