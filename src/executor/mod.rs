//! Subprocess execution for installer, toolchain and probe commands

pub mod python;
pub mod runner;

pub use runner::{run_command, CommandOutput, CommandSpec};
