//! Resilient installation of native-extension Python dependencies.
//!
//! A package is installed by walking an ordered ladder of strategies until
//! one both installs it and passes a verification probe. The library exposes
//! the ladder with pluggable collaborators; the `ladder` binary wires it to
//! pip, the host toolchain and an import probe.

pub mod cli;
pub mod error;
pub mod executor;
pub mod ladder;
pub mod packages;
pub mod project;
pub mod utils;
