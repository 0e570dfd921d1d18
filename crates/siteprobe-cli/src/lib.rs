//! Siteprobe CLI library
//!
//! Argument parsing, configuration, suite execution and console output for
//! the `siteprobe` binary.

#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

mod commands;
mod config;
mod error;
pub mod logging;
mod output;
mod runner;

pub use commands::{Cli, ColorArg, Commands, FileArgs, FormatArg, RunArgs};
pub use config::{CliConfig, ColorChoice, Verbosity};
pub use error::{CliError, CliResult};
pub use output::{render_summary, OutputFormat, ProgressReporter};
pub use runner::{launch_session, RunPlan, RunSummary};
