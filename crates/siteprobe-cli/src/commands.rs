//! CLI command definitions using clap

use crate::output::OutputFormat;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Siteprobe: browser regression suites for a public website
#[derive(Parser, Debug)]
#[command(name = "siteprobe")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (failures and the summary only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run suites against the live site
    Run(RunArgs),

    /// List the suites in a suite file
    List(FileArgs),

    /// Check a suite file without opening a browser
    Validate(FileArgs),
}

/// Suite file selection shared by every subcommand
#[derive(Parser, Debug, Clone)]
pub struct FileArgs {
    /// Suite file (YAML)
    #[arg(short, long, default_value = "suites/studyleo.yaml")]
    pub file: PathBuf,
}

/// Arguments for the run command
#[derive(Parser, Debug)]
#[allow(clippy::struct_excessive_bools)]
pub struct RunArgs {
    /// Suite file selection
    #[command(flatten)]
    pub file: FileArgs,

    /// Suite key to run (repeatable, case-insensitive)
    #[arg(short, long = "suite", value_name = "KEY")]
    pub suites: Vec<String>,

    /// Run every suite in the file
    #[arg(long, conflicts_with = "suites")]
    pub all: bool,

    /// Run all selected suites on one browser
    #[arg(long)]
    pub shared_browser: bool,

    /// Force headless mode
    #[arg(long, conflicts_with = "headed")]
    pub headless: bool,

    /// Force a visible browser window
    #[arg(long)]
    pub headed: bool,

    /// Chromium binary
    #[arg(long, value_name = "PATH")]
    pub chromium: Option<String>,

    /// Disable the Chromium sandbox (containers)
    #[arg(long)]
    pub no_sandbox: bool,

    /// Run log directory
    #[arg(long, default_value = "logs")]
    pub logs: PathBuf,

    /// Screenshot directory
    #[arg(long, default_value = "screenshots")]
    pub screenshots: PathBuf,

    /// Result format on stdout
    #[arg(long, default_value = "text")]
    pub format: FormatArg,
}

impl RunArgs {
    /// Headless override, if any
    #[must_use]
    pub const fn headless_override(&self) -> Option<bool> {
        if self.headless {
            Some(true)
        } else if self.headed {
            Some(false)
        } else {
            None
        }
    }

    /// Suite keys to select; empty means every suite
    #[must_use]
    pub fn selected_keys(&self) -> &[String] {
        if self.all {
            &[]
        } else {
            &self.suites
        }
    }
}

/// Color argument
#[derive(ValueEnum, Debug, Clone, Default)]
pub enum ColorArg {
    /// Automatic color detection
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for crate::config::ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}

/// Output format argument
#[derive(ValueEnum, Debug, Clone, Copy, Default)]
pub enum FormatArg {
    /// Progress lines and a summary table
    #[default]
    Text,
    /// One JSON document with every report
    Json,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Text => Self::Text,
            FormatArg::Json => Self::Json,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    fn run_args(args: &[&str]) -> RunArgs {
        let mut argv = vec!["siteprobe", "run"];
        argv.extend_from_slice(args);
        match Cli::parse_from(argv).command {
            Commands::Run(args) => args,
            other => panic!("expected Run command, got {other:?}"),
        }
    }

    mod cli_tests {
        use super::*;

        #[test]
        fn test_run_defaults() {
            let args = run_args(&[]);
            assert_eq!(args.file.file, PathBuf::from("suites/studyleo.yaml"));
            assert!(args.suites.is_empty());
            assert!(!args.shared_browser);
            assert_eq!(args.headless_override(), None);
            assert_eq!(args.logs, PathBuf::from("logs"));
            assert!(matches!(args.format, FormatArg::Text));
        }

        #[test]
        fn test_repeatable_suite() {
            let args = run_args(&["-s", "home", "--suite", "Blogs"]);
            assert_eq!(args.selected_keys(), ["home", "Blogs"]);
        }

        #[test]
        fn test_all_selects_everything() {
            let args = run_args(&["--all", "--shared-browser"]);
            assert!(args.selected_keys().is_empty());
            assert!(args.shared_browser);
        }

        #[test]
        fn test_all_conflicts_with_suite() {
            let parsed = Cli::try_parse_from(["siteprobe", "run", "--all", "-s", "home"]);
            assert!(parsed.is_err());
        }

        #[test]
        fn test_headless_flags() {
            assert_eq!(run_args(&["--headless"]).headless_override(), Some(true));
            assert_eq!(run_args(&["--headed"]).headless_override(), Some(false));
            assert!(Cli::try_parse_from(["siteprobe", "run", "--headless", "--headed"]).is_err());
        }

        #[test]
        fn test_global_flags() {
            let cli = Cli::parse_from(["siteprobe", "-vv", "--color", "never", "list"]);
            assert_eq!(cli.verbose, 2);
            assert!(matches!(cli.color, ColorArg::Never));
            assert!(matches!(cli.command, Commands::List(_)));
        }

        #[test]
        fn test_validate_with_file() {
            let cli = Cli::parse_from(["siteprobe", "validate", "-f", "other.yaml"]);
            match cli.command {
                Commands::Validate(args) => assert_eq!(args.file, PathBuf::from("other.yaml")),
                other => panic!("expected Validate, got {other:?}"),
            }
        }

        #[test]
        fn test_json_format() {
            let args = run_args(&["--format", "json"]);
            assert_eq!(OutputFormat::from(args.format), OutputFormat::Json);
        }
    }
}
