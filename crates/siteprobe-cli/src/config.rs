//! CLI configuration

use crate::output::OutputFormat;
use serde::{Deserialize, Serialize};
use siteprobe::BrowserConfig;
use std::path::PathBuf;

/// CLI verbosity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Verbosity {
    /// Quiet - failures and the summary only
    Quiet,
    /// Normal - default output
    #[default]
    Normal,
    /// Verbose - run log lines on the console
    Verbose,
    /// Debug - driver traffic too
    Debug,
}

impl Verbosity {
    /// Build from `-q` and the number of `-v` flags
    #[must_use]
    pub const fn from_flags(quiet: bool, verbose: u8) -> Self {
        if quiet {
            return Self::Quiet;
        }
        match verbose {
            0 => Self::Normal,
            1 => Self::Verbose,
            _ => Self::Debug,
        }
    }

    /// Check if quiet mode
    #[must_use]
    pub const fn is_quiet(self) -> bool {
        matches!(self, Self::Quiet)
    }

    /// Check if verbose or higher
    #[must_use]
    pub const fn is_verbose(self) -> bool {
        matches!(self, Self::Verbose | Self::Debug)
    }

    /// Default `tracing` filter directive for this level
    #[must_use]
    pub const fn filter_directive(self) -> &'static str {
        match self {
            Self::Quiet => "error",
            Self::Normal => "warn",
            Self::Verbose => "siteprobe=info,siteprobe_cli=info,warn",
            Self::Debug => "siteprobe=debug,siteprobe_cli=debug,info",
        }
    }
}

/// Color output choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ColorChoice {
    /// Always use colors
    Always,
    /// Use colors when output is a terminal
    #[default]
    Auto,
    /// Never use colors
    Never,
}

impl ColorChoice {
    /// Should use colors based on output detection
    #[must_use]
    pub fn should_color(self) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::Auto => std::io::IsTerminal::is_terminal(&std::io::stderr()),
        }
    }
}

/// CLI configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    /// Verbosity level
    pub verbosity: Verbosity,
    /// Color output choice
    pub color: ColorChoice,
    /// Suite file
    pub suite_file: PathBuf,
    /// Run log directory
    pub logs_dir: PathBuf,
    /// Screenshot root directory
    pub screenshots_dir: PathBuf,
    /// Force headless (overrides the suite file)
    pub headless: Option<bool>,
    /// Chromium binary
    pub chromium_path: Option<String>,
    /// Disable the Chromium sandbox
    pub no_sandbox: bool,
    /// One browser for all suites
    pub shared_browser: bool,
    /// Result format on stdout
    pub format: OutputFormat,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            verbosity: Verbosity::Normal,
            color: ColorChoice::Auto,
            suite_file: PathBuf::from("suites/studyleo.yaml"),
            logs_dir: PathBuf::from("logs"),
            screenshots_dir: PathBuf::from("screenshots"),
            headless: None,
            chromium_path: None,
            no_sandbox: false,
            shared_browser: false,
            format: OutputFormat::Text,
        }
    }
}

impl CliConfig {
    /// Create new default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set verbosity
    #[must_use]
    pub const fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Set color choice
    #[must_use]
    pub const fn with_color(mut self, color: ColorChoice) -> Self {
        self.color = color;
        self
    }

    /// Set the suite file
    #[must_use]
    pub fn with_suite_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.suite_file = path.into();
        self
    }

    /// Apply CLI browser overrides on top of a configuration from the suite file
    #[must_use]
    pub fn apply_browser(&self, mut browser: BrowserConfig) -> BrowserConfig {
        if let Some(headless) = self.headless {
            browser = browser.with_headless(headless);
        }
        if let Some(path) = &self.chromium_path {
            browser = browser.with_chromium_path(path.clone());
        }
        if self.no_sandbox {
            browser = browser.with_no_sandbox();
        }
        browser
    }
}
