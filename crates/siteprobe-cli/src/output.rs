//! Output formatting and progress reporting

use console::{style, Style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use siteprobe::{Outcome, SuiteReport, Tally};
use std::fmt::Write as _;
use std::time::Duration;

/// Output format for run results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON reports on stdout
    Json,
}

/// Progress reporter for suite execution
#[derive(Debug)]
pub struct ProgressReporter {
    term: Term,
    progress_bar: Option<ProgressBar>,
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new(true, false)
    }
}

impl ProgressReporter {
    /// Create a new progress reporter
    #[must_use]
    pub fn new(use_color: bool, quiet: bool) -> Self {
        Self {
            term: Term::stderr(),
            progress_bar: None,
            use_color,
            quiet,
        }
    }

    /// Start a progress bar over the selected suites
    pub fn start_progress(&mut self, total: u64, message: &str) {
        if self.quiet {
            return;
        }

        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        pb.set_message(message.to_string());
        self.progress_bar = Some(pb);
    }

    /// Increment progress
    pub fn increment(&self, delta: u64) {
        if let Some(ref pb) = self.progress_bar {
            pb.inc(delta);
        }
    }

    /// Update progress message
    pub fn set_message(&self, message: &str) {
        if let Some(ref pb) = self.progress_bar {
            pb.set_message(message.to_string());
        }
    }

    /// Finish progress bar
    pub fn finish(&self) {
        if let Some(ref pb) = self.progress_bar {
            pb.finish_and_clear();
        }
    }

    fn line(&self, line: &str) {
        match &self.progress_bar {
            Some(pb) if !pb.is_finished() => pb.println(line),
            _ => {
                let _ = self.term.write_line(line);
            }
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        if self.quiet {
            return;
        }
        let prefix = if self.use_color {
            style("✓").green().bold().to_string()
        } else {
            "PASS".to_string()
        };
        self.line(&format!("{prefix} {message}"));
    }

    /// Print a failure message
    pub fn failure(&self, message: &str) {
        // Failures print even in quiet mode
        let prefix = if self.use_color {
            style("✗").red().bold().to_string()
        } else {
            "FAIL".to_string()
        };
        self.line(&format!("{prefix} {message}"));
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.quiet {
            return;
        }
        let prefix = if self.use_color {
            style("⚠").yellow().bold().to_string()
        } else {
            "WARN".to_string()
        };
        self.line(&format!("{prefix} {message}"));
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if self.quiet {
            return;
        }
        let prefix = if self.use_color {
            style("ℹ").blue().bold().to_string()
        } else {
            "INFO".to_string()
        };
        self.line(&format!("{prefix} {message}"));
    }

    /// Print a section header
    pub fn header(&self, title: &str) {
        if self.quiet {
            return;
        }
        let styled = if self.use_color {
            style(title).bold().underlined().to_string()
        } else {
            format!("=== {title} ===")
        };
        self.line("");
        self.line(&styled);
    }

    /// Print every scenario of a finished suite
    pub fn suite_results(&self, report: &SuiteReport) {
        for result in &report.results {
            match &result.outcome {
                Outcome::Passed => self.success(&result.name),
                Outcome::PassedWithWarning(msg) => {
                    self.warning(&format!("{}: {msg}", result.name));
                }
                Outcome::Failed(msg) => self.failure(&format!("{}: {msg}", result.name)),
            }
        }
        if let Some(reason) = &report.aborted {
            self.failure(&format!("{} aborted: {reason}", report.name));
        }
    }

    /// Print the global summary table
    pub fn summary(&self, reports: &[SuiteReport], duration: Duration) {
        let failed = reports.iter().any(|r| !r.is_success());
        if self.quiet && !failed {
            return;
        }
        let table = render_summary(reports, duration);
        if self.use_color {
            let status = if failed {
                Style::new().red().bold().apply_to("FAILURES")
            } else {
                Style::new().green().bold().apply_to("ALL PASSED")
            };
            self.line("");
            self.line(&status.to_string());
        }
        for line in table.lines() {
            self.line(line);
        }
    }
}

/// Render the summary table (`TestClass  Total | Passed | Failed`)
#[must_use]
pub fn render_summary(reports: &[SuiteReport], duration: Duration) -> String {
    let mut out = String::new();
    let _ = writeln!(out);
    let _ = writeln!(out, "{:=<46}", "");
    let _ = writeln!(out, "{:<20} {:>7} | {:>7} | {:>7}", "TestClass", "Total", "Passed", "Failed");
    let _ = writeln!(out, "{:-<46}", "");

    let mut total = Tally::default();
    for report in reports {
        let t = report.tally;
        let _ = writeln!(
            out,
            "{:<20} {:>7} | {:>7} | {:>7}",
            truncate(&report.name, 20),
            t.total(),
            t.passed,
            t.failed
        );
        total.absorb(&t);
    }

    let _ = writeln!(out, "{:-<46}", "");
    let _ = writeln!(
        out,
        "{:<20} {:>7} | {:>7} | {:>7}",
        "TOTAL",
        total.total(),
        total.passed,
        total.failed
    );
    let _ = writeln!(out, "{:=<46}", "");
    let _ = writeln!(
        out,
        "Warnings: {}  Screenshots: {}  Success rate: {:.1}%",
        total.warnings,
        total.screenshots,
        total.success_rate()
    );
    let _ = writeln!(out, "Total duration: {:.1}s", duration.as_secs_f64());
    out
}

fn truncate(name: &str, max: usize) -> String {
    if name.chars().count() <= max {
        name.to_string()
    } else {
        name.chars().take(max).collect()
    }
}
