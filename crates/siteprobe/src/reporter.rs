//! Run log and failure screenshots.
//!
//! Each suite keeps an ordered [`RunLog`] that is mirrored to the console via
//! `tracing` and written to `<Suite>_<yyyy-MM-dd_HH-mm-ss>.txt` when the suite
//! ends. Screenshots land in a per-run folder `<Suite>_<timestamp>/` as
//! `<LABEL>_<HHmmss>.png`. Failing to capture a screenshot is logged and never
//! fails the suite.

use crate::driver::PageDriver;
use crate::result::ProbeResult;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Timestamp format used in log and screenshot folder names
pub const RUN_TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Severity of a log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Progress
    Info,
    /// Soft failure or warning
    Warn,
}

/// One timestamped log line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    /// Wall-clock time (`HH:MM:SS`)
    pub time: String,
    /// Severity
    pub level: LogLevel,
    /// Message
    pub message: String,
}

impl LogLine {
    fn render(&self) -> String {
        match self.level {
            LogLevel::Info => format!("[{}] {}", self.time, self.message),
            LogLevel::Warn => format!("[{}] WARN {}", self.time, self.message),
        }
    }
}

/// Ordered log of one suite run
#[derive(Debug, Clone)]
pub struct RunLog {
    suite: String,
    started: DateTime<Local>,
    lines: Vec<LogLine>,
}

impl RunLog {
    /// Start a log for a suite
    #[must_use]
    pub fn new(suite: impl Into<String>) -> Self {
        Self::started_at(suite, Local::now())
    }

    /// Start a log with an explicit start time
    #[must_use]
    pub fn started_at(suite: impl Into<String>, started: DateTime<Local>) -> Self {
        Self {
            suite: suite.into(),
            started,
            lines: Vec::new(),
        }
    }

    /// Suite name
    #[must_use]
    pub fn suite(&self) -> &str {
        &self.suite
    }

    /// Run start time
    #[must_use]
    pub const fn started(&self) -> DateTime<Local> {
        self.started
    }

    fn push(&mut self, level: LogLevel, message: String) {
        self.lines.push(LogLine {
            time: Local::now().format("%H:%M:%S").to_string(),
            level,
            message,
        });
    }

    /// Append a progress line
    pub fn info(&mut self, message: impl Into<String>) {
        let message = message.into();
        info!(suite = %self.suite, "{message}");
        self.push(LogLevel::Info, message);
    }

    /// Append a warning line
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!(suite = %self.suite, "{message}");
        self.push(LogLevel::Warn, message);
    }

    /// Lines in order
    #[must_use]
    pub fn lines(&self) -> &[LogLine] {
        &self.lines
    }

    /// Whether any line contains `needle`
    #[must_use]
    pub fn contains(&self, needle: &str) -> bool {
        self.lines.iter().any(|l| l.message.contains(needle))
    }

    /// `<Suite>_<yyyy-MM-dd_HH-mm-ss>.txt`
    #[must_use]
    pub fn file_name(&self) -> String {
        format!(
            "{}_{}.txt",
            sanitize_label(&self.suite),
            self.started.format(RUN_TIMESTAMP_FORMAT)
        )
    }

    /// Write the log into `dir`, creating it if needed
    pub fn flush(&self, dir: &Path) -> ProbeResult<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(self.file_name());
        let mut body = String::new();
        for line in &self.lines {
            body.push_str(&line.render());
            body.push('\n');
        }
        fs::write(&path, body)?;
        Ok(path)
    }
}

/// Writes failure screenshots for one suite run
#[derive(Debug, Clone)]
pub struct ScreenshotSink {
    dir: PathBuf,
    captured: Vec<PathBuf>,
}

impl ScreenshotSink {
    /// Sink writing into `<root>/<Suite>_<timestamp>/`
    #[must_use]
    pub fn new(root: &Path, log: &RunLog) -> Self {
        let folder = format!(
            "{}_{}",
            sanitize_label(log.suite()),
            log.started().format(RUN_TIMESTAMP_FORMAT)
        );
        Self {
            dir: root.join(folder),
            captured: Vec::new(),
        }
    }

    /// Target folder
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of screenshots written
    #[must_use]
    pub fn count(&self) -> usize {
        self.captured.len()
    }

    /// Paths written so far
    #[must_use]
    pub fn captured(&self) -> &[PathBuf] {
        &self.captured
    }

    /// Capture the current page; failures are logged and yield `None`
    pub async fn capture(
        &mut self,
        driver: &dyn PageDriver,
        label: &str,
        log: &mut RunLog,
    ) -> Option<PathBuf> {
        match self.try_capture(driver, label).await {
            Ok(path) => {
                log.info(format!("Screenshot saved: {}", path.display()));
                self.captured.push(path.clone());
                Some(path)
            }
            Err(e) => {
                log.warn(format!("Screenshot '{label}' failed: {e}"));
                None
            }
        }
    }

    async fn try_capture(&self, driver: &dyn PageDriver, label: &str) -> ProbeResult<PathBuf> {
        let shot = driver.screenshot().await?;
        fs::create_dir_all(&self.dir)?;
        let stem = format!(
            "{}_{}",
            sanitize_label(label),
            Local::now().format("%H%M%S")
        );
        let mut path = self.dir.join(format!("{stem}.png"));
        let mut n = 2;
        while path.exists() {
            path = self.dir.join(format!("{stem}_{n}.png"));
            n += 1;
        }
        fs::write(&path, &shot.data)?;
        Ok(path)
    }
}

/// Replace every non-alphanumeric character with `_`
#[must_use]
pub fn sanitize_label(label: &str) -> String {
    label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}
