//! Suite execution for the `run` command
//!
//! Per-suite mode opens a fresh browser for every suite and closes it when
//! the suite ends. Shared mode opens one browser, runs the suites one after
//! another on it and closes it once at the end.

use crate::error::{CliError, CliResult};
use crate::output::ProgressReporter;
use serde::{Deserialize, Serialize};
use siteprobe::{BrowserConfig, ProbeResult, Session, SuiteReport, SuiteRunner, SuiteSpec, WaitPolicy};
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Reports of a whole run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// One report per suite, in run order
    pub reports: Vec<SuiteReport>,
    /// Wall time of the run in milliseconds
    pub duration_ms: u64,
}

impl RunSummary {
    /// Wall time of the run
    #[must_use]
    pub const fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    /// Whether every suite passed
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.reports.iter().all(SuiteReport::is_success)
    }
}

/// What to run and how
#[derive(Debug)]
pub struct RunPlan<'a> {
    /// Suites in run order
    pub suites: Vec<&'a SuiteSpec>,
    /// Suite runner (screenshot and log locations)
    pub runner: SuiteRunner,
    /// Wait policy for every session
    pub waits: WaitPolicy,
    /// One browser for all suites
    pub shared: bool,
}

impl RunPlan<'_> {
    /// Run the plan, opening sessions with `open`
    ///
    /// Fails only when a browser cannot be opened; failed scenarios end up in
    /// the reports.
    pub async fn execute<F, Fut>(
        &self,
        mut open: F,
        reporter: &ProgressReporter,
    ) -> CliResult<RunSummary>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ProbeResult<Session>>,
    {
        let started = Instant::now();
        let mut reports = Vec::with_capacity(self.suites.len());

        if self.shared {
            let mut session = open().await.map_err(CliError::Launch)?.with_waits(self.waits);
            info!(suites = self.suites.len(), "running suites on a shared browser");
            for suite in &self.suites {
                reports.push(self.run_one(suite, &mut session, reporter).await);
            }
            close(&mut session).await;
        } else {
            for suite in &self.suites {
                let mut session = open().await.map_err(CliError::Launch)?.with_waits(self.waits);
                reports.push(self.run_one(suite, &mut session, reporter).await);
                close(&mut session).await;
            }
        }

        Ok(RunSummary {
            reports,
            duration_ms: started.elapsed().as_millis() as u64,
        })
    }

    async fn run_one(
        &self,
        suite: &SuiteSpec,
        session: &mut Session,
        reporter: &ProgressReporter,
    ) -> SuiteReport {
        reporter.set_message(&suite.name);
        reporter.header(&suite.name);
        let report = self.runner.run(suite, session).await;
        reporter.suite_results(&report);
        if let Some(path) = &report.log_file {
            reporter.info(&format!("Log: {}", path.display()));
        }
        reporter.increment(1);
        report
    }
}

async fn close(session: &mut Session) {
    if let Err(e) = session.close().await {
        warn!(error = %e, "browser close failed");
    }
}

/// Launch a Chromium session
#[cfg(feature = "browser")]
pub async fn launch_session(config: BrowserConfig) -> ProbeResult<Session> {
    Session::launch(&config).await
}

/// Launch a Chromium session
#[cfg(not(feature = "browser"))]
pub async fn launch_session(_config: BrowserConfig) -> ProbeResult<Session> {
    Err(siteprobe::ProbeError::BrowserLaunch {
        message: "siteprobe was built without the `browser` feature".to_string(),
    })
}
