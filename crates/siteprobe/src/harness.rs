//! Suite and scenario execution.
//!
//! A [`SuiteRunner`] drives one [`SuiteSpec`] against a session:
//!
//! 1. open the start URL and run the setup steps,
//! 2. read the baseline (the suite aborts when it is unreadable),
//! 3. run every scenario, then every link sweep,
//! 4. write the summary and flush the run log.
//!
//! A scenario that raises an error is recorded as failed with a screenshot
//! and the suite moves on. Reset steps run after every scenario, whatever its
//! outcome.

use crate::browser::{duration_ms, Session, WaitPolicy};
use crate::driver::PageDriver;
use crate::observe::{Observable, Observation};
use crate::playbook::{Expectation, ScenarioSpec, SuiteSpec};
use crate::reporter::{RunLog, ScreenshotSink};
use crate::result::ProbeResult;
use crate::steps::{run_steps, StepNote};
use crate::sweep;
use crate::wait::{
    poll_for, wait_for_absent, wait_for_document_ready, wait_for_observation_change,
    wait_for_present, wait_for_url_change, WaitOptions,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Pass/fail counters
///
/// Warnings are passes that carry a warning, so `total == passed + failed`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    /// Passed scenarios, including those with warnings
    pub passed: u32,
    /// Failed scenarios
    pub failed: u32,
    /// Passed scenarios that carry a warning
    pub warnings: u32,
    /// Failure screenshots written
    pub screenshots: u32,
}

impl Tally {
    /// Count one outcome
    pub fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Passed => self.passed += 1,
            Outcome::PassedWithWarning(_) => {
                self.passed += 1;
                self.warnings += 1;
            }
            Outcome::Failed(_) => self.failed += 1,
        }
    }

    /// Add another tally into this one
    pub fn absorb(&mut self, other: &Self) {
        self.passed += other.passed;
        self.failed += other.failed;
        self.warnings += other.warnings;
        self.screenshots += other.screenshots;
    }

    /// Scenarios counted
    #[must_use]
    pub const fn total(&self) -> u32 {
        self.passed + self.failed
    }

    /// Percentage of passed scenarios (0 when nothing ran)
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.total() == 0 {
            0.0
        } else {
            f64::from(self.passed) * 100.0 / f64::from(self.total())
        }
    }
}

/// Verdict of one scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum Outcome {
    /// Passed
    Passed,
    /// Passed with a soft failure worth a look
    PassedWithWarning(String),
    /// Failed
    Failed(String),
}

impl Outcome {
    /// Whether the scenario counts as passed
    #[must_use]
    pub const fn is_pass(&self) -> bool {
        !matches!(self, Self::Failed(_))
    }

    /// Log symbol
    #[must_use]
    pub const fn symbol(&self) -> &'static str {
        match self {
            Self::Passed => "✓",
            Self::PassedWithWarning(_) => "⚠",
            Self::Failed(_) => "✗",
        }
    }
}

/// Result of one scenario (or one swept link)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    /// Scenario name
    pub name: String,
    /// Verdict
    pub outcome: Outcome,
    /// Observation before acting
    pub before: Option<Observation>,
    /// Observation after acting
    pub after: Option<Observation>,
    /// Wall time spent
    #[serde(with = "duration_ms")]
    pub duration: Duration,
    /// Screenshot taken on failure
    pub screenshot: Option<PathBuf>,
}

/// Everything one suite produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteReport {
    /// Suite key
    pub key: String,
    /// Suite display name
    pub name: String,
    /// Scenario results in run order
    pub results: Vec<ScenarioResult>,
    /// Counters
    pub tally: Tally,
    /// Why the suite stopped early, if it did
    pub aborted: Option<String>,
    /// Screenshots written
    pub screenshots: Vec<PathBuf>,
    /// Run log file, when one was written
    pub log_file: Option<PathBuf>,
    /// Wall time spent
    #[serde(with = "duration_ms")]
    pub duration: Duration,
}

impl SuiteReport {
    /// Whether every scenario passed and the suite ran to the end
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.tally.failed == 0 && self.aborted.is_none()
    }
}

/// Mutable state of one suite run, shared with the sweep runner
#[derive(Debug)]
pub(crate) struct RunContext {
    pub(crate) waits: WaitPolicy,
    pub(crate) log: RunLog,
    pub(crate) shots: ScreenshotSink,
    pub(crate) results: Vec<ScenarioResult>,
    pub(crate) tally: Tally,
}

impl RunContext {
    pub(crate) fn new(suite_name: &str, waits: WaitPolicy, screenshot_root: &Path) -> Self {
        let log = RunLog::new(suite_name);
        let shots = ScreenshotSink::new(screenshot_root, &log);
        Self {
            waits,
            log,
            shots,
            results: Vec::new(),
            tally: Tally::default(),
        }
    }

    /// Record a result, logging its verdict
    pub(crate) fn record(&mut self, result: ScenarioResult) {
        match &result.outcome {
            Outcome::Passed => self.log.info(format!("✓ {}: PASSED", result.name)),
            Outcome::PassedWithWarning(msg) => self
                .log
                .warn(format!("⚠ {}: PASSED WITH WARNING ({msg})", result.name)),
            Outcome::Failed(msg) => self.log.warn(format!("✗ {}: FAILED ({msg})", result.name)),
        }
        self.tally.record(&result.outcome);
        self.results.push(result);
    }

    /// Log step notes
    pub(crate) fn note_all(&mut self, notes: &[StepNote]) -> Vec<String> {
        let mut warnings = Vec::new();
        for note in notes {
            match note {
                StepNote::Info(msg) => self.log.info(format!("  {msg}")),
                StepNote::Warning(msg) => {
                    self.log.warn(format!("  {msg}"));
                    warnings.push(msg.clone());
                }
            }
        }
        warnings
    }

    /// Capture a screenshot of the current page
    pub(crate) async fn screenshot(
        &mut self,
        driver: &dyn PageDriver,
        label: &str,
    ) -> Option<PathBuf> {
        self.shots.capture(driver, label, &mut self.log).await
    }
}

/// Runs suites against a session
#[derive(Debug, Clone)]
pub struct SuiteRunner {
    screenshot_dir: PathBuf,
    log_dir: Option<PathBuf>,
}

impl Default for SuiteRunner {
    fn default() -> Self {
        Self::new("screenshots")
    }
}

impl SuiteRunner {
    /// Runner writing screenshots under `screenshot_dir`
    #[must_use]
    pub fn new(screenshot_dir: impl Into<PathBuf>) -> Self {
        Self {
            screenshot_dir: screenshot_dir.into(),
            log_dir: None,
        }
    }

    /// Also write each suite's run log into `dir`
    #[must_use]
    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    /// Run one suite to completion
    ///
    /// Never returns an error: every failure ends up in the report.
    pub async fn run(&self, suite: &SuiteSpec, session: &mut Session) -> SuiteReport {
        let started = Instant::now();
        let waits = *session.waits();
        let mut ctx = RunContext::new(&suite.name, waits, &self.screenshot_dir);
        ctx.log.info(format!("=== {} ===", suite.name));

        let aborted = match self.prepare(suite, session.driver_mut(), &mut ctx).await {
            Ok(()) => {
                for scenario in &suite.scenarios {
                    let result = run_scenario(suite, scenario, session.driver_mut(), &mut ctx).await;
                    ctx.record(result);
                }
                for spec in &suite.sweeps {
                    sweep::run_sweep(spec, session.driver_mut(), &mut ctx).await;
                }
                None
            }
            Err(reason) => {
                ctx.log.warn(format!("✗ Suite aborted: {reason}"));
                let screenshot = ctx.screenshot(session.driver(), "SETUP_FAILED").await;
                ctx.record(ScenarioResult {
                    name: format!("{} setup", suite.name),
                    outcome: Outcome::Failed(reason.clone()),
                    before: None,
                    after: None,
                    duration: started.elapsed(),
                    screenshot,
                });
                Some(reason)
            }
        };

        write_summary(&mut ctx);
        let log_file = self.log_dir.as_deref().and_then(|dir| match ctx.log.flush(dir) {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::warn!(error = %e, "could not write run log");
                None
            }
        });

        SuiteReport {
            key: suite.key.clone(),
            name: suite.name.clone(),
            tally: ctx.tally,
            results: ctx.results,
            aborted,
            screenshots: ctx.shots.captured().to_vec(),
            log_file,
            duration: started.elapsed(),
        }
    }

    /// Open the start page, run setup and read the baseline
    async fn prepare(
        &self,
        suite: &SuiteSpec,
        driver: &mut dyn PageDriver,
        ctx: &mut RunContext,
    ) -> Result<(), String> {
        ctx.log.info(format!("Opening {}", suite.start_url));
        driver
            .navigate(&suite.start_url)
            .await
            .map_err(|e| e.to_string())?;
        if !wait_for_document_ready(driver, WaitOptions::page_load(&ctx.waits))
            .await
            .success
        {
            ctx.log.warn("Start page not ready, continuing");
        }

        let notes = run_steps(driver, &suite.setup, &ctx.waits)
            .await
            .map_err(|e| format!("setup failed: {e}"))?;
        ctx.note_all(&notes);

        let Some(observable) = &suite.baseline else {
            return Ok(());
        };
        let baseline = read_readable(driver, observable, WaitOptions::medium(&ctx.waits)).await;
        if !baseline.is_readable() {
            return Err(format!("baseline {observable} unreadable"));
        }
        ctx.log.info(format!("Initial {observable}: {baseline}"));
        Ok(())
    }
}

/// Poll an observable until it is readable
async fn read_readable(
    driver: &dyn PageDriver,
    observable: &Observable,
    options: WaitOptions,
) -> Observation {
    let description = format!("{observable} to be readable");
    let (_, value) = poll_for(options, &description, || async move {
        let value = observable.observe(driver).await;
        Ok(value.is_readable().then_some(value))
    })
    .await;
    value.unwrap_or(Observation::Unreadable)
}

/// Run one scenario and judge it
pub(crate) async fn run_scenario(
    suite: &SuiteSpec,
    scenario: &ScenarioSpec,
    driver: &mut dyn PageDriver,
    ctx: &mut RunContext,
) -> ScenarioResult {
    let started = Instant::now();
    ctx.log.info(format!("▶ {}", scenario.name));

    let (outcome, before, after) = match execute(suite, scenario, driver, ctx).await {
        Ok((outcome, before, after)) => (outcome, before, after),
        Err(e) => (Outcome::Failed(e.to_string()), None, None),
    };

    let screenshot = if outcome.is_pass() {
        None
    } else {
        ctx.screenshot(driver, &format!("{}_FAILED", scenario.name))
            .await
    };

    match run_steps(driver, &scenario.reset, &ctx.waits).await {
        Ok(notes) => {
            ctx.note_all(&notes);
        }
        Err(e) => ctx.log.warn(format!("  reset failed: {e}")),
    }

    ScenarioResult {
        name: scenario.name.clone(),
        outcome,
        before,
        after,
        duration: started.elapsed(),
        screenshot,
    }
}

type Judged = (Outcome, Option<Observation>, Option<Observation>);

async fn execute(
    suite: &SuiteSpec,
    scenario: &ScenarioSpec,
    driver: &mut dyn PageDriver,
    ctx: &mut RunContext,
) -> ProbeResult<Judged> {
    let waits = ctx.waits;
    let mut warnings = {
        let notes = run_steps(driver, &scenario.before, &waits).await?;
        ctx.note_all(&notes)
    };

    let observable = suite.observable_for(scenario);
    let before = match observable {
        Some(o) => Some(o.observe(driver).await),
        None => None,
    };
    let url_before = driver.current_url().await?;
    let windows_before = driver.window_count().await?;

    if scenario.expect.needs_baseline() && !before.as_ref().is_some_and(Observation::is_readable) {
        return Ok((
            Outcome::Failed("no readable value before acting".to_string()),
            before,
            None,
        ));
    }
    if let (Some(o), Some(b)) = (observable, &before) {
        ctx.log.info(format!("  before {o}: {b}"));
    }

    let notes = run_steps(driver, &scenario.actions, &waits).await?;
    warnings.extend(ctx.note_all(&notes));

    if let Some(ms) = scenario.settle_ms {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    let options = scenario.timeout_ms.map_or_else(
        || WaitOptions::medium(&waits),
        |ms| WaitOptions::medium(&waits).with_timeout(Duration::from_millis(ms)),
    );
    let (verdict, after) = judge(
        &scenario.expect,
        observable,
        before.as_ref(),
        &url_before,
        windows_before,
        driver,
        options,
    )
    .await;
    if let (Some(o), Some(a)) = (observable, &after) {
        ctx.log.info(format!("  after {o}: {a}"));
    }

    let outcome = match verdict {
        Err(msg) if scenario.soft => Outcome::PassedWithWarning(msg),
        Err(msg) => Outcome::Failed(msg),
        Ok(Some(msg)) => Outcome::PassedWithWarning(msg),
        Ok(None) if warnings.is_empty() => Outcome::Passed,
        Ok(None) => Outcome::PassedWithWarning(warnings.join("; ")),
    };
    Ok((outcome, before, after))
}

/// `Ok(None)` passes, `Ok(Some(w))` passes with a warning, `Err(msg)` fails
type Verdict = Result<Option<String>, String>;

async fn judge(
    expect: &Expectation,
    observable: Option<&Observable>,
    before: Option<&Observation>,
    url_before: &str,
    windows_before: usize,
    driver: &dyn PageDriver,
    options: WaitOptions,
) -> (Verdict, Option<Observation>) {
    match expect {
        Expectation::Completes => (Ok(None), None),
        Expectation::Changes | Expectation::MayChange { .. } => {
            let (Some(observable), Some(before)) = (observable, before) else {
                return (Err("nothing to observe".to_string()), None);
            };
            let (result, changed) =
                wait_for_observation_change(driver, observable, before, options).await;
            if result.success {
                return (Ok(None), changed);
            }
            let after = observable.observe(driver).await;
            let verdict = match expect {
                _ if !after.is_readable() => Err(format!("{observable} unreadable after acting")),
                Expectation::MayChange {
                    warn_if_unchanged: true,
                } => Ok(Some(format!("{observable} unchanged ({after})"))),
                Expectation::MayChange { .. } => Ok(None),
                _ => Err(format!(
                    "{observable} did not change from {before} within {}ms",
                    options.timeout.as_millis()
                )),
            };
            (verdict, Some(after))
        }
        Expectation::Readable => {
            let Some(observable) = observable else {
                return (Err("nothing to observe".to_string()), None);
            };
            let after = read_readable(driver, observable, options).await;
            if after.is_readable() {
                (Ok(None), Some(after))
            } else {
                (Err(format!("{observable} unreadable")), Some(after))
            }
        }
        Expectation::Present { selector } => {
            let (result, _) = wait_for_present(driver, selector, options).await;
            let verdict = if result.success {
                Ok(None)
            } else {
                Err(format!("{selector} did not appear"))
            };
            (verdict, None)
        }
        Expectation::Absent { selector } => {
            let verdict = if wait_for_absent(driver, selector, options).await.success {
                Ok(None)
            } else {
                Err(format!("{selector} still present"))
            };
            (verdict, None)
        }
        Expectation::UrlChanged => {
            let (result, url) = wait_for_url_change(driver, url_before, None, options).await;
            let verdict = if result.success {
                Ok(None)
            } else {
                Err(format!("URL stayed at {url_before}"))
            };
            (verdict, url.map(Observation::Text))
        }
        Expectation::UrlContains { fragment } => {
            let (result, url) = poll_for(options, "URL fragment", || async move {
                let url = driver.current_url().await?;
                Ok(url.contains(fragment.as_str()).then_some(url))
            })
            .await;
            let verdict = if result.success {
                Ok(None)
            } else {
                Err(format!("URL does not contain '{fragment}'"))
            };
            (verdict, url.map(Observation::Text))
        }
        Expectation::NewWindow => {
            let (result, count) = poll_for(options, "new window", || async move {
                let count = driver.window_count().await?;
                Ok((count > windows_before).then_some(count))
            })
            .await;
            let verdict = if result.success {
                Ok(None)
            } else {
                Err("no new window opened".to_string())
            };
            (verdict, count.map(|n| Observation::Number(n as u64)))
        }
    }
}

fn write_summary(ctx: &mut RunContext) {
    ctx.tally.screenshots = ctx.shots.count() as u32;
    let tally = ctx.tally;
    ctx.log.info("=== SUMMARY ===");
    ctx.log.info(format!("Total: {}", tally.total()));
    ctx.log.info(format!("Passed: {}", tally.passed));
    ctx.log.info(format!("Failed: {}", tally.failed));
    ctx.log.info(format!("Warnings: {}", tally.warnings));
    ctx.log.info(format!("Screenshots: {}", tally.screenshots));
    ctx.log.info(format!("Success rate: {:.1}%", tally.success_rate()));
}
