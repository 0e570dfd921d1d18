//! Siteprobe: declarative browser regression harness
//!
//! Suites are described in YAML: a start page, setup steps, a value to
//! observe, and scenarios that act on the page and judge the effect. Link
//! sweeps open every detail page behind a listing and check it. The harness
//! drives a real Chromium over CDP (feature `browser`) or the in-memory
//! [`MockDriver`] in tests.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ Suite file   │   │ SuiteRunner  │   │ steps /      │   │ PageDriver   │
//! │ (YAML)       │──►│ + sweeps     │──►│ interact /   │──►│ Chromium or  │
//! │              │   │              │   │ wait         │   │ Mock         │
//! └──────────────┘   └──────┬───────┘   └──────────────┘   └──────────────┘
//!                           │
//!                           ▼
//!                    RunLog + ScreenshotSink ──► logs/, screenshots/
//! ```
//!
//! # Example
//!
//! ```no_run
//! use siteprobe::prelude::*;
//!
//! # async fn run() -> ProbeResult<()> {
//! let file = SuiteFile::load(std::path::Path::new("suites/studyleo.yaml"))?;
//! let mut session = Session::from_driver(MockDriver::new()).with_waits(file.settings.wait_policy());
//! let runner = SuiteRunner::new("screenshots").with_log_dir("logs");
//! for suite in file.select(&[])? {
//!     let report = runner.run(suite, &mut session).await;
//!     println!("{}: {}/{}", report.name, report.tally.passed, report.tally.total());
//! }
//! session.close().await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod browser;
#[allow(clippy::missing_errors_doc, clippy::must_use_candidate)]
mod driver;
mod harness;
mod interact;
#[allow(clippy::missing_errors_doc, clippy::must_use_candidate)]
mod locator;
mod observe;
mod playbook;
mod reporter;
mod result;
mod steps;
mod sweep;
mod wait;

pub use browser::{
    BrowserConfig, Session, WaitPolicy, DEFAULT_LONG_WAIT_MS, DEFAULT_MEDIUM_WAIT_MS,
    DEFAULT_PAGE_LOAD_MS, DEFAULT_POLL_INTERVAL_MS, DEFAULT_SHORT_WAIT_MS,
};
#[cfg(feature = "browser")]
pub use driver::ChromiumDriver;
pub use driver::{
    ElementHandle, ElementState, MockDriver, MockElement, MockPage, MockReaction, PageDriver,
    Screenshot,
};
pub use harness::{Outcome, ScenarioResult, SuiteReport, SuiteRunner, Tally};
pub use interact::{
    click, click_with_fallback, locate_for_click, script_click, scroll_into_view, select_option,
    type_text, ClickOutcome, OptionChoice,
};
pub use locator::Selector;
pub use observe::{format_count, normalize_whitespace, parse_count, Observable, Observation};
pub use playbook::{
    Expectation, ScenarioSpec, Settings, Step, SuiteFile, SuiteSpec, SCHEMA_VERSION,
};
pub use reporter::{sanitize_label, LogLevel, LogLine, RunLog, ScreenshotSink, RUN_TIMESTAMP_FORMAT};
pub use result::{ProbeError, ProbeResult};
pub use steps::{run_step, run_steps, StepNote};
pub use sweep::{
    collect_links, resolve_href, run_checks, with_page_param, Check, CheckResult, ExpectedLinks,
    LinkTarget, OpenMode, Pagination, SweepSpec,
};
pub use wait::{
    poll_for, poll_until, wait_for_absent, wait_for_clickable, wait_for_document_ready,
    wait_for_observation_change, wait_for_present, wait_for_url_change, WaitOptions, WaitResult,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::browser::*;
    #[cfg(feature = "browser")]
    pub use super::driver::ChromiumDriver;
    pub use super::driver::{
        ElementHandle, ElementState, MockDriver, MockElement, MockPage, MockReaction, PageDriver,
        Screenshot,
    };
    pub use super::harness::*;
    pub use super::interact::*;
    pub use super::locator::*;
    pub use super::observe::*;
    pub use super::playbook::*;
    pub use super::reporter::*;
    pub use super::result::*;
    pub use super::steps::*;
    pub use super::sweep::*;
    pub use super::wait::*;
}
