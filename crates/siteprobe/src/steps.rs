//! Step execution.

use crate::browser::WaitPolicy;
use crate::driver::PageDriver;
use crate::interact;
use crate::playbook::Step;
use crate::result::{ProbeError, ProbeResult};
use crate::wait::{wait_for_document_ready, wait_for_present, WaitOptions};
use std::time::Duration;
use tracing::debug;

/// Something worth logging about a step that did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepNote {
    /// Progress
    Info(String),
    /// Soft failure; the scenario continues
    Warning(String),
}

/// Run one step against the page
pub async fn run_step(
    driver: &mut dyn PageDriver,
    step: &Step,
    waits: &WaitPolicy,
) -> ProbeResult<Option<StepNote>> {
    debug!(?step, "step");
    let medium = WaitOptions::medium(waits);
    let with_timeout = |ms: Option<u64>| ms.map_or(medium, |ms| medium.with_timeout(Duration::from_millis(ms)));

    match step {
        Step::Navigate { url } => {
            driver.navigate(url).await?;
            Ok(settle(driver, waits).await)
        }
        Step::Click {
            selector,
            optional,
            timeout_ms,
        } => {
            let result = interact::click(driver, selector, with_timeout(*timeout_ms)).await;
            match result {
                Ok(interact::ClickOutcome::Native) => Ok(None),
                Ok(interact::ClickOutcome::Scripted) => Ok(Some(StepNote::Info(format!(
                    "{selector}: clicked via script"
                )))),
                Err(e) => skip_if_optional(*optional, e),
            }
        }
        Step::ScriptClick { selector, optional } => {
            match interact::script_click(driver, selector, medium).await {
                Ok(()) => Ok(None),
                Err(e) => skip_if_optional(*optional, e),
            }
        }
        Step::Type { selector, text } => {
            interact::type_text(driver, selector, text, medium).await?;
            Ok(None)
        }
        Step::SelectOption {
            trigger,
            options,
            choice,
        } => {
            let picked = interact::select_option(driver, trigger, options, choice, medium).await?;
            Ok(Some(StepNote::Info(format!("Selected '{picked}'"))))
        }
        Step::ScrollTo { selector, optional } => {
            match interact::scroll_into_view(driver, selector, medium).await {
                Ok(_) => Ok(None),
                Err(e) => skip_if_optional(*optional, e),
            }
        }
        Step::Script { code } => {
            driver.execute_script(code).await?;
            Ok(None)
        }
        Step::Back => {
            driver.back().await?;
            Ok(settle(driver, waits).await)
        }
        Step::Pause { ms } => {
            tokio::time::sleep(Duration::from_millis(*ms)).await;
            Ok(None)
        }
        Step::WaitReady => {
            wait_for_document_ready(driver, WaitOptions::page_load(waits))
                .await
                .into_result()?;
            Ok(None)
        }
        Step::WaitFor {
            selector,
            timeout_ms,
        } => {
            let (result, _) = wait_for_present(driver, selector, with_timeout(*timeout_ms)).await;
            result.into_result()?;
            Ok(None)
        }
        Step::CloseExtraWindows => {
            let closed = driver.close_extra_windows().await?;
            Ok((closed > 0).then(|| StepNote::Info(format!("Closed {closed} extra window(s)"))))
        }
    }
}

/// Run steps in order, stopping at the first error
///
/// Returns the notes collected along the way.
pub async fn run_steps(
    driver: &mut dyn PageDriver,
    steps: &[Step],
    waits: &WaitPolicy,
) -> ProbeResult<Vec<StepNote>> {
    let mut notes = Vec::new();
    for step in steps {
        if let Some(note) = run_step(driver, step, waits).await? {
            notes.push(note);
        }
    }
    Ok(notes)
}

async fn settle(driver: &dyn PageDriver, waits: &WaitPolicy) -> Option<StepNote> {
    let ready = wait_for_document_ready(driver, WaitOptions::page_load(waits)).await;
    (!ready.success).then(|| {
        StepNote::Warning(format!(
            "page not ready after {}ms",
            ready.timeout.as_millis()
        ))
    })
}

fn skip_if_optional(optional: bool, error: ProbeError) -> ProbeResult<Option<StepNote>> {
    if optional && error.is_locate_failure() {
        Ok(Some(StepNote::Warning(format!("skipped: {error}"))))
    } else {
        Err(error)
    }
}
