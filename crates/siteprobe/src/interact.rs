//! Element interaction helpers.
//!
//! Clicks go through [`click_with_fallback`]: a native click first, and a
//! DOM-level scripted click only when the native one was intercepted or the
//! element could not take it. Any other failure propagates unchanged.

use crate::driver::{ElementHandle, PageDriver};
use crate::locator::Selector;
use crate::observe::normalize_whitespace;
use crate::result::{ProbeError, ProbeResult};
use crate::wait::{wait_for_clickable, wait_for_present, WaitOptions};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// How a click was delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClickOutcome {
    /// User-level click succeeded
    Native,
    /// Native click failed with an interception-class error; `element.click()` used
    Scripted,
}

/// Click natively, falling back to a scripted click on interception
pub async fn click_with_fallback(
    driver: &dyn PageDriver,
    handle: &ElementHandle,
) -> ProbeResult<ClickOutcome> {
    match driver.click(handle).await {
        Ok(()) => Ok(ClickOutcome::Native),
        Err(e) if e.is_interception() => {
            warn!(target_element = %handle, error = %e, "native click failed, using scripted click");
            driver.script_click(handle).await?;
            Ok(ClickOutcome::Scripted)
        }
        Err(e) => Err(e),
    }
}

/// Resolve a selector to a handle worth clicking
///
/// Prefers the first clickable match; falls back to the first present match so
/// the scripted click can still reach elements that never become clickable.
pub async fn locate_for_click(
    driver: &dyn PageDriver,
    selector: &Selector,
    options: WaitOptions,
) -> ProbeResult<ElementHandle> {
    let (_, clickable) = wait_for_clickable(driver, selector, options).await;
    if let Some(handle) = clickable {
        return Ok(handle);
    }
    driver
        .find(selector)
        .await?
        .ok_or_else(|| ProbeError::ElementNotFound {
            selector: selector.to_string(),
        })
}

/// Wait for a selector, scroll it into view and click it with fallback
pub async fn click(
    driver: &dyn PageDriver,
    selector: &Selector,
    options: WaitOptions,
) -> ProbeResult<ClickOutcome> {
    let handle = locate_for_click(driver, selector, options).await?;
    driver.scroll_into_view(&handle).await?;
    click_with_fallback(driver, &handle).await
}

/// Click with the scripted click directly
pub async fn script_click(
    driver: &dyn PageDriver,
    selector: &Selector,
    options: WaitOptions,
) -> ProbeResult<()> {
    let handle = require_present(driver, selector, options).await?;
    driver.script_click(&handle).await
}

/// Wait for a selector and scroll its first match into view
pub async fn scroll_into_view(
    driver: &dyn PageDriver,
    selector: &Selector,
    options: WaitOptions,
) -> ProbeResult<ElementHandle> {
    let handle = require_present(driver, selector, options).await?;
    driver.scroll_into_view(&handle).await?;
    Ok(handle)
}

/// Wait for an input, clear it and type `text`
pub async fn type_text(
    driver: &dyn PageDriver,
    selector: &Selector,
    text: &str,
    options: WaitOptions,
) -> ProbeResult<()> {
    let (_, handle) = wait_for_clickable(driver, selector, options).await;
    let handle = handle.ok_or_else(|| ProbeError::ElementNotFound {
        selector: selector.to_string(),
    })?;
    driver.clear_and_type(&handle, text).await?;
    debug!(input = %selector, text, "typed");
    Ok(())
}

async fn require_present(
    driver: &dyn PageDriver,
    selector: &Selector,
    options: WaitOptions,
) -> ProbeResult<ElementHandle> {
    let (_, handle) = wait_for_present(driver, selector, options).await;
    handle.ok_or_else(|| ProbeError::ElementNotFound {
        selector: selector.to_string(),
    })
}

/// Which option of a dropdown to pick
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptionChoice {
    /// Pick the first option whose text contains this (case-insensitive)
    pub prefer: Option<String>,
    /// Skip options whose text starts with any of these (case-insensitive)
    pub skip_prefixes: Vec<String>,
    /// Skip options whose text equals any of these (case-insensitive)
    pub skip_exact: Vec<String>,
}

impl OptionChoice {
    /// Prefer a specific option
    #[must_use]
    pub fn prefer(mut self, text: impl Into<String>) -> Self {
        self.prefer = Some(text.into());
        self
    }

    /// Skip options starting with `prefix`
    #[must_use]
    pub fn skip_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.skip_prefixes.push(prefix.into());
        self
    }

    /// Skip options equal to `text`
    #[must_use]
    pub fn skip_exact(mut self, text: impl Into<String>) -> Self {
        self.skip_exact.push(text.into());
        self
    }

    /// Whether an option's text may be picked at all
    #[must_use]
    pub fn accepts(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        if lower.is_empty() {
            return false;
        }
        !self
            .skip_prefixes
            .iter()
            .any(|p| lower.starts_with(&p.to_lowercase()))
            && !self.skip_exact.iter().any(|s| lower == s.to_lowercase())
    }

    /// Whether an option's text is the preferred one
    #[must_use]
    pub fn is_preferred(&self, text: &str) -> bool {
        self.prefer
            .as_ref()
            .is_some_and(|p| text.to_lowercase().contains(&p.to_lowercase()))
    }
}

/// Open a dropdown and pick an option
///
/// Returns the text of the chosen option.
pub async fn select_option(
    driver: &dyn PageDriver,
    trigger: &Selector,
    options_selector: &Selector,
    choice: &OptionChoice,
    wait: WaitOptions,
) -> ProbeResult<String> {
    click(driver, trigger, wait).await?;

    let (_, first) = wait_for_present(driver, options_selector, wait).await;
    if first.is_none() {
        return Err(ProbeError::ElementNotFound {
            selector: options_selector.to_string(),
        });
    }
    // Let the option list finish rendering.
    tokio::time::sleep(Duration::from_millis(300).min(wait.timeout)).await;

    let mut fallback: Option<(ElementHandle, String)> = None;
    let mut preferred: Option<(ElementHandle, String)> = None;
    for handle in driver.find_all(options_selector).await? {
        let Ok(state) = driver.element_state(&handle).await else {
            continue;
        };
        if !state.is_clickable() {
            continue;
        }
        let text = normalize_whitespace(&driver.text(&handle).await.unwrap_or_default());
        if !choice.accepts(&text) {
            continue;
        }
        if choice.is_preferred(&text) {
            preferred = Some((handle, text));
            break;
        }
        if fallback.is_none() {
            fallback = Some((handle, text));
        }
    }

    let (handle, text) =
        preferred
            .or(fallback)
            .ok_or_else(|| ProbeError::ElementNotFound {
                selector: format!("{options_selector} (no selectable option)"),
            })?;
    driver.scroll_into_view(&handle).await?;
    click_with_fallback(driver, &handle).await?;
    debug!(option = %text, "selected option");
    Ok(text)
}
