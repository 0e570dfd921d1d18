//! Polling waits.
//!
//! Every wait re-evaluates a condition at a fixed interval until it holds or
//! the timeout elapses. A timeout is a soft failure: the caller receives a
//! [`WaitResult`] with `success == false` and decides what it means. Errors
//! raised while evaluating the condition count as "not yet".
//!
//! A wait returns no later than `timeout + poll_interval` (plus the time of a
//! single condition evaluation).

use crate::browser::WaitPolicy;
use crate::driver::{ElementHandle, PageDriver};
use crate::locator::Selector;
use crate::observe::{Observable, Observation};
use crate::result::{ProbeError, ProbeResult};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::trace;

/// Options for wait operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    /// Give up after this long
    pub timeout: Duration,
    /// Time between evaluations
    pub poll_interval: Duration,
}

impl WaitOptions {
    /// Create wait options
    #[must_use]
    pub const fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            poll_interval,
        }
    }

    /// Short timeout from a policy
    #[must_use]
    pub const fn short(policy: &WaitPolicy) -> Self {
        Self::new(policy.short, policy.poll_interval)
    }

    /// Medium timeout from a policy
    #[must_use]
    pub const fn medium(policy: &WaitPolicy) -> Self {
        Self::new(policy.medium, policy.poll_interval)
    }

    /// Long timeout from a policy
    #[must_use]
    pub const fn long(policy: &WaitPolicy) -> Self {
        Self::new(policy.long, policy.poll_interval)
    }

    /// Page-load timeout from a policy
    #[must_use]
    pub const fn page_load(policy: &WaitPolicy) -> Self {
        Self::new(policy.page_load, policy.poll_interval)
    }

    /// Replace the timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Result of a wait operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitResult {
    /// Whether the wait was successful
    pub success: bool,
    /// Time spent waiting
    pub elapsed: Duration,
    /// Number of condition evaluations
    pub attempts: u32,
    /// Description of what was waited for
    pub waited_for: String,
    /// Configured timeout
    pub timeout: Duration,
}

impl WaitResult {
    /// Create a successful wait result
    #[must_use]
    pub fn success(elapsed: Duration, attempts: u32, waited_for: impl Into<String>) -> Self {
        Self {
            success: true,
            elapsed,
            attempts,
            waited_for: waited_for.into(),
            timeout: Duration::ZERO,
        }
    }

    /// Create a timeout wait result
    #[must_use]
    pub fn timed_out(
        elapsed: Duration,
        attempts: u32,
        timeout: Duration,
        waited_for: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            elapsed,
            attempts,
            waited_for: waited_for.into(),
            timeout,
        }
    }

    /// Convert a timeout into `ProbeError::Timeout`
    pub fn into_result(self) -> ProbeResult<Self> {
        if self.success {
            Ok(self)
        } else {
            Err(ProbeError::Timeout {
                ms: self.timeout.as_millis() as u64,
                waited_for: self.waited_for,
            })
        }
    }
}

/// Poll `probe` until it yields a value or the timeout elapses
pub async fn poll_for<T, F, Fut>(
    options: WaitOptions,
    description: &str,
    mut probe: F,
) -> (WaitResult, Option<T>)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ProbeResult<Option<T>>>,
{
    let start = Instant::now();
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        match probe().await {
            Ok(Some(value)) => {
                let mut result = WaitResult::success(start.elapsed(), attempts, description);
                result.timeout = options.timeout;
                return (result, Some(value));
            }
            Ok(None) => {}
            Err(e) => trace!(error = %e, waiting_for = description, "condition not ready"),
        }

        if start.elapsed() >= options.timeout {
            return (
                WaitResult::timed_out(start.elapsed(), attempts, options.timeout, description),
                None,
            );
        }
        tokio::time::sleep(options.poll_interval).await;
    }
}

/// Poll `predicate` until it returns true or the timeout elapses
pub async fn poll_until<F, Fut>(options: WaitOptions, description: &str, mut predicate: F) -> WaitResult
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ProbeResult<bool>>,
{
    let (result, _) = poll_for(options, description, || {
        let fut = predicate();
        async move { fut.await.map(|ok| ok.then_some(())) }
    })
    .await;
    result
}

/// Wait until the selector matches at least one element
pub async fn wait_for_present(
    driver: &dyn PageDriver,
    selector: &Selector,
    options: WaitOptions,
) -> (WaitResult, Option<ElementHandle>) {
    let description = format!("{selector} to be present");
    poll_for(options, &description, || async move { driver.find(selector).await }).await
}

/// Wait until the selector matches nothing
pub async fn wait_for_absent(
    driver: &dyn PageDriver,
    selector: &Selector,
    options: WaitOptions,
) -> WaitResult {
    let description = format!("{selector} to be absent");
    poll_until(options, &description, || async move {
        Ok(driver.find(selector).await?.is_none())
    })
    .await
}

/// Wait until the first visible, enabled match exists
pub async fn wait_for_clickable(
    driver: &dyn PageDriver,
    selector: &Selector,
    options: WaitOptions,
) -> (WaitResult, Option<ElementHandle>) {
    let description = format!("{selector} to be clickable");
    poll_for(options, &description, || async move {
        for handle in driver.find_all(selector).await? {
            if driver.element_state(&handle).await?.is_clickable() {
                return Ok(Some(handle));
            }
        }
        Ok(None)
    })
    .await
}

/// Wait until `document.readyState == "complete"`
pub async fn wait_for_document_ready(driver: &dyn PageDriver, options: WaitOptions) -> WaitResult {
    poll_until(options, "document ready", || async move {
        Ok(driver.ready_state().await? == "complete")
    })
    .await
}

/// Wait until the URL differs from `previous` (and contains `must_contain`)
pub async fn wait_for_url_change(
    driver: &dyn PageDriver,
    previous: &str,
    must_contain: Option<&str>,
    options: WaitOptions,
) -> (WaitResult, Option<String>) {
    let description = match must_contain {
        Some(fragment) => format!("URL to change to one containing '{fragment}'"),
        None => "URL to change".to_string(),
    };
    poll_for(options, &description, || async move {
        let url = driver.current_url().await?;
        let changed = url != previous && must_contain.map_or(true, |f| url.contains(f));
        Ok(changed.then_some(url))
    })
    .await
}

/// Wait until an observation differs from `baseline` and is readable
pub async fn wait_for_observation_change(
    driver: &dyn PageDriver,
    observable: &Observable,
    baseline: &Observation,
    options: WaitOptions,
) -> (WaitResult, Option<Observation>) {
    let description = format!("{observable} to change from {baseline}");
    poll_for(options, &description, || async move {
        let current = observable.observe(driver).await;
        Ok((current.is_readable() && &current != baseline).then_some(current))
    })
    .await
}
