//! Link sweeps.
//!
//! A sweep collects the detail links on a listing page, opens each one and
//! runs checks against the detail page, then returns to the listing. Every
//! link is recorded as its own scenario result. Pagination moves the sweep to
//! the following listing pages either by clicking a "next" control or by
//! loading `?page=N`.

use crate::driver::{ElementHandle, PageDriver};
use crate::harness::{Outcome, RunContext, ScenarioResult};
use crate::interact::click_with_fallback;
use crate::locator::Selector;
use crate::observe::{normalize_whitespace, parse_count};
use crate::playbook::Step;
use crate::result::{ProbeError, ProbeResult};
use crate::steps::run_steps;
use crate::wait::{
    poll_for, wait_for_document_ready, wait_for_present, wait_for_url_change, WaitOptions,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Instant;
use tracing::debug;

/// How a detail page is opened
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpenMode {
    /// Load the link's URL directly
    #[default]
    Visit,
    /// Click the link on the listing page
    Click,
}

/// A listing-page sweep
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepSpec {
    /// Prefix of every result name
    pub name: String,
    /// Links to open
    pub links: Selector,
    /// Keep only links whose href contains this
    #[serde(default)]
    pub href_contains: Option<String>,
    /// Drop links whose href ends with any of these
    #[serde(default)]
    pub exclude_suffixes: Vec<String>,
    /// Drop links whose href contains any of these
    #[serde(default)]
    pub exclude_containing: Vec<String>,
    /// How to open each link
    #[serde(default)]
    pub open: OpenMode,
    /// Extra attempts per link when opening or checking fails
    #[serde(default)]
    pub retries: u32,
    /// Steps run on every listing page before collecting links
    #[serde(default)]
    pub prepare: Vec<Step>,
    /// Checks run on every detail page
    #[serde(default)]
    pub checks: Vec<Check>,
    /// How to reach the next listing page
    #[serde(default)]
    pub pagination: Option<Pagination>,
    /// Stop after this many listing pages
    #[serde(default)]
    pub max_pages: Option<u32>,
    /// Open at most this many links per listing page
    #[serde(default)]
    pub max_links: Option<usize>,
    /// Stop paginating once a page has fewer links than this
    #[serde(default)]
    pub stop_below: Option<usize>,
    /// Expected link counts, checked as warnings
    #[serde(default)]
    pub expected: Option<ExpectedLinks>,
}

/// Expected number of links per listing page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedLinks {
    /// On every page but the last
    pub per_page: usize,
    /// On the last page
    #[serde(default)]
    pub last_page: Option<usize>,
}

/// Moving between listing pages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Pagination {
    /// Click a "next" control
    Click {
        /// The control
        next: Selector,
        /// Marker of the current page; advancing it counts as a page change
        #[serde(default)]
        active: Option<Selector>,
    },
    /// Load `<list url>?<param>=N`
    QueryParam {
        /// Query parameter name
        #[serde(default = "default_page_param")]
        param: String,
        /// Number of pages
        #[serde(default)]
        pages: Option<u32>,
        /// Read the page count as the largest number among these elements
        #[serde(default)]
        pages_from: Option<Selector>,
    },
}

fn default_page_param() -> String {
    "page".to_string()
}

fn default_attempts() -> u32 {
    3
}

fn default_min_body() -> usize {
    100
}

fn default_error_keywords() -> Vec<String> {
    [
        "page not found",
        "404 error",
        "500 error",
        "internal server error",
        "something went wrong",
    ]
    .iter()
    .map(ToString::to_string)
    .collect()
}

fn default_title_keywords() -> Vec<String> {
    ["error", "not found", "404"]
        .iter()
        .map(ToString::to_string)
        .collect()
}

/// A detail-page check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Check {
    /// The URL must contain a fragment
    UrlContains {
        /// Required fragment
        fragment: String,
    },
    /// An element must be present
    Present {
        /// Element
        selector: Selector,
        /// Attempts of one short wait each
        #[serde(default = "default_attempts")]
        attempts: u32,
    },
    /// The body text must be longer than a minimum
    MinBodyText {
        /// Minimum characters
        #[serde(default = "default_min_body")]
        chars: usize,
        /// Attempts, one poll interval apart
        #[serde(default = "default_attempts")]
        attempts: u32,
    },
    /// The page must not look like an error page
    NoErrorPage {
        /// Presence of this element proves the page is fine
        #[serde(default)]
        unless_present: Option<Selector>,
        /// Visible elements that mark an error page
        #[serde(default)]
        error_selectors: Vec<Selector>,
        /// Title fragments that mark an error page (case-insensitive)
        #[serde(default = "default_title_keywords")]
        title_keywords: Vec<String>,
        /// Body fragments that mark an error page (case-insensitive)
        #[serde(default = "default_error_keywords")]
        body_keywords: Vec<String>,
        /// A body shorter than this is an error page
        #[serde(default = "default_min_body")]
        min_body_chars: usize,
    },
    /// Cells of a table must list every required text
    RequiredTexts {
        /// The table
        table: Selector,
        /// Cells compared against `texts`
        cells: Selector,
        /// Required cell texts (whitespace-normalised, case-insensitive)
        texts: Vec<String>,
        /// Body phrases that excuse a missing table
        #[serde(default)]
        waived_by: Vec<String>,
    },
}

/// Result of one check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckResult {
    /// Passed
    Pass,
    /// Passed, with something worth a look
    Warn(String),
    /// Failed
    Fail(String),
}

impl SweepSpec {
    /// Check rules serde cannot express
    pub fn validate(&self) -> ProbeResult<()> {
        if let Some(Pagination::QueryParam {
            pages: None,
            pages_from: None,
            ..
        }) = &self.pagination
        {
            return Err(ProbeError::suite(format!(
                "sweep '{}': query_param pagination needs pages or pages_from",
                self.name
            )));
        }
        for check in &self.checks {
            if let Check::RequiredTexts { texts, .. } = check {
                if texts.is_empty() {
                    return Err(ProbeError::suite(format!(
                        "sweep '{}': required_texts lists no texts",
                        self.name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Whether an href belongs to this sweep
    #[must_use]
    pub fn accepts_href(&self, href: &str) -> bool {
        let href = href.trim();
        !href.is_empty()
            && self
                .href_contains
                .as_ref()
                .map_or(true, |f| href.contains(f.as_str()))
            && !self
                .exclude_suffixes
                .iter()
                .any(|s| href.trim_end_matches('/').ends_with(s.as_str()))
            && !self
                .exclude_containing
                .iter()
                .any(|s| href.contains(s.as_str()))
    }
}

/// A link found on a listing page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkTarget {
    /// Absolute URL
    pub url: String,
    /// Name used in results
    pub label: String,
    /// Position among the matches on the listing page
    pub index: usize,
}

/// Resolve an href against the page it was found on
#[must_use]
pub fn resolve_href(base: &str, href: &str) -> String {
    let href = href.trim();
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }
    let scheme_end = base.find("://").map_or(0, |i| i + 3);
    let scheme = &base[..scheme_end.saturating_sub(3)];
    let origin_end = base[scheme_end..]
        .find('/')
        .map_or(base.len(), |i| scheme_end + i);
    let origin = &base[..origin_end];

    if let Some(rest) = href.strip_prefix("//") {
        format!("{scheme}://{rest}")
    } else if href.starts_with('/') {
        format!("{origin}{href}")
    } else {
        let path = base.split(['?', '#']).next().unwrap_or(base);
        let dir = path.rfind('/').filter(|&i| i >= origin_end).map_or(origin, |i| &path[..i]);
        format!("{dir}/{href}")
    }
}

/// Replace or add `param=page` in a URL's query
#[must_use]
pub fn with_page_param(url: &str, param: &str, page: u32) -> String {
    let (base, fragment) = url.split_once('#').map_or((url, None), |(b, f)| (b, Some(f)));
    let (path, query) = base.split_once('?').map_or((base, ""), |(p, q)| (p, q));
    let prefix = format!("{param}=");
    let mut pairs: Vec<String> = query
        .split('&')
        .filter(|p| !p.is_empty() && !p.starts_with(&prefix))
        .map(ToString::to_string)
        .collect();
    pairs.push(format!("{param}={page}"));
    let mut out = format!("{path}?{}", pairs.join("&"));
    if let Some(f) = fragment {
        out.push('#');
        out.push_str(f);
    }
    out
}

/// Last non-empty path segment of a URL
fn last_segment(url: &str) -> String {
    url.split(['?', '#'])
        .next()
        .unwrap_or(url)
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(url)
        .to_string()
}

async fn link_label(driver: &dyn PageDriver, handle: &ElementHandle, url: &str) -> String {
    if let Ok(text) = driver.text(handle).await {
        if let Some(line) = text.lines().map(str::trim).find(|l| !l.is_empty()) {
            return line.to_string();
        }
    }
    if let Ok(Some(aria)) = driver.attribute(handle, "aria-label").await {
        let aria = aria.trim();
        if !aria.is_empty() {
            return aria.to_string();
        }
    }
    last_segment(url)
}

/// Collect, filter and dedupe the sweep's links on the current page
pub async fn collect_links(
    spec: &SweepSpec,
    driver: &dyn PageDriver,
    seen: &mut HashSet<String>,
) -> ProbeResult<Vec<LinkTarget>> {
    let base = driver.current_url().await?;
    let mut targets = Vec::new();
    for handle in driver.find_all(&spec.links).await? {
        let Some(href) = driver.attribute(&handle, "href").await? else {
            continue;
        };
        if !spec.accepts_href(&href) {
            continue;
        }
        let url = resolve_href(&base, &href);
        if !seen.insert(url.clone()) {
            continue;
        }
        let label = link_label(driver, &handle, &url).await;
        targets.push(LinkTarget {
            url,
            label,
            index: handle.index,
        });
        if spec.max_links.is_some_and(|max| targets.len() >= max) {
            break;
        }
    }
    Ok(targets)
}

/// Run every check against the current page
pub async fn run_checks(
    checks: &[Check],
    driver: &dyn PageDriver,
    waits: &crate::browser::WaitPolicy,
) -> CheckResult {
    let mut warnings = Vec::new();
    for check in checks {
        match run_check(check, driver, waits).await {
            CheckResult::Pass => {}
            CheckResult::Warn(msg) => warnings.push(msg),
            fail @ CheckResult::Fail(_) => return fail,
        }
    }
    if warnings.is_empty() {
        CheckResult::Pass
    } else {
        CheckResult::Warn(warnings.join("; "))
    }
}

async fn run_check(
    check: &Check,
    driver: &dyn PageDriver,
    waits: &crate::browser::WaitPolicy,
) -> CheckResult {
    match check {
        Check::UrlContains { fragment } => match driver.current_url().await {
            Ok(url) if url.contains(fragment.as_str()) => CheckResult::Pass,
            Ok(url) => CheckResult::Fail(format!("wrong page: {url}")),
            Err(e) => CheckResult::Fail(e.to_string()),
        },
        Check::Present { selector, attempts } => {
            let per_attempt = WaitOptions::short(waits);
            for attempt in 1..=(*attempts).max(1) {
                if wait_for_present(driver, selector, per_attempt).await.0.success {
                    return CheckResult::Pass;
                }
                debug!(%selector, attempt, "content not present yet");
            }
            CheckResult::Fail(format!("{selector} not found"))
        }
        Check::MinBodyText { chars, attempts } => {
            let options = WaitOptions::new(
                waits.poll_interval * attempts.saturating_sub(1),
                waits.poll_interval,
            );
            let (_, len) = poll_for(options, "body text", || async move {
                let len = driver.body_text().await?.trim().chars().count();
                Ok((len > *chars).then_some(len))
            })
            .await;
            match len {
                Some(_) => CheckResult::Pass,
                None => CheckResult::Fail(format!("body text shorter than {chars} characters")),
            }
        }
        Check::NoErrorPage {
            unless_present,
            error_selectors,
            title_keywords,
            body_keywords,
            min_body_chars,
        } => match error_page_reason(
            driver,
            unless_present.as_ref(),
            error_selectors,
            title_keywords,
            body_keywords,
            *min_body_chars,
        )
        .await
        {
            Some(reason) => CheckResult::Fail(format!("error page: {reason}")),
            None => CheckResult::Pass,
        },
        Check::RequiredTexts {
            table,
            cells,
            texts,
            waived_by,
        } => check_required_texts(driver, table, cells, texts, waived_by, waits).await,
    }
}

async fn error_page_reason(
    driver: &dyn PageDriver,
    unless_present: Option<&Selector>,
    error_selectors: &[Selector],
    title_keywords: &[String],
    body_keywords: &[String],
    min_body_chars: usize,
) -> Option<String> {
    if let Some(selector) = unless_present {
        if matches!(driver.find(selector).await, Ok(Some(_))) {
            return None;
        }
    }
    for selector in error_selectors {
        let Ok(handles) = driver.find_all(selector).await else {
            continue;
        };
        for handle in handles {
            if driver
                .element_state(&handle)
                .await
                .is_ok_and(|s| s.visible)
            {
                return Some(format!("{selector} visible"));
            }
        }
    }
    let title = driver.title().await.unwrap_or_default().to_lowercase();
    if let Some(k) = title_keywords.iter().find(|k| title.contains(&k.to_lowercase())) {
        return Some(format!("title contains '{k}'"));
    }
    let body = driver.body_text().await.unwrap_or_default();
    let lower = body.to_lowercase();
    if let Some(k) = body_keywords.iter().find(|k| lower.contains(&k.to_lowercase())) {
        return Some(format!("body contains '{k}'"));
    }
    let len = body.trim().chars().count();
    if len < min_body_chars {
        return Some(format!("body has only {len} characters"));
    }
    None
}

async fn check_required_texts(
    driver: &dyn PageDriver,
    table: &Selector,
    cells: &Selector,
    texts: &[String],
    waived_by: &[String],
    waits: &crate::browser::WaitPolicy,
) -> CheckResult {
    let (found, _) = wait_for_present(driver, table, WaitOptions::long(waits)).await;
    if !found.success {
        let body = driver.body_text().await.unwrap_or_default().to_lowercase();
        if let Some(phrase) = waived_by.iter().find(|p| body.contains(&p.to_lowercase())) {
            return CheckResult::Warn(format!("no table; page says '{phrase}'"));
        }
        return CheckResult::Fail(format!("{table} not found"));
    }

    let mut actual = Vec::new();
    for handle in driver.find_all(cells).await.unwrap_or_default() {
        if let Ok(text) = driver.text(&handle).await {
            let text = normalize_whitespace(&text);
            if !text.is_empty() {
                actual.push(text.to_lowercase());
            }
        }
    }
    let missing: Vec<&str> = texts
        .iter()
        .filter(|t| !actual.contains(&normalize_whitespace(t).to_lowercase()))
        .map(String::as_str)
        .collect();
    if !missing.is_empty() {
        return CheckResult::Fail(format!("missing: {}", missing.join(", ")));
    }
    if actual.len() == texts.len() {
        CheckResult::Pass
    } else {
        CheckResult::Warn(format!(
            "{} rows, expected {}",
            actual.len(),
            texts.len()
        ))
    }
}

/// Run a sweep from the current listing page, recording one result per link
pub(crate) async fn run_sweep(spec: &SweepSpec, driver: &mut dyn PageDriver, ctx: &mut RunContext) {
    let waits = ctx.waits;
    ctx.log.info(format!("=== Sweep: {} ===", spec.name));

    let first_page = match driver.current_url().await {
        Ok(url) => url,
        Err(e) => {
            ctx.log.warn(format!("Sweep '{}' cannot read the listing URL: {e}", spec.name));
            return;
        }
    };

    let total_pages = match &spec.pagination {
        Some(Pagination::QueryParam {
            pages: Some(n), ..
        }) => Some(*n),
        Some(Pagination::QueryParam {
            pages_from: Some(sel),
            ..
        }) => Some(read_page_count(driver, sel).await),
        _ => None,
    };
    let last_page = match (total_pages, spec.max_pages) {
        (Some(t), Some(m)) => Some(t.min(m)),
        (t, m) => t.or(m),
    };
    if let Some(n) = total_pages {
        ctx.log.info(format!("Pages: {n}"));
    }

    let mut seen = HashSet::new();
    let mut page = 1u32;
    let mut list_url = first_page.clone();
    loop {
        ctx.log.info(format!("--- Page {page} ---"));
        match run_steps(driver, &spec.prepare, &waits).await {
            Ok(notes) => {
                ctx.note_all(&notes);
            }
            Err(e) => ctx.log.warn(format!("  prepare failed: {e}")),
        }

        let links = match collect_links(spec, driver, &mut seen).await {
            Ok(links) => links,
            Err(e) => {
                ctx.log.warn(format!("  collecting links failed: {e}"));
                Vec::new()
            }
        };
        ctx.log.info(format!("  {} link(s)", links.len()));
        check_expected(spec, page, last_page, links.len(), ctx);

        for (i, link) in links.iter().enumerate() {
            let name = format!("{} p{page} #{}: {}", spec.name, i + 1, link.label);
            let result = sweep_link(spec, link, &list_url, &name, driver, ctx).await;
            ctx.record(result);
            return_to_list(driver, &list_url, ctx).await;
        }

        if last_page.is_some_and(|last| page >= last) {
            break;
        }
        if let Some(min) = spec.stop_below.filter(|&min| links.len() < min) {
            ctx.log.info(format!("  fewer than {min} links, stopping"));
            break;
        }
        let Some(next) = next_page(spec, driver, &first_page, &list_url, page, ctx).await else {
            break;
        };
        list_url = next;
        page += 1;
    }
}

/// Warn when a listing page does not have the expected number of links
fn check_expected(
    spec: &SweepSpec,
    page: u32,
    last_page: Option<u32>,
    found: usize,
    ctx: &mut RunContext,
) {
    let Some(expected) = spec.expected else {
        return;
    };
    let want = match (last_page, expected.last_page) {
        (Some(last), Some(n)) if page == last => n,
        _ => expected.per_page,
    };
    if found != want {
        ctx.log.warn(format!("  page {page}: {found} link(s), expected {want}"));
    }
}

async fn read_page_count(driver: &dyn PageDriver, selector: &Selector) -> u32 {
    let mut max = 1u32;
    for handle in driver.find_all(selector).await.unwrap_or_default() {
        let text = driver.text(&handle).await.unwrap_or_default();
        if let Some(n) = parse_count(text.trim()).and_then(|n| u32::try_from(n).ok()) {
            max = max.max(n);
        }
    }
    max
}

async fn sweep_link(
    spec: &SweepSpec,
    link: &LinkTarget,
    list_url: &str,
    name: &str,
    driver: &mut dyn PageDriver,
    ctx: &mut RunContext,
) -> ScenarioResult {
    let started = Instant::now();
    let attempts = spec.retries + 1;
    let mut outcome = Outcome::Failed("not attempted".to_string());

    for attempt in 1..=attempts {
        if attempt > 1 {
            ctx.log.info(format!("  retry {attempt}/{attempts}: {}", link.label));
        }
        match open_link(spec, link, list_url, driver, ctx).await {
            Ok(()) => {}
            Err(OpenFailure::Retryable(msg)) => {
                outcome = Outcome::Failed(msg);
                continue;
            }
            Err(OpenFailure::Final(msg)) => {
                outcome = Outcome::Failed(msg);
                break;
            }
        }
        outcome = match run_checks(&spec.checks, driver, &ctx.waits).await {
            CheckResult::Pass => Outcome::Passed,
            CheckResult::Warn(msg) => Outcome::PassedWithWarning(msg),
            CheckResult::Fail(msg) => Outcome::Failed(msg),
        };
        if outcome.is_pass() {
            break;
        }
    }

    let screenshot = if outcome.is_pass() {
        None
    } else {
        ctx.screenshot(driver, &format!("FAILED_{name}")).await
    };
    ScenarioResult {
        name: name.to_string(),
        outcome,
        before: None,
        after: None,
        duration: started.elapsed(),
        screenshot,
    }
}

enum OpenFailure {
    Retryable(String),
    Final(String),
}

async fn open_link(
    spec: &SweepSpec,
    link: &LinkTarget,
    list_url: &str,
    driver: &mut dyn PageDriver,
    ctx: &mut RunContext,
) -> Result<(), OpenFailure> {
    let waits = ctx.waits;
    match spec.open {
        OpenMode::Visit => {
            driver
                .navigate(&link.url)
                .await
                .map_err(|e| OpenFailure::Retryable(e.to_string()))?;
        }
        OpenMode::Click => {
            return_to_list(driver, list_url, ctx).await;
            let handle = find_link_handle(spec, link, driver)
                .await
                .map_err(|e| OpenFailure::Retryable(e.to_string()))?;
            driver
                .scroll_into_view(&handle)
                .await
                .map_err(|e| OpenFailure::Retryable(e.to_string()))?;
            click_with_fallback(driver, &handle)
                .await
                .map_err(|e| OpenFailure::Retryable(e.to_string()))?;
            let (changed, url) =
                wait_for_url_change(driver, list_url, None, WaitOptions::medium(&waits)).await;
            if !changed.success {
                return Err(OpenFailure::Retryable("click did not navigate".to_string()));
            }
            if let (Some(fragment), Some(url)) = (&spec.href_contains, url) {
                if !url.contains(fragment.as_str()) {
                    return Err(OpenFailure::Final(format!("wrong page: {url}")));
                }
            }
        }
    }
    if !wait_for_document_ready(driver, WaitOptions::page_load(&waits))
        .await
        .success
    {
        ctx.log.warn(format!("  {} not ready, checking anyway", link.url));
    }
    Ok(())
}

/// Find the link on the listing page again, by URL first and position second
async fn find_link_handle(
    spec: &SweepSpec,
    link: &LinkTarget,
    driver: &dyn PageDriver,
) -> ProbeResult<ElementHandle> {
    let base = driver.current_url().await?;
    let handles = driver.find_all(&spec.links).await?;
    for handle in &handles {
        if let Ok(Some(href)) = driver.attribute(handle, "href").await {
            if resolve_href(&base, &href) == link.url {
                return Ok(handle.clone());
            }
        }
    }
    handles
        .into_iter()
        .nth(link.index)
        .ok_or_else(|| ProbeError::ElementNotFound {
            selector: format!("{} (link to {})", spec.links, link.url),
        })
}

async fn return_to_list(driver: &mut dyn PageDriver, list_url: &str, ctx: &mut RunContext) {
    if driver.current_url().await.is_ok_and(|url| url == list_url) {
        return;
    }
    if let Err(e) = driver.navigate(list_url).await {
        ctx.log.warn(format!("  could not return to {list_url}: {e}"));
        return;
    }
    let _ = wait_for_document_ready(driver, WaitOptions::page_load(&ctx.waits)).await;
}

async fn next_page(
    spec: &SweepSpec,
    driver: &mut dyn PageDriver,
    first_page: &str,
    list_url: &str,
    page: u32,
    ctx: &mut RunContext,
) -> Option<String> {
    let waits = ctx.waits;
    match spec.pagination.as_ref()? {
        Pagination::QueryParam { param, .. } => {
            let url = with_page_param(first_page, param, page + 1);
            if let Err(e) = driver.navigate(&url).await {
                ctx.log.warn(format!("  could not open page {}: {e}", page + 1));
                return None;
            }
            let _ = wait_for_document_ready(driver, WaitOptions::page_load(&waits)).await;
            Some(url)
        }
        Pagination::Click { next, active } => {
            let handle = match driver.find(next).await {
                Ok(Some(handle)) => handle,
                _ => {
                    ctx.log.info("  no next page");
                    return None;
                }
            };
            let marker_before = match active {
                Some(sel) => active_page_number(driver, sel).await,
                None => None,
            };
            let clicked = match driver.scroll_into_view(&handle).await {
                Ok(()) => click_with_fallback(driver, &handle).await.map(|_| ()),
                Err(e) => Err(e),
            };
            if let Err(e) = clicked {
                ctx.log.warn(format!("  next page click failed: {e}"));
                return None;
            }

            let driver_ref: &dyn PageDriver = driver;
            let (advanced, url) = poll_for(
                WaitOptions::medium(&waits),
                "next listing page",
                || async move {
                    let url = driver_ref.current_url().await?;
                    if url != list_url {
                        return Ok(Some(url));
                    }
                    let moved = match (active, marker_before) {
                        (Some(sel), Some(before)) => active_page_number(driver_ref, sel)
                            .await
                            .is_some_and(|now| now > before),
                        _ => false,
                    };
                    Ok(moved.then_some(url))
                },
            )
            .await;
            if !advanced.success {
                ctx.log.warn("  next page did not load");
                return None;
            }
            let _ = wait_for_document_ready(driver, WaitOptions::page_load(&waits)).await;
            url
        }
    }
}

async fn active_page_number(driver: &dyn PageDriver, selector: &Selector) -> Option<u64> {
    let handle = driver.find(selector).await.ok()??;
    parse_count(&driver.text(&handle).await.ok()?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    mod url_tests {
        use super::*;

        #[test]
        fn test_resolve_href() {
            let base = "https://site.test/en/blogs?page=2";
            assert_eq!(
                resolve_href(base, "https://other.test/x"),
                "https://other.test/x"
            );
            assert_eq!(
                resolve_href(base, "/en/blogs/visa-guide"),
                "https://site.test/en/blogs/visa-guide"
            );
            assert_eq!(
                resolve_href(base, "//cdn.test/a"),
                "https://cdn.test/a"
            );
            assert_eq!(
                resolve_href(base, "visa-guide"),
                "https://site.test/en/visa-guide"
            );
            assert_eq!(
                resolve_href("https://site.test", "x"),
                "https://site.test/x"
            );
        }

        #[test]
        fn test_with_page_param() {
            assert_eq!(
                with_page_param("https://site.test/en/visa", "page", 2),
                "https://site.test/en/visa?page=2"
            );
            assert_eq!(
                with_page_param("https://site.test/en/visa?page=2&sort=asc", "page", 3),
                "https://site.test/en/visa?sort=asc&page=3"
            );
            assert_eq!(
                with_page_param("https://site.test/u?q=1#top", "page", 4),
                "https://site.test/u?q=1&page=4#top"
            );
        }

        #[test]
        fn test_last_segment() {
            assert_eq!(last_segment("https://site.test/en/universities/bau/"), "bau");
            assert_eq!(last_segment("https://site.test/en/blogs/a?x=1"), "a");
        }

        #[test]
        fn test_accepts_href() {
            let spec: SweepSpec = serde_yaml_ng::from_str(
                r##"
name: Universities
links: "a[href*='/universities/']"
href_contains: /universities/
exclude_suffixes: [/universities]
exclude_containing: ["#"]
"##,
            )
            .unwrap();
            assert!(spec.accepts_href("/en/universities/bahcesehir"));
            assert!(!spec.accepts_href("/en/universities/"));
            assert!(!spec.accepts_href("/en/universities/x#reviews"));
            assert!(!spec.accepts_href("/en/programs/x"));
            assert!(!spec.accepts_href("   "));
            assert_eq!(spec.open, OpenMode::Visit);
        }

        #[test]
        fn test_validate_pagination() {
            let spec: SweepSpec = serde_yaml_ng::from_str(
                "name: Visa\nlinks: a.card\npagination: { mode: query_param }\n",
            )
            .unwrap();
            assert!(spec.validate().is_err());

            let spec: SweepSpec = serde_yaml_ng::from_str(
                "name: Visa\nlinks: a.card\npagination: { mode: query_param, pages: 10 }\n",
            )
            .unwrap();
            assert!(spec.validate().is_ok());
        }
    }

    mod run_tests {
        use super::*;
        use crate::browser::WaitPolicy;
        use crate::driver::{MockDriver, MockElement, MockPage, MockReaction};
        use tempfile::TempDir;

        const LIST: &str = "https://site.test/en/blogs";

        fn ctx(tmp: &TempDir) -> RunContext {
            RunContext::new("BlogsTest", WaitPolicy::fast(), tmp.path())
        }

        fn link(href: &str, text: &str) -> MockElement {
            MockElement::new(text).with_attr("href", href)
        }

        fn article(title: &str) -> MockPage {
            MockPage::new(title)
                .with_body("lorem ipsum ".repeat(20))
                .with_element(Selector::css("article"), MockElement::new("body"))
        }

        fn blog_sweep(open: OpenMode) -> SweepSpec {
            SweepSpec {
                name: "Blogs".into(),
                links: Selector::css("a.blog"),
                href_contains: Some("/blogs/".into()),
                exclude_suffixes: vec!["/blogs".into()],
                exclude_containing: vec!["#".into()],
                open,
                retries: 0,
                prepare: Vec::new(),
                checks: vec![
                    Check::UrlContains {
                        fragment: "/blogs/".into(),
                    },
                    Check::NoErrorPage {
                        unless_present: None,
                        error_selectors: Vec::new(),
                        title_keywords: default_title_keywords(),
                        body_keywords: default_error_keywords(),
                        min_body_chars: 100,
                    },
                    Check::Present {
                        selector: Selector::css("article"),
                        attempts: 1,
                    },
                ],
                pagination: None,
                max_pages: None,
                max_links: None,
                stop_below: None,
                expected: None,
            }
        }

        #[tokio::test(start_paused = true)]
        async fn test_visit_sweep_records_each_link() {
            let tmp = TempDir::new().unwrap();
            let mut ctx = ctx(&tmp);
            let mut driver = MockDriver::new();
            let links = Selector::css("a.blog");
            driver.add_page(
                LIST,
                MockPage::new("Blogs")
                    .with_element(links.clone(), link("/en/blogs/visa-guide", "Visa guide\n5 min"))
                    .with_element(links.clone(), link("/en/blogs/visa-guide#comments", "dup"))
                    .with_element(links.clone(), link("/en/blogs/gone", ""))
                    .with_element(links, link("/en/blogs/visa-guide", "again")),
            );
            driver.add_page("https://site.test/en/blogs/visa-guide", article("Visa guide"));
            driver.add_page(
                "https://site.test/en/blogs/gone",
                article("404 Not Found"),
            );
            driver.navigate(LIST).await.unwrap();

            run_sweep(&blog_sweep(OpenMode::Visit), &mut driver, &mut ctx).await;

            assert_eq!(ctx.results.len(), 2);
            assert_eq!(ctx.results[0].name, "Blogs p1 #1: Visa guide");
            assert_eq!(ctx.results[0].outcome, Outcome::Passed);
            assert_eq!(ctx.results[1].name, "Blogs p1 #2: gone");
            assert!(
                matches!(&ctx.results[1].outcome, Outcome::Failed(msg) if msg.contains("title contains"))
            );
            assert!(ctx.results[1].screenshot.is_some());
            assert_eq!(ctx.tally.passed, 1);
            assert_eq!(ctx.tally.failed, 1);
            assert_eq!(driver.url(), LIST);
        }

        #[tokio::test(start_paused = true)]
        async fn test_click_sweep_falls_back_and_retries() {
            let tmp = TempDir::new().unwrap();
            let mut ctx = ctx(&tmp);
            let mut driver = MockDriver::new();
            let links = Selector::css("a.blog");
            driver.add_page(
                LIST,
                MockPage::new("Blogs")
                    .with_element(
                        links.clone(),
                        link("/en/blogs/covered", "Covered").obstructed_by("div"),
                    )
                    .with_element(links.clone(), link("/en/blogs/dead", "Dead")),
            );
            driver.add_page("https://site.test/en/blogs/covered", article("Covered"));
            driver.on_click(
                links,
                MockReaction::Navigate("https://site.test/en/blogs/covered".into()),
            );
            driver.navigate(LIST).await.unwrap();

            let mut spec = blog_sweep(OpenMode::Click);
            spec.retries = 1;
            spec.links = Selector::css("a.blog");
            run_sweep(&spec, &mut driver, &mut ctx).await;

            // Both links share the reaction, so both land on the covered article.
            assert_eq!(ctx.results.len(), 2);
            assert!(ctx.results.iter().all(|r| r.outcome.is_pass()));
            assert!(driver.was_called("script_click:css:a.blog[0]"));
            assert!(driver.was_called("click:css:a.blog[1]"));
        }

        #[tokio::test(start_paused = true)]
        async fn test_click_without_navigation_fails_after_retries() {
            let tmp = TempDir::new().unwrap();
            let mut ctx = ctx(&tmp);
            let mut driver = MockDriver::new();
            let links = Selector::css("a.blog");
            driver.add_page(
                LIST,
                MockPage::new("Blogs").with_element(links, link("/en/blogs/stuck", "Stuck")),
            );
            driver.navigate(LIST).await.unwrap();

            let mut spec = blog_sweep(OpenMode::Click);
            spec.retries = 2;
            run_sweep(&spec, &mut driver, &mut ctx).await;

            assert_eq!(ctx.results.len(), 1);
            assert_eq!(
                ctx.results[0].outcome,
                Outcome::Failed("click did not navigate".into())
            );
            assert_eq!(driver.call_count("click:css:a.blog[0]"), 3);
        }

        #[tokio::test(start_paused = true)]
        async fn test_query_param_pagination() {
            let tmp = TempDir::new().unwrap();
            let mut ctx = ctx(&tmp);
            let mut driver = MockDriver::new();
            let links = Selector::css("a.blog");
            driver.add_page(
                LIST,
                MockPage::new("Blogs").with_element(links.clone(), link("/en/blogs/a", "A")),
            );
            driver.add_page(
                "https://site.test/en/blogs?page=2",
                MockPage::new("Blogs 2").with_element(links, link("/en/blogs/b", "B")),
            );
            driver.add_page("https://site.test/en/blogs/a", article("A"));
            driver.add_page("https://site.test/en/blogs/b", article("B"));
            driver.navigate(LIST).await.unwrap();

            let mut spec = blog_sweep(OpenMode::Visit);
            spec.pagination = Some(Pagination::QueryParam {
                param: "page".into(),
                pages: Some(2),
                pages_from: None,
            });
            spec.expected = Some(ExpectedLinks {
                per_page: 1,
                last_page: Some(1),
            });
            run_sweep(&spec, &mut driver, &mut ctx).await;

            let names: Vec<_> = ctx.results.iter().map(|r| r.name.as_str()).collect();
            assert_eq!(names, ["Blogs p1 #1: A", "Blogs p2 #1: B"]);
            assert!(driver.was_called("navigate:https://site.test/en/blogs?page=2"));
            assert!(!ctx.log.contains("expected"));
        }

        #[tokio::test(start_paused = true)]
        async fn test_stop_below_ends_click_pagination() {
            let tmp = TempDir::new().unwrap();
            let mut ctx = ctx(&tmp);
            let mut driver = MockDriver::new();
            let links = Selector::css("a.blog");
            driver.add_page(
                LIST,
                MockPage::new("Blogs")
                    .with_element(links, link("/en/blogs/a", "A"))
                    .with_element(Selector::css("a.next"), MockElement::new("Next")),
            );
            driver.add_page("https://site.test/en/blogs/a", article("A"));
            driver.navigate(LIST).await.unwrap();

            let mut spec = blog_sweep(OpenMode::Visit);
            spec.pagination = Some(Pagination::Click {
                next: Selector::css("a.next"),
                active: None,
            });
            spec.stop_below = Some(15);
            run_sweep(&spec, &mut driver, &mut ctx).await;

            assert_eq!(ctx.results.len(), 1);
            assert!(ctx.log.contains("fewer than 15 links"));
            assert!(!driver.was_called("click:css:a.next"));
        }

        #[tokio::test(start_paused = true)]
        async fn test_click_pagination_follows_active_marker() {
            let tmp = TempDir::new().unwrap();
            let mut ctx = ctx(&tmp);
            let mut driver = MockDriver::new();
            let marker = Selector::css("a[data-active='true']");
            driver.add_page(
                LIST,
                MockPage::new("Blogs")
                    .with_element(Selector::css("a.blog"), link("/en/blogs/a", "A"))
                    .with_element(Selector::css("a.next"), MockElement::new("Next"))
                    .with_element(marker.clone(), MockElement::new("1")),
            );
            driver.add_page("https://site.test/en/blogs/a", article("A"));
            driver.on_click(
                Selector::css("a.next"),
                MockReaction::SetText {
                    selector: marker.clone(),
                    text: "2".into(),
                },
            );
            driver.navigate(LIST).await.unwrap();

            let mut spec = blog_sweep(OpenMode::Visit);
            spec.open = OpenMode::Click;
            spec.pagination = Some(Pagination::Click {
                next: Selector::css("a.next"),
                active: Some(marker),
            });
            driver.on_click(
                Selector::css("a.blog"),
                MockReaction::Navigate("https://site.test/en/blogs/a".into()),
            );
            run_sweep(&spec, &mut driver, &mut ctx).await;

            // Page 2 re-renders in place: its link was already seen, and the
            // marker stays at 2 on the next click.
            assert_eq!(ctx.results.len(), 1);
            assert!(ctx.log.contains("--- Page 2 ---"));
            assert!(ctx.log.contains("next page did not load"));
        }

        #[tokio::test(start_paused = true)]
        async fn test_page_count_from_pagination_links() {
            let driver = MockDriver::new();
            let sel = Selector::css("[data-slot='pagination-link']");
            for text in ["1", "2", "10", "Next"] {
                driver.add_element(sel.clone(), MockElement::new(text));
            }
            assert_eq!(read_page_count(&driver, &sel).await, 10);
            assert_eq!(read_page_count(&driver, &Selector::css("nav")).await, 1);
        }
    }

    mod check_tests {
        use super::*;
        use crate::browser::WaitPolicy;
        use crate::driver::{MockDriver, MockElement};

        fn docs_check() -> Check {
            Check::RequiredTexts {
                table: Selector::css("table"),
                cells: Selector::css("td.doc"),
                texts: vec!["Valid Passport".into(), "Bank Statement".into()],
                waived_by: vec!["do not need a visa".into()],
            }
        }

        #[tokio::test(start_paused = true)]
        async fn test_required_texts_pass_and_row_warning() {
            let driver = MockDriver::new();
            driver.add_element(Selector::css("table"), MockElement::new(""));
            for text in ["  valid   passport ", "BANK STATEMENT", "Photo"] {
                driver.add_element(Selector::css("td.doc"), MockElement::new(text));
            }
            let result = run_checks(&[docs_check()], &driver, &WaitPolicy::fast()).await;
            assert_eq!(result, CheckResult::Warn("3 rows, expected 2".into()));
        }

        #[tokio::test(start_paused = true)]
        async fn test_required_texts_missing() {
            let driver = MockDriver::new();
            driver.add_element(Selector::css("table"), MockElement::new(""));
            driver.add_element(Selector::css("td.doc"), MockElement::new("Valid Passport"));
            let result = run_checks(&[docs_check()], &driver, &WaitPolicy::fast()).await;
            assert_eq!(result, CheckResult::Fail("missing: Bank Statement".into()));
        }

        #[tokio::test(start_paused = true)]
        async fn test_missing_table_waived_or_failed() {
            let driver = MockDriver::new();
            driver.set_body("Citizens of this country do not need a visa.");
            let result = run_checks(&[docs_check()], &driver, &WaitPolicy::fast()).await;
            assert!(matches!(result, CheckResult::Warn(_)));

            driver.set_body("Something else entirely");
            let result = run_checks(&[docs_check()], &driver, &WaitPolicy::fast()).await;
            assert_eq!(result, CheckResult::Fail("css:table not found".into()));
        }

        #[tokio::test(start_paused = true)]
        async fn test_error_page_signals() {
            let driver = MockDriver::new();
            let check = Check::NoErrorPage {
                unless_present: Some(Selector::css("table")),
                error_selectors: vec![Selector::css("[class*='error-page']")],
                title_keywords: default_title_keywords(),
                body_keywords: default_error_keywords(),
                min_body_chars: 100,
            };
            let waits = WaitPolicy::fast();

            driver.set_body("short");
            assert!(matches!(
                run_checks(std::slice::from_ref(&check), &driver, &waits).await,
                CheckResult::Fail(msg) if msg.contains("only 5 characters")
            ));

            driver.set_body(format!("{} Internal Server Error", "text ".repeat(30)));
            assert!(matches!(
                run_checks(std::slice::from_ref(&check), &driver, &waits).await,
                CheckResult::Fail(msg) if msg.contains("internal server error")
            ));

            driver.add_element(
                Selector::css("[class*='error-page']"),
                MockElement::new("Oops"),
            );
            assert!(matches!(
                run_checks(std::slice::from_ref(&check), &driver, &waits).await,
                CheckResult::Fail(msg) if msg.contains("visible")
            ));

            driver.add_element(Selector::css("table"), MockElement::new(""));
            assert_eq!(
                run_checks(std::slice::from_ref(&check), &driver, &waits).await,
                CheckResult::Pass
            );
        }

        #[tokio::test(start_paused = true)]
        async fn test_min_body_text() {
            let driver = MockDriver::new();
            driver.set_body("tiny");
            let check = Check::MinBodyText {
                chars: 100,
                attempts: 3,
            };
            assert!(matches!(
                run_checks(&[check], &driver, &WaitPolicy::fast()).await,
                CheckResult::Fail(_)
            ));
        }
    }
}
