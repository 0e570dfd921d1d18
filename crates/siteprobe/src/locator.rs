//! Element selectors.
//!
//! A [`Selector`] names how to find elements on a page. Suite files write
//! selectors as plain strings with an optional strategy prefix:
//!
//! | Form | Strategy |
//! |------|----------|
//! | `css:button.primary` | CSS |
//! | `xpath://main//h1` | XPath |
//! | `id:search` | element id |
//! | `text:Apply Now` | visible text (substring) |
//! | `testid:cookie-banner-accept-button` | `data-testid` attribute |
//! | `/html/body/a`, `(//a)[2]` | XPath (bare) |
//! | anything else | CSS (bare) |
//!
//! Every selector renders to a JavaScript expression that yields an array of
//! matching elements, so drivers can resolve `(selector, index)` handles the
//! same way regardless of strategy.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::result::{ProbeError, ProbeResult};

/// Selector for locating elements
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Selector {
    /// CSS selector (e.g., "button.primary")
    Css(String),
    /// XPath selector
    XPath(String),
    /// Element id
    Id(String),
    /// Text content selector
    Text(String),
    /// Test ID selector (data-testid attribute)
    TestId(String),
}

impl Selector {
    /// Create a CSS selector
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    /// Create an XPath selector
    #[must_use]
    pub fn xpath(expr: impl Into<String>) -> Self {
        Self::XPath(expr.into())
    }

    /// Create an id selector
    #[must_use]
    pub fn id(id: impl Into<String>) -> Self {
        Self::Id(id.into())
    }

    /// Create a text selector
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Create a test ID selector
    #[must_use]
    pub fn test_id(id: impl Into<String>) -> Self {
        Self::TestId(id.into())
    }

    /// Parse a selector string with an optional strategy prefix
    pub fn parse(raw: &str) -> ProbeResult<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ProbeError::suite("empty selector"));
        }

        let selector = if let Some(rest) = raw.strip_prefix("css:") {
            Self::Css(rest.trim().to_string())
        } else if let Some(rest) = raw.strip_prefix("xpath:") {
            Self::XPath(rest.trim().to_string())
        } else if let Some(rest) = raw.strip_prefix("id:") {
            Self::Id(rest.trim().to_string())
        } else if let Some(rest) = raw.strip_prefix("text:") {
            Self::Text(rest.trim().to_string())
        } else if let Some(rest) = raw.strip_prefix("testid:") {
            Self::TestId(rest.trim().to_string())
        } else if raw.starts_with('/') || raw.starts_with('(') {
            Self::XPath(raw.to_string())
        } else {
            Self::Css(raw.to_string())
        };

        if selector.value().is_empty() {
            return Err(ProbeError::suite(format!(
                "selector '{raw}' has an empty value"
            )));
        }
        Ok(selector)
    }

    /// The raw selector value without its strategy
    #[must_use]
    pub fn value(&self) -> &str {
        match self {
            Self::Css(s) | Self::XPath(s) | Self::Id(s) | Self::Text(s) | Self::TestId(s) => s,
        }
    }

    /// JavaScript expression yielding an array of every matching element
    #[must_use]
    pub fn to_all_query(&self) -> String {
        match self {
            Self::Css(s) => format!("Array.from(document.querySelectorAll({}))", js_str(s)),
            Self::XPath(s) => format!(
                "(() => {{ const r = document.evaluate({}, document, null, \
                 XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null); \
                 const out = []; for (let i = 0; i < r.snapshotLength; i++) out.push(r.snapshotItem(i)); \
                 return out; }})()",
                js_str(s)
            ),
            Self::Id(id) => format!(
                "[document.getElementById({})].filter(el => el !== null)",
                js_str(id)
            ),
            Self::Text(t) => format!(
                "(() => {{ const t = {}; const txt = el => el.innerText || el.textContent || ''; \
                 return Array.from(document.querySelectorAll('body *')).filter(el => \
                 txt(el).includes(t) && !Array.from(el.children).some(c => txt(c).includes(t))); }})()",
                js_str(t)
            ),
            Self::TestId(id) => format!(
                "Array.from(document.querySelectorAll({}))",
                js_str(&format!("[data-testid=\"{}\"]", id.replace('"', "\\\"")))
            ),
        }
    }

    /// JavaScript expression yielding the match at `index`, or `null`
    #[must_use]
    pub fn to_nth_query(&self, index: usize) -> String {
        format!("(({}))[{index}] || null", self.to_all_query())
    }

    /// JavaScript expression yielding the first match, or `null`
    #[must_use]
    pub fn to_query(&self) -> String {
        self.to_nth_query(0)
    }

    /// JavaScript expression yielding the number of matches
    #[must_use]
    pub fn to_count_query(&self) -> String {
        format!("({}).length", self.to_all_query())
    }
}

/// Render a string as a JavaScript string literal
pub(crate) fn js_str(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css(s) => write!(f, "css:{s}"),
            Self::XPath(s) => write!(f, "xpath:{s}"),
            Self::Id(s) => write!(f, "id:{s}"),
            Self::Text(s) => write!(f, "text:{s}"),
            Self::TestId(s) => write!(f, "testid:{s}"),
        }
    }
}

impl FromStr for Selector {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Selector {
    type Error = ProbeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Selector> for String {
    fn from(selector: Selector) -> Self {
        selector.to_string()
    }
}
