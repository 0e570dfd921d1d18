//! Page observations.
//!
//! An [`Observable`] is something a scenario reads before and after acting
//! on the page: a result counter, an element's text, the URL, how many
//! elements match, or how many windows are open. Reading never fails; a value
//! that cannot be read is [`Observation::Unreadable`].

use crate::driver::PageDriver;
use crate::locator::Selector;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// What to read from the page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Observable {
    /// Digits in an element's text, as a number ("78 Universities Found" is 78)
    Count {
        /// Counter element
        selector: Selector,
    },
    /// Whitespace-normalised text of an element
    Text {
        /// Element to read
        selector: Selector,
    },
    /// Current URL
    Url,
    /// Number of elements matching a selector
    ElementCount {
        /// Elements to count
        selector: Selector,
    },
    /// Number of open windows/tabs
    WindowCount,
}

impl Observable {
    /// Read the current value
    pub async fn observe(&self, driver: &dyn PageDriver) -> Observation {
        let observed = match self {
            Self::Count { selector } => read_text(driver, selector)
                .await
                .and_then(|text| parse_count(&text))
                .map_or(Observation::Unreadable, Observation::Number),
            Self::Text { selector } => read_text(driver, selector)
                .await
                .map_or(Observation::Unreadable, |t| {
                    Observation::Text(normalize_whitespace(&t))
                }),
            Self::Url => driver
                .current_url()
                .await
                .map_or(Observation::Unreadable, Observation::Text),
            Self::ElementCount { selector } => driver
                .find_all(selector)
                .await
                .map_or(Observation::Unreadable, |els| {
                    Observation::Number(els.len() as u64)
                }),
            Self::WindowCount => driver
                .window_count()
                .await
                .map_or(Observation::Unreadable, |n| Observation::Number(n as u64)),
        };
        debug!(observable = %self, observed = %observed, "observe");
        observed
    }
}

async fn read_text(driver: &dyn PageDriver, selector: &Selector) -> Option<String> {
    let handle = driver.find(selector).await.ok()??;
    driver.text(&handle).await.ok()
}

impl fmt::Display for Observable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Count { selector } => write!(f, "count({selector})"),
            Self::Text { selector } => write!(f, "text({selector})"),
            Self::Url => write!(f, "url"),
            Self::ElementCount { selector } => write!(f, "element_count({selector})"),
            Self::WindowCount => write!(f, "window_count"),
        }
    }
}

/// A value read from the page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Observation {
    /// Numeric value
    Number(u64),
    /// Text value
    Text(String),
    /// Element missing or text without digits
    Unreadable,
}

impl Observation {
    /// Whether a value was read
    #[must_use]
    pub const fn is_readable(&self) -> bool {
        !matches!(self, Self::Unreadable)
    }

    /// Numeric value, if any
    #[must_use]
    pub const fn as_number(&self) -> Option<u64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => f.write_str(&format_count(*n)),
            Self::Text(t) => write!(f, "\"{t}\""),
            Self::Unreadable => f.write_str("N/A"),
        }
    }
}

/// Concatenate every digit in `text` into a number
///
/// Returns `None` when the text has no digits or the number overflows.
#[must_use]
pub fn parse_count(text: &str) -> Option<u64> {
    let digits: String = text.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

/// Format a count with thousands separators ("1,234")
#[must_use]
pub fn format_count(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Collapse runs of whitespace into single spaces and trim
#[must_use]
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::driver::{MockDriver, MockElement};
    use proptest::prelude::*;

    mod parse_tests {
        use super::*;

        #[test]
        fn test_parse_count() {
            assert_eq!(parse_count("78 Universities Found"), Some(78));
            assert_eq!(parse_count("1,234 programs"), Some(1234));
            assert_eq!(parse_count("No results"), None);
            assert_eq!(parse_count(""), None);
            assert_eq!(parse_count("0 Found"), Some(0));
        }

        #[test]
        fn test_parse_count_overflow() {
            assert_eq!(parse_count("99999999999999999999999 found"), None);
        }

        #[test]
        fn test_format_count() {
            assert_eq!(format_count(0), "0");
            assert_eq!(format_count(999), "999");
            assert_eq!(format_count(1_000), "1,000");
            assert_eq!(format_count(1_234_567), "1,234,567");
        }

        #[test]
        fn test_normalize_whitespace() {
            assert_eq!(
                normalize_whitespace("  Valid\n  Passport \t"),
                "Valid Passport"
            );
        }

        #[test]
        fn test_observation_display() {
            assert_eq!(Observation::Number(12_345).to_string(), "12,345");
            assert_eq!(Observation::Unreadable.to_string(), "N/A");
            assert_eq!(Observation::Text("x".into()).to_string(), "\"x\"");
        }

        proptest! {
            #[test]
            fn prop_format_then_parse(n in any::<u64>()) {
                prop_assert_eq!(parse_count(&format_count(n)), Some(n));
            }

            #[test]
            fn prop_parse_ignores_letters(n in 0u64..1_000_000, word in "[a-zA-Z ]{0,12}") {
                let text = format!("{n}{word}");
                prop_assert_eq!(parse_count(&text), Some(n));
            }
        }
    }

    mod observe_tests {
        use super::*;

        #[tokio::test]
        async fn test_count_and_text() {
            let driver = MockDriver::new();
            let counter = Selector::css("span[aria-live='polite']");
            driver.add_element(counter.clone(), MockElement::new("78 Universities Found"));

            let count = Observable::Count {
                selector: counter.clone(),
            };
            assert_eq!(count.observe(&driver).await, Observation::Number(78));

            let text = Observable::Text { selector: counter };
            assert_eq!(
                text.observe(&driver).await,
                Observation::Text("78 Universities Found".into())
            );
        }

        #[tokio::test]
        async fn test_missing_counter_is_unreadable() {
            let driver = MockDriver::new();
            let count = Observable::Count {
                selector: Selector::css("span.missing"),
            };
            assert_eq!(count.observe(&driver).await, Observation::Unreadable);
        }

        #[tokio::test]
        async fn test_element_and_window_count() {
            let driver = MockDriver::new();
            let cards = Selector::css("a.card");
            for i in 0..3 {
                driver.add_element(cards.clone(), MockElement::new(format!("card {i}")));
            }
            let observable = Observable::ElementCount { selector: cards };
            assert_eq!(observable.observe(&driver).await, Observation::Number(3));
            assert_eq!(
                Observable::WindowCount.observe(&driver).await,
                Observation::Number(1)
            );
        }

        #[test]
        fn test_yaml_form() {
            let yaml = "type: count\nselector: \"span.text-xs\"\n";
            let observable: Observable = serde_yaml_ng::from_str(yaml).unwrap();
            assert_eq!(
                observable,
                Observable::Count {
                    selector: Selector::css("span.text-xs")
                }
            );
            let url: Observable = serde_yaml_ng::from_str("type: url").unwrap();
            assert_eq!(url, Observable::Url);
        }
    }
}
