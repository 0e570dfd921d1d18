//! Result and error types for siteprobe.

use thiserror::Error;

/// Result type for siteprobe operations
pub type ProbeResult<T> = Result<T, ProbeError>;

/// Errors that can occur while driving a page
#[derive(Debug, Error)]
pub enum ProbeError {
    /// Browser executable not found
    #[error("Browser not found. Install Chromium or set CHROMIUM_PATH")]
    BrowserNotFound,

    /// Browser launch error
    #[error("Failed to launch browser: {message}")]
    BrowserLaunch {
        /// Error message
        message: String,
    },

    /// Session already closed
    #[error("Browser session is closed")]
    SessionClosed,

    /// Navigation error
    #[error("Navigation to {url} failed: {message}")]
    Navigation {
        /// URL that failed
        url: String,
        /// Error message
        message: String,
    },

    /// No element matched the selector
    #[error("Element not found: {selector}")]
    ElementNotFound {
        /// Selector that matched nothing
        selector: String,
    },

    /// Another element sits on top of the click target
    #[error("Click on {selector} intercepted by <{obstructed_by}>")]
    ClickIntercepted {
        /// Selector of the click target
        selector: String,
        /// Tag of the element receiving the click instead
        obstructed_by: String,
    },

    /// Element exists but cannot receive input (hidden, zero-sized, disabled)
    #[error("Element {selector} is not interactable: {reason}")]
    NotInteractable {
        /// Selector of the element
        selector: String,
        /// Why the element cannot be interacted with
        reason: String,
    },

    /// Element handle no longer resolves
    #[error("Stale element reference: {selector} [{index}]")]
    StaleElement {
        /// Selector of the handle
        selector: String,
        /// Index within the selector's matches
        index: usize,
    },

    /// JavaScript evaluation error
    #[error("Script evaluation failed: {message}")]
    Script {
        /// Error message
        message: String,
    },

    /// Screenshot error
    #[error("Screenshot failed: {message}")]
    Screenshot {
        /// Error message
        message: String,
    },

    /// Operation timed out
    #[error("Timed out after {ms}ms waiting for {waited_for}")]
    Timeout {
        /// Timeout in milliseconds
        ms: u64,
        /// What was being waited for
        waited_for: String,
    },

    /// Suite definition is invalid
    #[error("Invalid suite definition: {message}")]
    Suite {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl ProbeError {
    /// Create a script error
    #[must_use]
    pub fn script(message: impl Into<String>) -> Self {
        Self::Script {
            message: message.into(),
        }
    }

    /// Create a suite definition error
    #[must_use]
    pub fn suite(message: impl Into<String>) -> Self {
        Self::Suite {
            message: message.into(),
        }
    }

    /// Whether a native click failed because the target could not take it.
    ///
    /// Only these errors trigger the scripted click fallback.
    #[must_use]
    pub const fn is_interception(&self) -> bool {
        matches!(
            self,
            Self::ClickIntercepted { .. } | Self::NotInteractable { .. }
        )
    }

    /// Locate-or-interact failures: the element was missing, stale or unusable.
    #[must_use]
    pub const fn is_locate_failure(&self) -> bool {
        matches!(
            self,
            Self::ElementNotFound { .. }
                | Self::StaleElement { .. }
                | Self::ClickIntercepted { .. }
                | Self::NotInteractable { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interception_classification() {
        let intercepted = ProbeError::ClickIntercepted {
            selector: "#apply".into(),
            obstructed_by: "div".into(),
        };
        let hidden = ProbeError::NotInteractable {
            selector: "#apply".into(),
            reason: "zero-sized".into(),
        };
        let missing = ProbeError::ElementNotFound {
            selector: "#apply".into(),
        };

        assert!(intercepted.is_interception());
        assert!(hidden.is_interception());
        assert!(!missing.is_interception());
        assert!(!ProbeError::script("boom").is_interception());
    }

    #[test]
    fn test_locate_failure_classification() {
        let stale = ProbeError::StaleElement {
            selector: "a.card".into(),
            index: 4,
        };
        assert!(stale.is_locate_failure());
        assert!(!ProbeError::Timeout {
            ms: 10,
            waited_for: "x".into()
        }
        .is_locate_failure());
    }

    #[test]
    fn test_display_messages() {
        let err = ProbeError::ClickIntercepted {
            selector: "button.apply".into(),
            obstructed_by: "div".into(),
        };
        assert_eq!(
            err.to_string(),
            "Click on button.apply intercepted by <div>"
        );

        let err = ProbeError::Timeout {
            ms: 10_000,
            waited_for: "result count change".into(),
        };
        assert!(err.to_string().contains("10000ms"));
    }

    #[test]
    fn test_io_error_from() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ProbeError = io_err.into();
        assert!(err.to_string().contains("I/O"));
    }
}
