//! Page driver abstraction.
//!
//! The harness never talks to a browser directly. It drives a [`PageDriver`],
//! which is implemented by [`ChromiumDriver`] (CDP via chromiumoxide, feature
//! `browser`) and by [`MockDriver`], a scriptable in-memory page used by the
//! harness tests.
//!
//! Element handles are `(selector, index)` pairs and are re-resolved on every
//! use. A handle whose index no longer resolves is stale.

mod mock;

#[cfg(feature = "browser")]
mod chromium;

#[cfg(feature = "browser")]
pub use chromium::ChromiumDriver;
pub use mock::{MockDriver, MockElement, MockPage, MockReaction};

use crate::locator::Selector;
use crate::result::ProbeResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::SystemTime;

/// Handle to the `index`-th match of a selector
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementHandle {
    /// Selector the handle was resolved from
    pub selector: Selector,
    /// Position among the selector's matches
    pub index: usize,
}

impl ElementHandle {
    /// Create a new element handle
    #[must_use]
    pub const fn new(selector: Selector, index: usize) -> Self {
        Self { selector, index }
    }

    /// Handle to the first match
    #[must_use]
    pub const fn first(selector: Selector) -> Self {
        Self::new(selector, 0)
    }
}

impl fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.selector, self.index)
    }
}

/// Interactability of an element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ElementState {
    /// Rendered with a non-zero box and not hidden by style
    pub visible: bool,
    /// Not disabled
    pub enabled: bool,
}

impl ElementState {
    /// Visible and enabled
    #[must_use]
    pub const fn clickable() -> Self {
        Self {
            visible: true,
            enabled: true,
        }
    }

    /// Whether a user could click the element
    #[must_use]
    pub const fn is_clickable(&self) -> bool {
        self.visible && self.enabled
    }
}

/// Screenshot data with metadata
#[derive(Debug, Clone)]
pub struct Screenshot {
    /// Raw PNG data
    pub data: Vec<u8>,
    /// Timestamp when screenshot was taken
    pub timestamp: SystemTime,
}

impl Screenshot {
    /// Create a new screenshot
    #[must_use]
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            timestamp: SystemTime::now(),
        }
    }

    /// Get the size in bytes
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }

    /// Check if screenshot is valid (has data)
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.data.is_empty()
    }
}

/// Browser automation driver consumed by the harness
///
/// # Implementations
///
/// - `ChromiumDriver` - CDP via chromiumoxide (feature `browser`)
/// - `MockDriver` - In-memory page for tests
#[async_trait]
pub trait PageDriver: Send + Sync + fmt::Debug {
    /// Navigate to URL and wait for the load event
    async fn navigate(&mut self, url: &str) -> ProbeResult<()>;

    /// Go back in history
    async fn back(&mut self) -> ProbeResult<()>;

    /// Get current URL
    async fn current_url(&self) -> ProbeResult<String>;

    /// Get page title
    async fn title(&self) -> ProbeResult<String>;

    /// Get `document.readyState`
    async fn ready_state(&self) -> ProbeResult<String>;

    /// Resolve every match of a selector
    async fn find_all(&self, selector: &Selector) -> ProbeResult<Vec<ElementHandle>>;

    /// Resolve the first match of a selector
    async fn find(&self, selector: &Selector) -> ProbeResult<Option<ElementHandle>> {
        Ok(self.find_all(selector).await?.into_iter().next())
    }

    /// Visibility and enabled state of an element
    async fn element_state(&self, handle: &ElementHandle) -> ProbeResult<ElementState>;

    /// Native (user-level) click
    ///
    /// Fails with `ClickIntercepted` when another element would receive the
    /// click, and with `NotInteractable` when the element is hidden or disabled.
    async fn click(&self, handle: &ElementHandle) -> ProbeResult<()>;

    /// DOM-level click (`element.click()`), bypasses hit testing
    async fn script_click(&self, handle: &ElementHandle) -> ProbeResult<()>;

    /// Scroll the element into the middle of the viewport
    async fn scroll_into_view(&self, handle: &ElementHandle) -> ProbeResult<()>;

    /// Clear an input and type text into it
    async fn clear_and_type(&self, handle: &ElementHandle, text: &str) -> ProbeResult<()>;

    /// Rendered text of an element
    async fn text(&self, handle: &ElementHandle) -> ProbeResult<String>;

    /// Attribute value of an element
    async fn attribute(&self, handle: &ElementHandle, name: &str) -> ProbeResult<Option<String>>;

    /// Execute JavaScript in page context
    async fn execute_script(&self, script: &str) -> ProbeResult<serde_json::Value>;

    /// Text of the document body
    async fn body_text(&self) -> ProbeResult<String>;

    /// Full-page PNG screenshot
    async fn screenshot(&self) -> ProbeResult<Screenshot>;

    /// Number of open windows/tabs
    async fn window_count(&self) -> ProbeResult<usize>;

    /// Close every window except the main one, returning how many were closed
    async fn close_extra_windows(&mut self) -> ProbeResult<usize>;

    /// Shut the browser down
    async fn quit(&mut self) -> ProbeResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_display() {
        let handle = ElementHandle::new(Selector::css("a.card"), 3);
        assert_eq!(handle.to_string(), "css:a.card[3]");
        assert_eq!(ElementHandle::first(Selector::id("x")).index, 0);
    }

    #[test]
    fn test_element_state() {
        assert!(ElementState::clickable().is_clickable());
        assert!(!ElementState::default().is_clickable());
        let disabled = ElementState {
            visible: true,
            enabled: false,
        };
        assert!(!disabled.is_clickable());
    }

    #[test]
    fn test_screenshot_validity() {
        assert!(Screenshot::new(vec![0x89, b'P', b'N', b'G']).is_valid());
        assert!(!Screenshot::new(vec![]).is_valid());
        assert_eq!(Screenshot::new(vec![1, 2, 3]).size_bytes(), 3);
    }
}
