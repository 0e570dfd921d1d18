//! In-memory page driver for tests.

use super::{ElementHandle, ElementState, PageDriver, Screenshot};
use crate::locator::Selector;
use crate::result::{ProbeError, ProbeResult};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Fake DOM element
#[derive(Debug, Clone)]
pub struct MockElement {
    /// Rendered text
    pub text: String,
    /// Visible on screen
    pub visible: bool,
    /// Not disabled
    pub enabled: bool,
    /// Tag of an overlay that swallows native clicks
    pub obstructed_by: Option<String>,
    /// Attributes (`href`, `aria-label`, ...)
    pub attributes: HashMap<String, String>,
    /// Current input value
    pub value: String,
}

impl MockElement {
    /// Visible, enabled element with the given text
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            visible: true,
            enabled: true,
            obstructed_by: None,
            attributes: HashMap::new(),
            value: String::new(),
        }
    }

    /// Mark hidden
    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// Mark disabled
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Cover with an overlay that intercepts native clicks
    #[must_use]
    pub fn obstructed_by(mut self, tag: impl Into<String>) -> Self {
        self.obstructed_by = Some(tag.into());
        self
    }

    /// Set an attribute
    #[must_use]
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }
}

/// Side effect of clicking or typing into an element
#[derive(Debug, Clone)]
pub enum MockReaction {
    /// Replace the text of the first match of a selector
    SetText {
        /// Element to update
        selector: Selector,
        /// New text
        text: String,
    },
    /// Load another URL
    Navigate(String),
    /// Open a new window/tab
    OpenWindow,
    /// Add elements under a selector (e.g. dropdown options appearing)
    Reveal {
        /// Selector the new elements match
        selector: Selector,
        /// Elements to add
        elements: Vec<MockElement>,
    },
}

/// Static content of one URL
#[derive(Debug, Clone, Default)]
pub struct MockPage {
    /// Document title
    pub title: String,
    /// Body text
    pub body: String,
    /// Elements by selector
    pub elements: HashMap<Selector, Vec<MockElement>>,
}

impl MockPage {
    /// Create an empty page
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Set body text
    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Add an element under a selector
    #[must_use]
    pub fn with_element(mut self, selector: Selector, element: MockElement) -> Self {
        self.elements.entry(selector).or_default().push(element);
        self
    }
}

#[derive(Debug, Default)]
struct MockState {
    url: String,
    page: MockPage,
    pages: HashMap<String, MockPage>,
    history: Vec<String>,
    unreachable: HashSet<String>,
    click_reactions: Vec<(Selector, MockReaction)>,
    type_reactions: Vec<(Selector, MockReaction)>,
    script_results: Vec<(String, serde_json::Value)>,
    ready_state: Option<String>,
    extra_windows: usize,
    fail_screenshots: bool,
    quit_count: usize,
    call_history: Vec<String>,
}

impl MockState {
    fn load(&mut self, url: &str) {
        self.url = url.to_string();
        if let Some(page) = self.pages.get(url) {
            self.page = page.clone();
        }
    }

    fn element(&self, handle: &ElementHandle) -> ProbeResult<&MockElement> {
        self.page
            .elements
            .get(&handle.selector)
            .and_then(|els| els.get(handle.index))
            .ok_or_else(|| ProbeError::StaleElement {
                selector: handle.selector.to_string(),
                index: handle.index,
            })
    }

    fn element_mut(&mut self, handle: &ElementHandle) -> ProbeResult<&mut MockElement> {
        self.page
            .elements
            .get_mut(&handle.selector)
            .and_then(|els| els.get_mut(handle.index))
            .ok_or_else(|| ProbeError::StaleElement {
                selector: handle.selector.to_string(),
                index: handle.index,
            })
    }

    fn apply(&mut self, reaction: MockReaction) {
        match reaction {
            MockReaction::SetText { selector, text } => {
                if let Some(el) = self
                    .page
                    .elements
                    .get_mut(&selector)
                    .and_then(|els| els.first_mut())
                {
                    el.text = text;
                }
            }
            MockReaction::Navigate(url) => {
                let previous = self.url.clone();
                self.history.push(previous);
                self.load(&url);
            }
            MockReaction::OpenWindow => self.extra_windows += 1,
            MockReaction::Reveal { selector, elements } => {
                self.page
                    .elements
                    .entry(selector)
                    .or_default()
                    .extend(elements);
            }
        }
    }

    fn react(&mut self, selector: &Selector, typed: bool) {
        let list = if typed {
            &self.type_reactions
        } else {
            &self.click_reactions
        };
        let reactions: Vec<MockReaction> = list
            .iter()
            .filter(|(s, _)| s == selector)
            .map(|(_, r)| r.clone())
            .collect();
        for reaction in reactions {
            self.apply(reaction);
        }
    }
}

/// Mock driver for unit testing
///
/// Clones share state, so a test can keep a clone for inspection after
/// handing the driver to a session.
#[derive(Debug, Clone, Default)]
pub struct MockDriver {
    state: Arc<Mutex<MockState>>,
}

impl MockDriver {
    /// Create new mock driver
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, call: String) {
        self.state().call_history.push(call);
    }

    /// Register the content served at a URL
    pub fn add_page(&self, url: impl Into<String>, page: MockPage) {
        let url = url.into();
        let mut state = self.state();
        if state.url == url {
            state.page = page.clone();
        }
        state.pages.insert(url, page);
    }

    /// Add an element to the currently loaded page
    pub fn add_element(&self, selector: Selector, element: MockElement) {
        self.state()
            .page
            .elements
            .entry(selector)
            .or_default()
            .push(element);
    }

    /// Remove every element matching a selector from the current page
    pub fn remove_elements(&self, selector: &Selector) {
        self.state().page.elements.remove(selector);
    }

    /// Set the text of the first match on the current page
    pub fn set_text(&self, selector: &Selector, text: impl Into<String>) {
        self.state().apply(MockReaction::SetText {
            selector: selector.clone(),
            text: text.into(),
        });
    }

    /// Set body text of the current page
    pub fn set_body(&self, body: impl Into<String>) {
        self.state().page.body = body.into();
    }

    /// React when an element matching `selector` is clicked
    pub fn on_click(&self, selector: Selector, reaction: MockReaction) {
        self.state().click_reactions.push((selector, reaction));
    }

    /// React when text is typed into an element matching `selector`
    pub fn on_type(&self, selector: Selector, reaction: MockReaction) {
        self.state().type_reactions.push((selector, reaction));
    }

    /// Return `value` from scripts containing `fragment`
    pub fn set_script_result(&self, fragment: impl Into<String>, value: serde_json::Value) {
        self.state().script_results.push((fragment.into(), value));
    }

    /// Override `document.readyState`
    pub fn set_ready_state(&self, state: impl Into<String>) {
        self.state().ready_state = Some(state.into());
    }

    /// Make navigation to `url` fail
    pub fn set_unreachable(&self, url: impl Into<String>) {
        self.state().unreachable.insert(url.into());
    }

    /// Make screenshots fail
    pub fn fail_screenshots(&self) {
        self.state().fail_screenshots = true;
    }

    /// Current input value of an element
    #[must_use]
    pub fn value_of(&self, handle: &ElementHandle) -> Option<String> {
        self.state().element(handle).ok().map(|el| el.value.clone())
    }

    /// Currently loaded URL
    #[must_use]
    pub fn url(&self) -> String {
        self.state().url.clone()
    }

    /// Number of times `quit` was called
    #[must_use]
    pub fn quit_count(&self) -> usize {
        self.state().quit_count
    }

    /// Get call history
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.state().call_history.clone()
    }

    /// Check if method was called
    #[must_use]
    pub fn was_called(&self, method: &str) -> bool {
        self.state()
            .call_history
            .iter()
            .any(|c| c.starts_with(method))
    }

    /// Number of calls starting with `method`
    #[must_use]
    pub fn call_count(&self, method: &str) -> usize {
        self.state()
            .call_history
            .iter()
            .filter(|c| c.starts_with(method))
            .count()
    }
}

#[async_trait]
impl PageDriver for MockDriver {
    async fn navigate(&mut self, url: &str) -> ProbeResult<()> {
        self.record(format!("navigate:{url}"));
        let mut state = self.state();
        if state.unreachable.contains(url) {
            return Err(ProbeError::Navigation {
                url: url.to_string(),
                message: "net::ERR_NAME_NOT_RESOLVED".to_string(),
            });
        }
        if !state.url.is_empty() {
            let previous = state.url.clone();
            state.history.push(previous);
        }
        state.load(url);
        Ok(())
    }

    async fn back(&mut self) -> ProbeResult<()> {
        self.record("back".to_string());
        let mut state = self.state();
        if let Some(previous) = state.history.pop() {
            state.load(&previous);
        }
        Ok(())
    }

    async fn current_url(&self) -> ProbeResult<String> {
        Ok(self.state().url.clone())
    }

    async fn title(&self) -> ProbeResult<String> {
        Ok(self.state().page.title.clone())
    }

    async fn ready_state(&self) -> ProbeResult<String> {
        Ok(self
            .state()
            .ready_state
            .clone()
            .unwrap_or_else(|| "complete".to_string()))
    }

    async fn find_all(&self, selector: &Selector) -> ProbeResult<Vec<ElementHandle>> {
        let count = self
            .state()
            .page
            .elements
            .get(selector)
            .map_or(0, Vec::len);
        Ok((0..count)
            .map(|i| ElementHandle::new(selector.clone(), i))
            .collect())
    }

    async fn element_state(&self, handle: &ElementHandle) -> ProbeResult<ElementState> {
        let state = self.state();
        let el = state.element(handle)?;
        Ok(ElementState {
            visible: el.visible,
            enabled: el.enabled,
        })
    }

    async fn click(&self, handle: &ElementHandle) -> ProbeResult<()> {
        self.record(format!("click:{handle}"));
        let mut state = self.state();
        let el = state.element(handle)?;
        if !el.visible {
            return Err(ProbeError::NotInteractable {
                selector: handle.selector.to_string(),
                reason: "element is not visible".to_string(),
            });
        }
        if !el.enabled {
            return Err(ProbeError::NotInteractable {
                selector: handle.selector.to_string(),
                reason: "element is disabled".to_string(),
            });
        }
        if let Some(tag) = &el.obstructed_by {
            return Err(ProbeError::ClickIntercepted {
                selector: handle.selector.to_string(),
                obstructed_by: tag.clone(),
            });
        }
        state.react(&handle.selector, false);
        Ok(())
    }

    async fn script_click(&self, handle: &ElementHandle) -> ProbeResult<()> {
        self.record(format!("script_click:{handle}"));
        let mut state = self.state();
        state.element(handle)?;
        state.react(&handle.selector, false);
        Ok(())
    }

    async fn scroll_into_view(&self, handle: &ElementHandle) -> ProbeResult<()> {
        self.record(format!("scroll:{handle}"));
        self.state().element(handle).map(|_| ())
    }

    async fn clear_and_type(&self, handle: &ElementHandle, text: &str) -> ProbeResult<()> {
        self.record(format!("type:{handle}:{text}"));
        let mut state = self.state();
        let el = state.element_mut(handle)?;
        if !el.visible || !el.enabled {
            return Err(ProbeError::NotInteractable {
                selector: handle.selector.to_string(),
                reason: "input cannot receive text".to_string(),
            });
        }
        el.value = text.to_string();
        state.react(&handle.selector, true);
        Ok(())
    }

    async fn text(&self, handle: &ElementHandle) -> ProbeResult<String> {
        let state = self.state();
        state.element(handle).map(|el| el.text.clone())
    }

    async fn attribute(&self, handle: &ElementHandle, name: &str) -> ProbeResult<Option<String>> {
        let state = self.state();
        state
            .element(handle)
            .map(|el| el.attributes.get(name).cloned())
    }

    async fn execute_script(&self, script: &str) -> ProbeResult<serde_json::Value> {
        self.record(format!("script:{script}"));
        Ok(self
            .state()
            .script_results
            .iter()
            .find(|(fragment, _)| script.contains(fragment.as_str()))
            .map_or(serde_json::Value::Null, |(_, v)| v.clone()))
    }

    async fn body_text(&self) -> ProbeResult<String> {
        Ok(self.state().page.body.clone())
    }

    async fn screenshot(&self) -> ProbeResult<Screenshot> {
        self.record("screenshot".to_string());
        if self.state().fail_screenshots {
            return Err(ProbeError::Screenshot {
                message: "mock screenshot failure".to_string(),
            });
        }
        Ok(Screenshot::new(b"\x89PNG\r\n\x1a\n".to_vec()))
    }

    async fn window_count(&self) -> ProbeResult<usize> {
        Ok(1 + self.state().extra_windows)
    }

    async fn close_extra_windows(&mut self) -> ProbeResult<usize> {
        self.record("close_extra_windows".to_string());
        let mut state = self.state();
        let closed = state.extra_windows;
        state.extra_windows = 0;
        Ok(closed)
    }

    async fn quit(&mut self) -> ProbeResult<()> {
        self.record("quit".to_string());
        self.state().quit_count += 1;
        Ok(())
    }
}
