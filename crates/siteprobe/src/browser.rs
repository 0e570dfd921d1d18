//! Browser session management.
//!
//! A [`Session`] owns one page driver for the lifetime of a suite (or of a
//! whole run in shared-browser mode). Closing is idempotent: the driver's
//! `quit` runs at most once no matter how many times `close` is called.

use crate::driver::PageDriver;
use crate::result::ProbeResult;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Default short wait (5 seconds)
pub const DEFAULT_SHORT_WAIT_MS: u64 = 5_000;

/// Default medium wait (10 seconds)
pub const DEFAULT_MEDIUM_WAIT_MS: u64 = 10_000;

/// Default long wait (20 seconds)
pub const DEFAULT_LONG_WAIT_MS: u64 = 20_000;

/// Default polling interval (500 ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// Default page-load timeout (10 seconds)
pub const DEFAULT_PAGE_LOAD_MS: u64 = 10_000;

/// Browser configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Run in headless mode
    pub headless: bool,
    /// Window width
    pub window_width: u32,
    /// Window height
    pub window_height: u32,
    /// Path to chromium binary (None = auto-detect)
    pub chromium_path: Option<String>,
    /// Sandbox mode (disable for containers)
    pub sandbox: bool,
    /// Suppress site notification prompts
    pub disable_notifications: bool,
    /// Allow popups (new tabs opened by links)
    pub disable_popup_blocking: bool,
    /// Hide the automation-controlled flag from pages
    pub hide_automation: bool,
    /// CDP request timeout
    #[serde(with = "duration_ms")]
    pub request_timeout: Duration,
    /// Additional command-line switches
    pub extra_args: Vec<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: false,
            window_width: 1920,
            window_height: 1080,
            chromium_path: None,
            sandbox: true,
            disable_notifications: true,
            disable_popup_blocking: true,
            hide_automation: true,
            request_timeout: Duration::from_secs(30),
            extra_args: Vec::new(),
        }
    }
}

impl BrowserConfig {
    /// Set window dimensions
    #[must_use]
    pub const fn with_window(mut self, width: u32, height: u32) -> Self {
        self.window_width = width;
        self.window_height = height;
        self
    }

    /// Set headless mode
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Set chromium path
    #[must_use]
    pub fn with_chromium_path(mut self, path: impl Into<String>) -> Self {
        self.chromium_path = Some(path.into());
        self
    }

    /// Disable sandbox (for containers/CI)
    #[must_use]
    pub const fn with_no_sandbox(mut self) -> Self {
        self.sandbox = false;
        self
    }

    /// Add a command-line switch
    #[must_use]
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.extra_args.push(arg.into());
        self
    }

    /// Command-line switches derived from the configuration
    #[must_use]
    pub fn launch_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if !self.headless {
            args.push("--start-maximized".to_string());
        }
        if self.disable_notifications {
            args.push("--disable-notifications".to_string());
        }
        if self.disable_popup_blocking {
            args.push("--disable-popup-blocking".to_string());
        }
        if self.hide_automation {
            args.push("--disable-blink-features=AutomationControlled".to_string());
        }
        args.extend(self.extra_args.iter().cloned());
        args
    }
}

/// Timeouts used by waits and page loads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitPolicy {
    /// Short wait (element presence after an action)
    #[serde(with = "duration_ms")]
    pub short: Duration,
    /// Medium wait (result changes, clickability)
    #[serde(with = "duration_ms")]
    pub medium: Duration,
    /// Long wait (slow pages)
    #[serde(with = "duration_ms")]
    pub long: Duration,
    /// Interval between polls
    #[serde(with = "duration_ms")]
    pub poll_interval: Duration,
    /// Page-load timeout
    #[serde(with = "duration_ms")]
    pub page_load: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            short: Duration::from_millis(DEFAULT_SHORT_WAIT_MS),
            medium: Duration::from_millis(DEFAULT_MEDIUM_WAIT_MS),
            long: Duration::from_millis(DEFAULT_LONG_WAIT_MS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            page_load: Duration::from_millis(DEFAULT_PAGE_LOAD_MS),
        }
    }
}

impl WaitPolicy {
    /// Uniformly short policy for tests
    #[must_use]
    pub const fn fast() -> Self {
        Self {
            short: Duration::from_millis(50),
            medium: Duration::from_millis(100),
            long: Duration::from_millis(200),
            poll_interval: Duration::from_millis(10),
            page_load: Duration::from_millis(100),
        }
    }
}

pub(crate) mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

/// One browser session
#[derive(Debug)]
pub struct Session {
    driver: Box<dyn PageDriver>,
    waits: WaitPolicy,
    closed: bool,
}

impl Session {
    /// Launch a Chromium session
    ///
    /// # Errors
    ///
    /// Returns error if the browser cannot be launched
    #[cfg(feature = "browser")]
    pub async fn launch(config: &BrowserConfig) -> ProbeResult<Self> {
        let driver = crate::driver::ChromiumDriver::launch(config).await?;
        Ok(Self::from_driver(driver))
    }

    /// Wrap an existing driver
    #[must_use]
    pub fn from_driver(driver: impl PageDriver + 'static) -> Self {
        Self {
            driver: Box::new(driver),
            waits: WaitPolicy::default(),
            closed: false,
        }
    }

    /// Use a different wait policy
    #[must_use]
    pub fn with_waits(mut self, waits: WaitPolicy) -> Self {
        self.waits = waits;
        self
    }

    /// The session's wait policy
    #[must_use]
    pub const fn waits(&self) -> &WaitPolicy {
        &self.waits
    }

    /// Shared access to the driver
    #[must_use]
    pub fn driver(&self) -> &dyn PageDriver {
        self.driver.as_ref()
    }

    /// Exclusive access to the driver
    pub fn driver_mut(&mut self) -> &mut dyn PageDriver {
        self.driver.as_mut()
    }

    /// Whether `close` has run
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    /// Quit the browser; later calls are no-ops
    pub async fn close(&mut self) -> ProbeResult<()> {
        if self.closed {
            debug!("session already closed");
            return Ok(());
        }
        self.closed = true;
        if let Err(e) = self.driver.quit().await {
            warn!(error = %e, "browser did not shut down cleanly");
            return Err(e);
        }
        debug!("session closed");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::driver::MockDriver;

    mod config_tests {
        use super::*;

        #[test]
        fn test_default_args() {
            let args = BrowserConfig::default().launch_args();
            assert!(args.contains(&"--start-maximized".to_string()));
            assert!(args.contains(&"--disable-notifications".to_string()));
            assert!(args.contains(&"--disable-popup-blocking".to_string()));
            assert!(args.contains(&"--disable-blink-features=AutomationControlled".to_string()));
        }

        #[test]
        fn test_headless_skips_maximize() {
            let args = BrowserConfig::default()
                .with_headless(true)
                .with_arg("--lang=en")
                .launch_args();
            assert!(!args.contains(&"--start-maximized".to_string()));
            assert_eq!(args.last().map(String::as_str), Some("--lang=en"));
        }

        #[test]
        fn test_builder() {
            let config = BrowserConfig::default()
                .with_window(1280, 720)
                .with_no_sandbox()
                .with_chromium_path("/usr/bin/chromium");
            assert_eq!(config.window_width, 1280);
            assert!(!config.sandbox);
            assert_eq!(config.chromium_path.as_deref(), Some("/usr/bin/chromium"));
        }

        #[test]
        fn test_wait_policy_defaults() {
            let waits = WaitPolicy::default();
            assert_eq!(waits.short, Duration::from_secs(5));
            assert_eq!(waits.medium, Duration::from_secs(10));
            assert_eq!(waits.long, Duration::from_secs(20));
            assert_eq!(waits.poll_interval, Duration::from_millis(500));
        }

        #[test]
        fn test_wait_policy_serde_ms() {
            let json = serde_json::to_value(WaitPolicy::default()).unwrap();
            assert_eq!(json["short"], 5000);
            let back: WaitPolicy = serde_json::from_value(json).unwrap();
            assert_eq!(back, WaitPolicy::default());
        }
    }

    mod session_tests {
        use super::*;

        #[tokio::test]
        async fn test_close_is_idempotent() {
            let mock = MockDriver::new();
            let mut session = Session::from_driver(mock.clone());

            assert!(!session.is_closed());
            session.close().await.unwrap();
            session.close().await.unwrap();
            session.close().await.unwrap();

            assert!(session.is_closed());
            assert_eq!(mock.quit_count(), 1);
        }

        #[tokio::test]
        async fn test_driver_access() {
            let mock = MockDriver::new();
            let mut session = Session::from_driver(mock.clone()).with_waits(WaitPolicy::fast());
            session
                .driver_mut()
                .navigate("https://site.test")
                .await
                .unwrap();
            assert_eq!(
                session.driver().current_url().await.unwrap(),
                "https://site.test"
            );
            assert_eq!(session.waits().poll_interval, Duration::from_millis(10));
        }
    }
}
