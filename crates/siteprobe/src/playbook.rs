//! Declarative suite files.
//!
//! A suite file lists the suites of one site. Each suite opens a start URL,
//! runs setup steps, optionally reads a baseline observation, then runs its
//! scenarios and link sweeps in order. Site-specific selectors live here, in
//! data, and nowhere in the harness.
//!
//! ```yaml
//! version: "1.0"
//! suites:
//!   - key: universities
//!     name: UniversitiesTest
//!     start_url: https://example.com/en/universities
//!     baseline: { type: count, selector: "span[aria-live='polite']" }
//!     scenarios:
//!       - name: Search
//!         actions:
//!           - { type: type, selector: "input[placeholder='Search']", text: istanbul }
//!         expect: { type: changes }
//!         reset:
//!           - { type: navigate, url: https://example.com/en/universities }
//! ```

use crate::browser::{BrowserConfig, WaitPolicy};
use crate::interact::OptionChoice;
use crate::locator::Selector;
use crate::observe::Observable;
use crate::result::{ProbeError, ProbeResult};
use crate::sweep::SweepSpec;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// Supported schema version
pub const SCHEMA_VERSION: &str = "1.0";

/// Root of a suite file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteFile {
    /// Schema version (must be "1.0")
    pub version: String,
    /// Browser and wait settings
    #[serde(default)]
    pub settings: Settings,
    /// Suites in run order
    pub suites: Vec<SuiteSpec>,
}

/// Browser and wait settings; unset fields keep their defaults
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Run the browser without a window
    pub headless: Option<bool>,
    /// Window width
    pub window_width: Option<u32>,
    /// Window height
    pub window_height: Option<u32>,
    /// Short wait in milliseconds
    pub short_wait_ms: Option<u64>,
    /// Medium wait in milliseconds
    pub medium_wait_ms: Option<u64>,
    /// Long wait in milliseconds
    pub long_wait_ms: Option<u64>,
    /// Poll interval in milliseconds
    pub poll_interval_ms: Option<u64>,
    /// Page-load timeout in milliseconds
    pub page_load_ms: Option<u64>,
}

impl Settings {
    /// Overlay these settings on a browser configuration
    #[must_use]
    pub fn apply_browser(&self, mut config: BrowserConfig) -> BrowserConfig {
        if let Some(headless) = self.headless {
            config.headless = headless;
        }
        if let Some(width) = self.window_width {
            config.window_width = width;
        }
        if let Some(height) = self.window_height {
            config.window_height = height;
        }
        config
    }

    /// Wait policy with these settings applied over the defaults
    #[must_use]
    pub fn wait_policy(&self) -> WaitPolicy {
        let mut policy = WaitPolicy::default();
        let set = |slot: &mut Duration, ms: Option<u64>| {
            if let Some(ms) = ms {
                *slot = Duration::from_millis(ms);
            }
        };
        set(&mut policy.short, self.short_wait_ms);
        set(&mut policy.medium, self.medium_wait_ms);
        set(&mut policy.long, self.long_wait_ms);
        set(&mut policy.poll_interval, self.poll_interval_ms);
        set(&mut policy.page_load, self.page_load_ms);
        policy
    }
}

/// One suite: a page, its setup and the checks run against it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteSpec {
    /// Short key used on the command line
    pub key: String,
    /// Display name (also names log files and screenshot folders)
    pub name: String,
    /// Page opened first
    pub start_url: String,
    /// Steps run once after opening the start URL
    #[serde(default)]
    pub setup: Vec<Step>,
    /// Observation read after setup; the suite aborts if it is unreadable
    #[serde(default)]
    pub baseline: Option<Observable>,
    /// Scenarios in order
    #[serde(default)]
    pub scenarios: Vec<ScenarioSpec>,
    /// Link sweeps, run after the scenarios
    #[serde(default)]
    pub sweeps: Vec<SweepSpec>,
}

impl SuiteSpec {
    /// Observable a scenario compares, falling back to the suite baseline
    #[must_use]
    pub fn observable_for<'a>(&'a self, scenario: &'a ScenarioSpec) -> Option<&'a Observable> {
        scenario.observe.as_ref().or(self.baseline.as_ref())
    }

    /// Number of scenarios known before running (sweeps add theirs at run time)
    #[must_use]
    pub fn scenario_count(&self) -> usize {
        self.scenarios.len()
    }
}

/// One check: act on the page and judge the effect
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioSpec {
    /// Scenario name
    pub name: String,
    /// Steps run before the baseline observation is taken
    #[serde(default)]
    pub before: Vec<Step>,
    /// What to compare before and after (defaults to the suite baseline)
    #[serde(default)]
    pub observe: Option<Observable>,
    /// Steps that should cause the expected effect
    #[serde(default)]
    pub actions: Vec<Step>,
    /// Expected effect
    #[serde(default)]
    pub expect: Expectation,
    /// An unmet expectation is a warning instead of a failure
    #[serde(default)]
    pub soft: bool,
    /// How long to wait for the effect (defaults to the medium wait)
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    /// Pause between the actions and the evaluation
    #[serde(default)]
    pub settle_ms: Option<u64>,
    /// Steps run afterwards regardless of the outcome
    #[serde(default)]
    pub reset: Vec<Step>,
}

/// A single page interaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Step {
    /// Load a URL and wait for the document to be ready
    Navigate {
        /// Target URL
        url: String,
    },
    /// Click with scripted fallback
    Click {
        /// Element to click
        selector: Selector,
        /// A missing element is a warning instead of an error
        #[serde(default)]
        optional: bool,
        /// Wait for the element this long (defaults to the medium wait)
        #[serde(default)]
        timeout_ms: Option<u64>,
    },
    /// DOM-level click only
    ScriptClick {
        /// Element to click
        selector: Selector,
        /// A missing element is a warning instead of an error
        #[serde(default)]
        optional: bool,
    },
    /// Clear an input and type text
    Type {
        /// Input element
        selector: Selector,
        /// Text to type
        text: String,
    },
    /// Open a dropdown and pick an option
    SelectOption {
        /// Element that opens the dropdown
        trigger: Selector,
        /// Option elements
        options: Selector,
        /// Which option to pick
        #[serde(default)]
        choice: OptionChoice,
    },
    /// Scroll an element into view
    ScrollTo {
        /// Element to reveal
        selector: Selector,
        /// A missing element is a warning instead of an error
        #[serde(default)]
        optional: bool,
    },
    /// Run JavaScript in the page
    Script {
        /// Code to evaluate
        code: String,
    },
    /// Go back in history
    Back,
    /// Sleep
    Pause {
        /// Milliseconds
        ms: u64,
    },
    /// Wait for `document.readyState == "complete"`
    WaitReady,
    /// Wait for an element to be present
    WaitFor {
        /// Element to wait for
        selector: Selector,
        /// Timeout (defaults to the medium wait)
        #[serde(default)]
        timeout_ms: Option<u64>,
    },
    /// Close every window but the main one
    CloseExtraWindows,
}

/// Expected effect of a scenario's actions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Expectation {
    /// The steps ran without error
    #[default]
    Completes,
    /// The observation must change within the timeout
    Changes,
    /// A change passes; no change passes too (with a warning if asked)
    MayChange {
        /// Record a warning when nothing changed
        #[serde(default)]
        warn_if_unchanged: bool,
    },
    /// The observation must be readable afterwards
    Readable,
    /// An element must appear
    Present {
        /// Element expected
        selector: Selector,
    },
    /// An element must disappear
    Absent {
        /// Element expected gone
        selector: Selector,
    },
    /// The URL must change
    UrlChanged,
    /// The URL must contain a fragment
    UrlContains {
        /// Required fragment
        fragment: String,
    },
    /// A new window or tab must open
    NewWindow,
}

impl Expectation {
    /// Whether judging this expectation needs an observable
    #[must_use]
    pub const fn needs_observable(&self) -> bool {
        matches!(self, Self::Changes | Self::MayChange { .. } | Self::Readable)
    }

    /// Whether the baseline observation must be readable before acting
    #[must_use]
    pub const fn needs_baseline(&self) -> bool {
        matches!(self, Self::Changes | Self::MayChange { .. })
    }
}

impl SuiteFile {
    /// Parse and validate YAML
    pub fn from_yaml(yaml: &str) -> ProbeResult<Self> {
        let file: Self = serde_yaml_ng::from_str(yaml)?;
        file.validate()?;
        Ok(file)
    }

    /// Read, parse and validate a suite file
    pub fn load(path: &Path) -> ProbeResult<Self> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml(&yaml)
    }

    /// Check structural rules serde cannot express
    pub fn validate(&self) -> ProbeResult<()> {
        if self.version != SCHEMA_VERSION {
            return Err(ProbeError::suite(format!(
                "unsupported version '{}', expected '{SCHEMA_VERSION}'",
                self.version
            )));
        }
        if self.suites.is_empty() {
            return Err(ProbeError::suite("no suites defined"));
        }

        let mut keys = HashSet::new();
        for suite in &self.suites {
            if suite.key.trim().is_empty() {
                return Err(ProbeError::suite(format!(
                    "suite '{}' has an empty key",
                    suite.name
                )));
            }
            if !keys.insert(suite.key.to_lowercase()) {
                return Err(ProbeError::suite(format!(
                    "duplicate suite key '{}'",
                    suite.key
                )));
            }
            validate_suite(suite)?;
        }
        Ok(())
    }

    /// Suites matching `keys` (case-insensitive), in file order; all suites when empty
    pub fn select(&self, keys: &[String]) -> ProbeResult<Vec<&SuiteSpec>> {
        if keys.is_empty() {
            return Ok(self.suites.iter().collect());
        }
        let wanted: HashSet<String> = keys.iter().map(|k| k.trim().to_lowercase()).collect();
        for key in &wanted {
            if !self.suites.iter().any(|s| s.key.to_lowercase() == *key) {
                return Err(ProbeError::suite(format!("unknown suite '{key}'")));
            }
        }
        Ok(self
            .suites
            .iter()
            .filter(|s| wanted.contains(&s.key.to_lowercase()))
            .collect())
    }
}

fn validate_suite(suite: &SuiteSpec) -> ProbeResult<()> {
    let ctx = |msg: String| ProbeError::suite(format!("suite '{}': {msg}", suite.key));

    if !(suite.start_url.starts_with("http://") || suite.start_url.starts_with("https://")) {
        return Err(ctx(format!("start_url '{}' is not http(s)", suite.start_url)));
    }
    if suite.scenarios.is_empty() && suite.sweeps.is_empty() {
        return Err(ctx("defines no scenarios or sweeps".to_string()));
    }

    let mut names = HashSet::new();
    for scenario in &suite.scenarios {
        if !names.insert(scenario.name.as_str()) {
            return Err(ctx(format!("duplicate scenario '{}'", scenario.name)));
        }
        if scenario.expect.needs_observable() && suite.observable_for(scenario).is_none() {
            return Err(ctx(format!(
                "scenario '{}' expects an observation but neither it nor the suite defines one",
                scenario.name
            )));
        }
    }

    for sweep in &suite.sweeps {
        sweep.validate().map_err(|e| ctx(e.to_string()))?;
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
version: "1.0"
settings:
  headless: true
  medium_wait_ms: 2000
suites:
  - key: universities
    name: UniversitiesTest
    start_url: https://site.test/en/universities
    setup:
      - { type: click, selector: "testid:cookie-banner-accept-button", optional: true }
    baseline: { type: count, selector: "span[aria-live='polite']" }
    scenarios:
      - name: Search
        actions:
          - { type: type, selector: "input[placeholder='Search']", text: istanbul }
        expect: { type: changes }
        reset:
          - { type: navigate, url: https://site.test/en/universities }
      - name: City
        actions:
          - type: select_option
            trigger: "button[role='combobox']"
            options: "[role='option']"
            choice: { skip_exact: [All] }
        expect: { type: may_change, warn_if_unchanged: true }
"#;

    mod parse_tests {
        use super::*;

        #[test]
        fn test_parse_minimal() {
            let file = SuiteFile::from_yaml(MINIMAL).unwrap();
            assert_eq!(file.suites.len(), 1);
            let suite = &file.suites[0];
            assert_eq!(suite.setup.len(), 1);
            assert!(matches!(
                suite.setup[0],
                Step::Click { optional: true, .. }
            ));
            assert_eq!(suite.scenarios[0].expect, Expectation::Changes);
            assert_eq!(
                suite.scenarios[1].expect,
                Expectation::MayChange {
                    warn_if_unchanged: true
                }
            );
            match &suite.scenarios[1].actions[0] {
                Step::SelectOption { choice, .. } => {
                    assert_eq!(choice.skip_exact, vec!["All".to_string()]);
                }
                other => panic!("unexpected step {other:?}"),
            }
        }

        #[test]
        fn test_default_expectation_is_completes() {
            let yaml = r#"
name: Close dialog
actions:
  - { type: click, selector: "button[data-slot='dialog-close']" }
"#;
            let scenario: ScenarioSpec = serde_yaml_ng::from_str(yaml).unwrap();
            assert_eq!(scenario.expect, Expectation::Completes);
            assert!(!scenario.soft);
        }

        #[test]
        fn test_unit_steps() {
            let steps: Vec<Step> = serde_yaml_ng::from_str(
                "- type: back\n- type: wait_ready\n- type: close_extra_windows\n- { type: pause, ms: 500 }\n",
            )
            .unwrap();
            assert_eq!(
                steps,
                vec![
                    Step::Back,
                    Step::WaitReady,
                    Step::CloseExtraWindows,
                    Step::Pause { ms: 500 }
                ]
            );
        }

        #[test]
        fn test_settings() {
            let file = SuiteFile::from_yaml(MINIMAL).unwrap();
            let waits = file.settings.wait_policy();
            assert_eq!(waits.medium, Duration::from_secs(2));
            assert_eq!(waits.short, Duration::from_secs(5));
            let config = file.settings.apply_browser(BrowserConfig::default());
            assert!(config.headless);
        }

        #[test]
        fn test_unknown_setting_rejected() {
            let yaml = MINIMAL.replace("headless: true", "headles: true");
            assert!(SuiteFile::from_yaml(&yaml).is_err());
        }

        #[test]
        fn test_shipped_suites_parse() {
            let file = SuiteFile::from_yaml(include_str!("../../../suites/studyleo.yaml")).unwrap();
            let keys: Vec<&str> = file.suites.iter().map(|s| s.key.as_str()).collect();
            assert_eq!(keys, ["home", "universities", "programs", "blogs", "visa"]);

            let visa = &file.suites[4].sweeps[0];
            assert_eq!(visa.retries, 2);
            assert_eq!(
                visa.expected,
                Some(crate::sweep::ExpectedLinks {
                    per_page: 20,
                    last_page: Some(13)
                })
            );

            // aliases resolve to the shared reset steps
            let programs = &file.suites[2];
            assert_eq!(programs.scenarios[0].reset, programs.scenarios[1].reset);
            assert!(matches!(
                programs.scenarios[0].reset[1],
                Step::ScriptClick { optional: true, .. }
            ));
        }
    }

    mod validate_tests {
        use super::*;

        #[test]
        fn test_wrong_version() {
            let yaml = MINIMAL.replace("\"1.0\"", "\"2.0\"");
            let err = SuiteFile::from_yaml(&yaml).unwrap_err();
            assert!(err.to_string().contains("unsupported version"));
        }

        #[test]
        fn test_duplicate_keys() {
            let mut file = SuiteFile::from_yaml(MINIMAL).unwrap();
            let copy = file.suites[0].clone();
            file.suites.push(copy);
            let err = file.validate().unwrap_err();
            assert!(err.to_string().contains("duplicate suite key"));
        }

        #[test]
        fn test_expectation_without_observable() {
            let mut file = SuiteFile::from_yaml(MINIMAL).unwrap();
            file.suites[0].baseline = None;
            let err = file.validate().unwrap_err();
            assert!(err.to_string().contains("expects an observation"));
        }

        #[test]
        fn test_empty_suite_rejected() {
            let mut file = SuiteFile::from_yaml(MINIMAL).unwrap();
            file.suites[0].scenarios.clear();
            assert!(file.validate().is_err());
        }

        #[test]
        fn test_bad_start_url() {
            let yaml = MINIMAL.replace("start_url: https://", "start_url: ftp://");
            assert!(SuiteFile::from_yaml(&yaml).is_err());
        }

        #[test]
        fn test_select() {
            let file = SuiteFile::from_yaml(MINIMAL).unwrap();
            assert_eq!(file.select(&[]).unwrap().len(), 1);
            assert_eq!(
                file.select(&["Universities".to_string()]).unwrap()[0].name,
                "UniversitiesTest"
            );
            assert!(file.select(&["blogs".to_string()]).is_err());
        }

        #[test]
        fn test_load_from_disk() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("suite.yaml");
            std::fs::write(&path, MINIMAL).unwrap();
            assert!(SuiteFile::load(&path).is_ok());
            assert!(SuiteFile::load(&dir.path().join("missing.yaml")).is_err());
        }
    }
}
