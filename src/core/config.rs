use crate::core::pagination::{MissingControlPolicy, PaginationStrategy, DEFAULT_READY_SELECTOR};
use crate::{HarvestError, HarvestResult};
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Everything a harvest run needs besides the list of sets.
///
/// Built in code with the `with_*` methods, or read from a JSON file where
/// every field is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    pub output_dir: PathBuf,
    pub error_log: Option<PathBuf>,
    pub strategy: PaginationStrategy,
    /// Awaited after every navigation; a page without it is broken, not empty.
    /// `null` in a config file turns the check off.
    pub ready_selector: Option<String>,
    pub navigation_timeout_ms: u64,
    pub selector_timeout_ms: u64,
    pub max_pages: Option<usize>,
    pub on_missing_control: MissingControlPolicy,
    pub browser: BrowserOptions,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("html_files"),
            error_log: None,
            strategy: PaginationStrategy::default(),
            ready_selector: Some(DEFAULT_READY_SELECTOR.to_string()),
            navigation_timeout_ms: 30_000,
            selector_timeout_ms: 10_000,
            max_pages: None,
            on_missing_control: MissingControlPolicy::default(),
            browser: BrowserOptions::default(),
        }
    }
}

impl HarvestConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> HarvestResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            HarvestError::ConfigError(format!("cannot read config {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&content)?;
        info!("Loaded harvest config from {}", path.display());
        Ok(config)
    }

    pub fn with_output_dir<P: Into<PathBuf>>(mut self, output_dir: P) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    pub fn with_error_log<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.error_log = Some(path.into());
        self
    }

    pub fn with_strategy(mut self, strategy: PaginationStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_ready_selector(mut self, selector: &str) -> Self {
        self.ready_selector = Some(selector.to_string());
        self
    }

    pub fn without_ready_selector(mut self) -> Self {
        self.ready_selector = None;
        self
    }

    pub fn with_navigation_timeout(mut self, timeout: Duration) -> Self {
        self.navigation_timeout_ms = as_millis(timeout);
        self
    }

    pub fn with_selector_timeout(mut self, timeout: Duration) -> Self {
        self.selector_timeout_ms = as_millis(timeout);
        self
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = Some(max_pages);
        self
    }

    pub fn with_missing_control_policy(mut self, policy: MissingControlPolicy) -> Self {
        self.on_missing_control = policy;
        self
    }

    pub fn with_browser(mut self, browser: BrowserOptions) -> Self {
        self.browser = browser;
        self
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    pub fn selector_timeout(&self) -> Duration {
        Duration::from_millis(self.selector_timeout_ms)
    }

    /// Rejects settings that could only fail later, mid-run.
    pub fn validate(&self) -> HarvestResult<()> {
        if self.navigation_timeout_ms == 0 || self.selector_timeout_ms == 0 {
            return Err(HarvestError::ConfigError(
                "timeouts must be at least one millisecond".to_string(),
            ));
        }
        if self.max_pages == Some(0) {
            return Err(HarvestError::ConfigError(
                "max_pages must be greater than zero".to_string(),
            ));
        }
        if let Some(selector) = &self.ready_selector {
            if selector.trim().is_empty() {
                return Err(HarvestError::ConfigError(
                    "ready selector must not be empty".to_string(),
                ));
            }
        }
        self.strategy.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserOptions {
    pub headless: bool,
    pub executable: Option<PathBuf>,
    /// DevTools endpoint of an already running browser (`ws://` or `http://`).
    pub remote_url: Option<String>,
    pub user_agent: Option<String>,
    /// Hides the usual automation fingerprints (launch flags and injected
    /// page scripts).
    pub stealth: bool,
    pub args: Vec<String>,
    pub request_timeout_secs: u64,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            headless: true,
            executable: None,
            remote_url: None,
            user_agent: Some(DEFAULT_USER_AGENT.to_string()),
            stealth: true,
            args: Vec::new(),
            request_timeout_secs: 60,
        }
    }
}

impl BrowserOptions {
    pub fn with_head(mut self) -> Self {
        self.headless = false;
        self
    }

    pub fn with_remote_url(mut self, url: &str) -> Self {
        self.remote_url = Some(url.to_string());
        self
    }

    pub fn without_stealth(mut self) -> Self {
        self.stealth = false;
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn as_millis(timeout: Duration) -> u64 {
    u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX)
}
