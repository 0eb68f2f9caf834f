use crate::{HarvestError, HarvestResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

pub const DEFAULT_PAGE_PARAM: &str = "site";
/// Present on every listing page, including the "no results" one.
pub const DEFAULT_READY_SELECTOR: &str = "div.table-body";
pub const DEFAULT_NO_RESULTS_SELECTOR: &str =
    "div.table-body > p.noResults.text-center.h3.text-muted.py-5";
pub const DEFAULT_NEXT_SELECTOR: &str = r#"a.pagination-control[aria-label="Next page"]"#;
pub const DEFAULT_DISABLED_CLASS: &str = "disabled";

/// How the pages of one set are discovered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum PaginationStrategy {
    /// Only the document at the set's link.
    SinglePage,
    /// `link?<param>=<n>` for n = start, start + 1, ... until `stop` fires.
    QueryIncrement {
        #[serde(default = "default_page_param")]
        param: String,
        #[serde(default = "default_start_index")]
        start: usize,
        #[serde(default)]
        stop: StopSignal,
    },
    /// Navigate to the link once, then keep clicking the next control.
    ClickThrough {
        #[serde(default)]
        control: NextControl,
    },
}

impl Default for PaginationStrategy {
    fn default() -> Self {
        PaginationStrategy::QueryIncrement {
            param: default_page_param(),
            start: default_start_index(),
            stop: StopSignal::default(),
        }
    }
}

impl PaginationStrategy {
    pub fn query_increment() -> Self {
        Self::default()
    }

    pub fn click_through() -> Self {
        PaginationStrategy::ClickThrough {
            control: NextControl::default(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PaginationStrategy::SinglePage => "single_page",
            PaginationStrategy::QueryIncrement { .. } => "query_increment",
            PaginationStrategy::ClickThrough { .. } => "click_through",
        }
    }

    pub fn validate(&self) -> HarvestResult<()> {
        match self {
            PaginationStrategy::SinglePage => Ok(()),
            PaginationStrategy::QueryIncrement { param, stop, .. } => {
                if param.trim().is_empty() {
                    return Err(HarvestError::ConfigError(
                        "page query parameter must not be empty".to_string(),
                    ));
                }
                match stop {
                    StopSignal::NoResults { marker } => marker.validate(),
                    StopSignal::NextDisabled { control } => control.validate(),
                }
            }
            PaginationStrategy::ClickThrough { control } => control.validate(),
        }
    }
}

/// What tells the query-increment walk that it is past the last page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "until", rename_all = "snake_case")]
pub enum StopSignal {
    /// The page carries a "no results" marker; that page is not kept.
    NoResults { marker: EndMarker },
    /// The page's next control is disabled; that page is kept and is the last.
    NextDisabled { control: NextControl },
}

impl Default for StopSignal {
    fn default() -> Self {
        StopSignal::NoResults {
            marker: EndMarker::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EndMarker {
    /// An element matching the selector exists in the page.
    Selector { selector: String },
    /// The page markup contains the pattern (case-insensitive unless regex).
    Content {
        pattern: String,
        #[serde(default)]
        is_regex: bool,
    },
}

impl Default for EndMarker {
    fn default() -> Self {
        EndMarker::Selector {
            selector: DEFAULT_NO_RESULTS_SELECTOR.to_string(),
        }
    }
}

impl EndMarker {
    fn validate(&self) -> HarvestResult<()> {
        match self {
            EndMarker::Selector { selector } => require_selector(selector),
            EndMarker::Content { pattern, is_regex } => {
                if pattern.is_empty() {
                    return Err(HarvestError::ConfigError(
                        "end marker pattern must not be empty".to_string(),
                    ));
                }
                if *is_regex {
                    Regex::new(pattern)?;
                }
                Ok(())
            }
        }
    }

    /// Content check against already extracted markup. Selector markers need
    /// the live page and are answered by the driver instead.
    pub fn matches_content(&self, html: &str) -> HarvestResult<bool> {
        match self {
            EndMarker::Selector { .. } => Ok(false),
            EndMarker::Content { pattern, is_regex } => {
                if *is_regex {
                    Ok(Regex::new(pattern)?.is_match(html))
                } else {
                    Ok(html.to_lowercase().contains(&pattern.to_lowercase()))
                }
            }
        }
    }
}

/// The "next page" anchor and the class it carries on the last page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextControl {
    #[serde(default = "default_next_selector")]
    pub selector: String,
    #[serde(default = "default_disabled_class")]
    pub disabled_class: String,
}

impl Default for NextControl {
    fn default() -> Self {
        Self {
            selector: default_next_selector(),
            disabled_class: default_disabled_class(),
        }
    }
}

impl NextControl {
    fn validate(&self) -> HarvestResult<()> {
        require_selector(&self.selector)?;
        if self.disabled_class.trim().is_empty() {
            return Err(HarvestError::ConfigError(
                "disabled class must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// What to do when the next control is missing from a page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingControlPolicy {
    /// Fail the set with `ControlNotFound`; nothing is written.
    #[default]
    Fail,
    /// Treat the page as the last one and keep what was collected.
    Finish,
}

/// Builds the URL of page `index` by appending `param=index` to the link's query.
pub fn page_url(link: &Url, param: &str, index: usize) -> Url {
    let mut url = link.clone();
    url.query_pairs_mut().append_pair(param, &index.to_string());
    url
}

fn require_selector(selector: &str) -> HarvestResult<()> {
    if selector.trim().is_empty() {
        return Err(HarvestError::ConfigError(
            "selector must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn default_page_param() -> String {
    DEFAULT_PAGE_PARAM.to_string()
}

fn default_start_index() -> usize {
    1
}

fn default_next_selector() -> String {
    DEFAULT_NEXT_SELECTOR.to_string()
}

fn default_disabled_class() -> String {
    DEFAULT_DISABLED_CLASS.to_string()
}
