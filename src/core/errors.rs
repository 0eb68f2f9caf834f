use crate::storage::StorageError;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarvestError {
    #[error("Browser error: {0}")]
    BrowserError(#[from] chromiumoxide::error::CdpError),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("URL parsing error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Regex error: {0}")]
    RegexError(#[from] regex::Error),

    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error("Navigation to {url} failed: {reason}")]
    NavigationError { url: String, reason: String },

    #[error("Timed out after {after:?} while {operation}")]
    Timeout { operation: String, after: Duration },

    #[error("Next page control `{selector}` not found on page {page}")]
    ControlNotFound { selector: String, page: usize },

    #[error("Page limit of {limit} reached before the last page")]
    PageLimitExceeded { limit: usize },

    #[error("Script error: {0}")]
    ScriptError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl HarvestError {
    /// Stable short name used to bucket failures in the run statistics.
    pub fn kind(&self) -> &'static str {
        match self {
            HarvestError::BrowserError(_) => "browser",
            HarvestError::HttpError(_) => "http",
            HarvestError::UrlError(_) => "url",
            HarvestError::IoError(_) => "io",
            HarvestError::JsonError(_) => "json",
            HarvestError::RegexError(_) => "regex",
            HarvestError::StorageError(_) => "storage",
            HarvestError::NavigationError { .. } => "navigation",
            HarvestError::Timeout { .. } => "timeout",
            HarvestError::ControlNotFound { .. } => "control_not_found",
            HarvestError::PageLimitExceeded { .. } => "page_limit",
            HarvestError::ScriptError(_) => "script",
            HarvestError::ConfigError(_) => "config",
        }
    }

    pub(crate) fn timeout(operation: impl Into<String>, after: Duration) -> Self {
        HarvestError::Timeout {
            operation: operation.into(),
            after,
        }
    }
}

pub type HarvestResult<T> = Result<T, HarvestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message_names_operation() {
        let err = HarvestError::timeout("waiting for `div.table-body`", Duration::from_secs(10));
        assert_eq!(
            err.to_string(),
            "Timed out after 10s while waiting for `div.table-body`"
        );
        assert_eq!(err.kind(), "timeout");
    }

    #[test]
    fn test_control_not_found_is_distinct_kind() {
        let err = HarvestError::ControlNotFound {
            selector: "a.next".to_string(),
            page: 1,
        };
        assert_eq!(err.kind(), "control_not_found");
        assert!(err.to_string().contains("a.next"));
    }
}
