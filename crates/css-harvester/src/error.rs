// Copyright 2026 Cortex Contributors
// SPDX-License-Identifier: Apache-2.0

//! Error types for the harvesting pipeline.
//!
//! Only browser launch and navigation failures abort a run. Everything else
//! is scoped to a single resource and ends up in the report's skipped list.

use std::path::PathBuf;

/// All errors that can occur while harvesting stylesheets.
#[derive(thiserror::Error, Debug)]
pub enum HarvestError {
    #[error("Browser launch failed: {0}")]
    BrowserLaunch(String),

    #[error("Navigation to {url} timed out after {timeout_ms}ms")]
    NavigationTimeout { url: String, timeout_ms: u64 },

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Fetch failed: {0}")]
    Fetch(String),

    #[error("Script evaluation failed: {0}")]
    Script(String),

    #[error("Failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl HarvestError {
    /// Whether this error aborts the whole run rather than one resource.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            HarvestError::BrowserLaunch(_)
                | HarvestError::NavigationTimeout { .. }
                | HarvestError::Navigation(_)
        )
    }
}

/// Convenience result type.
pub type HarvestResult<T> = Result<T, HarvestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        let timeout = HarvestError::NavigationTimeout {
            url: "https://example.com".to_string(),
            timeout_ms: 30_000,
        };
        assert!(timeout.is_fatal());
        assert!(HarvestError::BrowserLaunch("no chromium".into()).is_fatal());
        assert!(!HarvestError::Fetch("503".into()).is_fatal());
        assert!(!HarvestError::InvalidUrl("::".into()).is_fatal());
    }

    #[test]
    fn test_timeout_message_names_url() {
        let err = HarvestError::NavigationTimeout {
            url: "https://example.com/page".to_string(),
            timeout_ms: 500,
        };
        assert_eq!(
            err.to_string(),
            "Navigation to https://example.com/page timed out after 500ms"
        );
    }
}
