// Copyright 2026 Cortex Contributors
// SPDX-License-Identifier: Apache-2.0

//! Stylesheet capture core: classification, path derivation, deduplication,
//! persistence, inline aggregation and single-pass `@import` resolution.

pub mod classify;
pub mod imports;
pub mod inline;
pub mod ledger;
pub mod path;
pub mod sink;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Mutex;

/// How a stylesheet entered the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// Loaded by the page itself.
    External,
    /// Fetched directly because a captured stylesheet `@import`ed it.
    Import,
    /// Bundle of the page's `<style>` blocks.
    Inline,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ResourceKind::External => "external",
            ResourceKind::Import => "import",
            ResourceKind::Inline => "inline",
        };
        f.write_str(label)
    }
}

/// A stylesheet that was written to disk during this run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedResource {
    pub source_url: String,
    /// Full path of the written file (output dir included).
    pub local_path: PathBuf,
    pub kind: ResourceKind,
}

/// A resource that was recognised but could not be captured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedResource {
    pub url: String,
    pub reason: String,
}

/// Run-scoped list of skipped resources, appended from concurrent handlers.
#[derive(Debug, Default)]
pub struct SkipLog {
    entries: Mutex<Vec<SkippedResource>>,
}

impl SkipLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, url: &str, reason: impl Into<String>) {
        let entry = SkippedResource {
            url: url.to_string(),
            reason: reason.into(),
        };
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(entry);
    }

    pub fn snapshot(&self) -> Vec<SkippedResource> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}
