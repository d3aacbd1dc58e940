// Copyright 2026 Cortex Contributors
// SPDX-License-Identifier: Apache-2.0

//! End-of-run summary: what was captured, what was skipped.

use crate::capture::{CapturedResource, ResourceKind, SkippedResource};
use crate::error::{HarvestError, HarvestResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::Path;

/// Outcome of one harvesting run.
#[derive(Debug, Clone, Serialize)]
pub struct HarvestReport {
    pub target_url: String,
    pub final_url: String,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    /// Captured resources in capture order.
    pub captured: Vec<CapturedResource>,
    pub skipped: Vec<SkippedResource>,
    pub total: usize,
}

impl HarvestReport {
    pub fn new(
        target_url: &str,
        final_url: &str,
        started_at: DateTime<Utc>,
        elapsed_ms: u64,
        captured: Vec<CapturedResource>,
        skipped: Vec<SkippedResource>,
    ) -> Self {
        Self {
            target_url: target_url.to_string(),
            final_url: final_url.to_string(),
            started_at,
            elapsed_ms,
            total: captured.len(),
            captured,
            skipped,
        }
    }

    pub fn count_of(&self, kind: ResourceKind) -> usize {
        self.captured.iter().filter(|r| r.kind == kind).count()
    }

    /// Human-readable summary for the console.
    pub fn render_summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Stylesheets captured from {}:", self.target_url);
        for resource in &self.captured {
            let _ = writeln!(
                out,
                "  [{:<8}] {} -> {}",
                resource.kind.to_string(),
                resource.source_url,
                resource.local_path.display()
            );
        }
        if !self.skipped.is_empty() {
            let _ = writeln!(out, "Skipped:");
            for skipped in &self.skipped {
                let _ = writeln!(out, "  {} ({})", skipped.url, skipped.reason);
            }
        }
        let _ = writeln!(
            out,
            "Total: {} ({} external, {} import, {} inline) in {}ms",
            self.total,
            self.count_of(ResourceKind::External),
            self.count_of(ResourceKind::Import),
            self.count_of(ResourceKind::Inline),
            self.elapsed_ms
        );
        out
    }

    /// Write the report as pretty JSON.
    pub fn write_manifest(&self, path: &Path) -> HarvestResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| HarvestError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|source| HarvestError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_json_diff::assert_json_include;
    use serde_json::json;
    use std::path::PathBuf;

    fn sample() -> HarvestReport {
        HarvestReport::new(
            "https://example.com/page",
            "https://example.com/page",
            Utc::now(),
            42,
            vec![
                CapturedResource {
                    source_url: "https://example.com/styles.css".to_string(),
                    local_path: PathBuf::from("out/css/example.com/styles.css"),
                    kind: ResourceKind::External,
                },
                CapturedResource {
                    source_url: "https://example.com/page".to_string(),
                    local_path: PathBuf::from("out/css/example.com/page.inline.css"),
                    kind: ResourceKind::Inline,
                },
            ],
            vec![SkippedResource {
                url: "https://example.com/gone.css".to_string(),
                reason: "Fetch failed: HTTP 404".to_string(),
            }],
        )
    }

    #[test]
    fn test_summary_lists_every_capture_and_total() {
        let text = sample().render_summary();
        assert!(text.contains("[external] https://example.com/styles.css -> out/css/example.com/styles.css"));
        assert!(text.contains("[inline  ] https://example.com/page -> out/css/example.com/page.inline.css"));
        assert!(text.contains("https://example.com/gone.css (Fetch failed: HTTP 404)"));
        assert!(text.contains("Total: 2 (1 external, 0 import, 1 inline)"));
    }

    #[test]
    fn test_json_shape() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_json_include!(
            actual: value,
            expected: json!({
                "target_url": "https://example.com/page",
                "total": 2,
                "captured": [
                    { "kind": "external", "source_url": "https://example.com/styles.css" },
                    { "kind": "inline" }
                ],
                "skipped": [ { "url": "https://example.com/gone.css" } ]
            })
        );
    }

    #[test]
    fn test_write_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports/run.json");
        sample().write_manifest(&path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["total"], 2);
        assert_eq!(value["elapsed_ms"], 42);
    }
}
