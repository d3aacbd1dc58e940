// Copyright 2026 Cortex Contributors
// SPDX-License-Identifier: Apache-2.0

//! Single-pass `@import` resolution.
//!
//! Only stylesheets handed to [`ImportResolver::resolve`] are scanned.
//! Whatever those imports pull in is captured but never scanned itself, which
//! bounds the work and makes import cycles impossible.

use super::sink::CaptureSink;
use super::{CapturedResource, ResourceKind, SkipLog};
use crate::acquisition::Fetcher;
use crate::error::{HarvestError, HarvestResult};
use futures::stream::{self, StreamExt};
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;
use tracing::{debug, info, warn};
use url::Url;

/// Matches `@import "u"`, `@import 'u'` and `@import url(u)` with optional
/// quotes inside the parentheses. Media qualifiers after the URL are ignored.
fn import_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r#"(?i)@import\s*(?:url\(\s*(?:"([^"]*)"|'([^']*)'|([^)'"\s]*))\s*\)|"([^"]*)"|'([^']*)')"#,
        )
        .expect("import regex is valid")
    })
}

/// Every `@import` reference in `css`, in source order.
pub fn scan_imports(css: &str) -> Vec<String> {
    import_pattern()
        .captures_iter(css)
        .filter_map(|caps| {
            (1..=5)
                .find_map(|i| caps.get(i))
                .map(|m| m.as_str().trim().to_string())
        })
        .filter(|href| !href.is_empty())
        .collect()
}

/// Resolve `href` against the URL of the stylesheet that contains it.
///
/// Fragments are dropped; only http(s) targets are accepted.
pub fn resolve_reference(stylesheet_url: &str, href: &str) -> HarvestResult<Url> {
    let base = Url::parse(stylesheet_url)
        .map_err(|e| HarvestError::InvalidUrl(format!("{stylesheet_url}: {e}")))?;
    let mut target = base
        .join(href)
        .map_err(|e| HarvestError::InvalidUrl(format!("{href}: {e}")))?;

    if !matches!(target.scheme(), "http" | "https") {
        return Err(HarvestError::InvalidUrl(format!(
            "{href}: unsupported scheme {}",
            target.scheme()
        )));
    }

    target.set_fragment(None);
    Ok(target)
}

/// Fetches and captures the imports of already-captured stylesheets.
pub struct ImportResolver<'a> {
    sink: &'a CaptureSink,
    fetcher: &'a dyn Fetcher,
    skipped: &'a SkipLog,
    concurrency: usize,
}

impl<'a> ImportResolver<'a> {
    pub fn new(
        sink: &'a CaptureSink,
        fetcher: &'a dyn Fetcher,
        skipped: &'a SkipLog,
        concurrency: usize,
    ) -> Self {
        Self {
            sink,
            fetcher,
            skipped,
            concurrency: concurrency.max(1),
        }
    }

    /// Scan the external stylesheets in `sources` once and capture every new
    /// import target. Returns what was captured.
    pub async fn resolve(&self, sources: &[CapturedResource]) -> Vec<CapturedResource> {
        let targets = self.collect_targets(sources).await;
        if targets.is_empty() {
            debug!("no @import targets to fetch");
            return Vec::new();
        }

        info!("resolving {} @import target(s)", targets.len());

        let results: Vec<(String, HarvestResult<Option<CapturedResource>>)> =
            stream::iter(targets)
                .map(|url| async move {
                    let result = self.fetch_and_capture(&url).await;
                    (url, result)
                })
                .buffer_unordered(self.concurrency)
                .collect()
                .await;

        let mut captured = Vec::new();
        for (url, result) in results {
            match result {
                Ok(Some(resource)) => captured.push(resource),
                Ok(None) => debug!("import {url} was captured concurrently"),
                Err(e) => {
                    warn!("skipping import {url}: {e}");
                    self.skipped.record(&url, e.to_string());
                }
            }
        }
        captured
    }

    /// Unique, not-yet-captured import URLs in discovery order.
    async fn collect_targets(&self, sources: &[CapturedResource]) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut targets = Vec::new();

        for source in sources.iter().filter(|r| r.kind == ResourceKind::External) {
            let css = match tokio::fs::read_to_string(&source.local_path).await {
                Ok(css) => css,
                Err(e) => {
                    warn!(
                        "cannot read {} for @import scan: {e}",
                        source.local_path.display()
                    );
                    self.skipped
                        .record(&source.source_url, format!("unreadable for @import scan: {e}"));
                    continue;
                }
            };

            for href in scan_imports(&css) {
                let url = match resolve_reference(&source.source_url, &href) {
                    Ok(url) => url.to_string(),
                    Err(e) => {
                        warn!("skipping @import in {}: {e}", source.source_url);
                        self.skipped.record(&href, e.to_string());
                        continue;
                    }
                };

                if self.sink.ledger().contains(&url) {
                    debug!("import {url} already captured");
                    continue;
                }
                if seen.insert(url.clone()) {
                    targets.push(url);
                }
            }
        }

        targets
    }

    async fn fetch_and_capture(&self, url: &str) -> HarvestResult<Option<CapturedResource>> {
        let response = self
            .fetcher
            .fetch(url)
            .await
            .map_err(|e| HarvestError::Fetch(format!("{e:#}")))?;

        if !response.is_success() {
            return Err(HarvestError::Fetch(format!("HTTP {}", response.status)));
        }

        self.sink
            .capture(url, &response.body, ResourceKind::Import)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::HttpResponse;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[test]
    fn test_scan_three_forms() {
        let css = r#"
            @import "a.css";
            @import 'b.css';
            @import url(c.css);
            @import url("d.css");
            @import url( 'e.css' );
            .x { color: red }
        "#;
        assert_eq!(scan_imports(css), vec!["a.css", "b.css", "c.css", "d.css", "e.css"]);
    }

    #[test]
    fn test_scan_ignores_media_qualifiers() {
        let css = "@import url('print.css') print;\n@import \"wide.css\" screen and (min-width: 900px);";
        assert_eq!(scan_imports(css), vec!["print.css", "wide.css"]);
    }

    #[test]
    fn test_scan_case_insensitive_and_empty() {
        assert_eq!(scan_imports("@IMPORT \"x.css\";"), vec!["x.css"]);
        assert!(scan_imports("@import url();").is_empty());
        assert!(scan_imports(".a{background:url(x.png)}").is_empty());
    }

    #[test]
    fn test_resolve_against_stylesheet_url() {
        let url = resolve_reference("https://cdn.example.com/css/main.css", "../fonts/f.css").unwrap();
        assert_eq!(url.as_str(), "https://cdn.example.com/fonts/f.css");

        let url = resolve_reference("https://cdn.example.com/css/main.css", "base.css#top").unwrap();
        assert_eq!(url.as_str(), "https://cdn.example.com/css/base.css");

        let url = resolve_reference("https://a.com/x.css", "//b.com/y.css").unwrap();
        assert_eq!(url.as_str(), "https://b.com/y.css");
    }

    #[test]
    fn test_resolve_rejects_non_http() {
        assert!(resolve_reference("https://a.com/x.css", "data:text/css,a{}").is_err());
        assert!(resolve_reference("not a url", "x.css").is_err());
    }

    /// Serves canned bodies and remembers what was requested.
    struct CannedFetcher {
        bodies: HashMap<String, (u16, String)>,
        requested: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Fetcher for CannedFetcher {
        async fn fetch(&self, url: &str) -> Result<HttpResponse> {
            self.requested.lock().unwrap().push(url.to_string());
            let (status, body) = self
                .bodies
                .get(url)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("connection refused"))?;
            Ok(HttpResponse {
                url: url.to_string(),
                final_url: url.to_string(),
                status,
                content_type: Some("text/css".to_string()),
                body,
            })
        }
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_siblings() {
        let dir = tempfile::tempdir().unwrap();
        let sink = CaptureSink::new(dir.path());
        let skipped = SkipLog::new();

        let main = sink
            .capture(
                "https://example.com/css/main.css",
                "@import 'ok.css'; @import 'gone.css'; @import 'down.css';",
                ResourceKind::External,
            )
            .await
            .unwrap()
            .unwrap();

        let fetcher = CannedFetcher {
            bodies: HashMap::from([
                ("https://example.com/css/ok.css".to_string(), (200, "ok{}".to_string())),
                ("https://example.com/css/gone.css".to_string(), (404, String::new())),
            ]),
            requested: Mutex::new(Vec::new()),
        };

        let resolver = ImportResolver::new(&sink, &fetcher, &skipped, 2);
        let captured = resolver.resolve(&[main]).await;

        assert_eq!(captured.len(), 1);
        assert_eq!(captured[0].source_url, "https://example.com/css/ok.css");
        assert_eq!(captured[0].kind, ResourceKind::Import);
        assert!(dir.path().join("example.com/css/ok.css").exists());

        let skipped = skipped.snapshot();
        assert_eq!(skipped.len(), 2);
        assert!(skipped.iter().any(|s| s.url.ends_with("gone.css") && s.reason.contains("404")));
        assert!(skipped.iter().any(|s| s.url.ends_with("down.css")));
    }

    #[tokio::test]
    async fn test_known_and_duplicate_targets_fetched_once() {
        let dir = tempfile::tempdir().unwrap();
        let sink = CaptureSink::new(dir.path());
        let skipped = SkipLog::new();

        let a = sink
            .capture("https://example.com/a.css", "@import 'shared.css'; @import 'b.css';", ResourceKind::External)
            .await
            .unwrap()
            .unwrap();
        let b = sink
            .capture("https://example.com/b.css", "@import \"shared.css\";", ResourceKind::External)
            .await
            .unwrap()
            .unwrap();

        let fetcher = CannedFetcher {
            bodies: HashMap::from([(
                "https://example.com/shared.css".to_string(),
                (200, "s{}".to_string()),
            )]),
            requested: Mutex::new(Vec::new()),
        };

        let resolver = ImportResolver::new(&sink, &fetcher, &skipped, 4);
        let captured = resolver.resolve(&[a, b]).await;

        assert_eq!(captured.len(), 1);
        assert_eq!(
            *fetcher.requested.lock().unwrap(),
            vec!["https://example.com/shared.css".to_string()]
        );
        assert!(skipped.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_source_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let sink = CaptureSink::new(dir.path());
        let skipped = SkipLog::new();
        let ghost = CapturedResource {
            source_url: "https://example.com/ghost.css".to_string(),
            local_path: dir.path().join("missing/ghost.css"),
            kind: ResourceKind::External,
        };
        let fetcher = CannedFetcher {
            bodies: HashMap::new(),
            requested: Mutex::new(Vec::new()),
        };

        let captured = ImportResolver::new(&sink, &fetcher, &skipped, 1)
            .resolve(&[ghost])
            .await;
        assert!(captured.is_empty());
        assert_eq!(skipped.snapshot().len(), 1);
        assert!(fetcher.requested.lock().unwrap().is_empty());
    }
}
