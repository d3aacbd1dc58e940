// Copyright 2026 Cortex Contributors
// SPDX-License-Identifier: Apache-2.0

//! The harvesting pipeline.
//!
//! Phases run strictly in order:
//!
//! 1. **Capture**: navigate and, concurrently, classify and persist every
//!    stylesheet response until the network goes idle.
//! 2. **Inline**: bundle the rendered document's `<style>` blocks.
//! 3. **Imports**: one pass over the externals captured in phase 1.
//!
//! Only a failed or timed-out navigation aborts the run.

use crate::acquisition::Fetcher;
use crate::capture::imports::ImportResolver;
use crate::capture::inline::{self, INLINE_STYLES_SCRIPT};
use crate::capture::sink::CaptureSink;
use crate::capture::{classify, ResourceKind, SkipLog};
use crate::config::HarvestConfig;
use crate::error::{HarvestError, HarvestResult};
use crate::renderer::{NavigationResult, RenderContext, Renderer, ResponseEvent};
use crate::report::HarvestReport;
use chrono::Utc;
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;

/// Runs the capture pipeline against one page.
pub struct Harvester {
    config: HarvestConfig,
    renderer: Arc<dyn Renderer>,
    fetcher: Arc<dyn Fetcher>,
}

impl Harvester {
    pub fn new(
        config: HarvestConfig,
        renderer: Arc<dyn Renderer>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        Self {
            config,
            renderer,
            fetcher,
        }
    }

    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    /// Harvest every stylesheet of `target_url` into the configured output dir.
    ///
    /// Each call starts with an empty ledger.
    pub async fn run(&self, target_url: &str) -> HarvestResult<HarvestReport> {
        Url::parse(target_url)
            .map_err(|e| HarvestError::InvalidUrl(format!("{target_url}: {e}")))?;

        let started_at = Utc::now();
        let clock = Instant::now();
        let sink = CaptureSink::new(self.config.out_dir.clone());
        let skipped = SkipLog::new();

        let ctx = self
            .renderer
            .new_context()
            .await
            .map_err(|e| HarvestError::BrowserLaunch(format!("{e:#}")))?;

        let outcome = self
            .run_phases(ctx.as_ref(), target_url, &sink, &skipped)
            .await;

        if let Err(e) = ctx.close().await {
            warn!("failed to close browser context: {e:#}");
        }

        let navigation = outcome?;
        let report = HarvestReport::new(
            target_url,
            &navigation.final_url,
            started_at,
            clock.elapsed().as_millis() as u64,
            sink.captured(),
            skipped.snapshot(),
        );
        info!(
            "harvest of {target_url} finished: {} captured, {} skipped",
            report.total,
            report.skipped.len()
        );
        Ok(report)
    }

    async fn run_phases(
        &self,
        ctx: &dyn RenderContext,
        target_url: &str,
        sink: &CaptureSink,
        skipped: &SkipLog,
    ) -> HarvestResult<NavigationResult> {
        let navigation = self.capture_phase(ctx, target_url, sink, skipped).await?;
        info!(
            "network idle after {}ms, {} stylesheet(s) captured",
            navigation.load_time_ms,
            sink.ledger().len()
        );

        self.inline_phase(ctx, target_url, sink, skipped).await;

        // Snapshot before resolving: imports of imports are never scanned.
        let externals = sink.captured_of(ResourceKind::External);
        ImportResolver::new(
            sink,
            self.fetcher.as_ref(),
            skipped,
            self.config.import_concurrency,
        )
        .resolve(&externals)
        .await;

        Ok(navigation)
    }

    /// Navigate under the ceiling while handling responses as they arrive.
    async fn capture_phase(
        &self,
        ctx: &dyn RenderContext,
        target_url: &str,
        sink: &CaptureSink,
        skipped: &SkipLog,
    ) -> HarvestResult<NavigationResult> {
        let mut events = ctx
            .responses()
            .await
            .map_err(|e| HarvestError::Navigation(format!("{e:#}")))?;

        let timeout_ms = self.config.navigation_timeout_ms;
        let navigation = tokio::time::timeout(
            Duration::from_millis(timeout_ms),
            ctx.navigate(target_url, Duration::from_millis(self.config.idle_ms)),
        );
        tokio::pin!(navigation);

        info!("navigating to {target_url}");
        let mut handlers = FuturesUnordered::new();

        let outcome = loop {
            tokio::select! {
                biased;
                Some(event) = events.next() => {
                    handlers.push(self.handle_response(ctx, sink, skipped, event));
                }
                Some(()) = handlers.next(), if !handlers.is_empty() => {}
                outcome = &mut navigation => break outcome,
            }
        };

        let navigation = match outcome {
            Ok(Ok(navigation)) => navigation,
            Ok(Err(e)) => return Err(HarvestError::Navigation(format!("{e:#}"))),
            Err(_) => {
                return Err(HarvestError::NavigationTimeout {
                    url: target_url.to_string(),
                    timeout_ms,
                })
            }
        };

        // Responses that were already queued when the network went idle.
        while let Some(Some(event)) = events.next().now_or_never() {
            handlers.push(self.handle_response(ctx, sink, skipped, event));
        }
        while handlers.next().await.is_some() {}

        Ok(navigation)
    }

    async fn handle_response(
        &self,
        ctx: &dyn RenderContext,
        sink: &CaptureSink,
        skipped: &SkipLog,
        event: ResponseEvent,
    ) {
        if !classify::is_stylesheet(&event) {
            return;
        }
        if sink.ledger().contains(&event.url) {
            debug!("already captured {}", event.url);
            return;
        }

        let body = match ctx.response_body(&event).await {
            Ok(body) => body,
            Err(e) => {
                warn!("skipping {}: {e:#}", event.url);
                skipped.record(&event.url, format!("{e:#}"));
                return;
            }
        };

        if let Err(e) = sink.capture(&event.url, &body, ResourceKind::External).await {
            warn!("skipping {}: {e}", event.url);
            skipped.record(&event.url, e.to_string());
        }
    }

    async fn inline_phase(
        &self,
        ctx: &dyn RenderContext,
        page_url: &str,
        sink: &CaptureSink,
        skipped: &SkipLog,
    ) {
        let blocks = match ctx.execute_js(INLINE_STYLES_SCRIPT).await {
            Ok(value) => inline::parse_blocks(value),
            Err(e) => Err(HarvestError::Script(format!("{e:#}"))),
        };

        let result = match blocks {
            Ok(blocks) => inline::aggregate(sink, blocks, page_url).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(Some(_)) => {}
            Ok(None) => debug!("no inline styles on {page_url}"),
            Err(e) => {
                warn!("skipping inline styles of {page_url}: {e}");
                skipped.record(page_url, format!("inline styles: {e}"));
            }
        }
    }
}
