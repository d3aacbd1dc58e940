// Copyright 2026 Cortex Contributors
// SPDX-License-Identifier: Apache-2.0

//! Persist stylesheet bodies under the derived path, once per URL.
//!
//! Every write goes to a uniquely named sibling file first and is renamed
//! into place, so a reader never sees a half-written stylesheet.

use super::ledger::DedupLedger;
use super::{path, CapturedResource, ResourceKind};
use crate::error::{HarvestError, HarvestResult};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

/// Owns the run's ledgers and the list of everything written so far.
///
/// Stylesheet URLs and pages with an inline bundle are tracked in separate
/// ledgers, so `ledger().len()` counts fetched URLs only.
#[derive(Debug)]
pub struct CaptureSink {
    out_dir: PathBuf,
    ledger: DedupLedger,
    inline_pages: DedupLedger,
    captured: Mutex<Vec<CapturedResource>>,
}

impl CaptureSink {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
            ledger: DedupLedger::new(),
            inline_pages: DedupLedger::new(),
            captured: Mutex::new(Vec::new()),
        }
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    pub fn ledger(&self) -> &DedupLedger {
        &self.ledger
    }

    /// Pages whose inline bundle has been written (or is being written).
    pub fn inline_pages(&self) -> &DedupLedger {
        &self.inline_pages
    }

    /// Capture a stylesheet body fetched from `url`.
    ///
    /// Returns `Ok(None)` when the URL was already captured this run.
    pub async fn capture(
        &self,
        url: &str,
        body: &str,
        kind: ResourceKind,
    ) -> HarvestResult<Option<CapturedResource>> {
        self.persist(&self.ledger, url, path::stylesheet_path(url), body, kind)
            .await
    }

    /// Write the inline bundle of `page_url`, once per page.
    pub(crate) async fn capture_inline(
        &self,
        page_url: &str,
        body: &str,
    ) -> HarvestResult<Option<CapturedResource>> {
        self.persist(
            &self.inline_pages,
            page_url,
            path::inline_path(page_url),
            body,
            ResourceKind::Inline,
        )
        .await
    }

    /// Claim `source_url` in `ledger`, write `body` to `relative_path`, and
    /// record the result.
    async fn persist(
        &self,
        ledger: &DedupLedger,
        source_url: &str,
        relative_path: String,
        body: &str,
        kind: ResourceKind,
    ) -> HarvestResult<Option<CapturedResource>> {
        if !ledger.claim(source_url) {
            debug!("already captured [{kind}] {source_url}");
            return Ok(None);
        }

        let local_path = self.out_dir.join(&relative_path);
        if let Err(e) = write_atomically(&local_path, body).await {
            ledger.release(source_url);
            return Err(e);
        }

        let resource = CapturedResource {
            source_url: source_url.to_string(),
            local_path,
            kind,
        };
        info!(
            "captured [{kind}] {source_url} -> {}",
            resource.local_path.display()
        );

        self.captured
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(resource.clone());

        Ok(Some(resource))
    }

    /// Everything captured so far, in capture order.
    pub fn captured(&self) -> Vec<CapturedResource> {
        self.captured
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Captured resources of one kind, in capture order.
    pub fn captured_of(&self, kind: ResourceKind) -> Vec<CapturedResource> {
        self.captured()
            .into_iter()
            .filter(|r| r.kind == kind)
            .collect()
    }
}

async fn write_atomically(target: &Path, body: &str) -> HarvestResult<()> {
    let write_err = |source: std::io::Error| HarvestError::Write {
        path: target.to_path_buf(),
        source,
    };

    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let file_name = target
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("stylesheet.css");
    let staging = target.with_file_name(format!(".{file_name}.{}.part", Uuid::new_v4()));

    let staged = match tokio::fs::write(&staging, body.as_bytes()).await {
        Ok(()) => tokio::fs::rename(&staging, target).await,
        Err(e) => Err(e),
    };
    if let Err(e) = staged {
        let _ = tokio::fs::remove_file(&staging).await;
        return Err(write_err(e));
    }

    Ok(())
}
