// Copyright 2026 Cortex Contributors
// SPDX-License-Identifier: Apache-2.0

//! Run-scoped set of URLs that have been (or are being) captured.

use dashmap::DashSet;

/// Deduplication ledger shared by every capture path in one run.
///
/// `claim` is the only way in: check and insert happen under one shard
/// lock, so two handlers racing on the same URL cannot both win.
#[derive(Debug, Default)]
pub struct DedupLedger {
    urls: DashSet<String>,
}

impl DedupLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `url` for capture. Returns `false` if someone already has it.
    pub fn claim(&self, url: &str) -> bool {
        self.urls.insert(url.to_string())
    }

    /// Give a claim back after a failed write.
    pub fn release(&self, url: &str) {
        self.urls.remove(url);
    }

    pub fn contains(&self, url: &str) -> bool {
        self.urls.contains(url)
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}
