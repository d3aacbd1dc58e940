// Copyright 2026 Cortex Contributors
// SPDX-License-Identifier: Apache-2.0

//! Bundle the page's `<style>` blocks into one labelled file.

use super::sink::CaptureSink;
use super::CapturedResource;
use crate::error::{HarvestError, HarvestResult};

/// Returns the text of every `<style>` element, in document order.
pub const INLINE_STYLES_SCRIPT: &str =
    "Array.from(document.querySelectorAll('style')).map(s => s.textContent || '')";

/// One `<style>` block and its zero-based position in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineBlock {
    pub index: usize,
    pub css_text: String,
}

/// Ordered inline blocks of a single page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InlineBundle {
    blocks: Vec<InlineBlock>,
}

impl InlineBundle {
    pub fn from_texts(texts: Vec<String>) -> Self {
        let blocks = texts
            .into_iter()
            .enumerate()
            .map(|(index, css_text)| InlineBlock { index, css_text })
            .collect();
        Self { blocks }
    }

    pub fn blocks(&self) -> &[InlineBlock] {
        &self.blocks
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Each block preceded by `/* inline style #N */`, separated by a blank line.
    pub fn render(&self) -> String {
        let mut out = self
            .blocks
            .iter()
            .map(|b| format!("/* inline style #{} */\n{}", b.index, b.css_text))
            .collect::<Vec<_>>()
            .join("\n\n");
        out.push('\n');
        out
    }
}

/// Decode the result of [`INLINE_STYLES_SCRIPT`].
pub fn parse_blocks(value: serde_json::Value) -> HarvestResult<Vec<String>> {
    match value {
        serde_json::Value::Null => Ok(Vec::new()),
        other => serde_json::from_value(other)
            .map_err(|e| HarvestError::Script(format!("unexpected inline style result: {e}"))),
    }
}

/// Write the inline bundle for `page_url`.
///
/// No blocks means no file and `Ok(None)`. A second call for the same page
/// in one run is also a no-op.
pub async fn aggregate(
    sink: &CaptureSink,
    blocks: Vec<String>,
    page_url: &str,
) -> HarvestResult<Option<CapturedResource>> {
    let bundle = InlineBundle::from_texts(blocks);
    if bundle.is_empty() {
        return Ok(None);
    }

    sink.capture_inline(page_url, &bundle.render()).await
}
