// Copyright 2026 Cortex Contributors
// SPDX-License-Identifier: Apache-2.0

//! Renderer abstraction for browser-based page rendering.
//!
//! Defines the `Renderer` and `RenderContext` traits that abstract over
//! the browser engine (currently Chromium via chromiumoxide). The harvest
//! pipeline only talks to these traits, so tests drive it with scripted
//! contexts instead of a real browser.

pub mod chromium;
pub mod network;

use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Result of navigating to a URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationResult {
    /// The final URL after any redirects.
    pub final_url: String,
    /// Time from navigation start until the network went idle.
    pub load_time_ms: u64,
}

/// One network response observed while a page loads.
///
/// The body is not part of the event; read it through
/// [`RenderContext::response_body`] once the event has been accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseEvent {
    /// Driver-specific identifier used to fetch the body later.
    pub request_id: String,
    /// Response URL.
    pub url: String,
    /// HTTP status code.
    pub status: u16,
    /// Response headers as reported by the browser.
    pub headers: Vec<(String, String)>,
    /// Resource type declared by the originating request (e.g. "Stylesheet").
    pub resource_type: Option<String>,
}

impl ResponseEvent {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }
}

/// Live stream of response events for one context.
pub type ResponseStream = BoxStream<'static, ResponseEvent>;

/// A browser engine that can create rendering contexts.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Create a new browser context (tab).
    async fn new_context(&self) -> Result<Box<dyn RenderContext>>;
    /// Shut down the browser engine.
    async fn shutdown(&self) -> Result<()>;
    /// Number of currently active contexts.
    fn active_contexts(&self) -> usize;
}

/// A single browser context (tab) for rendering pages.
#[async_trait]
pub trait RenderContext: Send + Sync {
    /// Take the response stream. Must be called before `navigate`; a context
    /// has exactly one subscriber.
    async fn responses(&self) -> Result<ResponseStream>;
    /// Navigate to a URL and wait until the network has been idle for `idle`.
    ///
    /// No ceiling is applied here; callers wrap this in their own timeout.
    async fn navigate(&self, url: &str, idle: Duration) -> Result<NavigationResult>;
    /// Read the body of a previously observed response as text.
    async fn response_body(&self, response: &ResponseEvent) -> Result<String>;
    /// Execute JavaScript in the page context and return the result.
    async fn execute_js(&self, script: &str) -> Result<serde_json::Value>;
    /// Close this context.
    async fn close(self: Box<Self>) -> Result<()>;
}
