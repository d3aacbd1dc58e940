// Copyright 2026 Cortex Contributors
// SPDX-License-Identifier: Apache-2.0

//! Chromium-based renderer using chromiumoxide.

use super::network::{decode_body, spawn_network_pump, wait_for_idle, NetworkActivity};
use super::{NavigationResult, RenderContext, Renderer, ResponseEvent, ResponseStream};
use crate::config::CHROMIUM_PATH_ENV;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{EnableParams, GetResponseBodyParams, RequestId};
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::debug;

/// Discover a Chromium binary on this machine.
///
/// Explicit choices (flag or env) are resolved by
/// [`crate::config::resolve_chromium_path`] before this is consulted.
pub fn find_chromium() -> Option<PathBuf> {
    // 1. ~/.css-harvester/chromium/
    if let Some(home) = dirs::home_dir() {
        let candidates = if cfg!(target_os = "macos") {
            vec![
                home.join(".css-harvester/chromium/chrome-mac-arm64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".css-harvester/chromium/chrome-mac-x64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".css-harvester/chromium/chrome"),
            ]
        } else {
            vec![
                home.join(".css-harvester/chromium/chrome-linux64/chrome"),
                home.join(".css-harvester/chromium/chrome"),
            ]
        };
        for c in candidates {
            if c.exists() {
                return Some(c);
            }
        }
    }

    // 2. System PATH
    for name in ["google-chrome", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    // 3. Common macOS location
    if cfg!(target_os = "macos") {
        let common =
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// Chromium-based renderer.
pub struct ChromiumRenderer {
    browser: Mutex<Browser>,
    handler: JoinHandle<()>,
    active_count: Arc<AtomicUsize>,
}

impl ChromiumRenderer {
    /// Launch a headless Chromium instance.
    ///
    /// `chrome_path` overrides discovery via [`find_chromium`].
    pub async fn new(chrome_path: Option<PathBuf>) -> Result<Self> {
        let chrome_path = chrome_path
            .or_else(find_chromium)
            .with_context(|| format!("Chromium not found. Set {CHROMIUM_PATH_ENV} or pass --chromium."))?;

        let config = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-background-networking")
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch Chromium")?;

        // Drive the CDP connection until the browser goes away.
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("chromium handler error: {e}");
                }
            }
        });

        Ok(Self {
            browser: Mutex::new(browser),
            handler,
            active_count: Arc::new(AtomicUsize::new(0)),
        })
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        let page = self
            .browser
            .lock()
            .await
            .new_page("about:blank")
            .await
            .context("failed to create new page")?;

        page.execute(EnableParams::default())
            .await
            .context("failed to enable network domain")?;

        let activity = Arc::new(NetworkActivity::new());
        let (responses, pump) = spawn_network_pump(&page, Arc::clone(&activity)).await?;

        self.active_count.fetch_add(1, Ordering::Relaxed);

        Ok(Box::new(ChromiumContext {
            page,
            activity,
            responses: Mutex::new(Some(responses)),
            pump,
            active_count: Arc::clone(&self.active_count),
        }))
    }

    async fn shutdown(&self) -> Result<()> {
        let mut browser = self.browser.lock().await;
        browser.close().await.context("failed to close Chromium")?;
        let _ = browser.wait().await;
        self.handler.abort();
        Ok(())
    }

    fn active_contexts(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }
}

/// A single Chromium page context.
pub struct ChromiumContext {
    page: Page,
    activity: Arc<NetworkActivity>,
    responses: Mutex<Option<mpsc::UnboundedReceiver<ResponseEvent>>>,
    pump: JoinHandle<()>,
    active_count: Arc<AtomicUsize>,
}

#[async_trait]
impl RenderContext for ChromiumContext {
    async fn responses(&self) -> Result<ResponseStream> {
        match self.responses.lock().await.take() {
            Some(rx) => Ok(UnboundedReceiverStream::new(rx).boxed()),
            None => bail!("response stream already taken for this context"),
        }
    }

    async fn navigate(&self, url: &str, idle: Duration) -> Result<NavigationResult> {
        let start = Instant::now();

        self.page
            .goto(url)
            .await
            .with_context(|| format!("navigation to {url} failed"))?;

        // goto resolves on load; late XHR/CSS still counts toward idle.
        let _ = self.page.wait_for_navigation().await;
        wait_for_idle(&self.activity, idle).await;

        let final_url = self
            .page
            .url()
            .await
            .unwrap_or_default()
            .unwrap_or_else(|| url.to_string());

        Ok(NavigationResult {
            final_url,
            load_time_ms: start.elapsed().as_millis() as u64,
        })
    }

    async fn response_body(&self, response: &ResponseEvent) -> Result<String> {
        let params = GetResponseBodyParams::new(RequestId::new(response.request_id.clone()));
        let reply = self
            .page
            .execute(params)
            .await
            .with_context(|| format!("failed to read body of {}", response.url))?;

        decode_body(&reply.result.body, reply.result.base64_encoded)
    }

    async fn execute_js(&self, script: &str) -> Result<serde_json::Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .context("JS execution failed")?;

        result
            .into_value()
            .map_err(|e| anyhow::anyhow!("failed to convert JS result: {e:?}"))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.active_count.fetch_sub(1, Ordering::Relaxed);
        self.pump.abort();
        let _ = self.page.close().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Requires Chromium to be installed
    async fn test_chromium_inline_styles_and_shutdown() {
        let renderer = ChromiumRenderer::new(None)
            .await
            .expect("failed to create renderer");
        let ctx = renderer
            .new_context()
            .await
            .expect("failed to create context");
        let _responses = ctx.responses().await.expect("responses taken twice");
        assert!(ctx.responses().await.is_err());

        ctx.navigate(
            "data:text/html,<style>h1{color:red}</style><h1>Hello</h1>",
            Duration::from_millis(100),
        )
        .await
        .expect("navigation failed");

        let result = ctx
            .execute_js("document.querySelectorAll('style').length")
            .await
            .expect("JS execution failed");
        assert_eq!(result.as_u64(), Some(1));

        ctx.close().await.expect("close failed");
        assert_eq!(renderer.active_contexts(), 0);

        renderer.shutdown().await.expect("shutdown failed");
    }
}
