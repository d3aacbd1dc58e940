// Copyright 2026 Cortex Contributors
// SPDX-License-Identifier: Apache-2.0

//! Direct HTTP acquisition, independent of page rendering.
//!
//! Used by the import resolver to fetch `@import` targets without loading
//! them in the browser.

pub mod http_client;

use anyhow::Result;
use async_trait::async_trait;

pub use http_client::{HttpClient, HttpResponse};

/// Anything that can GET a URL and hand back status plus text body.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<HttpResponse>;
}
