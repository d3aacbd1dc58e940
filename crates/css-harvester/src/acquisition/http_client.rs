// Copyright 2026 Cortex Contributors
// SPDX-License-Identifier: Apache-2.0

//! Async HTTP client wrapping reqwest.
//!
//! Not a browser, just HTTP requests. Handles redirects, timeouts,
//! retry on 5xx, and exponential backoff on 429.

use super::Fetcher;
use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Response from an HTTP GET request.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Original requested URL.
    pub url: String,
    /// Final URL after redirects.
    pub final_url: String,
    /// HTTP status code.
    pub status: u16,
    /// Content-Type header, if present.
    pub content_type: Option<String>,
    /// Response body as text.
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP client for direct stylesheet fetches.
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    /// HTTP/1.1-only fallback client for sites that reject HTTP/2.
    h1_client: reqwest::Client,
    timeout_ms: u64,
}

impl HttpClient {
    /// Create a new HTTP client with standard Chrome user-agent.
    pub fn new(timeout_ms: u64) -> Self {
        let ua = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
                  AppleWebKit/537.36 (KHTML, like Gecko) \
                  Chrome/131.0.0.0 Safari/537.36";

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(ua)
            .build()
            .unwrap_or_default();

        let h1_client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(ua)
            .http1_only()
            .build()
            .unwrap_or_default();

        Self {
            client,
            h1_client,
            timeout_ms,
        }
    }

    /// Perform a single GET request with retry on 5xx and backoff on 429.
    ///
    /// Falls back to HTTP/1.1 on protocol errors (some CDNs reject HTTP/2).
    pub async fn get(&self, url: &str) -> Result<HttpResponse> {
        match self.get_inner(&self.client, url).await {
            Ok(resp) => Ok(resp),
            Err(e) => {
                let err_str = format!("{e}");
                if err_str.contains("http2")
                    || err_str.contains("protocol")
                    || err_str.contains("connection closed")
                {
                    self.get_inner(&self.h1_client, url).await
                } else {
                    Err(e)
                }
            }
        }
    }

    async fn get_inner(&self, client: &reqwest::Client, url: &str) -> Result<HttpResponse> {
        let mut retries = 0u32;
        let max_retries = 2;

        loop {
            let r = client
                .get(url)
                .header("accept", "text/css,*/*;q=0.1")
                .timeout(Duration::from_millis(self.timeout_ms))
                .send()
                .await?;

            let status = r.status().as_u16();

            // Retry on 5xx
            if status >= 500 && retries < max_retries {
                retries += 1;
                let delay = Duration::from_millis(500 * 2u64.pow(retries - 1));
                tokio::time::sleep(delay).await;
                continue;
            }

            // Backoff on 429
            if status == 429 && retries < max_retries {
                retries += 1;
                let retry_after = r
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(2);
                let delay = Duration::from_secs(retry_after.min(10));
                tokio::time::sleep(delay).await;
                continue;
            }

            let final_url = r.url().to_string();
            let content_type = r
                .headers()
                .get("content-type")
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string());
            let body = r.text().await?;

            return Ok(HttpResponse {
                url: url.to_string(),
                final_url,
                status,
                content_type,
                body,
            });
        }
    }
}

#[async_trait]
impl Fetcher for HttpClient {
    async fn fetch(&self, url: &str) -> Result<HttpResponse> {
        self.get(url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_success_range() {
        let mut resp = HttpResponse {
            url: "https://example.com/a.css".to_string(),
            final_url: "https://example.com/a.css".to_string(),
            status: 200,
            content_type: Some("text/css".to_string()),
            body: String::new(),
        };
        assert!(resp.is_success());
        resp.status = 304;
        assert!(!resp.is_success());
        resp.status = 404;
        assert!(!resp.is_success());
    }

    #[tokio::test]
    async fn test_get_reads_body_and_content_type() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/base.css"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/css; charset=utf-8")
                    .set_body_string("body{margin:0}"),
            )
            .mount(&server)
            .await;

        let client = HttpClient::new(5_000);
        let resp = client.get(&format!("{}/base.css", server.uri())).await.unwrap();
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body, "body{margin:0}");
        assert_eq!(resp.content_type.as_deref(), Some("text/css; charset=utf-8"));
    }

    #[tokio::test]
    async fn test_not_found_is_returned_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing.css"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpClient::new(5_000);
        let resp = client
            .fetch(&format!("{}/missing.css", server.uri()))
            .await
            .unwrap();
        assert_eq!(resp.status, 404);
    }
}
