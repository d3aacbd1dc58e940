// Copyright 2026 Cortex Contributors
// SPDX-License-Identifier: Apache-2.0

//! URL → relative filesystem path derivation.
//!
//! `derive` is total: every input string maps to some safe relative path,
//! and the same input always maps to the same path. The sink and the ledger
//! rely on that to agree without sharing anything beyond the ledger itself.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use url::Url;

/// Directory used for inputs that do not parse as host-bearing URLs.
const RAW_PREFIX: &str = "_raw";

/// Longest path segment `derive` emits. With `.inline.css` appended and the
/// sink's `.{name}.{uuid}.part` staging name, a file name stays within 255 bytes.
pub const MAX_SEGMENT: usize = 200;

/// Separator between a path segment and its encoded query string.
const QUERY_SEPARATOR: &str = "__";

/// Map a URL to `host/sanitized/path[__query]`.
///
/// Segments longer than [`MAX_SEGMENT`] continue in sub-directories.
pub fn derive(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(url) => match url.host_str() {
            Some(host) if !host.is_empty() => derive_from_parts(host, url.path(), url.query()),
            _ => raw_fallback(raw),
        },
        Err(_) => raw_fallback(raw),
    }
}

/// Path for an external or imported stylesheet (always ends in `.css`).
pub fn stylesheet_path(url: &str) -> String {
    ensure_css_suffix(derive(url))
}

/// Path for the inline-style bundle of a page.
pub fn inline_path(page_url: &str) -> String {
    format!("{}.inline.css", derive(page_url))
}

/// Append `.css` unless the path already ends with it.
pub fn ensure_css_suffix(mut path: String) -> String {
    if !path.to_ascii_lowercase().ends_with(".css") {
        path.push_str(".css");
    }
    path
}

/// Replace everything outside `[A-Za-z0-9._/-]` with `_`.
pub fn sanitize(input: &str) -> String {
    input
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '/' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn derive_from_parts(host: &str, path: &str, query: Option<&str>) -> String {
    let mut segments = vec![sanitize(host)];

    // Interior empty segments are kept so `/a//b` and `/a/b` stay distinct;
    // a single trailing separator is stripped.
    let path = path.strip_prefix('/').unwrap_or(path);
    let path = path.strip_suffix('/').unwrap_or(path);
    if !path.is_empty() {
        segments.extend(path.split('/').map(sanitize_segment));
    }

    if let Some(query) = query.filter(|q| !q.is_empty()) {
        let encoded = URL_SAFE_NO_PAD.encode(query.as_bytes());
        if segments.len() > 1 {
            if let Some(last) = segments.last_mut() {
                *last = with_query_suffix(last, &encoded);
            }
        } else {
            segments.push(format!("{QUERY_SEPARATOR}{encoded}"));
        }
    }

    segments
        .iter()
        .flat_map(|segment| split_segment(segment))
        .collect::<Vec<_>>()
        .join("/")
}

fn sanitize_segment(segment: &str) -> String {
    match sanitize(segment) {
        empty if empty.is_empty() => "_".to_string(),
        dots if dots == "." || dots == ".." => "_".repeat(dots.len()),
        clean => clean,
    }
}

/// Break an over-long segment into `MAX_SEGMENT`-sized directory levels.
fn split_segment(segment: &str) -> Vec<String> {
    if segment.len() <= MAX_SEGMENT {
        return vec![segment.to_string()];
    }

    // Sanitized and base64 text is ASCII, so byte chunks are valid UTF-8.
    segment
        .as_bytes()
        .chunks(MAX_SEGMENT)
        .filter_map(|chunk| std::str::from_utf8(chunk).ok())
        .map(sanitize_segment)
        .collect()
}

/// `styles.css` + `dj0y` → `styles__dj0y.css`; other names get a plain suffix.
fn with_query_suffix(segment: &str, encoded: &str) -> String {
    match segment.strip_suffix(".css") {
        Some(stem) if !stem.is_empty() => format!("{stem}{QUERY_SEPARATOR}{encoded}.css"),
        _ => format!("{segment}{QUERY_SEPARATOR}{encoded}"),
    }
}

fn raw_fallback(raw: &str) -> String {
    let encoded = URL_SAFE_NO_PAD.encode(raw.as_bytes());
    if encoded.is_empty() {
        return RAW_PREFIX.to_string();
    }

    format!("{RAW_PREFIX}/{}", split_segment(&encoded).join("/"))
}
