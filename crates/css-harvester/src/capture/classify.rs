// Copyright 2026 Cortex Contributors
// SPDX-License-Identifier: Apache-2.0

//! Decide whether an intercepted response is a stylesheet.

use crate::renderer::ResponseEvent;

/// Accepted when the status is in `[200, 400)` and either the request was
/// declared as a stylesheet or the response says `text/css`.
pub fn is_stylesheet(response: &ResponseEvent) -> bool {
    is_capturable_status(response.status)
        && (declares_stylesheet(response.resource_type.as_deref())
            || is_css_content_type(response.content_type()))
}

/// Error pages and empty bodies live outside `[200, 400)`.
pub fn is_capturable_status(status: u16) -> bool {
    (200..400).contains(&status)
}

pub fn declares_stylesheet(resource_type: Option<&str>) -> bool {
    resource_type.is_some_and(|t| t.eq_ignore_ascii_case("stylesheet"))
}

/// Substring match so `text/css; charset=utf-8` qualifies.
pub fn is_css_content_type(content_type: Option<&str>) -> bool {
    content_type.is_some_and(|ct| ct.to_ascii_lowercase().contains("text/css"))
}
