// Copyright 2026 Cortex Contributors
// SPDX-License-Identifier: Apache-2.0

//! Configuration loading and resolution.

use std::path::PathBuf;

/// Target used when no URL is given on the command line.
pub const DEFAULT_TARGET_URL: &str = "https://example.com";

/// Root of the output tree.
pub const DEFAULT_OUT_DIR: &str = "out/css";

/// Env var overriding the output directory.
pub const OUT_DIR_ENV: &str = "CSS_HARVEST_OUT_DIR";

/// Env var pointing at a Chromium executable.
pub const CHROMIUM_PATH_ENV: &str = "CSS_HARVEST_CHROMIUM_PATH";

/// Settings for one harvesting run.
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    /// Directory the `<host>/<path>.css` tree is written under.
    pub out_dir: PathBuf,
    /// Ceiling for navigation including the network-idle wait.
    pub navigation_timeout_ms: u64,
    /// How long the network must stay quiet before the page counts as loaded.
    pub idle_ms: u64,
    /// Per-request timeout for direct `@import` fetches.
    pub fetch_timeout_ms: u64,
    /// Maximum number of `@import` fetches in flight.
    pub import_concurrency: usize,
    /// Explicit Chromium executable, if any.
    pub chromium_path: Option<PathBuf>,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            out_dir: PathBuf::from(DEFAULT_OUT_DIR),
            navigation_timeout_ms: 30_000,
            idle_ms: 500,
            fetch_timeout_ms: 15_000,
            import_concurrency: 8,
            chromium_path: None,
        }
    }
}

/// Resolve the output directory: explicit flag, then env, then default.
pub fn resolve_out_dir(explicit: Option<&str>) -> PathBuf {
    if let Some(path) = explicit {
        return PathBuf::from(path);
    }

    if let Ok(env_path) = std::env::var(OUT_DIR_ENV) {
        if !env_path.is_empty() {
            return PathBuf::from(env_path);
        }
    }

    PathBuf::from(DEFAULT_OUT_DIR)
}

/// Resolve an explicitly requested Chromium binary: flag, then env.
///
/// Returns `None` when neither is set; discovery is left to the renderer.
pub fn resolve_chromium_path(explicit: Option<&str>) -> Option<PathBuf> {
    explicit
        .map(PathBuf::from)
        .or_else(|| std::env::var(CHROMIUM_PATH_ENV).ok().map(PathBuf::from))
        .filter(|p| !p.as_os_str().is_empty())
}
