// Copyright 2026 Cortex Contributors
// SPDX-License-Identifier: Apache-2.0

//! css-harvester: capture every stylesheet a page loads or inlines.
//!
//! A page is rendered in headless Chromium; stylesheet responses are
//! intercepted and written under `<out>/<host>/<path>.css`, inline `<style>`
//! blocks are bundled into `<path>.inline.css`, and `@import`s found in the
//! captured stylesheets are fetched once, without recursion.

pub mod acquisition;
pub mod capture;
pub mod config;
pub mod error;
pub mod harvest;
pub mod renderer;
pub mod report;

pub use capture::{CapturedResource, ResourceKind, SkippedResource};
pub use config::HarvestConfig;
pub use error::{HarvestError, HarvestResult};
pub use harvest::Harvester;
pub use report::HarvestReport;
