// Copyright 2026 Cortex Contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use clap::{Parser, ValueEnum};
use css_harvester::acquisition::{Fetcher, HttpClient};
use css_harvester::config::{self, HarvestConfig, DEFAULT_TARGET_URL};
use css_harvester::renderer::chromium::ChromiumRenderer;
use css_harvester::renderer::Renderer;
use css_harvester::{HarvestError, Harvester};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(
    name = "css-harvest",
    about = "Capture every stylesheet a page loads or inlines and mirror it to disk",
    version
)]
struct Cli {
    /// Page to render
    #[arg(default_value = DEFAULT_TARGET_URL)]
    url: String,

    /// Output directory (also CSS_HARVEST_OUT_DIR)
    #[arg(long)]
    out_dir: Option<String>,

    /// Navigation ceiling in milliseconds, network-idle wait included
    #[arg(long, default_value = "30000")]
    timeout: u64,

    /// Quiet period that counts as network idle, in milliseconds
    #[arg(long, default_value = "500")]
    idle: u64,

    /// Timeout for each direct @import fetch, in milliseconds
    #[arg(long, default_value = "15000")]
    fetch_timeout: u64,

    /// Maximum concurrent @import fetches
    #[arg(long, default_value = "8")]
    concurrency: usize,

    /// Chromium executable (also CSS_HARVEST_CHROMIUM_PATH)
    #[arg(long)]
    chromium: Option<String>,

    /// Also write the run summary as JSON to this file
    #[arg(long)]
    manifest: Option<PathBuf>,

    /// Print the summary as JSON instead of text
    #[arg(long)]
    json: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log line format on stderr
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

impl Cli {
    fn harvest_config(&self) -> HarvestConfig {
        HarvestConfig {
            out_dir: config::resolve_out_dir(self.out_dir.as_deref()),
            navigation_timeout_ms: self.timeout,
            idle_ms: self.idle,
            fetch_timeout_ms: self.fetch_timeout,
            import_concurrency: self.concurrency,
            chromium_path: config::resolve_chromium_path(self.chromium.as_deref()),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    let logger = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match cli.log_format {
        LogFormat::Text => logger.init(),
        LogFormat::Json => logger.json().init(),
    }

    let result = run(&cli).await;

    // Consistent exit codes: 0=success, 1=error
    if let Err(e) = &result {
        eprintln!("  Error: {e:#}");
        std::process::exit(1);
    }

    result
}

async fn run(cli: &Cli) -> Result<()> {
    let config = cli.harvest_config();
    info!("css-harvest v{}", env!("CARGO_PKG_VERSION"));

    let renderer = ChromiumRenderer::new(config.chromium_path.clone())
        .await
        .map_err(|e| HarvestError::BrowserLaunch(format!("{e:#}")))?;
    let renderer: Arc<dyn Renderer> = Arc::new(renderer);
    let fetcher: Arc<dyn Fetcher> = Arc::new(HttpClient::new(config.fetch_timeout_ms));

    let harvester = Harvester::new(config, Arc::clone(&renderer), fetcher);
    let outcome = harvester.run(&cli.url).await;

    if let Err(e) = renderer.shutdown().await {
        warn!("browser shutdown failed: {e:#}");
    }

    let report = outcome?;

    if let Some(path) = &cli.manifest {
        report.write_manifest(path)?;
        info!("manifest written to {}", path.display());
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report.render_summary());
    }

    Ok(())
}
