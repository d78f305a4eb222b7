//! stillshot - video screenshot service
//!
//! Extracts still frames from a remote video with ffmpeg at evenly spaced
//! offsets and publishes each one to the first image host that accepts it,
//! keeping frames no host would take in a local directory.

mod capture;
mod config;
mod logging;
mod server;
mod storage;

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use crate::capture::{cleanup_screenshots, CapturePipeline, FfmpegExtractor};
use crate::config::Config;
use crate::server::AppState;
use crate::storage::{Publisher, UploadChain};

/// Application version.
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Errors from before tracing is up are only visible on stderr, so let
    // anyhow print them on the way out.
    run().await.inspect_err(|e| error!("stillshot exited with error: {:#}", e))
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();

    // Parse command line arguments
    let config_path = std::env::args().nth(1).map(PathBuf::from);

    let config = Config::load(config_path.as_deref())?;
    config.validate()?;

    logging::init_tracing(&config.logging)?;

    info!("Starting stillshot v{}", VERSION);

    let screenshot_dir = &config.capture.screenshot_dir;
    tokio::fs::create_dir_all(screenshot_dir).await?;
    let removed = cleanup_screenshots(screenshot_dir).await;
    info!(
        "Screenshot directory {:?} ready ({} stale frame(s) removed)",
        screenshot_dir, removed
    );

    let extractor = FfmpegExtractor::new(&config.capture.ffmpeg_path, config.capture.jpeg_quality);
    let chain = UploadChain::from_config(&config.providers, reqwest::Client::new());
    let publisher = Publisher::new(chain);
    info!(
        "Upload chain: {}",
        publisher.chain().provider_names().join(" -> ")
    );

    let pipeline = CapturePipeline::new(Arc::new(extractor), publisher, screenshot_dir);
    let state = Arc::new(AppState::new(pipeline, config.capture.clone()));

    server::start(&config.server, state).await?;

    info!("stillshot shutdown complete");
    Ok(())
}
