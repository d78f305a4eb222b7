//! HTTP surface: the capture form, the processing endpoint and retained frames.

mod routes;

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::{net::TcpListener, sync::Mutex};
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{error, info};

use crate::capture::CapturePipeline;
use crate::config::{CaptureConfig, ServerConfig};

pub struct AppState {
    pub pipeline: CapturePipeline,
    /// Values used when a form omits a field.
    pub defaults: CaptureConfig,
    /// Held for the whole capture so the screenshot directory has one writer.
    pub capture_lock: Mutex<()>,
}

impl AppState {
    pub fn new(pipeline: CapturePipeline, defaults: CaptureConfig) -> Self {
        Self {
            pipeline,
            defaults,
            capture_lock: Mutex::new(()),
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let screenshots = ServeDir::new(state.pipeline.screenshot_dir());

    Router::new()
        .route("/", get(routes::index))
        .route("/process", post(routes::process_video))
        .route("/health-check", get(routes::health_check))
        .nest_service(routes::SCREENSHOTS_ROUTE, screenshots)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start(config: &ServerConfig, state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
    info!("HTTP server running on {}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for CTRL+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received ctrl+C signal"),
        _ = terminate => info!("Received terminate signal"),
    }
}
