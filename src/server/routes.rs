//! Request handlers for the capture form and its JSON endpoint.

use axum::{
    extract::{rejection::FormRejection, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Form, Json,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

use super::AppState;
use crate::capture::{CaptureRequest, PipelineError, RequestError};
use crate::storage::UploadResult;

/// URL prefix under which retained frames are served.
pub const SCREENSHOTS_ROUTE: &str = "/static/screenshots";

const INDEX_HTML: &str = include_str!("../../assets/index.html");

// Run example
//   curl -X POST "http://localhost:5000/process" \
//     -d video_url=https://example.com/video.mp4 \
//     -d initial_delay=300 -d interval=180 -d num_screenshots=5

/// Raw form fields. Everything except the URL is optional and parsed by hand
/// so that malformed numbers produce the same error body as other failures.
#[derive(Debug, Default, Deserialize)]
pub struct ProcessForm {
    pub video_url: Option<String>,
    pub initial_delay: Option<String>,
    pub interval: Option<String>,
    pub num_screenshots: Option<String>,
    pub filename_prefix: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ProcessResponse {
    Success {
        screenshots: Vec<String>,
        imgbb: Vec<UploadResult>,
    },
    Error {
        message: String,
    },
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Form(#[from] FormRejection),
    #[error(transparent)]
    BadRequest(#[from] RequestError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Form(rejection) => rejection.status(),
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Pipeline(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(ProcessResponse::Error {
            message: self.to_string(),
        });
        (status, body).into_response()
    }
}

pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

pub async fn process_video(
    State(state): State<Arc<AppState>>,
    form: Result<Form<ProcessForm>, FormRejection>,
) -> Result<Json<ProcessResponse>, ApiError> {
    let Form(form) = form.inspect_err(|e| error!("Unreadable capture form: {}", e))?;
    let request = build_request(&state, form).inspect_err(|e| error!("Rejected capture request: {}", e))?;
    info!("Processing video URL: {}", request.video_source());

    let result = {
        let _running = state.capture_lock.lock().await;
        state
            .pipeline
            .capture(&request)
            .await
            .inspect_err(|e| error!("Error processing video: {}", e))?
    };

    let screenshots = result
        .local
        .iter()
        .map(|name| format!("{}/{}", SCREENSHOTS_ROUTE, name))
        .collect();

    Ok(Json(ProcessResponse::Success {
        screenshots,
        imgbb: result.uploaded,
    }))
}

fn build_request(state: &AppState, form: ProcessForm) -> Result<CaptureRequest, RequestError> {
    let defaults = &state.defaults;
    let video_url = form.video_url.ok_or(RequestError::MissingVideoSource)?;
    let initial_delay = parse_field(
        "initial_delay",
        form.initial_delay,
        defaults.default_initial_delay,
    )?;
    let interval = parse_field("interval", form.interval, defaults.default_interval)?;
    let count = parse_field(
        "num_screenshots",
        form.num_screenshots,
        defaults.default_num_screenshots,
    )?;
    if count > defaults.max_num_screenshots {
        return Err(RequestError::TooManyFrames {
            requested: count,
            max: defaults.max_num_screenshots,
        });
    }
    let prefix = form
        .filename_prefix
        .filter(|p| !p.trim().is_empty())
        .unwrap_or_else(default_prefix);

    CaptureRequest::new(video_url.trim(), count, initial_delay, interval, prefix)
}

/// Missing or blank fields fall back to `default`.
fn parse_field<T: FromStr>(
    field: &'static str,
    value: Option<String>,
    default: T,
) -> Result<T, RequestError> {
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(default),
        Some(v) => v.parse().map_err(|_| RequestError::InvalidNumber {
            field,
            value: v.to_string(),
        }),
    }
}

fn default_prefix() -> String {
    chrono::Local::now()
        .format("screenshot_%Y%m%d_%H%M%S")
        .to_string()
}
