//! ImgBB upload client, the primary host.

use async_trait::async_trait;
use reqwest::multipart::Form;
use reqwest::StatusCode;
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

use super::retry::{retry, RetryPolicy};
use super::{jpeg_part, read_image, ImageHost, UploadError, UploadResult};
use crate::config::ImgbbConfig;

/// Text ImgBB puts in the body when it throttles a key.
const RATE_LIMIT_MARKER: &str = "Rate limit reached";

#[derive(Debug, Deserialize)]
struct ImgbbResponse {
    #[serde(default)]
    success: bool,
    data: Option<ImgbbData>,
}

#[derive(Debug, Deserialize)]
struct ImgbbData {
    url: String,
    display_url: String,
    delete_url: Option<String>,
}

pub struct ImgbbUploader {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    policy: RetryPolicy,
}

impl ImgbbUploader {
    pub fn new(config: &ImgbbConfig, client: reqwest::Client) -> Self {
        Self {
            client,
            api_key: config.api_key.clone(),
            endpoint: config.endpoint.clone(),
            policy: RetryPolicy::new(config.retry_attempts, config.retry_delay()),
        }
    }

    async fn attempt(&self, path: &Path, attempt: u32) -> Result<UploadResult, UploadError> {
        let (bytes, name) = read_image(path).await?;
        info!(
            "Uploading {} to ImgBB (attempt {}/{})",
            name, attempt, self.policy.max_attempts
        );

        let form = Form::new()
            .text("key", self.api_key.clone())
            .text("name", name.clone())
            .part("image", jpeg_part(bytes, name)?);

        let response = self.client.post(&self.endpoint).multipart(form).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status == StatusCode::OK {
            let parsed: ImgbbResponse = serde_json::from_str(&body)
                .map_err(|e| UploadError::Malformed(format!("{e}: {body}")))?;
            if let (true, Some(data)) = (parsed.success, parsed.data) {
                return Ok(UploadResult {
                    url: data.url,
                    direct_url: data.display_url,
                    delete_url: data.delete_url,
                });
            }
        }

        debug!("ImgBB answered {}: {}", status, body);
        if body.contains(RATE_LIMIT_MARKER) {
            return Err(UploadError::RateLimited);
        }
        if status != StatusCode::OK {
            return Err(UploadError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Err(UploadError::Rejected(body))
    }
}

#[async_trait]
impl ImageHost for ImgbbUploader {
    fn name(&self) -> &'static str {
        "imgbb"
    }

    /// Retries only while ImgBB reports a rate limit.
    async fn upload(&self, path: &Path) -> Result<UploadResult, UploadError> {
        if self.api_key.is_empty() {
            return Err(UploadError::MissingCredential);
        }

        let retried = retry(self.policy, UploadError::is_rate_limited, |attempt| {
            self.attempt(path, attempt)
        })
        .await;
        if retried.attempts > 1 {
            debug!("ImgBB upload of {:?} took {} attempts", path, retried.attempts);
        }
        retried.result
    }
}
