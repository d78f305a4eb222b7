//! Freeimage.host upload client. Single attempt, no delete links.

use async_trait::async_trait;
use reqwest::multipart::Form;
use reqwest::StatusCode;
use serde::Deserialize;
use std::path::Path;
use tracing::info;

use super::{jpeg_part, read_image, ImageHost, UploadError, UploadResult};
use crate::config::FreeimageConfig;

#[derive(Debug, Deserialize)]
struct FreeimageResponse {
    status_code: Option<u16>,
    image: Option<FreeimageImage>,
}

#[derive(Debug, Deserialize)]
struct FreeimageImage {
    url: String,
    display_url: String,
}

pub struct FreeimageUploader {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl FreeimageUploader {
    pub fn new(config: &FreeimageConfig, client: reqwest::Client) -> Self {
        Self {
            client,
            api_key: config.api_key.clone(),
            endpoint: config.endpoint.clone(),
        }
    }
}

#[async_trait]
impl ImageHost for FreeimageUploader {
    fn name(&self) -> &'static str {
        "freeimage"
    }

    async fn upload(&self, path: &Path) -> Result<UploadResult, UploadError> {
        if self.api_key.is_empty() {
            return Err(UploadError::MissingCredential);
        }

        let (bytes, name) = read_image(path).await?;
        info!("Uploading {} to Freeimage.host", name);

        let form = Form::new()
            .text("key", self.api_key.clone())
            .text("action", "upload")
            .text("format", "json")
            .part("source", jpeg_part(bytes, name)?);

        let response = self.client.post(&self.endpoint).multipart(form).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status != StatusCode::OK {
            return Err(UploadError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: FreeimageResponse = serde_json::from_str(&body)
            .map_err(|e| UploadError::Malformed(format!("{e}: {body}")))?;
        match parsed {
            FreeimageResponse {
                status_code: Some(200),
                image: Some(image),
            } => Ok(UploadResult {
                url: image.url,
                direct_url: image.display_url,
                delete_url: None,
            }),
            _ => Err(UploadError::Rejected(body)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_server::{frame_file, spawn};
    use axum::body::Bytes;
    use axum::extract::State;
    use axum::routing::post;
    use axum::Router;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    async fn fake_freeimage(status: u16, body: &'static str) -> (FreeimageUploader, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let app = Router::new()
            .route(
                "/api/1/upload",
                post(move |State(hits): State<Arc<AtomicUsize>>, form: Bytes| async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    let text = String::from_utf8_lossy(&form);
                    assert!(text.contains("name=\"source\""));
                    (StatusCode::from_u16(status).unwrap(), body)
                }),
            )
            .with_state(Arc::clone(&hits));
        let base = spawn(app).await;

        let config = FreeimageConfig {
            api_key: "test-key".to_string(),
            endpoint: format!("{base}/api/1/upload"),
        };
        (FreeimageUploader::new(&config, reqwest::Client::new()), hits)
    }

    #[tokio::test]
    async fn parses_a_successful_upload_without_delete_url() {
        let dir = tempfile::tempdir().unwrap();
        let (uploader, _) = fake_freeimage(
            200,
            r#"{
                "status_code": 200,
                "success": {"message": "image uploaded", "code": 200},
                "image": {
                    "url": "https://iili.io/abc.jpg",
                    "display_url": "https://iili.io/abc.md.jpg"
                },
                "status_txt": "OK"
            }"#,
        )
        .await;

        let result = uploader.upload(&frame_file(dir.path())).await.unwrap();

        assert_eq!(result.url, "https://iili.io/abc.jpg");
        assert_eq!(result.direct_url, "https://iili.io/abc.md.jpg");
        assert_eq!(result.delete_url, None);
    }

    #[tokio::test]
    async fn rate_limits_are_not_retried() {
        let dir = tempfile::tempdir().unwrap();
        let (uploader, hits) = fake_freeimage(400, "Rate limit reached").await;

        let err = uploader.upload(&frame_file(dir.path())).await.unwrap_err();

        assert!(matches!(err, UploadError::Status { status: 400, .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn non_200_status_code_field_is_a_rejection() {
        let dir = tempfile::tempdir().unwrap();
        let (uploader, _) = fake_freeimage(200, r#"{"status_code": 400, "status_txt": "Bad Request"}"#).await;

        let err = uploader.upload(&frame_file(dir.path())).await.unwrap_err();

        assert!(matches!(err, UploadError::Rejected(_)));
    }

    #[tokio::test]
    async fn missing_key_fails_without_a_request() {
        let dir = tempfile::tempdir().unwrap();
        let uploader = FreeimageUploader::new(&FreeimageConfig::default(), reqwest::Client::new());

        let err = uploader.upload(&frame_file(dir.path())).await.unwrap_err();

        assert!(matches!(err, UploadError::MissingCredential));
    }
}
