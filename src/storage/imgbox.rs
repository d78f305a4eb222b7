//! Imgbox upload client. Anonymous, but every upload needs a fresh token.

use async_trait::async_trait;
use reqwest::multipart::Form;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use tracing::{debug, info};

use super::{jpeg_part, read_image, ImageHost, UploadError, UploadResult};
use crate::config::ImgboxConfig;

/// Form options sent with every upload: family safe, 350px cropped
/// thumbnails, no gallery, comments off.
const UPLOAD_OPTIONS: [(&str, &str); 5] = [
    ("content_type", "1"),
    ("thumbnail_size", "350c"),
    ("gallery_id", "null"),
    ("gallery_secret", "null"),
    ("comments_enabled", "0"),
];

#[derive(Debug, PartialEq, Eq)]
struct UploadToken {
    id: String,
    secret: String,
}

#[derive(Debug, Deserialize)]
struct ImgboxUploadResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    files: Vec<ImgboxFile>,
}

#[derive(Debug, Deserialize)]
struct ImgboxFile {
    original_url: String,
}

pub struct ImgboxUploader {
    client: reqwest::Client,
    token_endpoint: String,
    upload_endpoint: String,
}

impl ImgboxUploader {
    pub fn new(config: &ImgboxConfig, client: reqwest::Client) -> Self {
        Self {
            client,
            token_endpoint: config.token_endpoint.clone(),
            upload_endpoint: config.upload_endpoint.clone(),
        }
    }

    async fn request_token(&self) -> Result<UploadToken, UploadError> {
        let response = self.client.get(&self.token_endpoint).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if status != StatusCode::OK {
            return Err(UploadError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let json: Value = serde_json::from_str(&body)
            .map_err(|e| UploadError::Malformed(format!("token response: {e}")))?;
        parse_token(&json)
            .ok_or_else(|| UploadError::Malformed(format!("token response without token: {body}")))
    }
}

/// Token ids come back as numbers or strings depending on the endpoint version.
fn parse_token(json: &Value) -> Option<UploadToken> {
    if json.get("ok").and_then(Value::as_bool) != Some(true) {
        return None;
    }
    let field = |key: &str| match json.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    };
    Some(UploadToken {
        id: field("token_id")?,
        secret: field("token_secret")?,
    })
}

#[async_trait]
impl ImageHost for ImgboxUploader {
    fn name(&self) -> &'static str {
        "imgbox"
    }

    async fn upload(&self, path: &Path) -> Result<UploadResult, UploadError> {
        let token = self.request_token().await?;
        debug!("Got Imgbox upload token {}", token.id);

        let (bytes, name) = read_image(path).await?;
        info!("Uploading {} to Imgbox", name);

        let mut form = Form::new()
            .text("token_id", token.id)
            .text("token_secret", token.secret);
        for (key, value) in UPLOAD_OPTIONS {
            form = form.text(key, value);
        }
        let form = form.part("files[]", jpeg_part(bytes, name)?);

        let response = self
            .client
            .post(&self.upload_endpoint)
            .multipart(form)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;

        if status != StatusCode::OK {
            return Err(UploadError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ImgboxUploadResponse = serde_json::from_str(&body)
            .map_err(|e| UploadError::Malformed(format!("{e}: {body}")))?;
        if !parsed.success {
            return Err(UploadError::Rejected(body));
        }
        let file = parsed
            .files
            .into_iter()
            .next()
            .ok_or_else(|| UploadError::Rejected("no files in response".to_string()))?;

        Ok(UploadResult {
            url: file.original_url.clone(),
            direct_url: file.original_url,
            delete_url: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_server::{frame_file, spawn};
    use axum::body::Bytes;
    use axum::extract::State;
    use axum::routing::{get, post};
    use axum::Router;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Clone)]
    struct Fake {
        token: (u16, &'static str),
        upload: (u16, &'static str),
        uploads: Arc<AtomicUsize>,
    }

    async fn fake_imgbox(token: (u16, &'static str), upload: (u16, &'static str)) -> (ImgboxUploader, Arc<AtomicUsize>) {
        let uploads = Arc::new(AtomicUsize::new(0));
        let app = Router::new()
            .route(
                "/ajax/token/generate",
                get(|State(fake): State<Fake>| async move {
                    (StatusCode::from_u16(fake.token.0).unwrap(), fake.token.1)
                }),
            )
            .route(
                "/upload/process",
                post(|State(fake): State<Fake>, body: Bytes| async move {
                    fake.uploads.fetch_add(1, Ordering::SeqCst);
                    let text = String::from_utf8_lossy(&body);
                    assert!(text.contains("name=\"token_secret\""));
                    assert!(text.contains("name=\"files[]\""));
                    assert!(text.contains("350c"));
                    (StatusCode::from_u16(fake.upload.0).unwrap(), fake.upload.1)
                }),
            )
            .with_state(Fake {
                token,
                upload,
                uploads: Arc::clone(&uploads),
            });
        let base = spawn(app).await;

        let config = ImgboxConfig {
            token_endpoint: format!("{base}/ajax/token/generate"),
            upload_endpoint: format!("{base}/upload/process"),
        };
        (ImgboxUploader::new(&config, reqwest::Client::new()), uploads)
    }

    const TOKEN: &str = r#"{"ok":true,"token_id":4711,"token_secret":"s3cr3t","gallery_id":"g","gallery_secret":"gs"}"#;

    #[tokio::test]
    async fn uses_the_first_file_as_both_urls() {
        let dir = tempfile::tempdir().unwrap();
        let (uploader, uploads) = fake_imgbox(
            (200, TOKEN),
            (
                200,
                r#"{"success":true,"files":[{"original_url":"https://images2.imgbox.com/ab/cd/x_o.jpg"},{"original_url":"https://other"}]}"#,
            ),
        )
        .await;

        let result = uploader.upload(&frame_file(dir.path())).await.unwrap();

        assert_eq!(result.url, "https://images2.imgbox.com/ab/cd/x_o.jpg");
        assert_eq!(result.direct_url, result.url);
        assert_eq!(result.delete_url, None);
        assert_eq!(uploads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn token_failure_skips_the_upload() {
        let dir = tempfile::tempdir().unwrap();
        let (uploader, uploads) =
            fake_imgbox((503, "unavailable"), (200, r#"{"success":true,"files":[]}"#)).await;

        let err = uploader.upload(&frame_file(dir.path())).await.unwrap_err();

        assert!(matches!(err, UploadError::Status { status: 503, .. }));
        assert_eq!(uploads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn token_response_without_token_skips_the_upload() {
        let dir = tempfile::tempdir().unwrap();
        let (uploader, uploads) =
            fake_imgbox((200, r#"{"ok":true}"#), (200, r#"{"success":true,"files":[]}"#)).await;

        let err = uploader.upload(&frame_file(dir.path())).await.unwrap_err();

        assert!(matches!(err, UploadError::Malformed(_)));
        assert_eq!(uploads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_file_list_is_a_rejection() {
        let dir = tempfile::tempdir().unwrap();
        let (uploader, uploads) =
            fake_imgbox((200, TOKEN), (200, r#"{"success":true,"files":[]}"#)).await;

        let err = uploader.upload(&frame_file(dir.path())).await.unwrap_err();

        assert!(matches!(err, UploadError::Rejected(_)));
        assert_eq!(uploads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unsuccessful_upload_is_a_rejection() {
        let dir = tempfile::tempdir().unwrap();
        let (uploader, _) = fake_imgbox(
            (200, TOKEN),
            (200, r#"{"success":false,"files":[{"original_url":"https://x"}]}"#),
        )
        .await;

        let err = uploader.upload(&frame_file(dir.path())).await.unwrap_err();

        assert!(matches!(err, UploadError::Rejected(_)));
    }

    #[test]
    fn parses_numeric_and_string_token_ids() {
        assert_eq!(
            parse_token(&json!({"ok": true, "token_id": 12, "token_secret": "abc"})),
            Some(UploadToken {
                id: "12".to_string(),
                secret: "abc".to_string()
            })
        );
        assert_eq!(
            parse_token(&json!({"ok": true, "token_id": "12", "token_secret": "abc"}))
                .map(|t| t.id),
            Some("12".to_string())
        );
        assert_eq!(parse_token(&json!({"ok": false, "token_id": 12, "token_secret": "abc"})), None);
        assert_eq!(parse_token(&json!({"ok": true, "token_id": "", "token_secret": "abc"})), None);
    }
}
