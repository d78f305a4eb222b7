//! Image hosting: upload providers, the fallback chain and the publisher.

mod freeimage;
mod imgbb;
mod imgbox;
mod publish;
pub mod retry;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::ProvidersConfig;

pub use freeimage::FreeimageUploader;
pub use imgbb::ImgbbUploader;
pub use imgbox::ImgboxUploader;
pub use publish::{PublishOutcome, Publisher};

/// Where a provider put an uploaded image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResult {
    /// Canonical page URL.
    pub url: String,
    /// Direct link to the image itself.
    pub direct_url: String,
    /// Only set by providers that support deletion.
    pub delete_url: Option<String>,
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("no API key configured")]
    MissingCredential,
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("rate limit reached")]
    RateLimited,
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("upload rejected: {0}")]
    Rejected(String),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("all providers failed")]
    Exhausted,
}

impl UploadError {
    /// Transient rejection worth waiting out.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited)
    }
}

/// An image hosting service.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ImageHost {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    async fn upload(&self, path: &Path) -> Result<UploadResult, UploadError>;
}

/// A successful chain pass: the result and the provider that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainUpload {
    pub provider: &'static str,
    pub result: UploadResult,
}

/// Providers in priority order. The first success wins.
pub struct UploadChain {
    hosts: Vec<Box<dyn ImageHost + Send + Sync>>,
}

impl UploadChain {
    pub fn new(hosts: Vec<Box<dyn ImageHost + Send + Sync>>) -> Self {
        Self { hosts }
    }

    /// ImgBB, then Freeimage.host, then Imgbox.
    pub fn from_config(config: &ProvidersConfig, client: reqwest::Client) -> Self {
        Self::new(vec![
            Box::new(ImgbbUploader::new(&config.imgbb, client.clone())),
            Box::new(FreeimageUploader::new(&config.freeimage, client.clone())),
            Box::new(ImgboxUploader::new(&config.imgbox, client)),
        ])
    }

    pub fn provider_names(&self) -> Vec<&'static str> {
        self.hosts.iter().map(|h| h.name()).collect()
    }

    /// One left-to-right pass over the providers.
    pub async fn upload(&self, path: &Path) -> Result<ChainUpload, UploadError> {
        for host in &self.hosts {
            match host.upload(path).await {
                Ok(result) => {
                    info!("Uploaded {:?} to {}: {}", path, host.name(), result.direct_url);
                    return Ok(ChainUpload {
                        provider: host.name(),
                        result,
                    });
                }
                Err(e) => warn!("{} upload failed for {:?}: {}", host.name(), path, e),
            }
        }

        Err(UploadError::Exhausted)
    }
}

/// Read a frame for upload, keeping the file name for the multipart part.
async fn read_image(path: &Path) -> Result<(Vec<u8>, String), UploadError> {
    let bytes = tokio::fs::read(path).await.map_err(|source| UploadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "frame.jpg".to_string());
    Ok((bytes, name))
}

fn jpeg_part(bytes: Vec<u8>, file_name: String) -> Result<reqwest::multipart::Part, UploadError> {
    reqwest::multipart::Part::bytes(bytes)
        .file_name(file_name)
        .mime_str("image/jpeg")
        .map_err(UploadError::Transport)
}
