use tracing::{error, info, warn};

use super::{UploadChain, UploadResult};
use crate::capture::Frame;

/// What happened to one extracted frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// A provider accepted the frame; the local file is gone or at least abandoned.
    Uploaded(UploadResult),
    /// Every provider failed; the file stays in the screenshot directory.
    Retained(String),
}

/// Pushes frames through the upload chain and cleans up after successes.
pub struct Publisher {
    chain: UploadChain,
}

impl Publisher {
    pub fn new(chain: UploadChain) -> Self {
        Self { chain }
    }

    pub fn chain(&self) -> &UploadChain {
        &self.chain
    }

    pub async fn publish(&self, frame: &Frame) -> PublishOutcome {
        match self.chain.upload(&frame.path).await {
            Ok(upload) => {
                info!(
                    "Frame {} ({}, {} bytes) published via {}",
                    frame.index, frame.timestamp, frame.size_bytes, upload.provider
                );
                // A leftover file does not undo the upload.
                match tokio::fs::remove_file(&frame.path).await {
                    Ok(()) => info!("Deleted local file: {:?}", frame.path),
                    Err(e) => error!("Failed to delete local file {:?}: {}", frame.path, e),
                }
                PublishOutcome::Uploaded(upload.result)
            }
            Err(e) => {
                warn!(
                    "Keeping local file {:?} after failed upload: {}",
                    frame.path, e
                );
                PublishOutcome::Retained(frame.filename.clone())
            }
        }
    }
}
