//! The capture pipeline: plan, extract and publish every requested frame.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::{plan, CaptureRequest, CaptureResult, Frame, FrameExtractor, Timestamp};
use crate::storage::{PublishOutcome, Publisher};

/// Failures that abort a whole capture request.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to create screenshot directory {path:?}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub struct CapturePipeline {
    extractor: Arc<dyn FrameExtractor + Send + Sync>,
    publisher: Publisher,
    screenshot_dir: PathBuf,
}

impl CapturePipeline {
    pub fn new(
        extractor: Arc<dyn FrameExtractor + Send + Sync>,
        publisher: Publisher,
        screenshot_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            extractor,
            publisher,
            screenshot_dir: screenshot_dir.into(),
        }
    }

    pub fn screenshot_dir(&self) -> &Path {
        &self.screenshot_dir
    }

    /// Run one request to completion.
    ///
    /// Frames are handled strictly one after another. A frame that fails to
    /// extract is skipped; a frame no provider accepts stays on disk and is
    /// listed in `local`. Only a failure to create the screenshot directory
    /// fails the request.
    pub async fn capture(&self, request: &CaptureRequest) -> Result<CaptureResult, PipelineError> {
        let start = Instant::now();
        info!(
            "Starting capture of {} frame(s) from {} (delay={}s, interval={}s)",
            request.frame_count(),
            request.video_source(),
            request.initial_delay(),
            request.interval()
        );

        tokio::fs::create_dir_all(&self.screenshot_dir)
            .await
            .map_err(|source| PipelineError::CreateDir {
                path: self.screenshot_dir.clone(),
                source,
            })?;

        let mut result = CaptureResult::default();
        let timestamps = plan(
            request.frame_count(),
            request.initial_delay(),
            request.interval(),
        );

        for (index, timestamp) in (0u32..).zip(timestamps) {
            info!(
                "Processing frame {}/{} at {} ({}s)",
                index + 1,
                request.frame_count(),
                timestamp,
                timestamp.as_secs()
            );

            let Some(frame) = self.extract_frame(request, index, timestamp).await else {
                continue;
            };

            match self.publisher.publish(&frame).await {
                PublishOutcome::Uploaded(upload) => result.uploaded.push(upload),
                PublishOutcome::Retained(filename) => result.local.push(filename),
            }
        }

        info!(
            "Capture completed in {:.1}s: {} uploaded, {} kept locally, {} skipped",
            start.elapsed().as_secs_f64(),
            result.uploaded.len(),
            result.local.len(),
            request.frame_count() as usize - result.uploaded.len() - result.local.len()
        );

        Ok(result)
    }

    async fn extract_frame(
        &self,
        request: &CaptureRequest,
        index: u32,
        timestamp: Timestamp,
    ) -> Option<Frame> {
        let filename = request.frame_filename(index);
        let path = self.screenshot_dir.join(&filename);

        if let Err(e) = self
            .extractor
            .extract(request.video_source(), timestamp, &path)
            .await
        {
            error!("Extraction failed for frame {} at {}: {}", index, timestamp, e);
            return None;
        }

        let size_bytes = match tokio::fs::metadata(&path).await {
            Ok(meta) => meta.len(),
            Err(e) => {
                error!("Extracted frame {:?} is unreadable: {}", path, e);
                return None;
            }
        };

        let dimensions = {
            let path = path.clone();
            tokio::task::spawn_blocking(move || image::image_dimensions(path))
                .await
                .ok()
                .and_then(|r| r.ok())
        };

        let frame = Frame {
            index,
            timestamp,
            filename,
            path,
            size_bytes,
            dimensions,
        };
        match frame.dimensions {
            Some((w, h)) => info!(
                "Frame saved: {:?} ({} bytes, {}x{})",
                frame.path, frame.size_bytes, w, h
            ),
            None => info!("Frame saved: {:?} ({} bytes)", frame.path, frame.size_bytes),
        }
        Some(frame)
    }
}

/// Remove every `.jpg` file left in `dir` by a previous run.
///
/// Other files are untouched and a missing directory is not an error.
/// Returns the number of files removed.
pub async fn cleanup_screenshots(dir: &Path) -> usize {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("Screenshot directory {:?} does not exist yet", dir);
            return 0;
        }
        Err(e) => {
            error!("Screenshot cleanup failed for {:?}: {}", dir, e);
            return 0;
        }
    };

    let mut removed = 0;
    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                error!("Screenshot cleanup stopped early in {:?}: {}", dir, e);
                break;
            }
        };

        let path = entry.path();
        let is_jpg = path.extension().is_some_and(|ext| ext == "jpg");
        let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
        if !is_jpg || !is_file {
            continue;
        }

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                info!("Cleaned up old screenshot: {:?}", path);
                removed += 1;
            }
            Err(e) => warn!("Failed to clean up {:?}: {}", path, e),
        }
    }

    removed
}
