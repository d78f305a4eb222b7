//! Frame capture: timestamp planning, ffmpeg extraction and the capture pipeline.

mod ffmpeg;
mod pipeline;
mod timestamp;

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

use crate::storage::UploadResult;

pub use ffmpeg::{FfmpegExtractor, FrameExtractor};
#[cfg(test)]
pub use ffmpeg::{ExtractError, MockFrameExtractor};
pub use pipeline::{cleanup_screenshots, CapturePipeline, PipelineError};
pub use timestamp::{plan, Timestamp};

/// Why a capture request was refused before any work started.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("video_url is required")]
    MissingVideoSource,
    #[error("filename_prefix must be a plain file name, got {0:?}")]
    InvalidPrefix(String),
    #[error("{field} must be a non-negative integer, got {value:?}")]
    InvalidNumber { field: &'static str, value: String },
    #[error("num_screenshots must be at most {max}, got {requested}")]
    TooManyFrames { requested: u32, max: u32 },
}

/// A validated capture request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRequest {
    video_source: String,
    frame_count: u32,
    initial_delay: u64,
    interval: u64,
    filename_prefix: String,
}

impl CaptureRequest {
    pub fn new(
        video_source: impl Into<String>,
        frame_count: u32,
        initial_delay: u64,
        interval: u64,
        filename_prefix: impl Into<String>,
    ) -> Result<Self, RequestError> {
        let video_source = video_source.into();
        if video_source.trim().is_empty() {
            return Err(RequestError::MissingVideoSource);
        }

        let filename_prefix = filename_prefix.into();
        if filename_prefix.is_empty()
            || filename_prefix.contains(['/', '\\'])
            || filename_prefix.contains("..")
        {
            return Err(RequestError::InvalidPrefix(filename_prefix));
        }

        Ok(Self {
            video_source,
            frame_count,
            initial_delay,
            interval,
            filename_prefix,
        })
    }

    pub fn video_source(&self) -> &str {
        &self.video_source
    }

    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    pub fn initial_delay(&self) -> u64 {
        self.initial_delay
    }

    pub fn interval(&self) -> u64 {
        self.interval
    }

    /// File name of the frame at `index`.
    pub fn frame_filename(&self, index: u32) -> String {
        format!("{}_{}.jpg", self.filename_prefix, index)
    }
}

/// An extracted frame waiting to be published.
#[derive(Debug, Clone)]
pub struct Frame {
    pub index: u32,
    pub timestamp: Timestamp,
    pub filename: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    /// Pixel dimensions, when the JPEG header could be read.
    pub dimensions: Option<(u32, u32)>,
}

/// Outcome of a whole capture request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CaptureResult {
    /// Frames kept on disk because no provider accepted them.
    pub local: Vec<String>,
    /// Frames accepted by a provider, in index order.
    pub uploaded: Vec<UploadResult>,
}
