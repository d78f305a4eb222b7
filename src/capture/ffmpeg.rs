//! Single-frame extraction through the ffmpeg command-line tool.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

use super::Timestamp;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("failed to run {program:?}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("ffmpeg exited with {status}: {stderr}")]
    Failed { status: ExitStatus, stderr: String },
    #[error("ffmpeg reported success but {0:?} was not written")]
    MissingOutput(PathBuf),
    #[error("failed to clear previous frame {path:?}: {source}")]
    ClearOutput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Writes one still image of `source` at `timestamp` to `output`.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait FrameExtractor {
    async fn extract(
        &self,
        source: &str,
        timestamp: Timestamp,
        output: &Path,
    ) -> Result<(), ExtractError>;
}

pub struct FfmpegExtractor {
    program: PathBuf,
    quality: u8,
}

impl FfmpegExtractor {
    pub fn new(program: impl Into<PathBuf>, quality: u8) -> Self {
        Self {
            program: program.into(),
            quality,
        }
    }

    /// Seek before `-i` so long remote sources are not decoded up to the offset.
    fn args(&self, source: &str, timestamp: Timestamp, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = [
            "-hide_banner",
            "-loglevel",
            "error",
            "-ss",
        ]
        .into_iter()
        .map(OsString::from)
        .collect();
        args.push(timestamp.to_string().into());
        args.push("-i".into());
        args.push(source.into());
        args.push("-frames:v".into());
        args.push("1".into());
        args.push("-q:v".into());
        args.push(self.quality.to_string().into());
        args.push("-y".into());
        args.push(output.as_os_str().to_owned());
        args
    }
}

#[async_trait]
impl FrameExtractor for FfmpegExtractor {
    async fn extract(
        &self,
        source: &str,
        timestamp: Timestamp,
        output: &Path,
    ) -> Result<(), ExtractError> {
        // ffmpeg can exit 0 without opening the output, e.g. when seeking past the end
        match tokio::fs::remove_file(output).await {
            Ok(()) => debug!("Removed previous frame {:?}", output),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                return Err(ExtractError::ClearOutput {
                    path: output.to_path_buf(),
                    source: e,
                });
            }
        }

        let args = self.args(source, timestamp, output);
        debug!("Running {:?} {:?}", self.program, args);

        let result = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| ExtractError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !result.status.success() {
            // -y may have truncated an older file before ffmpeg gave up
            let _ = tokio::fs::remove_file(output).await;
            return Err(ExtractError::Failed {
                status: result.status,
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }

        match tokio::fs::metadata(output).await {
            Ok(meta) if meta.is_file() => Ok(()),
            _ => Err(ExtractError::MissingOutput(output.to_path_buf())),
        }
    }
}
