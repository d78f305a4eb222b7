//! Configuration loading from TOML files and environment variables.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Frame extraction configuration and per-request defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Directory holding extracted frames until they are uploaded.
    #[serde(default = "default_screenshot_dir")]
    pub screenshot_dir: PathBuf,
    /// Path or name of the ffmpeg binary.
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,
    /// ffmpeg `-q:v` value (2 = near lossless, 31 = worst).
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
    /// Seconds into the video of the first frame when a request omits it.
    #[serde(default = "default_initial_delay")]
    pub default_initial_delay: u64,
    /// Seconds between frames when a request omits it.
    #[serde(default = "default_interval")]
    pub default_interval: u64,
    /// Frame count when a request omits it.
    #[serde(default = "default_num_screenshots")]
    pub default_num_screenshots: u32,
    /// Upper bound on the frame count a single request may ask for.
    #[serde(default = "default_max_num_screenshots")]
    pub max_num_screenshots: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            screenshot_dir: default_screenshot_dir(),
            ffmpeg_path: default_ffmpeg_path(),
            jpeg_quality: default_jpeg_quality(),
            default_initial_delay: default_initial_delay(),
            default_interval: default_interval(),
            default_num_screenshots: default_num_screenshots(),
            max_num_screenshots: default_max_num_screenshots(),
        }
    }
}

/// Image host credentials and endpoints, in chain order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub imgbb: ImgbbConfig,
    #[serde(default)]
    pub freeimage: FreeimageConfig,
    #[serde(default)]
    pub imgbox: ImgboxConfig,
}

/// Primary host. The only one that retries, and only when rate limited.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImgbbConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_imgbb_endpoint")]
    pub endpoint: String,
    /// Total attempts, including the first one.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    /// Fixed delay between rate-limited attempts, in milliseconds.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for ImgbbConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint: default_imgbb_endpoint(),
            retry_attempts: default_retry_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl ImgbbConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FreeimageConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_freeimage_endpoint")]
    pub endpoint: String,
}

impl Default for FreeimageConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint: default_freeimage_endpoint(),
        }
    }
}

/// Imgbox needs no key; every upload is preceded by a token request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImgboxConfig {
    #[serde(default = "default_imgbox_token_endpoint")]
    pub token_endpoint: String,
    #[serde(default = "default_imgbox_upload_endpoint")]
    pub upload_endpoint: String,
}

impl Default for ImgboxConfig {
    fn default() -> Self {
        Self {
            token_endpoint: default_imgbox_token_endpoint(),
            upload_endpoint: default_imgbox_upload_endpoint(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_screenshot_dir() -> PathBuf {
    PathBuf::from("static/screenshots")
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_jpeg_quality() -> u8 {
    2
}

fn default_initial_delay() -> u64 {
    300
}

fn default_interval() -> u64 {
    180
}

fn default_num_screenshots() -> u32 {
    5
}

fn default_max_num_screenshots() -> u32 {
    100
}

fn default_imgbb_endpoint() -> String {
    "https://api.imgbb.com/1/upload".to_string()
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    2000
}

fn default_freeimage_endpoint() -> String {
    "https://freeimage.host/api/1/upload".to_string()
}

fn default_imgbox_token_endpoint() -> String {
    "https://imgbox.com/ajax/token/generate".to_string()
}

fn default_imgbox_upload_endpoint() -> String {
    "https://imgbox.com/upload/process".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        let config: Config =
            toml::from_str(&content).with_context(|| "Failed to parse config file")?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Call `dotenvy::dotenv()` first if a `.env` file should feed the overrides.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = config_path {
            Self::from_file(path)?
        } else {
            let default_paths = [
                PathBuf::from("config/default.toml"),
                dirs::config_dir()
                    .map(|d| d.join("stillshot/config.toml"))
                    .unwrap_or_default(),
            ];

            let mut loaded = None;
            for path in &default_paths {
                if path.is_file() {
                    loaded = Some(Self::from_file(path)?);
                    break;
                }
            }
            loaded.unwrap_or_default()
        };

        config.apply_overrides(|key| std::env::var(key).ok());

        Ok(config)
    }

    /// Apply overrides from a variable lookup (the process environment in production).
    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(val) = var("PORT") {
            if let Ok(v) = val.parse() {
                self.server.port = v;
            }
        }
        if let Some(val) = var("STILLSHOT_HOST") {
            self.server.host = val;
        }
        if let Some(val) = var("STILLSHOT_SCREENSHOT_DIR") {
            self.capture.screenshot_dir = PathBuf::from(val);
        }
        if let Some(val) = var("STILLSHOT_FFMPEG_PATH") {
            self.capture.ffmpeg_path = PathBuf::from(val);
        }
        if let Some(val) = var("STILLSHOT_JPEG_QUALITY") {
            if let Ok(v) = val.parse() {
                self.capture.jpeg_quality = v;
            }
        }
        if let Some(val) = var("STILLSHOT_MAX_NUM_SCREENSHOTS") {
            if let Ok(v) = val.parse() {
                self.capture.max_num_screenshots = v;
            }
        }
        if let Some(val) = var("IMGBB_API_KEY") {
            self.providers.imgbb.api_key = val;
        }
        if let Some(val) = var("FREEIMAGE_API_KEY") {
            self.providers.freeimage.api_key = val;
        }
        if let Some(val) = var("STILLSHOT_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Some(val) = var("STILLSHOT_LOG_FORMAT") {
            match val.to_ascii_lowercase().as_str() {
                "json" => self.logging.format = LogFormat::Json,
                "pretty" => self.logging.format = LogFormat::Pretty,
                _ => {}
            }
        }
    }

    /// Validate configuration values.
    ///
    /// Provider credentials are deliberately not checked here: a missing key
    /// makes that provider fail when it is called.
    pub fn validate(&self) -> Result<()> {
        if !(1..=31).contains(&self.capture.jpeg_quality) {
            anyhow::bail!("JPEG quality must be between 1 and 31");
        }
        if self.capture.screenshot_dir.as_os_str().is_empty() {
            anyhow::bail!("Screenshot directory cannot be empty");
        }
        if self.capture.ffmpeg_path.as_os_str().is_empty() {
            anyhow::bail!("ffmpeg path cannot be empty");
        }
        if self.capture.default_num_screenshots > self.capture.max_num_screenshots {
            anyhow::bail!(
                "Default screenshot count ({}) exceeds the maximum ({})",
                self.capture.default_num_screenshots,
                self.capture.max_num_screenshots
            );
        }
        if self.providers.imgbb.retry_attempts == 0 {
            anyhow::bail!("ImgBB retry attempts must be greater than 0");
        }
        Ok(())
    }
}
