//! Tracing subscriber setup.

use anyhow::Result;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{LogFormat, LoggingConfig};

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);

    match config.format {
        LogFormat::Pretty => registry
            .with(fmt::layer().with_target(true).with_thread_ids(false))
            .try_init()?,
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(false))
            .try_init()?,
    }

    Ok(())
}
