//! Tracing setup for the pipeline binary.
//!
//! Console output always; a plain-text copy goes to the log file when one is
//! given. `RUST_LOG` takes precedence over the level passed on the command line.

use crate::error::{BenchError, Result};
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Build the filter from `RUST_LOG`, falling back to `level`.
pub fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Install the global subscriber.
pub fn init(level: &str, log_file: Option<&Path>) -> Result<()> {
    let console = fmt::layer()
        .with_target(false)
        .with_timer(ChronoLocal::new(TIME_FORMAT.to_string()));

    let file_layer = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(true)
                    .with_timer(ChronoLocal::new(TIME_FORMAT.to_string()))
                    .with_writer(Arc::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter(level))
        .with(console)
        .with(file_layer)
        .try_init()
        .map_err(|e| BenchError::Configuration(format!("Failed to initialise logging: {}", e)))
}
