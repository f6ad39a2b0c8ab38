use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

use super::errors::{InfrastructureError, InfrastructureResult};

/// Environment variable holding the log filter, e.g. `sheetwalk=debug`.
pub const LOG_FILTER_ENV: &str = "SHEETWALK_LOG";

/// Installs a global subscriber appending to `log_file`.
///
/// The terminal belongs to the UI, so without a log file nothing is
/// installed and events are dropped.
pub fn init_logging(log_file: Option<&Path>) -> InfrastructureResult<bool> {
    let Some(path) = log_file else {
        return Ok(false);
    };

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| InfrastructureError::io(path, e))?;

    let filter = EnvFilter::try_from_env(LOG_FILTER_ENV).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init()
        .map_err(|e| InfrastructureError::Logging(e.to_string()))?;

    tracing::info!("Logging to {}", path.display());
    Ok(true)
}
