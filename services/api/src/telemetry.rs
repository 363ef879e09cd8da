//! services/api/src/telemetry.rs
//!
//! Installs the global `tracing` subscriber.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogFormat;
use crate::error::ApiError;

/// Sets up a registry filtered by `filter` (a `RUST_LOG`-style directive) that
/// writes either human-readable lines or one JSON object per event.
pub fn init(filter: &str, format: LogFormat) -> Result<(), ApiError> {
    let filter = EnvFilter::try_new(filter)
        .map_err(|e| ApiError::Internal(format!("invalid log filter {:?}: {}", filter, e)))?;
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match format {
        LogFormat::Console => registry.with(fmt::layer()).try_init(),
        LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
    };
    installed.map_err(|e| ApiError::Internal(format!("install log subscriber: {}", e)))
}
