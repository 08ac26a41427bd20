//! Structured logging setup.
//!
//! Stdout-only: the CLI demonstration harness has no log-rotation or
//! multi-sink requirements, unlike a deployed service.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LoggingSettings;

/// Initialize the global tracing subscriber. Safe to call once per process.
pub fn init(settings: &LoggingSettings) -> Result<(), tracing_subscriber::util::TryInitError> {
    let default_level = settings.level.parse::<tracing::level_filters::LevelFilter>().unwrap_or(tracing::level_filters::LevelFilter::INFO);
    let env_filter = EnvFilter::builder().with_default_directive(default_level.into()).from_env_lossy();

    if settings.json {
        let layer = tracing_subscriber::fmt::layer().json().with_target(true).with_filter(env_filter);
        tracing_subscriber::registry().with(layer).try_init()
    } else {
        let layer = tracing_subscriber::fmt::layer().with_target(false).with_filter(env_filter);
        tracing_subscriber::registry().with(layer).try_init()
    }
}
