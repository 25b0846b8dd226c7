//! Tracing subscriber setup.
//!
//! `RUST_LOG` takes precedence over the configured level. Output is either the
//! readable fmt layout or one JSON object per line.

use crate::config::LogFormat;
use std::sync::Once;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Installs the global subscriber. Calls after the first one are no-ops.
pub fn init(level: &str, format: LogFormat) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(level))
            .unwrap_or_else(|_| EnvFilter::new("info"));

        let builder = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true);

        // A subscriber may already be installed by the embedding application.
        let _ = match format {
            LogFormat::Json => builder.json().with_current_span(false).try_init(),
            LogFormat::Text => builder.try_init(),
        };
    });
}
