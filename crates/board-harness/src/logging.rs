//! Tracing subscriber setup.
//!
//! Logs go to stderr so the MCP stdio transport keeps stdout to itself.
//! `RUST_LOG` wins over the configured filter.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LoggingConfig;

pub fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::registry().with(filter).with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .with_target(true),
    );

    let _ = tracing::subscriber::set_global_default(subscriber);
}
