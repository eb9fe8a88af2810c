//! Subscriber setup for the binary

use std::io;

use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::{LogFormat, LoggingConfig};

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
///
/// Logs go to stderr so command output on stdout stays machine-readable.
pub fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .json()
                        .with_writer(io::stderr)
                        .with_span_events(FmtSpan::CLOSE),
                )
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().compact().with_writer(io::stderr).with_target(false))
                .init();
        }
    }

    tracing::debug!(level = %config.level, "Logging initialized");
}

/// Level used when `--verbose` is passed on the command line
pub fn verbose_level(config: &LoggingConfig, verbose: bool) -> LoggingConfig {
    if !verbose {
        return config.clone();
    }

    LoggingConfig {
        level: "debug".to_string(),
        format: config.format.clone(),
    }
}
