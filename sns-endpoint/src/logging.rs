//! Logging setup for applications embedding the endpoint
//!
//! The library only emits `tracing` events. Nothing is printed until the
//! application installs a subscriber, either its own or one of the modes
//! below.

use tracing_subscriber::{fmt, EnvFilter, Registry};

/// Environment variable overriding the log filter, e.g. `sns_endpoint=debug`.
pub const LOG_LEVEL_ENV: &str = "SNS_LOG_LEVEL";

/// Logging mode for different use cases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggingMode {
    /// No subscriber; events are discarded
    Silent,
    /// Compact stderr output at `info`
    Development,
    /// Verbose output with source locations at `debug`
    Debug,
}

/// Logging configuration error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Failed to initialize tracing subscriber: {0}")]
    TracingInit(String),
}

/// Install a global subscriber for `mode`.
///
/// `SNS_LOG_LEVEL`, then `RUST_LOG`, override the mode's default level.
/// Fails if a global subscriber is already set.
pub fn init_logging(mode: LoggingMode) -> Result<(), LoggingError> {
    let default_level = match mode {
        LoggingMode::Debug => "debug",
        _ => "info",
    };
    install(mode, default_level)
}

/// Install a subscriber filtering at `level` (`error` .. `trace`, or `off`).
///
/// The environment overrides still apply.
pub fn init_with_level(level: &str) -> Result<(), LoggingError> {
    install(mode_for_level(level), level)
}

fn install(mode: LoggingMode, default_level: &str) -> Result<(), LoggingError> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    match mode {
        LoggingMode::Silent => Ok(()),
        LoggingMode::Development => {
            let subscriber = Registry::default()
                .with(fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .compact())
                .with(create_env_filter(default_level));

            subscriber.try_init()
                .map_err(|e| LoggingError::TracingInit(e.to_string()))
        }
        LoggingMode::Debug => {
            let subscriber = Registry::default()
                .with(fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true))
                .with(create_env_filter(default_level));

            subscriber.try_init()
                .map_err(|e| LoggingError::TracingInit(e.to_string()))
        }
    }
}

/// Pick the mode matching a level name: `debug` and `trace` get the verbose
/// layout, `off` is silent, everything else is development output.
pub fn mode_for_level(level: &str) -> LoggingMode {
    match level.to_ascii_lowercase().as_str() {
        "off" => LoggingMode::Silent,
        "debug" | "trace" => LoggingMode::Debug,
        _ => LoggingMode::Development,
    }
}

fn create_env_filter(default_level: &str) -> EnvFilter {
    if let Ok(level) = std::env::var(LOG_LEVEL_ENV) {
        EnvFilter::new(level)
    } else if let Ok(rust_log) = std::env::var("RUST_LOG") {
        EnvFilter::new(rust_log)
    } else {
        EnvFilter::new(default_level)
    }
}
