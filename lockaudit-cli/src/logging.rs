//! Logging initialization for the lockaudit CLI.
//!
//! Configures `tracing-subscriber` based on the `[general]` section
//! of `LockauditConfig`. Logs go to stderr so that stdout carries only
//! the report.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use lockaudit_core::config::GeneralConfig;

use crate::error::CliError;

/// Initialize the global tracing subscriber.
///
/// Must be called exactly once, before any tracing macros are used.
/// `RUST_LOG` takes precedence over `config.log_level`.
///
/// # Formats
///
/// * `"json"` - Machine-parseable JSON lines
/// * `"pretty"` - Human-readable output
pub fn init_tracing(config: &GeneralConfig) -> Result<(), CliError> {
    let env_filter = build_filter(&config.log_level);

    match config.log_format.as_str() {
        "json" => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()
            .map_err(|e| {
                CliError::Config(format!("failed to initialize JSON tracing subscriber: {e}"))
            }),
        "pretty" => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_writer(std::io::stderr),
            )
            .try_init()
            .map_err(|e| {
                CliError::Config(format!("failed to initialize pretty tracing subscriber: {e}"))
            }),
        other => Err(CliError::Config(format!(
            "unknown log format '{other}', expected 'json' or 'pretty'"
        ))),
    }
}

fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_log_format_is_config_error() {
        let config = GeneralConfig {
            log_level: "info".to_owned(),
            log_format: "xml".to_owned(),
        };
        let err = init_tracing(&config).expect_err("xml format should be rejected");
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("xml"));
    }

    #[test]
    #[serial_test::serial]
    fn test_rust_log_overrides_configured_level() {
        // SAFETY: serial_test keeps environment mutation single-threaded.
        unsafe { std::env::set_var("RUST_LOG", "lockaudit_scanner=trace") };
        let filter = build_filter("warn");
        unsafe { std::env::remove_var("RUST_LOG") };
        assert!(filter.to_string().contains("lockaudit_scanner=trace"));
    }

    #[test]
    #[serial_test::serial]
    fn test_configured_level_without_rust_log() {
        // SAFETY: serial_test keeps environment mutation single-threaded.
        unsafe { std::env::remove_var("RUST_LOG") };
        assert_eq!(build_filter("debug").to_string(), "debug");
    }
}
