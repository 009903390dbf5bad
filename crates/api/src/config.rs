//! Application configuration loaded from environment variables.

use std::time::Duration;

use saga::{RetryPolicy, SagaOptions};

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        }
    }
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default `"0.0.0.0"`)
/// - `PORT`: listen port (default `3000`)
/// - `RUST_LOG`: tracing filter directive (default `"info"`)
/// - `LOG_FORMAT`: `json` for structured logs, anything else for text
/// - `APPROVAL_WINDOW_SECS`: how long orders wait for approval (default 900)
/// - `OPERATION_TIMEOUT_SECS`: per-attempt operation timeout (default 30)
/// - `RETRY_MAX_ATTEMPTS`: attempts per external operation (default 5)
///
/// Values that fail to parse fall back to their defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub approval_window_secs: u64,
    pub operation_timeout_secs: u64,
    pub retry_max_attempts: u32,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse_or(&lookup, "PORT", defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: lookup("LOG_FORMAT")
                .map(|v| LogFormat::parse(&v))
                .unwrap_or(defaults.log_format),
            approval_window_secs: parse_or(
                &lookup,
                "APPROVAL_WINDOW_SECS",
                defaults.approval_window_secs,
            ),
            operation_timeout_secs: parse_or(
                &lookup,
                "OPERATION_TIMEOUT_SECS",
                defaults.operation_timeout_secs,
            ),
            retry_max_attempts: parse_or(
                &lookup,
                "RETRY_MAX_ATTEMPTS",
                defaults.retry_max_attempts,
            ),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Builds the options every saga started by this server runs with.
    pub fn saga_options(&self) -> SagaOptions {
        SagaOptions::default()
            .with_approval_window(Duration::from_secs(self.approval_window_secs))
            .with_operation_timeout(Duration::from_secs(self.operation_timeout_secs))
            .with_retry_policy(
                RetryPolicy::default().with_maximum_attempts(self.retry_max_attempts),
            )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            approval_window_secs: 15 * 60,
            operation_timeout_secs: 30,
            retry_max_attempts: 5,
        }
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    lookup(key)
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}
