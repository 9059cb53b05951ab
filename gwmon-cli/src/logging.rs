//! Tracing subscriber setup with format selection.

use anyhow::{Context, Result};
use std::str::FromStr;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// JSON format for structured logging.
    Json,
    /// Human-readable pretty format with colors.
    Pretty,
    /// Compact single-line format.
    #[default]
    Compact,
}

impl FromStr for LogFormat {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "json" => Self::Json,
            "pretty" => Self::Pretty,
            "compact" => Self::Compact,
            _ => Self::default(),
        })
    }
}

/// Configuration for the CLI's log output.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    format: LogFormat,
    filter: String,
}

impl LoggingConfig {
    /// Build the configuration from `-v` count and environment.
    ///
    /// Environment variables:
    /// - `GWMON_LOG_FORMAT`: "json", "pretty", or "compact"
    /// - `RUST_LOG`: log filter string, overrides the verbosity flag
    pub fn from_verbosity(verbosity: u8) -> Self {
        Self::from_lookup(verbosity, |key| std::env::var(key).ok(), is_terminal())
    }

    fn from_lookup(verbosity: u8, lookup: impl Fn(&str) -> Option<String>, terminal: bool) -> Self {
        let level = match verbosity {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };

        let format = lookup("GWMON_LOG_FORMAT")
            .and_then(|s| s.parse::<LogFormat>().ok())
            .unwrap_or(if terminal {
                LogFormat::Pretty
            } else {
                LogFormat::Compact
            });

        let filter = lookup("RUST_LOG").unwrap_or_else(|| level.to_string());

        Self { format, filter }
    }

    /// Selected format.
    pub fn format(&self) -> LogFormat {
        self.format
    }

    /// Filter directive string.
    pub fn filter(&self) -> &str {
        &self.filter
    }
}

fn is_terminal() -> bool {
    std::io::IsTerminal::is_terminal(&std::io::stderr())
}

/// Install the global subscriber. Logs go to stderr so command output on
/// stdout stays machine readable.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_new(config.filter()).unwrap_or_else(|_| EnvFilter::new("warn"));

    let result = match config.format() {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().flatten_event(true).with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().pretty().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Compact => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .try_init(),
    };
    result.context("Failed to initialize tracing subscriber")
}
