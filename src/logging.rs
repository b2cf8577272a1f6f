//! Structured logging setup.
//!
//! The engine only emits `tracing` events; installing a subscriber is up to
//! the embedding application. [`init_logging`] installs the standard one: an
//! `EnvFilter` plus a JSON or pretty formatter, configured from
//! `HSTACKS_LOG_LEVEL`, `HSTACKS_LOG_FORMAT` and `HSTACKS_LOG_TARGET_FILTER`.
//!
//! Dispatch events are `debug` level inside a `dispatch` span carrying the
//! dispatch id and path; abandoned continuations are `warn`; unrecoverable
//! errors and panicking middleware are `error`.

use anyhow::{Context, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per event, with the span list (default)
    #[default]
    Json,
    /// Multi-line human readable output
    Pretty,
}

impl LogFormat {
    /// Unknown names fall back to JSON.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("pretty") {
            LogFormat::Pretty
        } else {
            LogFormat::Json
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Base level: trace/debug/info/warn/error
    pub level: String,
    pub format: LogFormat,
    /// Extra `EnvFilter` directives, e.g. `hstacks::dispatcher=trace`
    pub target_filter: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Json,
            target_filter: None,
        }
    }
}

impl LogConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`LogConfig::from_env`] with an arbitrary key lookup.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            level: lookup("HSTACKS_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            format: lookup("HSTACKS_LOG_FORMAT")
                .map(|val| LogFormat::parse(&val))
                .unwrap_or_default(),
            target_filter: lookup("HSTACKS_LOG_TARGET_FILTER")
                .filter(|val| !val.trim().is_empty()),
        }
    }

    /// `EnvFilter` directives: the level, then any extra target directives.
    #[must_use]
    pub fn filter_directives(&self) -> String {
        match &self.target_filter {
            Some(targets) if !targets.trim().is_empty() => {
                format!("{},{}", self.level, targets.trim())
            }
            _ => self.level.clone(),
        }
    }
}

/// Install the global subscriber described by `config`.
///
/// # Errors
///
/// Fails if the filter directives are invalid or a global subscriber is
/// already installed.
pub fn init_logging_with_config(config: &LogConfig) -> Result<()> {
    let directives = config.filter_directives();
    let filter = EnvFilter::try_new(&directives)
        .with_context(|| format!("Invalid log filter '{directives}'"))?;

    let output = match config.format {
        LogFormat::Json => fmt::layer().json().with_span_list(true).boxed(),
        LogFormat::Pretty => fmt::layer().pretty().boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(output)
        .try_init()
        .context("Failed to initialize logging")
}

/// Install the global subscriber from `HSTACKS_LOG_*` environment variables.
///
/// # Errors
///
/// See [`init_logging_with_config`].
pub fn init_logging() -> Result<()> {
    init_logging_with_config(&LogConfig::from_env())
}
