//! Logging initialisation for the preload engine.
//!
//! Installs a `tracing` subscriber that writes JSON or pretty output to
//! stderr or a file.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON structured logging.
    #[default]
    Json,
    /// Human-readable output for development.
    Pretty,
}

impl FromStr for LogFormat {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" | "text" => Ok(Self::Pretty),
            other => Err(LogError::UnknownFormat(other.to_string())),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub format: LogFormat,
    /// Filter directive, e.g. `info` or `preload_core=trace`.
    pub level: String,
    /// Log file. Logs go to stderr when unset.
    pub output_path: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Json,
            level: "info".to_string(),
            output_path: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum LogError {
    #[error("Invalid log filter: {0}")]
    InvalidFilter(String),
    #[error("Unknown log format: {0}")]
    UnknownFormat(String),
    #[error("Failed to open log file: {0}")]
    FileOpen(String),
    #[error("Subscriber already initialized")]
    AlreadyInitialized,
}

/// Install the global subscriber. Call once at start-up.
pub fn init_logging(config: &LogConfig) -> Result<(), LogError> {
    let filter = EnvFilter::try_new(&config.level)
        .map_err(|e| LogError::InvalidFilter(e.to_string()))?;

    match (&config.output_path, config.format) {
        (Some(path), format) => init_file_subscriber(filter, path, format),
        (None, LogFormat::Json) => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
            .map_err(|_| LogError::AlreadyInitialized),
        (None, LogFormat::Pretty) => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().pretty().with_writer(std::io::stderr))
            .try_init()
            .map_err(|_| LogError::AlreadyInitialized),
    }
}

fn init_file_subscriber(filter: EnvFilter, path: &Path, format: LogFormat) -> Result<(), LogError> {
    let file = std::fs::File::create(path).map_err(|e| LogError::FileOpen(e.to_string()))?;
    let writer = std::sync::Mutex::new(file);
    let registry = tracing_subscriber::registry().with(filter);

    let result = match format {
        LogFormat::Json => registry.with(fmt::layer().json().with_writer(writer)).try_init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().with_ansi(false).with_writer(writer))
            .try_init(),
    };
    result.map_err(|_| LogError::AlreadyInitialized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_parses_case_insensitively() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!(" pretty ".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert!(matches!("xml".parse::<LogFormat>(), Err(LogError::UnknownFormat(_))));
    }

    #[test]
    fn invalid_filter_is_rejected() {
        let config = LogConfig { level: "preload_core=loud".to_string(), ..Default::default() };
        assert!(matches!(init_logging(&config), Err(LogError::InvalidFilter(_))));
    }

    #[test]
    fn unwritable_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let config = LogConfig {
            output_path: Some(dir.path().join("missing").join("preload.log")),
            ..Default::default()
        };
        assert!(matches!(init_logging(&config), Err(LogError::FileOpen(_))));
    }
}
