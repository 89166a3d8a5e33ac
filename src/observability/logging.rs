//! Structured logging configuration.

use crate::config::LoggingSettings;
use std::path::PathBuf;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable output.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    /// Parses `json`; anything else is pretty.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Pretty
        }
    }
}

/// Resolved logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// `EnvFilter` directive.
    pub filter: String,
    /// Output format.
    pub format: LogFormat,
    /// Log file; stderr when unset.
    pub file: Option<PathBuf>,
}

impl LoggingConfig {
    /// Resolves settings with environment overrides.
    ///
    /// The filter comes from `QUANTIX_LOG`, then `RUST_LOG`, then the
    /// configured level, then `debug` when verbose or `warn` otherwise.
    /// `QUANTIX_LOG_FORMAT` and `QUANTIX_LOG_FILE` override the format and
    /// file.
    #[must_use]
    pub fn from_settings(settings: &LoggingSettings, verbose: bool) -> Self {
        Self::resolve(settings, verbose, |name| std::env::var(name).ok())
    }

    fn resolve(
        settings: &LoggingSettings,
        verbose: bool,
        env: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let env = |name: &str| env(name).filter(|value| !value.trim().is_empty());

        let filter = env("QUANTIX_LOG")
            .or_else(|| env("RUST_LOG"))
            .or_else(|| settings.level.clone())
            .unwrap_or_else(|| if verbose { "debug" } else { "warn" }.to_string());
        let format = env("QUANTIX_LOG_FORMAT")
            .or_else(|| settings.format.clone())
            .map_or_else(LogFormat::default, |f| LogFormat::parse(&f));
        let file = env("QUANTIX_LOG_FILE")
            .map(PathBuf::from)
            .or_else(|| settings.file.clone());

        Self {
            filter,
            format,
            file,
        }
    }
}
