//! Logging configuration.
//!
//! Precedence, highest first: explicit overrides from the embedding
//! application, `NTPP_LOG`, a level scraped from `RUST_LOG`, then the default
//! (`info`, human output). `NTPP_LOG_FORMAT` selects the output format.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::filter::LevelFilter;

/// Environment variable for the log level.
pub const ENV_LOG_LEVEL: &str = "NTPP_LOG";
/// Environment variable for the output format.
pub const ENV_LOG_FORMAT: &str = "NTPP_LOG_FORMAT";
const ENV_RUST_LOG: &str = "RUST_LOG";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown log {kind} '{value}'")]
pub struct UnknownLogSetting {
    kind: &'static str,
    value: String,
}

/// Output format written to stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Human,
    /// One JSON object per line.
    Jsonl,
}

impl FromStr for LogFormat {
    type Err = UnknownLogSetting;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "human" | "pretty" | "text" => Ok(Self::Human),
            "jsonl" | "json" => Ok(Self::Jsonl),
            _ => Err(UnknownLogSetting {
                kind: "format",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Human => "human",
            Self::Jsonl => "jsonl",
        })
    }
}

/// Verbosity, ordered from most to least verbose.
///
/// The engine logs construction at `info`, loss summaries at `debug` and
/// individual forecast splits at `trace`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Off,
}

impl LogLevel {
    const ALL: [LogLevel; 6] = [
        LogLevel::Trace,
        LogLevel::Debug,
        LogLevel::Info,
        LogLevel::Warn,
        LogLevel::Error,
        LogLevel::Off,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
            Self::Off => "off",
        }
    }

    /// Most verbose level named anywhere in a `RUST_LOG` directive string.
    fn scrape(directives: &str) -> Option<Self> {
        let lower = directives.to_ascii_lowercase();
        Self::ALL[..Self::ALL.len() - 1]
            .iter()
            .copied()
            .find(|level| lower.contains(level.as_str()))
    }
}

impl FromStr for LogLevel {
    type Err = UnknownLogSetting;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        let name = match lower.as_str() {
            "warning" => "warn",
            "none" | "quiet" => "off",
            other => other,
        };
        Self::ALL
            .into_iter()
            .find(|level| level.as_str() == name)
            .ok_or_else(|| UnknownLogSetting {
                kind: "level",
                value: s.to_string(),
            })
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Off => LevelFilter::OFF,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub format: LogFormat,
    pub level: LogLevel,
    /// Prefix human output with timestamps.
    pub timestamps: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: LogLevel::default(),
            timestamps: true,
        }
    }
}

impl LogConfig {
    /// Resolve from the process environment, then apply explicit overrides.
    pub fn from_env(level: Option<LogLevel>, format: Option<LogFormat>) -> Self {
        let mut config = Self::resolve(|key| std::env::var(key).ok());
        if let Some(level) = level {
            config.level = level;
        }
        if let Some(format) = format {
            config.format = format;
        }
        config
    }

    /// Resolve from an arbitrary variable lookup. Unparseable values are ignored.
    pub fn resolve<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let level = match lookup(ENV_LOG_LEVEL) {
            Some(value) => value.parse().ok(),
            None => lookup(ENV_RUST_LOG).as_deref().and_then(LogLevel::scrape),
        };
        let format = lookup(ENV_LOG_FORMAT).and_then(|v| v.parse().ok());

        Self {
            level: level.unwrap_or_default(),
            format: format.unwrap_or_default(),
            ..Self::default()
        }
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_timestamps(mut self, enabled: bool) -> Self {
        self.timestamps = enabled;
        self
    }
}
