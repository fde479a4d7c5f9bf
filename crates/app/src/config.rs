//! Application configuration loaded from environment variables.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Output format for log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => Err(ConfigError::Invalid {
                key: "LOG_FORMAT",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Pretty => f.write_str("pretty"),
            LogFormat::Json => f.write_str("json"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

/// Process configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `pretty` or `json` (default: `pretty`)
/// - `COMMAND_RETRY_LIMIT`: attempts per command on concurrency conflicts
///   (default: `3`, minimum `1`)
/// - `DATABASE_URL`: Postgres connection string; in-memory store when unset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub log_level: String,
    pub log_format: LogFormat,
    pub command_retry_limit: usize,
    pub database_url: Option<String>,
}

impl Config {
    pub const DEFAULT_RETRY_LIMIT: usize = 3;

    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, falling back to defaults for
    /// missing or empty keys.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let log_format = match get("LOG_FORMAT") {
            Some(v) => v.parse()?,
            None => LogFormat::default(),
        };

        let command_retry_limit = match get("COMMAND_RETRY_LIMIT") {
            Some(v) => match v.trim().parse::<usize>() {
                Ok(n) if n >= 1 => n,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "COMMAND_RETRY_LIMIT",
                        value: v,
                    });
                }
            },
            None => Self::DEFAULT_RETRY_LIMIT,
        };

        Ok(Self {
            log_level: get("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            log_format,
            command_retry_limit,
            database_url: get("DATABASE_URL"),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            command_retry_limit: Self::DEFAULT_RETRY_LIMIT,
            database_url: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = load(&[]).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.log_level, "info");
        assert_eq!(config.command_retry_limit, 3);
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_reads_every_key() {
        let config = load(&[
            ("RUST_LOG", "domain=debug"),
            ("LOG_FORMAT", "JSON"),
            ("COMMAND_RETRY_LIMIT", "5"),
            ("DATABASE_URL", "postgres://localhost/events"),
        ])
        .unwrap();

        assert_eq!(config.log_level, "domain=debug");
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.command_retry_limit, 5);
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/events")
        );
    }

    #[test]
    fn test_empty_values_fall_back_to_defaults() {
        let config = load(&[("DATABASE_URL", ""), ("LOG_FORMAT", " ")]).unwrap();
        assert!(config.database_url.is_none());
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_rejects_zero_retry_limit() {
        let err = load(&[("COMMAND_RETRY_LIMIT", "0")]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                key: "COMMAND_RETRY_LIMIT",
                value: "0".to_string()
            }
        );
    }

    #[test]
    fn test_rejects_unknown_log_format() {
        assert!(load(&[("LOG_FORMAT", "xml")]).is_err());
    }

    #[test]
    fn test_log_format_display_round_trips() {
        for format in [LogFormat::Pretty, LogFormat::Json] {
            assert_eq!(format.to_string().parse::<LogFormat>().unwrap(), format);
        }
    }
}
