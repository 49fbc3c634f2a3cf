//! Console configuration.
//!
//! Settings come from the environment (a `.env` file is honored) and can be
//! overridden on the command line.

use std::env;
use std::time::Duration;

use karaoke_sync::{RetryPolicy, DEFAULT_ENDPOINT};
use tracing::Level;

/// Holds all configuration for the console.
#[derive(Debug, Clone)]
pub struct Config {
    pub endpoint: String,
    pub retry_interval: Duration,
    pub max_retries: u32,
    pub log_level: Level,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value}")]
    InvalidNumber { name: &'static str, value: String },
    #[error("Invalid log level provided for RUST_LOG: {0}")]
    InvalidLogLevel(String),
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    // *   `KARAOKE_ENDPOINT`: (Optional) Websocket endpoint of the orchestration server. Defaults to "ws://127.0.0.1:8765".
    // *   `KARAOKE_RETRY_INTERVAL_MS`: (Optional) Fixed delay between reconnect attempts. Defaults to 5000.
    // *   `KARAOKE_MAX_RETRIES`: (Optional) Reconnect attempts before giving up. Defaults to 1000.
    // *   `RUST_LOG`: (Optional) The logging level. Defaults to "INFO".
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = RetryPolicy::default();

        let endpoint = lookup("KARAOKE_ENDPOINT").unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());

        let retry_interval = match lookup("KARAOKE_RETRY_INTERVAL_MS") {
            Some(value) => Duration::from_millis(parse_number("KARAOKE_RETRY_INTERVAL_MS", value)?),
            None => defaults.interval(),
        };

        let max_retries = match lookup("KARAOKE_MAX_RETRIES") {
            Some(value) => parse_number("KARAOKE_MAX_RETRIES", value)?,
            None => defaults.max_retries(),
        };

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str
            .parse::<Level>()
            .map_err(|_| ConfigError::InvalidLogLevel(log_level_str))?;

        Ok(Self {
            endpoint,
            retry_interval,
            max_retries,
            log_level,
        })
    }

    pub fn client_config(&self) -> karaoke_sync::Config {
        karaoke_sync::Config::builder()
            .with_endpoint(&self.endpoint)
            .with_retry_interval(self.retry_interval)
            .with_max_retries(self.max_retries)
            .build()
    }
}

fn parse_number<T: std::str::FromStr>(name: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidNumber { name, value })
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
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.endpoint, "ws://127.0.0.1:8765");
        assert_eq!(config.retry_interval, Duration::from_millis(5000));
        assert_eq!(config.max_retries, 1000);
        assert_eq!(config.log_level, Level::INFO);
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("KARAOKE_ENDPOINT", "ws://192.168.1.20:8765"),
            ("KARAOKE_RETRY_INTERVAL_MS", "250"),
            ("KARAOKE_MAX_RETRIES", " 12 "),
            ("RUST_LOG", "debug"),
        ])
        .unwrap();
        assert_eq!(config.endpoint, "ws://192.168.1.20:8765");
        assert_eq!(config.client_config().retry(), RetryPolicy::fixed(Duration::from_millis(250), 12));
        assert_eq!(config.log_level, Level::DEBUG);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            load(&[("KARAOKE_MAX_RETRIES", "lots")]),
            Err(ConfigError::InvalidNumber { name: "KARAOKE_MAX_RETRIES", .. })
        ));
        assert!(matches!(
            load(&[("RUST_LOG", "chatty")]),
            Err(ConfigError::InvalidLogLevel(_))
        ));
    }
}
