use std::time::Duration;

use crate::client::consts::{DEFAULT_CAPACITY, DEFAULT_ENDPOINT};
use crate::client::retry::RetryPolicy;

#[derive(Debug, Clone)]
pub struct Config {
    endpoint: String,
    retry: RetryPolicy,
    capacity: usize,
}

pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::new(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.config.endpoint = endpoint.to_string();
        self
    }

    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.config.retry = RetryPolicy::fixed(interval, self.config.retry.max_retries());
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.config.retry = RetryPolicy::fixed(self.config.retry.interval(), max_retries);
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.config.capacity = capacity.max(1);
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    /// Local orchestration server, fixed 5s retry, 1000 attempts.
    pub fn new() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            retry: RetryPolicy::default(),
            capacity: DEFAULT_CAPACITY,
        }
    }

    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn retry(&self) -> RetryPolicy {
        self.retry
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::new();
        assert_eq!(config.endpoint(), "ws://127.0.0.1:8765");
        assert_eq!(config.retry().interval(), Duration::from_millis(5000));
        assert_eq!(config.retry().max_retries(), 1000);
        assert_eq!(config.capacity(), 1024);
    }

    #[test]
    fn test_builder_overrides() {
        let config = Config::builder()
            .with_endpoint("ws://10.0.0.2:9000")
            .with_max_retries(3)
            .with_retry_interval(Duration::from_millis(250))
            .with_capacity(0)
            .build();
        assert_eq!(config.endpoint(), "ws://10.0.0.2:9000");
        assert_eq!(config.retry(), RetryPolicy::fixed(Duration::from_millis(250), 3));
        assert_eq!(config.capacity(), 1);
    }
}
