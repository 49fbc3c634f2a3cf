use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "ws://127.0.0.1:8765";

pub const DEFAULT_RETRY_INTERVAL_MS: u64 = 5000;
pub const DEFAULT_MAX_RETRIES: u32 = 1000;

pub const DEFAULT_CAPACITY: usize = 1024;

/// How long shutdown waits for the server to answer a close frame.
pub const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);
