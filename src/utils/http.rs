// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use crate::error::Result;
use crate::models::HttpConfig;

/// Keepalive probe interval for pooled connections.
const TCP_KEEPALIVE: Duration = Duration::from_secs(30);

/// Create a configured asynchronous HTTP client.
///
/// Connects and whole requests are time-bounded, and idle pooled connections
/// are closed instead of being reused indefinitely.
pub fn create_async_client(config: &HttpConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .timeout(Duration::from_secs(config.timeout_secs))
        .pool_idle_timeout(Duration::from_secs(config.pool_idle_timeout_secs))
        .tcp_keepalive(TCP_KEEPALIVE)
        .build()?;
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_client_from_defaults() {
        assert!(create_async_client(&HttpConfig::default()).is_ok());
    }
}
