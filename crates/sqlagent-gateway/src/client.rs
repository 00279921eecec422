use std::time::Duration;

use crate::error::GatewayError;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for the query API.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub timeout: Duration,
    /// Page size forwarded to the listing endpoint. `None` = backend default.
    pub history_limit: Option<u32>,
}

impl GatewayConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: DEFAULT_TIMEOUT,
            history_limit: None,
        }
    }
}

/// Build the HTTP client shared by every gateway call.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client, GatewayError> {
    reqwest::Client::builder()
        .user_agent(concat!("sqlagent/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .build()
        .map_err(|e| GatewayError::Transport(format!("failed to build HTTP client: {e}")))
}
