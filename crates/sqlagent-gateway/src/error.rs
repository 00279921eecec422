use thiserror::Error;

use sqlagent_core::models::QueryId;

/// Failures surfaced by the remote query gateway. Never retried here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// The backend could not be reached or the connection dropped.
    #[error("transport error: {0}")]
    Transport(String),

    /// The backend answered with a non-success status.
    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("query not found: {id}")]
    NotFound { id: QueryId },

    /// The body did not decode into the expected shape.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            GatewayError::InvalidResponse(e.to_string())
        } else {
            GatewayError::Transport(e.to_string())
        }
    }
}
