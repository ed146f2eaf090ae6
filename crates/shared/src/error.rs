use thiserror::Error;

/// Failure taxonomy for a single gateway round trip. Every variant maps to one
/// attempt: nothing here is retried automatically.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("request failed with status {status}")]
    Status { status: u16 },
    #[error("request timed out")]
    Timeout,
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("invalid response body: {0}")]
    Decode(String),
}

impl GatewayError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, GatewayError::Timeout)
    }
}
