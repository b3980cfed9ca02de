//! Shared pieces of the external service adapters

use std::time::Duration;
use thiserror::Error;

/// Integration errors
#[derive(Error, Debug)]
pub enum IntegrationError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The remote service answered but refused the operation
    #[error("Rejected: {0}")]
    Rejected(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<reqwest::Error> for IntegrationError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            IntegrationError::InvalidResponse(err.to_string())
        } else {
            IntegrationError::ConnectionFailed(err.to_string())
        }
    }
}

/// Map a non-success HTTP status to an error
pub(crate) fn status_error(status: reqwest::StatusCode, body: &str) -> IntegrationError {
    let body: String = body.chars().take(300).collect();
    match status.as_u16() {
        401 | 403 => IntegrationError::AuthFailed(format!("HTTP {}: {}", status, body)),
        400..=499 => IntegrationError::Rejected(format!("HTTP {}: {}", status, body)),
        _ => IntegrationError::ConnectionFailed(format!("HTTP {}: {}", status, body)),
    }
}

pub(crate) fn http_client(timeout_seconds: u64) -> Result<reqwest::Client, IntegrationError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_seconds.max(1)))
        .build()
        .map_err(|e| IntegrationError::Internal(format!("Failed to create HTTP client: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_mapping() {
        assert!(matches!(
            status_error(reqwest::StatusCode::UNAUTHORIZED, ""),
            IntegrationError::AuthFailed(_)
        ));
        assert!(matches!(
            status_error(reqwest::StatusCode::BAD_REQUEST, "bad"),
            IntegrationError::Rejected(_)
        ));
        assert!(matches!(
            status_error(reqwest::StatusCode::BAD_GATEWAY, ""),
            IntegrationError::ConnectionFailed(_)
        ));
    }
}
