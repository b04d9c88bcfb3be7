//! Shared error types for provider plumbing.
//!
//! Domain crates wrap these in their own enums; `user_message()` gives
//! caller-facing text without leaking provider details.

use thiserror::Error;

/// Network-related errors (HTTP, connectivity).
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Server error: {status} - {message}")]
    ServerError { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl NetworkError {
    pub fn user_message(&self) -> &'static str {
        match self {
            NetworkError::ConnectionFailed(_) => "Unable to reach the provider.",
            NetworkError::Timeout => "The provider did not respond in time.",
            NetworkError::ServerError { status, .. } if *status >= 500 => {
                "The provider is experiencing issues. Please try again later."
            }
            NetworkError::ServerError { .. } => "The provider rejected the request.",
            NetworkError::InvalidResponse(_) => "Received an unexpected response from the provider.",
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Configuration parse error: {0}")]
    ParseError(String),

    #[error("Missing required setting: {0}")]
    MissingSetting(String),
}

impl ConfigError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ConfigError::Invalid(_) => "Invalid configuration. Check your settings.",
            ConfigError::ParseError(_) => "Configuration is malformed. Check your settings.",
            ConfigError::MissingSetting(_) => "A required setting is missing. Check your settings.",
        }
    }
}

/// Extension trait for converting reqwest errors to our error types.
pub trait ReqwestErrorExt {
    fn into_network_error(self) -> NetworkError;
}

impl ReqwestErrorExt for reqwest::Error {
    fn into_network_error(self) -> NetworkError {
        if self.is_timeout() {
            NetworkError::Timeout
        } else if self.is_decode() {
            NetworkError::InvalidResponse(self.to_string())
        } else if let Some(status) = self.status() {
            NetworkError::ServerError {
                status: status.as_u16(),
                message: self.to_string(),
            }
        } else {
            NetworkError::ConnectionFailed(self.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_error_messages_split_on_5xx() {
        let upstream = NetworkError::ServerError {
            status: 503,
            message: "down".into(),
        };
        let rejected = NetworkError::ServerError {
            status: 401,
            message: "bad key".into(),
        };
        assert!(upstream.user_message().contains("try again later"));
        assert!(rejected.user_message().contains("rejected"));
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::MissingSetting("sms.from_number".into());
        assert!(err.to_string().contains("sms.from_number"));
        assert!(err.user_message().contains("missing"));
    }

    #[tokio::test]
    async fn test_connection_refused_maps_to_connection_failed() {
        // Port 9 (discard) on localhost is almost never listening.
        let err = reqwest::Client::new()
            .get("http://127.0.0.1:9/")
            .send()
            .await
            .unwrap_err();
        assert!(matches!(
            err.into_network_error(),
            NetworkError::ConnectionFailed(_) | NetworkError::Timeout
        ));
    }
}
