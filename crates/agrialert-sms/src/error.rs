use agrialert_core::NetworkError;
use thiserror::Error;

/// SMS provider errors
#[derive(Debug, Error)]
pub enum SmsError {
    #[error("SMS credentials rejected")]
    Unauthorized,

    #[error("SMS provider rejected request ({status}): {message}")]
    Rejected {
        status: u16,
        code: Option<i64>,
        message: String,
    },

    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Not supported by this transport: {0}")]
    Unsupported(&'static str),
}

impl SmsError {
    pub fn user_message(&self) -> &'static str {
        match self {
            SmsError::Unauthorized => "SMS service is not configured correctly.",
            SmsError::Rejected { status, .. } if *status == 400 => {
                "The phone number could not be reached."
            }
            SmsError::Rejected { .. } => "The SMS service rejected the message.",
            SmsError::RateLimited(_) => "Too many messages. Please try again later.",
            SmsError::Network(e) => e.user_message(),
            SmsError::Parse(_) => "SMS service returned an unexpected response.",
            SmsError::Unsupported(_) => "This SMS operation is not available.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_display_and_message() {
        let err = SmsError::Rejected {
            status: 400,
            code: Some(21211),
            message: "The 'To' number is not valid.".into(),
        };
        assert!(err.to_string().contains("not valid"));
        assert!(err.user_message().contains("phone number"));
    }

    #[test]
    fn test_network_message_passthrough() {
        let err = SmsError::from(NetworkError::Timeout);
        assert_eq!(err.user_message(), NetworkError::Timeout.user_message());
    }
}
