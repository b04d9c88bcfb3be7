use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SmsError;

/// Provider acknowledgement of an accepted message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageReceipt {
    pub sid: String,
}

/// Provider acknowledgement of a started verification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationReceipt {
    pub sid: String,
    pub status: String,
}

/// Outbound SMS channel.
///
/// Delivery is fire-and-forget: a receipt means the provider accepted the
/// message, not that the handset got it.
#[async_trait]
pub trait SmsTransport: Send + Sync {
    async fn send_message(&self, to: &str, body: &str) -> Result<MessageReceipt, SmsError>;

    /// Whether the provider generates and checks codes itself
    fn supports_verification(&self) -> bool {
        false
    }

    async fn start_verification(&self, _to: &str) -> Result<VerificationReceipt, SmsError> {
        Err(SmsError::Unsupported("start_verification"))
    }

    async fn check_verification(&self, _to: &str, _code: &str) -> Result<bool, SmsError> {
        Err(SmsError::Unsupported("check_verification"))
    }
}

/// Transport that writes messages to the log instead of sending them
#[derive(Debug, Default)]
pub struct LoggingTransport {
    sent: AtomicU64,
}

impl LoggingTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SmsTransport for LoggingTransport {
    async fn send_message(&self, to: &str, body: &str) -> Result<MessageReceipt, SmsError> {
        let n = self.sent.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::info!(to = %to, "SMS (not sent, no provider configured): {}", body);
        Ok(MessageReceipt {
            sid: format!("LOG{:08}", n),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_logging_transport_counts_and_issues_sids() {
        let transport = LoggingTransport::new();
        let first = transport.send_message("+15550001", "hello").await.unwrap();
        let second = transport.send_message("+15550002", "hello").await.unwrap();

        assert_eq!(first.sid, "LOG00000001");
        assert_eq!(second.sid, "LOG00000002");
        assert!(!transport.supports_verification());
    }

    #[tokio::test]
    async fn test_logging_transport_has_no_verification() {
        let transport = LoggingTransport::new();
        let err = transport.start_verification("+15550001").await.unwrap_err();
        assert!(matches!(err, SmsError::Unsupported(_)));
    }
}
