use agrialert_sms::SmsError;
use agrialert_weather::WeatherError;
use thiserror::Error;

/// Failure of an external provider call
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("weather provider: {0}")]
    Weather(#[from] WeatherError),

    #[error("SMS provider: {0}")]
    Sms(#[from] SmsError),
}

impl TransportError {
    pub fn user_message(&self) -> &'static str {
        match self {
            TransportError::Weather(e) => e.user_message(),
            TransportError::Sms(e) => e.user_message(),
        }
    }
}

/// Errors surfaced by subscription and alert operations.
///
/// Partial dispatch failures are not errors; see `DispatchReport`.
#[derive(Debug, Error)]
pub enum AlertError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidCode(String),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

impl From<WeatherError> for AlertError {
    fn from(e: WeatherError) -> Self {
        AlertError::Transport(TransportError::Weather(e))
    }
}

impl From<SmsError> for AlertError {
    fn from(e: SmsError) -> Self {
        AlertError::Transport(TransportError::Sms(e))
    }
}

impl AlertError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        AlertError::InvalidInput(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        AlertError::NotFound(message.into())
    }

    pub fn invalid_code(message: impl Into<String>) -> Self {
        AlertError::InvalidCode(message.into())
    }

    /// Caller-facing text. Client errors already carry it; provider
    /// failures are reduced to a generic description.
    pub fn user_message(&self) -> String {
        match self {
            AlertError::InvalidInput(msg)
            | AlertError::NotFound(msg)
            | AlertError::InvalidCode(msg) => msg.clone(),
            AlertError::Transport(e) => e.user_message().to_string(),
        }
    }

    pub fn is_client_error(&self) -> bool {
        !matches!(self, AlertError::Transport(_))
    }
}
