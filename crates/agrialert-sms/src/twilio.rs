use std::time::Duration;

use agrialert_core::{ConfigError, NetworkError, ReqwestErrorExt, SmsConfig};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::instrument;

use crate::error::SmsError;
use crate::transport::{MessageReceipt, SmsTransport, VerificationReceipt};

const REQUEST_TIMEOUT_SECS: u64 = 15;
const APPROVED: &str = "approved";

/// Twilio Programmable Messaging and Verify v2 client.
///
/// Sends are never retried: a retry after an ambiguous failure could deliver
/// the same SMS twice.
#[derive(Clone)]
pub struct TwilioClient {
    client: Client,
    account_sid: String,
    auth_token: String,
    from_number: String,
    verify_service_sid: Option<String>,
    api_base_url: String,
    verify_base_url: String,
}

impl std::fmt::Debug for TwilioClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwilioClient")
            .field("account_sid", &self.account_sid)
            .field("from_number", &self.from_number)
            .field("verify_service_sid", &self.verify_service_sid)
            .field("api_base_url", &self.api_base_url)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct TwilioMessage {
    sid: String,
}

#[derive(Debug, Deserialize)]
struct TwilioVerification {
    #[serde(default)]
    sid: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct TwilioErrorBody {
    code: Option<i64>,
    message: Option<String>,
}

impl TwilioClient {
    pub fn new(
        account_sid: impl Into<String>,
        auth_token: impl Into<String>,
        from_number: impl Into<String>,
    ) -> Result<Self, SmsError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| SmsError::Network(e.into_network_error()))?;

        let defaults = SmsConfig::default();
        Ok(Self {
            client,
            account_sid: account_sid.into(),
            auth_token: auth_token.into(),
            from_number: from_number.into(),
            verify_service_sid: None,
            api_base_url: defaults.api_base_url,
            verify_base_url: defaults.verify_base_url,
        })
    }

    /// Build from configuration; all three credentials must be present.
    pub fn from_config(config: &SmsConfig) -> Result<Self, ConfigError> {
        let required = |value: &Option<String>, name: &str| {
            value
                .clone()
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ConfigError::MissingSetting(name.to_string()))
        };

        let account_sid = required(&config.account_sid, "sms.account_sid")?;
        let auth_token = required(&config.auth_token, "sms.auth_token")?;
        let from_number = required(&config.from_number, "sms.from_number")?;

        let client = Self::new(account_sid, auth_token, from_number)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?
            .with_base_urls(&config.api_base_url, &config.verify_base_url);

        Ok(match config.verify_service_sid.clone().filter(|s| !s.is_empty()) {
            Some(sid) => client.with_verify_service(sid),
            None => client,
        })
    }

    pub fn with_base_urls(mut self, api_base_url: &str, verify_base_url: &str) -> Self {
        self.api_base_url = api_base_url.trim_end_matches('/').to_string();
        self.verify_base_url = verify_base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_verify_service(mut self, service_sid: impl Into<String>) -> Self {
        self.verify_service_sid = Some(service_sid.into());
        self
    }

    fn verify_service(&self) -> Result<&str, SmsError> {
        self.verify_service_sid
            .as_deref()
            .ok_or(SmsError::Unsupported("no Verify service configured"))
    }

    async fn post_form<T: DeserializeOwned>(
        &self,
        url: &str,
        form: &[(&str, &str)],
    ) -> Result<T, SmsError> {
        let response = self
            .client
            .post(url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(form)
            .send()
            .await
            .map_err(|e| SmsError::Network(e.into_network_error()))?;

        self.handle_response(response).await
    }

    async fn handle_response<T: DeserializeOwned>(&self, response: Response) -> Result<T, SmsError> {
        let status = response.status();

        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| SmsError::Parse(e.to_string()));
        }

        if status == StatusCode::UNAUTHORIZED {
            return Err(SmsError::Unauthorized);
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);
            return Err(SmsError::RateLimited(retry_after));
        }

        if status.is_server_error() {
            let text = response.text().await.unwrap_or_default();
            return Err(SmsError::Network(NetworkError::ServerError {
                status: status.as_u16(),
                message: text,
            }));
        }

        let text = response.text().await.unwrap_or_default();
        let body: Option<TwilioErrorBody> = serde_json::from_str(&text).ok();
        let (code, message) = match body {
            Some(b) => (b.code, b.message.unwrap_or(text)),
            None => (None, text),
        };

        Err(SmsError::Rejected {
            status: status.as_u16(),
            code,
            message,
        })
    }
}

#[async_trait]
impl SmsTransport for TwilioClient {
    #[instrument(skip(self, body), level = "info")]
    async fn send_message(&self, to: &str, body: &str) -> Result<MessageReceipt, SmsError> {
        let url = format!(
            "{}/Accounts/{}/Messages.json",
            self.api_base_url, self.account_sid
        );

        let message: TwilioMessage = self
            .post_form(&url, &[("To", to), ("From", self.from_number.as_str()), ("Body", body)])
            .await?;

        tracing::debug!(sid = %message.sid, "SMS accepted for {}", to);
        Ok(MessageReceipt { sid: message.sid })
    }

    fn supports_verification(&self) -> bool {
        self.verify_service_sid.is_some()
    }

    #[instrument(skip(self), level = "info")]
    async fn start_verification(&self, to: &str) -> Result<VerificationReceipt, SmsError> {
        let url = format!(
            "{}/Services/{}/Verifications",
            self.verify_base_url,
            self.verify_service()?
        );

        let verification: TwilioVerification = self
            .post_form(&url, &[("To", to), ("Channel", "sms")])
            .await?;

        Ok(VerificationReceipt {
            sid: verification.sid,
            status: verification.status,
        })
    }

    #[instrument(skip(self, code), level = "info")]
    async fn check_verification(&self, to: &str, code: &str) -> Result<bool, SmsError> {
        let url = format!(
            "{}/Services/{}/VerificationCheck",
            self.verify_base_url,
            self.verify_service()?
        );

        match self
            .post_form::<TwilioVerification>(&url, &[("To", to), ("Code", code)])
            .await
        {
            Ok(check) => Ok(check.status == APPROVED),
            // Twilio answers 404 once a verification is approved, expired or gone
            Err(SmsError::Rejected { status: 404, .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SmsConfig {
        SmsConfig {
            account_sid: Some("AC123".into()),
            auth_token: Some("secret".into()),
            from_number: Some("+15550000000".into()),
            ..SmsConfig::default()
        }
    }

    #[test]
    fn test_from_config_requires_credentials() {
        let mut cfg = config();
        cfg.auth_token = None;
        let err = TwilioClient::from_config(&cfg).unwrap_err();
        assert!(err.to_string().contains("sms.auth_token"));

        let mut cfg = config();
        cfg.from_number = Some(String::new());
        assert!(TwilioClient::from_config(&cfg).is_err());
    }

    #[test]
    fn test_verify_service_is_optional() {
        let client = TwilioClient::from_config(&config()).unwrap();
        assert!(!client.supports_verification());

        let mut cfg = config();
        cfg.verify_service_sid = Some("VA999".into());
        let client = TwilioClient::from_config(&cfg).unwrap();
        assert!(client.supports_verification());
    }

    #[test]
    fn test_debug_hides_token() {
        let client = TwilioClient::from_config(&config()).unwrap();
        let debug = format!("{:?}", client);
        assert!(debug.contains("AC123"));
        assert!(!debug.contains("secret"));
    }
}
