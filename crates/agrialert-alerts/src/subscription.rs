use std::sync::Arc;

use agrialert_core::AlertsConfig;
use agrialert_sms::{codes_match, generate_code, validate_phone_number, SmsTransport, CODE_LENGTH};
use agrialert_weather::Coordinates;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::clock::Clock;
use crate::error::AlertError;
use crate::scheduler::{AlertScheduler, JobInfo, DEFAULT_INTERVAL_MINUTES};
use crate::store::SubscriptionStore;

pub const DEFAULT_CODE_TTL_MINUTES: u32 = 15;

const SUBSCRIBED_MESSAGE: &str = "You have successfully subscribed to farm weather alerts. We will notify you when weather conditions may impact your farming activities.";
const UNSUBSCRIBED_MESSAGE: &str = "You have successfully unsubscribed from farm weather alerts. You will no longer receive notifications.";

fn verification_message(code: &str) -> String {
    format!("Your verification code for farm weather alerts is: {}", code)
}

/// Scheduler job id for a subscriber: `user-` and the last 10 digits
pub fn subscriber_job_id(phone_number: &str) -> String {
    let digits: Vec<char> = phone_number.chars().filter(|c| *c != '+').collect();
    let tail: String = digits[digits.len().saturating_sub(10)..].iter().collect();
    format!("user-{}", tail)
}

#[derive(Debug, Clone, Copy)]
pub struct SubscriptionSettings {
    pub code_ttl: Duration,
    pub interval_minutes: u32,
}

impl Default for SubscriptionSettings {
    fn default() -> Self {
        Self {
            code_ttl: Duration::minutes(i64::from(DEFAULT_CODE_TTL_MINUTES)),
            interval_minutes: DEFAULT_INTERVAL_MINUTES,
        }
    }
}

impl SubscriptionSettings {
    pub fn from_config(config: &AlertsConfig) -> Self {
        Self {
            code_ttl: Duration::minutes(i64::from(config.code_ttl_minutes)),
            interval_minutes: config.default_interval_minutes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationSent {
    pub sid: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionView {
    pub phone_number: String,
    pub location: Option<Coordinates>,
    pub active: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub alert_job: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubscriptionStatus {
    pub subscribed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription: Option<SubscriptionView>,
}

/// Subscribe/unsubscribe flow: verification codes, subscriber records and
/// their scheduler jobs.
pub struct SubscriptionService {
    store: Arc<SubscriptionStore>,
    scheduler: Arc<AlertScheduler>,
    transport: Arc<dyn SmsTransport>,
    clock: Arc<dyn Clock>,
    settings: SubscriptionSettings,
}

impl SubscriptionService {
    pub fn new(
        store: Arc<SubscriptionStore>,
        scheduler: Arc<AlertScheduler>,
        transport: Arc<dyn SmsTransport>,
        clock: Arc<dyn Clock>,
        settings: SubscriptionSettings,
    ) -> Self {
        Self {
            store,
            scheduler,
            transport,
            clock,
            settings,
        }
    }

    fn require_phone(phone_number: &str) -> Result<&str, AlertError> {
        let phone = phone_number.trim();
        if phone.is_empty() {
            return Err(AlertError::invalid_input("Phone number is required"));
        }
        if !validate_phone_number(phone) {
            return Err(AlertError::invalid_input("Invalid phone number format"));
        }
        Ok(phone)
    }

    /// Issue a verification code and record a pending subscription.
    ///
    /// Any existing record for the number is replaced and its job stopped.
    pub async fn send_verification(&self, phone_number: &str) -> Result<VerificationSent, AlertError> {
        let phone = Self::require_phone(phone_number)?;
        let now = self.clock.now();

        let pruned = self.store.prune_expired_pending(now - self.settings.code_ttl);
        if pruned > 0 {
            tracing::debug!("Pruned {} stale pending verifications", pruned);
        }

        let (sid, code) = if self.transport.supports_verification() {
            let receipt = self.transport.start_verification(phone).await?;
            (receipt.sid, None)
        } else {
            let code = generate_code(CODE_LENGTH);
            let receipt = self
                .transport
                .send_message(phone, &verification_message(&code))
                .await?;
            (receipt.sid, Some(code))
        };

        if let Some(previous) = self.store.begin_verification(phone, code, now) {
            if let Some(job_id) = previous.alert_job_id {
                self.scheduler.stop_alert_check(&job_id);
            }
        }

        tracing::info!("Verification code sent to {}", phone);
        Ok(VerificationSent { sid })
    }

    /// Check the code, activate the subscription and start its alert job
    pub async fn verify_and_subscribe(
        &self,
        phone_number: &str,
        code: &str,
        location: Option<Coordinates>,
    ) -> Result<JobInfo, AlertError> {
        let phone = Self::require_phone(phone_number)?;
        let code = code.trim();
        if code.is_empty() {
            return Err(AlertError::invalid_input("Verification code is required"));
        }
        let location = location
            .filter(Coordinates::is_valid)
            .ok_or_else(|| AlertError::invalid_input("A valid location (lat/lng) is required"))?;

        let pending = self
            .store
            .get(phone)
            .filter(|s| !s.verified)
            .ok_or_else(|| AlertError::not_found("No verification found for this number"))?;

        let now = self.clock.now();
        match pending.verification_code.as_deref() {
            Some(stored) => {
                if !codes_match(stored, code) {
                    return Err(AlertError::invalid_code("Invalid verification code"));
                }
                if now - pending.created_at > self.settings.code_ttl {
                    return Err(AlertError::invalid_code("Verification code has expired"));
                }
            }
            None => {
                if !self.transport.check_verification(phone, code).await? {
                    return Err(AlertError::invalid_code("Invalid verification code"));
                }
            }
        }

        let job_id = subscriber_job_id(phone);
        let job = self
            .scheduler
            .schedule_alert_check(&job_id, location, self.settings.interval_minutes)?;

        let updated = self.store.update(phone, |s| {
            s.verified = true;
            s.active = true;
            s.location = Some(location);
            s.verification_code = None;
            s.subscribed_at = Some(now);
            s.unsubscribed_at = None;
            s.alert_job_id = Some(job_id.clone());
        });
        if updated.is_none() {
            self.scheduler.stop_alert_check(&job_id);
            return Err(AlertError::not_found("No verification found for this number"));
        }

        if let Err(e) = self.transport.send_message(phone, SUBSCRIBED_MESSAGE).await {
            tracing::warn!("Subscription confirmation to {} failed: {}", phone, e);
        }

        tracing::info!("{} subscribed to alerts at {} (job {})", phone, location, job_id);
        Ok(job)
    }

    /// Never fails; unknown, unverified or inactive numbers are unsubscribed
    pub fn get_status(&self, phone_number: &str) -> SubscriptionStatus {
        match self.store.get(phone_number.trim()) {
            Some(s) if s.verified && s.active => SubscriptionStatus {
                subscribed: true,
                subscription: Some(SubscriptionView {
                    phone_number: s.phone_number,
                    location: s.location,
                    active: s.active,
                    created_at: s.subscribed_at,
                    alert_job: s.alert_job_id,
                }),
            },
            _ => SubscriptionStatus {
                subscribed: false,
                subscription: None,
            },
        }
    }

    /// Stop alerts for a verified, active subscriber
    pub async fn unsubscribe(&self, phone_number: &str) -> Result<(), AlertError> {
        let phone = phone_number.trim();
        if phone.is_empty() {
            return Err(AlertError::invalid_input("Phone number is required"));
        }

        let subscription = self
            .store
            .get(phone)
            .filter(|s| s.verified && s.active)
            .ok_or_else(|| AlertError::not_found("No active subscription found for this number"))?;

        if let Some(job_id) = &subscription.alert_job_id {
            self.scheduler.stop_alert_check(job_id);
        }

        let now = self.clock.now();
        self.store.update(phone, |s| {
            s.active = false;
            s.unsubscribed_at = Some(now);
        });

        if let Err(e) = self.transport.send_message(phone, UNSUBSCRIBED_MESSAGE).await {
            tracing::warn!("Unsubscribe confirmation to {} failed: {}", phone, e);
        }

        tracing::info!("{} unsubscribed from alerts", phone);
        Ok(())
    }
}
