use std::sync::Arc;

use agrialert_sms::SmsTransport;
use agrialert_weather::conditions::format_alert_body;
use agrialert_weather::{AlertCondition, Coordinates};
use futures::future::join_all;
use serde::Serialize;

use crate::geo::within_radius;
use crate::store::SubscriptionStore;

/// Result of one fan-out. Failed sends are counted, never raised.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchReport {
    pub alerts_sent: usize,
    pub failed: usize,
}

impl DispatchReport {
    pub fn attempted(&self) -> usize {
        self.alerts_sent + self.failed
    }
}

/// Sends alert notifications to subscribers near a location
pub struct AlertDispatcher {
    store: Arc<SubscriptionStore>,
    transport: Arc<dyn SmsTransport>,
}

impl AlertDispatcher {
    pub fn new(store: Arc<SubscriptionStore>, transport: Arc<dyn SmsTransport>) -> Self {
        Self { store, transport }
    }

    /// One message per (subscriber within `radius` of `origin`, condition).
    pub async fn dispatch(
        &self,
        conditions: &[AlertCondition],
        origin: Coordinates,
        radius: f64,
    ) -> DispatchReport {
        if conditions.is_empty() {
            return DispatchReport::default();
        }

        let bodies: Vec<(String, String)> = conditions
            .iter()
            .map(|c| (c.kind.label().to_string(), c.notification_body()))
            .collect();

        self.fan_out(origin, radius, &bodies).await
    }

    /// Send a single ad-hoc alert to everyone within `radius` of `origin`
    pub async fn notify_area(
        &self,
        origin: Coordinates,
        radius: f64,
        alert_type: &str,
        message: &str,
    ) -> DispatchReport {
        let bodies = vec![(alert_type.to_string(), format_alert_body(alert_type, message))];
        self.fan_out(origin, radius, &bodies).await
    }

    async fn fan_out(
        &self,
        origin: Coordinates,
        radius: f64,
        bodies: &[(String, String)],
    ) -> DispatchReport {
        let recipients: Vec<String> = self
            .store
            .active_subscribers()
            .into_iter()
            .filter(|(_, location)| within_radius(*location, origin, radius))
            .map(|(phone, _)| phone)
            .collect();

        if recipients.is_empty() {
            tracing::debug!("No subscribers within {} of {}", radius, origin);
            return DispatchReport::default();
        }

        let sends = recipients.iter().flat_map(|phone| {
            bodies.iter().map(move |(alert_type, body)| async move {
                let result = self.transport.send_message(phone, body).await;
                if let Err(e) = &result {
                    tracing::warn!(
                        phone = %phone,
                        alert_type = %alert_type,
                        "Failed to send alert SMS: {}",
                        e
                    );
                }
                result.is_ok()
            })
        });

        let outcomes = join_all(sends).await;
        let alerts_sent = outcomes.iter().filter(|ok| **ok).count();
        let report = DispatchReport {
            alerts_sent,
            failed: outcomes.len() - alerts_sent,
        };

        tracing::info!(
            recipients = recipients.len(),
            attempted = report.attempted(),
            alerts_sent = report.alerts_sent,
            failed = report.failed,
            "Dispatched alerts for {}",
            origin
        );
        report
    }
}
