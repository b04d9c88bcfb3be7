use std::collections::HashMap;

use agrialert_weather::Coordinates;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

/// Subscription state for one phone number
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub phone_number: String,
    pub location: Option<Coordinates>,
    pub verified: bool,
    pub active: bool,
    pub alert_job_id: Option<String>,
    /// Locally issued code; `None` when the provider checks codes
    #[serde(skip)]
    pub verification_code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub subscribed_at: Option<DateTime<Utc>>,
    pub unsubscribed_at: Option<DateTime<Utc>>,
}

impl Subscription {
    fn pending(phone_number: &str, code: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            phone_number: phone_number.to_string(),
            location: None,
            verified: false,
            active: false,
            alert_job_id: None,
            verification_code: code,
            created_at: now,
            subscribed_at: None,
            unsubscribed_at: None,
        }
    }

    /// Verified, active and located: eligible for alerts
    pub fn is_subscriber(&self) -> bool {
        self.verified && self.active && self.location.is_some()
    }
}

/// In-memory registry of subscriptions keyed by phone number.
///
/// Volatile: contents are lost on restart.
#[derive(Debug, Default)]
pub struct SubscriptionStore {
    records: RwLock<HashMap<String, Subscription>>,
}

impl SubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace any record for `phone_number` with a fresh unverified one.
    ///
    /// Returns the replaced record.
    pub fn begin_verification(
        &self,
        phone_number: &str,
        code: Option<String>,
        now: DateTime<Utc>,
    ) -> Option<Subscription> {
        self.records.write().insert(
            phone_number.to_string(),
            Subscription::pending(phone_number, code, now),
        )
    }

    pub fn get(&self, phone_number: &str) -> Option<Subscription> {
        self.records.read().get(phone_number).cloned()
    }

    /// Apply `change` to an existing record, returning the updated copy
    pub fn update<F>(&self, phone_number: &str, change: F) -> Option<Subscription>
    where
        F: FnOnce(&mut Subscription),
    {
        let mut records = self.records.write();
        let record = records.get_mut(phone_number)?;
        change(record);
        Some(record.clone())
    }

    /// Phone numbers and locations of every eligible subscriber
    pub fn active_subscribers(&self) -> Vec<(String, Coordinates)> {
        self.records
            .read()
            .values()
            .filter(|s| s.is_subscriber())
            .filter_map(|s| s.location.map(|loc| (s.phone_number.clone(), loc)))
            .collect()
    }

    /// Drop unverified records created before `cutoff`
    pub fn prune_expired_pending(&self, cutoff: DateTime<Utc>) -> usize {
        let mut records = self.records.write();
        let before = records.len();
        records.retain(|_, s| s.verified || s.created_at >= cutoff);
        before - records.len()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn activate(store: &SubscriptionStore, phone: &str, at: Coordinates) {
        store.update(phone, |s| {
            s.verified = true;
            s.active = true;
            s.location = Some(at);
        });
    }

    #[test]
    fn test_begin_verification_replaces_record() {
        let store = SubscriptionStore::new();
        let now = Utc::now();

        assert!(store
            .begin_verification("+15551234567", Some("111111".into()), now)
            .is_none());
        activate(&store, "+15551234567", Coordinates::new(1.0, 1.0));

        let previous = store
            .begin_verification("+15551234567", Some("222222".into()), now)
            .unwrap();
        assert!(previous.active);

        let fresh = store.get("+15551234567").unwrap();
        assert!(!fresh.verified);
        assert!(fresh.location.is_none());
        assert_eq!(fresh.verification_code.as_deref(), Some("222222"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_active_subscribers_filters_state() {
        let store = SubscriptionStore::new();
        let now = Utc::now();

        for phone in ["+1000001", "+1000002", "+1000003"] {
            store.begin_verification(phone, None, now);
        }
        activate(&store, "+1000001", Coordinates::new(1.0, 1.0));
        activate(&store, "+1000002", Coordinates::new(2.0, 2.0));
        store.update("+1000002", |s| s.active = false);

        let subscribers = store.active_subscribers();
        assert_eq!(subscribers.len(), 1);
        assert_eq!(subscribers[0].0, "+1000001");
    }

    #[test]
    fn test_prune_keeps_verified_and_fresh() {
        let store = SubscriptionStore::new();
        let now = Utc::now();
        let old = now - Duration::minutes(30);

        store.begin_verification("+1000001", Some("1".into()), old);
        store.begin_verification("+1000002", Some("2".into()), old);
        store.begin_verification("+1000003", Some("3".into()), now);
        activate(&store, "+1000002", Coordinates::new(0.0, 0.0));

        let pruned = store.prune_expired_pending(now - Duration::minutes(15));
        assert_eq!(pruned, 1);
        assert!(store.get("+1000001").is_none());
        assert!(store.get("+1000002").is_some());
        assert!(store.get("+1000003").is_some());
    }

    #[test]
    fn test_update_missing_record() {
        let store = SubscriptionStore::new();
        assert!(store.update("+1000001", |s| s.active = true).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_code_is_never_serialized() {
        let store = SubscriptionStore::new();
        store.begin_verification("+1000001", Some("123456".into()), Utc::now());
        let json = serde_json::to_string(&store.get("+1000001").unwrap()).unwrap();
        assert!(!json.contains("123456"));
        assert!(json.contains("phoneNumber"));
    }
}
