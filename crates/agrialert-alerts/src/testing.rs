//! Fakes for the provider seams.

use std::collections::HashSet;

use agrialert_sms::{MessageReceipt, SmsError, SmsTransport, VerificationReceipt};
use agrialert_weather::{
    Coordinates, CurrentConditions, HourlyForecast, ProviderAlert, WeatherError, WeatherProvider,
};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

/// Records every message; can be told to fail for certain numbers
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<(String, String)>>,
    failing: HashSet<String>,
    down: bool,
    verify_code: Option<String>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_for(numbers: &[&str]) -> Self {
        Self {
            failing: numbers.iter().map(|n| n.to_string()).collect(),
            ..Self::default()
        }
    }

    /// Every call fails
    pub fn down() -> Self {
        Self {
            down: true,
            ..Self::default()
        }
    }

    /// Provider-side verification that approves exactly `code`
    pub fn with_verify(code: &str) -> Self {
        Self {
            verify_code: Some(code.to_string()),
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().clone()
    }

    pub fn sent_to(&self, phone: &str) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .filter(|(to, _)| to == phone)
            .map(|(_, body)| body.clone())
            .collect()
    }

    /// Pull the 6-digit code out of the last verification SMS to `phone`
    pub fn last_code_for(&self, phone: &str) -> Option<String> {
        self.sent_to(phone)
            .iter()
            .rev()
            .find_map(|body| body.rsplit(": ").next().map(str::to_string))
            .filter(|code| code.len() == 6 && code.chars().all(|c| c.is_ascii_digit()))
    }

    fn outage() -> SmsError {
        SmsError::Network(agrialert_core::NetworkError::ConnectionFailed("outage".into()))
    }
}

#[async_trait]
impl SmsTransport for RecordingTransport {
    async fn send_message(&self, to: &str, body: &str) -> Result<MessageReceipt, SmsError> {
        if self.down || self.failing.contains(to) {
            return Err(Self::outage());
        }
        let mut sent = self.sent.lock();
        sent.push((to.to_string(), body.to_string()));
        Ok(MessageReceipt {
            sid: format!("SM{}", sent.len()),
        })
    }

    fn supports_verification(&self) -> bool {
        self.verify_code.is_some()
    }

    async fn start_verification(&self, _to: &str) -> Result<VerificationReceipt, SmsError> {
        if self.down {
            return Err(Self::outage());
        }
        Ok(VerificationReceipt {
            sid: "VE1".into(),
            status: "pending".into(),
        })
    }

    async fn check_verification(&self, _to: &str, code: &str) -> Result<bool, SmsError> {
        Ok(self.verify_code.as_deref() == Some(code))
    }
}

/// Fixed weather with optional failures
pub struct StaticWeather {
    current: CurrentConditions,
    forecast: Vec<HourlyForecast>,
    alerts: Vec<ProviderAlert>,
    current_error: Mutex<Option<WeatherError>>,
    alerts_fail: bool,
}

impl StaticWeather {
    pub fn calm() -> Self {
        Self {
            current: CurrentConditions {
                temperature: 18.0,
                feels_like: 18.0,
                humidity: 60,
                pressure: 1013.0,
                wind_speed: 10.0,
                wind_direction: None,
                description: "clear sky".into(),
                icon: "01d".into(),
                precipitation: 0.0,
                place: None,
                observed_at: Utc::now(),
            },
            forecast: Vec::new(),
            alerts: Vec::new(),
            current_error: Mutex::new(None),
            alerts_fail: false,
        }
    }

    pub fn with_forecast_step(mut self, temperature: f64, wind_speed: f64, precipitation: f64) -> Self {
        self.forecast.push(HourlyForecast {
            time: Utc::now(),
            temperature,
            feels_like: temperature,
            humidity: 70,
            wind_speed,
            description: "forecast".into(),
            precipitation,
        });
        self
    }

    pub fn with_alert(mut self, alert: ProviderAlert) -> Self {
        self.alerts.push(alert);
        self
    }

    /// The next current-conditions call fails with `error`
    pub fn failing_current(self, error: WeatherError) -> Self {
        *self.current_error.lock() = Some(error);
        self
    }

    pub fn failing_alerts(mut self) -> Self {
        self.alerts_fail = true;
        self
    }
}

#[async_trait]
impl WeatherProvider for StaticWeather {
    async fn current_conditions(&self, _at: Coordinates) -> Result<CurrentConditions, WeatherError> {
        if let Some(error) = self.current_error.lock().take() {
            return Err(error);
        }
        Ok(self.current.clone())
    }

    async fn hourly_forecast(
        &self,
        _at: Coordinates,
        _hours: u32,
    ) -> Result<Vec<HourlyForecast>, WeatherError> {
        Ok(self.forecast.clone())
    }

    async fn severe_alerts(&self, _at: Coordinates) -> Result<Vec<ProviderAlert>, WeatherError> {
        if self.alerts_fail {
            return Err(WeatherError::Forbidden("One Call requires a subscription".into()));
        }
        Ok(self.alerts.clone())
    }
}
