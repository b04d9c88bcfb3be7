use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::ConfigError;

/// Environment variable pointing at an explicit config file.
pub const CONFIG_PATH_ENV: &str = "AGRIALERT_CONFIG";

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Add an error
    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Add a warning
    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a summary of all errors
    pub fn error_summary(&self) -> String {
        if self.errors.is_empty() {
            return String::new();
        }
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP listener settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Weather provider settings
    #[serde(default)]
    pub weather: WeatherConfig,

    /// SMS provider settings
    #[serde(default)]
    pub sms: SmsConfig,

    /// Alert scheduling and subscription settings
    #[serde(default)]
    pub alerts: AlertsConfig,

    /// Problems found while applying environment overrides; reported as
    /// warnings by `validate` once logging is up
    #[serde(skip)]
    env_issues: Vec<ConfigValidationError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Fallback log filter when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    /// OpenWeather API key
    pub api_key: Option<String>,

    /// Base URL of the OpenWeather 2.5 API
    pub base_url: String,

    /// Forecast window used for forecast extremes, in hours
    pub forecast_hours: u32,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openweathermap.org/data/2.5".to_string(),
            forecast_hours: 24,
        }
    }
}

impl WeatherConfig {
    pub fn is_configured(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmsConfig {
    pub account_sid: Option<String>,
    pub auth_token: Option<String>,

    /// Sender identity for outgoing messages
    pub from_number: Option<String>,

    /// Twilio Verify service. When set, verification codes are issued and
    /// checked by the provider instead of locally.
    pub verify_service_sid: Option<String>,

    pub api_base_url: String,
    pub verify_base_url: String,
}

impl Default for SmsConfig {
    fn default() -> Self {
        Self {
            account_sid: None,
            auth_token: None,
            from_number: None,
            verify_service_sid: None,
            api_base_url: "https://api.twilio.com/2010-04-01".to_string(),
            verify_base_url: "https://verify.twilio.com/v2".to_string(),
        }
    }
}

impl SmsConfig {
    /// Check if credentials and sender identity are all present
    pub fn is_configured(&self) -> bool {
        [&self.account_sid, &self.auth_token, &self.from_number]
            .iter()
            .all(|v| v.as_deref().is_some_and(|s| !s.is_empty()))
    }

    pub fn uses_provider_verification(&self) -> bool {
        self.verify_service_sid
            .as_deref()
            .is_some_and(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertsConfig {
    /// Interval for subscriber jobs, in minutes
    #[serde(default = "default_interval_minutes")]
    pub default_interval_minutes: u32,

    /// Dispatch radius in degree units (0.1 is roughly 10km)
    #[serde(default = "default_radius_degrees")]
    pub radius_degrees: f64,

    /// Lifetime of a locally issued verification code, in minutes
    #[serde(default = "default_code_ttl_minutes")]
    pub code_ttl_minutes: u32,

    /// Schedule `default_locations` at startup
    #[serde(default)]
    pub enable_default_checks: bool,

    #[serde(default)]
    pub default_locations: Vec<DefaultLocation>,
}

fn default_interval_minutes() -> u32 {
    60
}

fn default_radius_degrees() -> f64 {
    0.1
}

fn default_code_ttl_minutes() -> u32 {
    15
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            default_interval_minutes: default_interval_minutes(),
            radius_degrees: default_radius_degrees(),
            code_ttl_minutes: default_code_ttl_minutes(),
            enable_default_checks: false,
            default_locations: Vec::new(),
        }
    }
}

/// A location monitored from startup, independent of any subscriber.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefaultLocation {
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub interval_minutes: Option<u32>,
}

/// Parse the `DEFAULT_ALERT_LOCATIONS` JSON array.
///
/// Entries without numeric `lat`/`lng` are skipped and described in the
/// second element of the result.
pub fn parse_default_locations(
    raw: &str,
) -> Result<(Vec<DefaultLocation>, Vec<ConfigValidationError>), ConfigError> {
    let entries: Vec<serde_json::Value> = serde_json::from_str(raw)
        .map_err(|e| ConfigError::ParseError(format!("DEFAULT_ALERT_LOCATIONS: {}", e)))?;

    let mut locations = Vec::with_capacity(entries.len());
    let mut skipped = Vec::new();
    for (index, entry) in entries.into_iter().enumerate() {
        match serde_json::from_value(entry) {
            Ok(loc) => locations.push(loc),
            Err(e) => skipped.push(ConfigValidationError {
                field: format!("DEFAULT_ALERT_LOCATIONS[{}]", index),
                message: format!("Skipped: {}", e),
            }),
        }
    }

    Ok((locations, skipped))
}

impl Config {
    /// Load configuration: defaults, then the config file if present, then
    /// environment variables (including a `.env` file).
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = match Self::config_path() {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => Self::default(),
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Returns an error if validation fails with critical errors. Warnings
    /// are handed back so they can be logged once tracing is up.
    pub fn load_validated() -> Result<(Self, ValidationResult)> {
        let config = Self::load()?;
        let validation = config.validate();

        if !validation.is_valid() {
            anyhow::bail!(
                "Configuration validation failed: {}",
                validation.error_summary()
            );
        }

        Ok((config, validation))
    }

    /// Read a TOML config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let config: Config = toml::from_str(&contents).context("Failed to parse config file")?;

        Ok(config)
    }

    /// Override fields from environment-style variables.
    ///
    /// Unusable values are left out and surface as warnings from `validate`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT") {
            match port.parse() {
                Ok(p) => self.server.port = p,
                Err(e) => self.env_issues.push(ConfigValidationError {
                    field: "PORT".to_string(),
                    message: format!("Ignoring invalid value '{}': {}", port, e),
                }),
            }
        }
        if let Some(host) = lookup("HOST") {
            self.server.host = host;
        }
        if let Some(level) = lookup("LOG_LEVEL") {
            self.server.log_level = level;
        }

        if let Some(key) = lookup("OPENWEATHER_API_KEY") {
            self.weather.api_key = Some(key);
        }
        if let Some(url) = lookup("OPENWEATHER_BASE_URL") {
            self.weather.base_url = url;
        }

        if let Some(sid) = lookup("TWILIO_ACCOUNT_SID") {
            self.sms.account_sid = Some(sid);
        }
        if let Some(token) = lookup("TWILIO_AUTH_TOKEN") {
            self.sms.auth_token = Some(token);
        }
        if let Some(from) = lookup("TWILIO_PHONE_NUMBER") {
            self.sms.from_number = Some(from);
        }
        if let Some(sid) = lookup("TWILIO_VERIFY_SERVICE_SID") {
            self.sms.verify_service_sid = Some(sid);
        }

        if let Some(flag) = lookup("ENABLE_DEFAULT_ALERT_CHECKS") {
            self.alerts.enable_default_checks = flag == "true";
        }
        if let Some(raw) = lookup("DEFAULT_ALERT_LOCATIONS") {
            match parse_default_locations(&raw) {
                Ok((locations, skipped)) => {
                    self.alerts.default_locations = locations;
                    self.env_issues.extend(skipped);
                }
                Err(e) => self.env_issues.push(ConfigValidationError {
                    field: "DEFAULT_ALERT_LOCATIONS".to_string(),
                    message: format!("Ignoring default alert locations: {}", e),
                }),
            }
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult {
            warnings: self.env_issues.clone(),
            ..ValidationResult::default()
        };

        if self.server.port == 0 {
            result.add_error("server.port", "Port cannot be 0");
        }

        self.validate_url(&self.weather.base_url, "weather.base_url", &mut result);
        self.validate_url(&self.sms.api_base_url, "sms.api_base_url", &mut result);
        self.validate_url(&self.sms.verify_base_url, "sms.verify_base_url", &mut result);

        if self.weather.forecast_hours == 0 {
            result.add_error("weather.forecast_hours", "Forecast window must be greater than 0");
        } else if self.weather.forecast_hours > 120 {
            result.add_warning(
                "weather.forecast_hours",
                "Forecast window exceeds the 5-day provider limit and will be truncated",
            );
        }

        if !self.weather.is_configured() {
            result.add_warning(
                "weather.api_key",
                "Weather API key not configured - alert checks will fail",
            );
        }

        if !self.sms.is_configured() {
            result.add_warning(
                "sms",
                "SMS provider not configured - messages will only be logged",
            );
        } else if !self.sms.uses_provider_verification() {
            result.add_warning(
                "sms.verify_service_sid",
                "No Verify service configured - using locally generated codes",
            );
        }

        if self.alerts.default_interval_minutes == 0 {
            result.add_error(
                "alerts.default_interval_minutes",
                "Check interval must be greater than 0",
            );
        } else if self.alerts.default_interval_minutes > 1440 {
            result.add_warning(
                "alerts.default_interval_minutes",
                "Check interval is more than 24 hours",
            );
        }

        if !(self.alerts.radius_degrees > 0.0) {
            result.add_error("alerts.radius_degrees", "Radius must be greater than 0");
        }

        if self.alerts.code_ttl_minutes == 0 {
            result.add_error("alerts.code_ttl_minutes", "Code lifetime must be greater than 0");
        }

        for (index, loc) in self.alerts.default_locations.iter().enumerate() {
            let field = format!("alerts.default_locations[{}]", index);
            // Bad entries are skipped at startup, the rest still run
            if !(-90.0..=90.0).contains(&loc.lat) || !(-180.0..=180.0).contains(&loc.lng) {
                result.add_warning(&field, "Coordinates out of range; location will be skipped");
            }
            if loc.interval_minutes == Some(0) {
                result.add_warning(&field, "Check interval is 0; location will be skipped");
            }
        }

        if self.alerts.enable_default_checks && self.alerts.default_locations.is_empty() {
            result.add_warning(
                "alerts.enable_default_checks",
                "Default checks enabled but no locations configured",
            );
        }

        result
    }

    /// Validate a URL field
    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }

                if url.port() == Some(0) {
                    result.add_error(field_name, "Port cannot be 0");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Get the path to the configuration file
    fn config_path() -> Option<PathBuf> {
        if let Ok(explicit) = std::env::var(CONFIG_PATH_ENV) {
            return Some(PathBuf::from(explicit));
        }

        dirs::config_dir().map(|dir| dir.join("agrialert").join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env_from(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_valid_default_config() {
        let config = Config::default();
        let result = config.validate();
        assert!(result.is_valid(), "Default config should be valid: {:?}", result.errors);
    }

    #[test]
    fn test_unconfigured_providers_are_warnings() {
        let result = Config::default().validate();
        assert!(result.is_valid());
        assert!(result.warnings.iter().any(|w| w.field == "weather.api_key"));
        assert!(result.warnings.iter().any(|w| w.field == "sms"));
    }

    #[test]
    fn test_invalid_url_scheme() {
        let mut config = Config::default();
        config.weather.base_url = "ftp://localhost:8080".to_string();
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.message.contains("http or https")));
    }

    #[test]
    fn test_invalid_url() {
        let mut config = Config::default();
        config.sms.api_base_url = "not-a-url".to_string();
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.field == "sms.api_base_url"));
    }

    #[test]
    fn test_zero_interval_and_radius() {
        let mut config = Config::default();
        config.alerts.default_interval_minutes = 0;
        config.alerts.radius_degrees = 0.0;
        let result = config.validate();
        assert!(result.errors.iter().any(|e| e.field == "alerts.default_interval_minutes"));
        assert!(result.errors.iter().any(|e| e.field == "alerts.radius_degrees"));
    }

    #[test]
    fn test_out_of_range_default_location() {
        let mut config = Config::default();
        config.alerts.default_locations.push(DefaultLocation {
            lat: 95.0,
            lng: 10.0,
            interval_minutes: None,
        });
        config.alerts.default_locations.push(DefaultLocation {
            lat: 10.0,
            lng: 10.0,
            interval_minutes: Some(0),
        });
        let result = config.validate();
        assert!(result.is_valid(), "Bad locations must not block startup");
        assert!(result
            .warnings
            .iter()
            .any(|w| w.field == "alerts.default_locations[0]" && w.message.contains("out of range")));
        assert!(result
            .warnings
            .iter()
            .any(|w| w.field == "alerts.default_locations[1]"));
    }

    #[test]
    fn test_apply_env_overrides() {
        let env = env_from(&[
            ("PORT", "8080"),
            ("OPENWEATHER_API_KEY", "weather-key"),
            ("TWILIO_ACCOUNT_SID", "AC123"),
            ("TWILIO_AUTH_TOKEN", "secret"),
            ("TWILIO_PHONE_NUMBER", "+15550000000"),
            ("ENABLE_DEFAULT_ALERT_CHECKS", "true"),
            (
                "DEFAULT_ALERT_LOCATIONS",
                r#"[{"lat": 10.5, "lng": 20.25}, {"lat": 1, "lng": 2, "intervalMinutes": 30}]"#,
            ),
        ]);

        let mut config = Config::default();
        config.apply_env(|key| env.get(key).cloned());

        assert_eq!(config.server.port, 8080);
        assert!(config.weather.is_configured());
        assert!(config.sms.is_configured());
        assert!(!config.sms.uses_provider_verification());
        assert!(config.alerts.enable_default_checks);
        assert_eq!(config.alerts.default_locations.len(), 2);
        assert_eq!(config.alerts.default_locations[1].interval_minutes, Some(30));
    }

    #[test]
    fn test_apply_env_keeps_port_on_garbage() {
        let env = env_from(&[("PORT", "not-a-port")]);
        let mut config = Config::default();
        config.apply_env(|key| env.get(key).cloned());
        assert_eq!(config.server.port, 3001);

        let result = config.validate();
        assert!(result.is_valid());
        assert!(result.warnings.iter().any(|w| w.field == "PORT"));
    }

    #[test]
    fn test_enable_flag_requires_literal_true() {
        let env = env_from(&[("ENABLE_DEFAULT_ALERT_CHECKS", "yes")]);
        let mut config = Config::default();
        config.apply_env(|key| env.get(key).cloned());
        assert!(!config.alerts.enable_default_checks);
    }

    #[test]
    fn test_parse_default_locations_skips_incomplete_entries() {
        let (locations, skipped) =
            parse_default_locations(r#"[{"lat": 1.0}, {"lat": 2.0, "lng": 3.0}]"#).unwrap();
        assert_eq!(locations.len(), 1);
        assert_eq!(locations[0].lng, 3.0);
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].field, "DEFAULT_ALERT_LOCATIONS[0]");
    }

    #[test]
    fn test_parse_default_locations_rejects_non_array() {
        let err = parse_default_locations("{not json").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_malformed_locations_env_is_ignored() {
        let env = env_from(&[("DEFAULT_ALERT_LOCATIONS", "oops")]);
        let mut config = Config::default();
        config.apply_env(|key| env.get(key).cloned());
        assert!(config.alerts.default_locations.is_empty());

        let result = config.validate();
        assert!(result.is_valid());
        assert!(result
            .warnings
            .iter()
            .any(|w| w.field == "DEFAULT_ALERT_LOCATIONS"));
    }

    #[test]
    fn test_out_of_range_env_location_does_not_block_startup() {
        let env = env_from(&[(
            "DEFAULT_ALERT_LOCATIONS",
            r#"[{"lat": 10, "lng": 10}, {"lat": 120, "lng": 0}]"#,
        )]);
        let mut config = Config::default();
        config.apply_env(|key| env.get(key).cloned());

        assert_eq!(config.alerts.default_locations.len(), 2);
        let result = config.validate();
        assert!(result.is_valid(), "{}", result.error_summary());
        assert!(result
            .warnings
            .iter()
            .any(|w| w.field == "alerts.default_locations[1]"));
    }

    #[test]
    fn test_from_file_partial_sections() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[server]
host = "127.0.0.1"
port = 9000
log_level = "debug"

[alerts]
radius_degrees = 0.25
"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.alerts.radius_degrees, 0.25);
        assert_eq!(config.alerts.default_interval_minutes, 60);
        assert_eq!(config.alerts.code_ttl_minutes, 15);
        assert_eq!(config.weather.forecast_hours, 24);
    }

    #[test]
    fn test_from_file_rejects_garbage() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "this is = = not toml").unwrap();
        assert!(Config::from_file(file.path()).is_err());
    }

    #[test]
    fn test_validation_result_error_summary() {
        let mut result = ValidationResult::default();
        result.add_error("field1", "error1");
        result.add_error("field2", "error2");
        let summary = result.error_summary();
        assert!(summary.contains("field1"));
        assert!(summary.contains("field2"));
    }
}
