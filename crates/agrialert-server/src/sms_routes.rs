//! `/api/sms/*`: subscriber verification and ad-hoc area alerts.

use agrialert_alerts::SubscriptionStatus;
use agrialert_weather::Coordinates;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::alert_routes::LocationBody;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhoneRequest {
    #[serde(default)]
    phone_number: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    #[serde(default)]
    phone_number: Option<String>,
    #[serde(default)]
    otp: Option<String>,
    #[serde(default)]
    location: Option<LocationBody>,
}

#[derive(Debug, Deserialize)]
pub struct LocationRadius {
    lat: Option<f64>,
    lng: Option<f64>,
    radius: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AreaAlertRequest {
    #[serde(default)]
    location_radius: Option<LocationRadius>,
    #[serde(default)]
    alert_type: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

fn require_phone(phone_number: Option<String>) -> Result<String, ApiError> {
    phone_number
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| ApiError::invalid_input("Phone number is required"))
}

pub async fn send_verification_handler(
    State(state): State<AppState>,
    payload: Result<Json<PhoneRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = payload?;
    let phone = require_phone(request.phone_number)?;

    let sent = state.subscriptions.send_verification(&phone).await?;
    Ok(Json(json!({ "success": true, "sid": sent.sid })))
}

pub async fn verify_and_subscribe_handler(
    State(state): State<AppState>,
    payload: Result<Json<VerifyRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = payload?;
    let location = request.location.as_ref().and_then(LocationBody::coordinates);
    let (Some(phone), Some(otp), Some(location)) = (
        request.phone_number.filter(|p| !p.trim().is_empty()),
        request.otp.filter(|c| !c.trim().is_empty()),
        location,
    ) else {
        return Err(ApiError::invalid_input(
            "Phone number, OTP, and location are required",
        ));
    };

    let job = state
        .subscriptions
        .verify_and_subscribe(&phone, &otp, Some(location))
        .await?;

    Ok(Json(json!({ "success": true, "alertJob": job })))
}

pub async fn subscription_status_handler(
    State(state): State<AppState>,
    query: Result<Query<PhoneRequest>, QueryRejection>,
) -> Result<Json<SubscriptionStatus>, ApiError> {
    let Query(request) = query?;
    let phone = require_phone(request.phone_number)?;

    Ok(Json(state.subscriptions.get_status(&phone)))
}

pub async fn unsubscribe_handler(
    State(state): State<AppState>,
    payload: Result<Json<PhoneRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = payload?;
    let phone = require_phone(request.phone_number)?;

    state.subscriptions.unsubscribe(&phone).await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn send_weather_alert_handler(
    State(state): State<AppState>,
    payload: Result<Json<AreaAlertRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = payload?;

    let area = request.location_radius.and_then(|area| {
        let origin = Coordinates::new(area.lat?, area.lng?);
        origin.is_valid().then_some((origin, area.radius))
    });
    let (Some((origin, radius)), Some(alert_type), Some(message)) = (
        area,
        request.alert_type.filter(|t| !t.trim().is_empty()),
        request.message.filter(|m| !m.trim().is_empty()),
    ) else {
        return Err(ApiError::invalid_input(
            "Location radius, alert type, and message are required",
        ));
    };

    let radius = radius.unwrap_or(state.radius);
    if !radius.is_finite() || radius < 0.0 {
        return Err(ApiError::invalid_input("Radius must be a non-negative number"));
    }

    let report = state
        .dispatcher
        .notify_area(origin, radius, &alert_type, &message)
        .await;
    tracing::info!(
        "Area alert '{}' near {}: {} sent, {} failed",
        alert_type,
        origin,
        report.alerts_sent,
        report.failed
    );

    Ok(Json(json!({
        "success": true,
        "notificationsSent": report.alerts_sent,
    })))
}
