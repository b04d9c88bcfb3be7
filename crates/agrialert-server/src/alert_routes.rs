//! `/api/alerts/*`: operator control of scheduled checks.

use agrialert_alerts::AlertError;
use agrialert_weather::Coordinates;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct LocationBody {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

impl LocationBody {
    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.lat, self.lng) {
            (Some(lat), Some(lng)) => Some(Coordinates::new(lat, lng)).filter(Coordinates::is_valid),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRequest {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    location: Option<LocationBody>,
    #[serde(default)]
    interval_minutes: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct StopRequest {
    #[serde(default)]
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CheckRequest {
    #[serde(default)]
    location: Option<LocationBody>,
}

pub async fn schedule_handler(
    State(state): State<AppState>,
    payload: Result<Json<ScheduleRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = payload?;

    let id = request.id.filter(|id| !id.trim().is_empty());
    let location = request.location.as_ref().and_then(LocationBody::coordinates);
    let (Some(id), Some(location)) = (id, location) else {
        return Err(ApiError::invalid_input("ID and location (lat/lng) are required"));
    };

    let interval = request.interval_minutes.unwrap_or(state.default_interval_minutes);
    let job = state.scheduler.schedule_alert_check(&id, location, interval)?;

    Ok(Json(json!({ "success": true, "job": job })))
}

pub async fn stop_handler(
    State(state): State<AppState>,
    payload: Result<Json<StopRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = payload?;
    let Some(id) = request.id.filter(|id| !id.trim().is_empty()) else {
        return Err(ApiError::invalid_input("Job ID is required"));
    };

    if !state.scheduler.stop_alert_check(&id) {
        return Err(AlertError::not_found(format!(
            "No active alert check job found with ID {}",
            id
        ))
        .into());
    }

    Ok(Json(json!({
        "success": true,
        "message": format!("Alert check job {} stopped successfully", id),
    })))
}

pub async fn jobs_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "success": true, "jobs": state.scheduler.get_scheduled_jobs() }))
}

pub async fn check_handler(
    State(state): State<AppState>,
    payload: Result<Json<CheckRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = payload?;
    let Some(location) = request.location.as_ref().and_then(LocationBody::coordinates) else {
        return Err(ApiError::invalid_input("Location (lat/lng) is required"));
    };

    let result = state.pipeline.check_location(location).await?;
    Ok(Json(json!({ "success": true, "result": result })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_body_requires_both_axes() {
        let full = LocationBody {
            lat: Some(0.0),
            lng: Some(0.0),
        };
        assert_eq!(full.coordinates(), Some(Coordinates::new(0.0, 0.0)));

        let partial = LocationBody {
            lat: Some(1.0),
            lng: None,
        };
        assert!(partial.coordinates().is_none());

        let out_of_range = LocationBody {
            lat: Some(100.0),
            lng: Some(0.0),
        };
        assert!(out_of_range.coordinates().is_none());
    }
}
