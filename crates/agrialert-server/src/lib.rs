//! HTTP surface for the farm weather alert service.
//!
//! - `/api/alerts/*` lets operators schedule, stop, list and trigger checks
//! - `/api/sms/*` handles subscriber verification and area alerts
//! - `/health` is a liveness probe
//!
//! All state lives in process memory and is lost on restart.

mod alert_routes;
mod error;
mod sms_routes;
mod state;

pub use error::ApiError;
pub use state::AppState;

use agrialert_core::{AlertsConfig, Config};
use agrialert_weather::Coordinates;
use anyhow::{Context, Result};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::signal::ctrl_c;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

pub fn router(state: AppState) -> Router {
    let alerts = Router::new()
        .route("/schedule", post(alert_routes::schedule_handler))
        .route("/stop", post(alert_routes::stop_handler))
        .route("/jobs", get(alert_routes::jobs_handler))
        .route("/check", post(alert_routes::check_handler));

    let sms = Router::new()
        .route("/send-verification", post(sms_routes::send_verification_handler))
        .route(
            "/verify-and-subscribe",
            post(sms_routes::verify_and_subscribe_handler),
        )
        .route(
            "/subscription-status",
            get(sms_routes::subscription_status_handler),
        )
        .route("/unsubscribe", post(sms_routes::unsubscribe_handler))
        .route(
            "/send-weather-alert",
            post(sms_routes::send_weather_alert_handler),
        );

    Router::new()
        .nest("/api/alerts", alerts)
        .nest("/api/sms", sms)
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok", "timestamp": Utc::now() }))
}

/// Schedule `default-location-<index>` jobs when enabled.
///
/// Returns how many jobs were started. Bad entries are skipped.
pub fn start_default_checks(state: &AppState, config: &AlertsConfig) -> usize {
    if !config.enable_default_checks {
        return 0;
    }

    let mut started = 0;
    for (index, location) in config.default_locations.iter().enumerate() {
        let id = format!("default-location-{}", index);
        let interval = location
            .interval_minutes
            .unwrap_or(config.default_interval_minutes);
        let at = Coordinates::new(location.lat, location.lng);

        match state.scheduler.schedule_alert_check(&id, at, interval) {
            Ok(_) => started += 1,
            Err(e) => tracing::warn!("Skipping default location {}: {}", id, e),
        }
    }

    tracing::info!("Started {} default alert checks", started);
    started
}

/// Serve until Ctrl+C or SIGTERM, then cancel every scheduled job
pub async fn run(config: Config) -> Result<()> {
    let state = AppState::from_config(&config).context("Failed to build application state")?;
    start_default_checks(&state, &config.alerts);

    let scheduler = state.scheduler.clone();
    let app = router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Server running on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    scheduler.shutdown();
    tracing::info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match ctrl_c().await {
            Ok(()) => tracing::info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                tracing::error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                tracing::info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
