//! JSON control API.

use artie_sensor_core::{
    api::{AddSensorRequest, ControllerStatus, ErrorBody},
    SensorDescriptor,
};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::controller::SensorController;

/// State shared by the API handlers.
pub struct ApiState {
    pub controller: Arc<SensorController>,
    pub shutdown_tx: mpsc::Sender<()>,
}

/// Errors returned by API handlers.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Sensor(#[from] artie_sensor_core::Error),

    #[error("Shutdown already in progress")]
    ShutdownPending,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Sensor(artie_sensor_core::Error::InvalidPath(_)) => StatusCode::BAD_REQUEST,
            ApiError::Sensor(artie_sensor_core::Error::PortsExhausted(_)) => StatusCode::CONFLICT,
            ApiError::Sensor(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ShutdownPending => StatusCode::CONFLICT,
        };
        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Creates the API router with all routes.
pub fn create_router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/api/sensors", get(sensors_list).post(sensors_add))
        .route("/api/status", get(status))
        .route("/api/shutdown", post(shutdown))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /api/sensors - Registered sensors
async fn sensors_list(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<Vec<SensorDescriptor>>, ApiError> {
    Ok(Json(state.controller.registered_sensors().await?))
}

/// POST /api/sensors - Register a sensor executable
async fn sensors_add(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<AddSensorRequest>,
) -> Result<(StatusCode, Json<SensorDescriptor>), ApiError> {
    let descriptor = state.controller.add(&request.path).await?;
    info!(
        "Registered sensor {} on port {}",
        descriptor.sensor_name, descriptor.sensor_port
    );
    Ok((StatusCode::CREATED, Json(descriptor)))
}

/// GET /api/status - Readiness and active sensors
async fn status(State(state): State<Arc<ApiState>>) -> Json<ControllerStatus> {
    Json(state.controller.status().await)
}

/// POST /api/shutdown - Request daemon shutdown
async fn shutdown(State(state): State<Arc<ApiState>>) -> Result<StatusCode, ApiError> {
    match state.shutdown_tx.try_send(()) {
        Ok(()) => {
            info!("Shutdown requested via API");
            Ok(StatusCode::ACCEPTED)
        }
        Err(e) => {
            warn!("Shutdown request not delivered: {}", e);
            Err(ApiError::ShutdownPending)
        }
    }
}
