//! Wire types of the daemon's JSON control API.

use crate::{SensorDescriptor, SensorState};
use serde::{Deserialize, Serialize};

/// Body of `POST /api/sensors`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddSensorRequest {
    /// Path to the sensor executable.
    pub path: String,
}

/// One active sensor as reported by `GET /api/status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorStatus {
    pub sensor_name: String,
    pub sensor_port: u16,
    pub management_port: u16,
    pub state: SensorState,
}

impl SensorStatus {
    /// Builds a status entry for a descriptor in the given state.
    pub fn new(descriptor: &SensorDescriptor, state: SensorState) -> Self {
        Self {
            sensor_name: descriptor.sensor_name.clone(),
            sensor_port: descriptor.sensor_port,
            management_port: descriptor.management_port,
            state,
        }
    }
}

/// Body of `GET /api/status`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerStatus {
    /// Whether the startup run has finished and polling is enabled.
    pub ready: bool,
    /// Sensors currently considered active, in start order.
    pub active: Vec<SensorStatus>,
}

/// Error body returned by every failing API call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
