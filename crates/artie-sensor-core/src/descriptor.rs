//! Sensor descriptors and per-sensor lifecycle state.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Persisted description of a registered sensor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorDescriptor {
    /// Registry-assigned identifier (0 until saved).
    #[serde(default)]
    pub id: u64,

    /// Path to the sensor executable.
    pub executable_path: String,

    /// Port of the sensor control surface.
    pub sensor_port: u16,

    /// Port of the sensor management surface (always `sensor_port + 1`).
    pub management_port: u16,

    /// Name used in control-surface URLs.
    pub sensor_name: String,
}

impl SensorDescriptor {
    /// Creates an unsaved descriptor for the executable at `path`.
    ///
    /// The sensor name is derived from the path and the management port is
    /// placed directly above `sensor_port`.
    pub fn new(path: &str, sensor_port: u16) -> Result<Self> {
        let sensor_name = sensor_name_from_path(path)?;
        let management_port = sensor_port
            .checked_add(1)
            .ok_or(Error::PortsExhausted(sensor_port))?;

        Ok(Self {
            id: 0,
            executable_path: path.to_string(),
            sensor_port,
            management_port,
            sensor_name,
        })
    }
}

/// Derives the sensor name from an executable path.
///
/// Takes the last `/` segment and keeps everything before the first `-`,
/// so `/opt/sensors/temperature-1.2.3.jar` becomes `temperature`.
pub fn sensor_name_from_path(path: &str) -> Result<String> {
    let file_name = path.rsplit('/').next().unwrap_or_default();
    let name = file_name.split('-').next().unwrap_or_default();

    if name.is_empty() {
        return Err(Error::InvalidPath(path.to_string()));
    }
    Ok(name.to_string())
}

/// Lifecycle state of a single sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorState {
    /// Present in the registry only.
    #[default]
    Registered,
    /// Marked active by the controller, not configured yet.
    Started,
    /// Datasource configuration pushed to the sensor.
    Configured,
    /// Start endpoint acknowledged.
    Running,
    /// Stop sequence issued.
    Stopped,
}

impl FromStr for SensorState {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "registered" => Ok(SensorState::Registered),
            "started" => Ok(SensorState::Started),
            "configured" => Ok(SensorState::Configured),
            "running" => Ok(SensorState::Running),
            "stopped" => Ok(SensorState::Stopped),
            _ => Err(format!("unknown sensor state: {}", s)),
        }
    }
}

impl std::fmt::Display for SensorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SensorState::Registered => write!(f, "registered"),
            SensorState::Started => write!(f, "started"),
            SensorState::Configured => write!(f, "configured"),
            SensorState::Running => write!(f, "running"),
            SensorState::Stopped => write!(f, "stopped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sensor_name_from_path() {
        assert_eq!(
            sensor_name_from_path("/opt/sensors/temperature-1.2.3.jar").unwrap(),
            "temperature"
        );
        assert_eq!(
            sensor_name_from_path("humidity-sensor-0.1.jar").unwrap(),
            "humidity"
        );
        // No dash keeps the whole file name
        assert_eq!(
            sensor_name_from_path("/opt/sensors/light.jar").unwrap(),
            "light.jar"
        );
    }

    #[test]
    fn test_sensor_name_from_invalid_path() {
        assert!(matches!(
            sensor_name_from_path("/opt/sensors/"),
            Err(Error::InvalidPath(_))
        ));
        assert!(matches!(
            sensor_name_from_path("/opt/sensors/-1.0.jar"),
            Err(Error::InvalidPath(_))
        ));
        assert!(sensor_name_from_path("").is_err());
    }

    #[test]
    fn test_descriptor_ports() {
        let descriptor = SensorDescriptor::new("/opt/sensors/noise-2.0.jar", 9010).unwrap();
        assert_eq!(descriptor.id, 0);
        assert_eq!(descriptor.sensor_name, "noise");
        assert_eq!(descriptor.sensor_port, 9010);
        assert_eq!(descriptor.management_port, 9011);
    }

    #[test]
    fn test_descriptor_port_overflow() {
        assert!(matches!(
            SensorDescriptor::new("/opt/sensors/noise-2.0.jar", u16::MAX),
            Err(Error::PortsExhausted(u16::MAX))
        ));
    }

    #[test]
    fn test_state_from_str() {
        assert_eq!(
            "running".parse::<SensorState>().unwrap(),
            SensorState::Running
        );
        assert_eq!(
            "Configured".parse::<SensorState>().unwrap(),
            SensorState::Configured
        );
        assert!("booting".parse::<SensorState>().is_err());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(SensorState::Started.to_string(), "started");
        assert_eq!(SensorState::Stopped.to_string(), "stopped");
    }
}
