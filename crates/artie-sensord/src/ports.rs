//! Sensor port allocation.

use artie_sensor_core::{Error, Result, SensorRegistry};

/// Gap between the sensor ports of two consecutively added sensors.
pub const PORT_STEP: u16 = 10;

/// Returns the sensor port for the next sensor to register.
///
/// The first sensor gets `min_port`; later ones sit `PORT_STEP` above the
/// highest port in the registry. Callers must hold the registry exclusively
/// until the new descriptor is saved.
pub fn next_port(registry: &dyn SensorRegistry, min_port: u16) -> Result<u16> {
    let Some(highest) = registry.find_highest_port()? else {
        return Ok(min_port);
    };

    highest
        .sensor_port
        .checked_add(PORT_STEP)
        .filter(|port| port.checked_add(1).is_some())
        .ok_or(Error::PortsExhausted(highest.sensor_port))
}

#[cfg(test)]
mod tests {
    use super::*;
    use artie_sensor_core::{MemoryRegistry, SensorDescriptor};

    #[test]
    fn test_empty_registry_uses_min_port() {
        let registry = MemoryRegistry::new();
        assert_eq!(next_port(&registry, 9000).unwrap(), 9000);
    }

    #[test]
    fn test_steps_above_highest() {
        let mut registry = MemoryRegistry::new();
        registry
            .save(SensorDescriptor::new("a-1.jar", 9030).unwrap())
            .unwrap();
        registry
            .save(SensorDescriptor::new("b-1.jar", 9000).unwrap())
            .unwrap();

        assert_eq!(next_port(&registry, 9000).unwrap(), 9040);
        // A lower minimum never moves allocation backwards
        assert_eq!(next_port(&registry, 1000).unwrap(), 9040);
    }

    #[test]
    fn test_exhausted() {
        let mut registry = MemoryRegistry::new();
        registry
            .save(SensorDescriptor::new("a-1.jar", 65525).unwrap())
            .unwrap();
        assert!(matches!(
            next_port(&registry, 9000),
            Err(Error::PortsExhausted(65525))
        ));
    }
}
