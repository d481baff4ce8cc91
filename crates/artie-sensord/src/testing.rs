//! Recording `SensorLink` used by the controller and poller tests.

use artie_sensor_core::{ConfigurationMap, Error, Result, SensorDescriptor, SensorLink};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

/// Fake sensor fleet. Every call is recorded as `"<call>:<sensor name>"`.
#[derive(Default)]
pub struct FakeLink {
    calls: Mutex<Vec<String>>,
    configurations: Mutex<HashMap<String, ConfigurationMap>>,
    pushed: Mutex<Vec<(String, ConfigurationMap)>>,
    failing: Mutex<HashSet<String>>,
    slow_stops: Mutex<HashMap<String, Duration>>,
    stop_delay: Duration,
}

impl FakeLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every `stop` call hang for `delay`.
    pub fn with_stop_delay(delay: Duration) -> Self {
        Self {
            stop_delay: delay,
            ..Self::default()
        }
    }

    /// Makes `stop` hang for `delay` for `sensor_name` only.
    pub fn slow_stop(&self, sensor_name: &str, delay: Duration) {
        self.slow_stops
            .lock()
            .unwrap()
            .insert(sensor_name.to_string(), delay);
    }

    pub fn set_configuration(&self, sensor_name: &str, configuration: ConfigurationMap) {
        self.configurations
            .lock()
            .unwrap()
            .insert(sensor_name.to_string(), configuration);
    }

    /// Makes `call` fail for `sensor_name`.
    pub fn fail(&self, call: &str, sensor_name: &str) {
        self.failing
            .lock()
            .unwrap()
            .insert(format!("{}:{}", call, sensor_name));
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, call: &str) -> usize {
        let prefix = format!("{}:", call);
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with(&prefix))
            .count()
    }

    pub fn pushed(&self) -> Vec<(String, ConfigurationMap)> {
        self.pushed.lock().unwrap().clone()
    }

    fn record(&self, call: &str, sensor: &SensorDescriptor) -> Result<()> {
        let key = format!("{}:{}", call, sensor.sensor_name);
        self.calls.lock().unwrap().push(key.clone());

        if self.failing.lock().unwrap().contains(&key) {
            return Err(Error::Status {
                url: key,
                status: 500,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl SensorLink for FakeLink {
    async fn get_configuration(&self, sensor: &SensorDescriptor) -> Result<ConfigurationMap> {
        self.record("getConfiguration", sensor)?;
        Ok(self
            .configurations
            .lock()
            .unwrap()
            .get(&sensor.sensor_name)
            .cloned()
            .unwrap_or_default())
    }

    async fn push_configuration(
        &self,
        sensor: &SensorDescriptor,
        configuration: &ConfigurationMap,
    ) -> Result<()> {
        self.record("configuration", sensor)?;
        self.pushed
            .lock()
            .unwrap()
            .push((sensor.sensor_name.clone(), configuration.clone()));
        Ok(())
    }

    async fn start(&self, sensor: &SensorDescriptor) -> Result<()> {
        self.record("start", sensor)
    }

    async fn stop(&self, sensor: &SensorDescriptor) -> Result<()> {
        let result = self.record("stop", sensor);
        let delay = self
            .slow_stops
            .lock()
            .unwrap()
            .get(&sensor.sensor_name)
            .copied()
            .unwrap_or(self.stop_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        result
    }

    async fn send_sensor_data(&self, sensor: &SensorDescriptor) -> Result<()> {
        self.record("sendSensorData", sensor)
    }

    async fn shutdown(&self, sensor: &SensorDescriptor) -> Result<()> {
        self.record("shutdown", sensor)
    }
}
