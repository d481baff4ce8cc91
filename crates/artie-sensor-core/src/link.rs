//! HTTP control and management surface of a sensor process.

use crate::{Error, Result, SensorDescriptor};
use async_trait::async_trait;
use reqwest::{header, Client, RequestBuilder, Response};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

/// Sensor configuration as exchanged with the control surface.
pub type ConfigurationMap = BTreeMap<String, String>;

/// Calls a sensor can answer, addressed by its descriptor.
#[async_trait]
pub trait SensorLink: Send + Sync {
    /// Fetches the sensor's current configuration.
    async fn get_configuration(&self, sensor: &SensorDescriptor) -> Result<ConfigurationMap>;

    /// Pushes a full configuration back to the sensor.
    async fn push_configuration(
        &self,
        sensor: &SensorDescriptor,
        configuration: &ConfigurationMap,
    ) -> Result<()>;

    /// Starts the sensor.
    async fn start(&self, sensor: &SensorDescriptor) -> Result<()>;

    /// Stops the sensor.
    async fn stop(&self, sensor: &SensorDescriptor) -> Result<()>;

    /// Asks the sensor to send its latest data.
    async fn send_sensor_data(&self, sensor: &SensorDescriptor) -> Result<()>;

    /// Shuts the sensor process down through its management surface.
    async fn shutdown(&self, sensor: &SensorDescriptor) -> Result<()>;
}

/// `SensorLink` over plain HTTP.
///
/// Every request is bounded by the timeout given at construction.
#[derive(Debug, Clone)]
pub struct HttpSensorLink {
    client: Client,
    host: String,
}

impl HttpSensorLink {
    /// Creates a link reaching sensors on `host`.
    pub fn new(host: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            host: host.to_string(),
        })
    }

    fn control_url(&self, sensor: &SensorDescriptor, endpoint: &str) -> String {
        format!(
            "http://{}:{}/sensor/{}/{}",
            self.host, sensor.sensor_port, sensor.sensor_name, endpoint
        )
    }

    fn management_url(&self, sensor: &SensorDescriptor, endpoint: &str) -> String {
        format!(
            "http://{}:{}/actuator/{}",
            self.host, sensor.management_port, endpoint
        )
    }

    async fn send(&self, request: RequestBuilder, url: String) -> Result<Response> {
        let response = request.send().await?;
        let status = response.status();
        debug!("{} -> {}", url, status);

        if !status.is_success() {
            return Err(Error::Status {
                url,
                status: status.as_u16(),
            });
        }
        Ok(response)
    }

    async fn get(&self, url: String) -> Result<Response> {
        self.send(self.client.get(&url), url).await
    }
}

#[async_trait]
impl SensorLink for HttpSensorLink {
    async fn get_configuration(&self, sensor: &SensorDescriptor) -> Result<ConfigurationMap> {
        let response = self
            .get(self.control_url(sensor, "getConfiguration"))
            .await?;
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn push_configuration(
        &self,
        sensor: &SensorDescriptor,
        configuration: &ConfigurationMap,
    ) -> Result<()> {
        let url = self.control_url(sensor, "configuration");
        let body = serde_json::to_vec(configuration)?;
        let request = self
            .client
            .post(&url)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body);
        self.send(request, url).await?;
        Ok(())
    }

    async fn start(&self, sensor: &SensorDescriptor) -> Result<()> {
        self.get(self.control_url(sensor, "start")).await?;
        Ok(())
    }

    async fn stop(&self, sensor: &SensorDescriptor) -> Result<()> {
        self.get(self.control_url(sensor, "stop")).await?;
        Ok(())
    }

    async fn send_sensor_data(&self, sensor: &SensorDescriptor) -> Result<()> {
        self.get(self.control_url(sensor, "sendSensorData")).await?;
        Ok(())
    }

    async fn shutdown(&self, sensor: &SensorDescriptor) -> Result<()> {
        let url = self.management_url(sensor, "shutdown");
        self.send(self.client.post(&url), url).await?;
        Ok(())
    }
}
