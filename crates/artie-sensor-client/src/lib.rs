//! HTTP client library for communicating with the Artie sensor daemon.
//!
//! This crate provides the client used by the `artiectl` command line tool.

use anyhow::{Context, Result};
use artie_sensor_core::{
    api::{AddSensorRequest, ControllerStatus, ErrorBody},
    SensorDescriptor,
};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// Default daemon API address.
pub const DEFAULT_URL: &str = "http://127.0.0.1:8787";

/// Client for the daemon's JSON control API.
#[derive(Debug, Clone)]
pub struct SensorClient {
    client: Client,
    base_url: String,
}

impl SensorClient {
    /// Creates a client for the daemon at `base_url`.
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Returns the daemon base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Sends a request and turns non-success answers into errors carrying
    /// the daemon's message.
    async fn send(&self, request: RequestBuilder, what: &str) -> Result<Response> {
        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to {}: daemon unreachable at {}", what, self.base_url))?;

        let status = response.status();
        debug!("{} -> {}", what, status);
        if status.is_success() {
            return Ok(response);
        }

        let message = match response.json::<ErrorBody>().await {
            Ok(body) => body.error,
            Err(_) => status
                .canonical_reason()
                .unwrap_or("unknown error")
                .to_string(),
        };
        anyhow::bail!("Failed to {} ({}): {}", what, status.as_u16(), message)
    }

    async fn json<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> Result<T> {
        self.send(request, what)
            .await?
            .json()
            .await
            .with_context(|| format!("Failed to {}: invalid response", what))
    }

    /// Registers the sensor executable at `path`.
    pub async fn add_sensor(&self, path: &str) -> Result<SensorDescriptor> {
        let request = self
            .client
            .post(self.url("/api/sensors"))
            .json(&AddSensorRequest {
                path: path.to_string(),
            });
        self.json(request, "add sensor").await
    }

    /// Lists registered sensors.
    pub async fn list_sensors(&self) -> Result<Vec<SensorDescriptor>> {
        self.json(self.client.get(self.url("/api/sensors")), "list sensors")
            .await
    }

    /// Gets readiness and the active sensors.
    pub async fn status(&self) -> Result<ControllerStatus> {
        self.json(self.client.get(self.url("/api/status")), "get status")
            .await
    }

    /// Requests daemon shutdown.
    pub async fn shutdown(&self) -> Result<()> {
        self.send(self.client.post(self.url("/api/shutdown")), "request shutdown")
            .await?;
        Ok(())
    }
}
