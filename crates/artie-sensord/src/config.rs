//! Configuration management.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Control API listen address (e.g., "127.0.0.1:8787")
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Directory holding the sensor registry
    #[serde(default = "default_state_dir")]
    pub state_dir: String,

    /// Sensor fleet settings
    #[serde(default)]
    pub sensors: SensorsConfig,

    /// Datasource pushed into every sensor's configuration
    #[serde(default)]
    pub datasource: DatasourceConfig,

    /// Lifecycle event queue settings
    #[serde(default)]
    pub events: EventsConfig,
}

/// Sensor fleet configuration. Durations are in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorsConfig {
    /// Host the sensor processes listen on
    #[serde(default = "default_host")]
    pub host: String,

    /// Port given to the first registered sensor
    #[serde(default = "default_min_port")]
    pub min_port: u16,

    /// Data poll period
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,

    /// Wait after marking a sensor active before talking to it
    #[serde(default = "default_settle_delay")]
    pub settle_delay: u64,

    /// Timeout applied to every control and management call
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,

    /// Upper bound on stopping the whole fleet during shutdown
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout: u64,
}

impl Default for SensorsConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            min_port: default_min_port(),
            poll_interval: default_poll_interval(),
            settle_delay: default_settle_delay(),
            request_timeout: default_request_timeout(),
            shutdown_timeout: default_shutdown_timeout(),
        }
    }
}

impl SensorsConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout)
    }
}

/// Datasource parameters handed to sensors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasourceConfig {
    #[serde(default)]
    pub url: String,

    #[serde(default)]
    pub driver_class: String,

    #[serde(default)]
    pub user: String,

    #[serde(default)]
    pub password: String,
}

/// Lifecycle event queue configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    /// Events buffered before new ones are dropped
    #[serde(default = "default_event_capacity")]
    pub capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            capacity: default_event_capacity(),
        }
    }
}

// Default value functions
fn default_listen() -> String {
    "127.0.0.1:8787".to_string()
}

fn default_state_dir() -> String {
    "/var/lib/artie-sensord".to_string()
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_min_port() -> u16 {
    9000
}

fn default_poll_interval() -> u64 {
    5000
}

fn default_settle_delay() -> u64 {
    10000
}

fn default_request_timeout() -> u64 {
    5000
}

fn default_shutdown_timeout() -> u64 {
    30000
}

fn default_event_capacity() -> usize {
    256
}

impl Config {
    /// Loads configuration from a TOML file, then applies environment overrides.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content =
            std::fs::read_to_string(path.as_ref()).context("Failed to read configuration file")?;
        let mut config: Config =
            toml::from_str(&content).context("Failed to parse configuration")?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Applies `ARTIE_*` overrides looked up through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("ARTIE_LISTEN") {
            self.listen = value;
        }
        if let Some(value) = lookup("ARTIE_STATE_DIR") {
            self.state_dir = value;
        }
        if let Some(value) = lookup("ARTIE_SENSOR_HOST") {
            self.sensors.host = value;
        }
        if let Some(value) = lookup("ARTIE_MIN_SENSOR_PORT") {
            self.sensors.min_port = parse_override("ARTIE_MIN_SENSOR_PORT", &value)?;
        }
        if let Some(value) = lookup("ARTIE_POLL_INTERVAL") {
            self.sensors.poll_interval = parse_override("ARTIE_POLL_INTERVAL", &value)?;
        }
        if let Some(value) = lookup("ARTIE_SETTLE_DELAY") {
            self.sensors.settle_delay = parse_override("ARTIE_SETTLE_DELAY", &value)?;
        }
        if let Some(value) = lookup("ARTIE_REQUEST_TIMEOUT") {
            self.sensors.request_timeout = parse_override("ARTIE_REQUEST_TIMEOUT", &value)?;
        }
        if let Some(value) = lookup("ARTIE_SHUTDOWN_TIMEOUT") {
            self.sensors.shutdown_timeout = parse_override("ARTIE_SHUTDOWN_TIMEOUT", &value)?;
        }
        if let Some(value) = lookup("ARTIE_DB_URL") {
            self.datasource.url = value;
        }
        if let Some(value) = lookup("ARTIE_DB_DRIVER_CLASS") {
            self.datasource.driver_class = value;
        }
        if let Some(value) = lookup("ARTIE_DB_USER") {
            self.datasource.user = value;
        }
        if let Some(value) = lookup("ARTIE_DB_PASSWD") {
            self.datasource.password = value;
        }
        self.validate()
    }

    /// Rejects values the daemon cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.sensors.poll_interval == 0 {
            anyhow::bail!("sensors.poll_interval must be at least 1 millisecond");
        }
        Ok(())
    }

    /// Path of the sensor registry file.
    pub fn registry_path(&self) -> PathBuf {
        Path::new(&self.state_dir).join("sensors.toml")
    }
}

fn parse_override<T>(key: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse()
        .with_context(|| format!("Invalid value for {}: {:?}", key, value))
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            state_dir: default_state_dir(),
            sensors: SensorsConfig::default(),
            datasource: DatasourceConfig::default(),
            events: EventsConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.listen, "127.0.0.1:8787");
        assert_eq!(config.sensors.min_port, 9000);
        assert_eq!(config.sensors.poll_interval(), Duration::from_secs(5));
        assert_eq!(config.events.capacity, 256);
        assert_eq!(config.datasource, DatasourceConfig::default());
    }

    #[test]
    fn test_parse_sections() {
        let config: Config = toml::from_str(
            r#"
            state_dir = "/tmp/artie"

            [sensors]
            min_port = 12000
            settle_delay = 0

            [datasource]
            url = "jdbc:mysql://db/artie"
            user = "artie"
            "#,
        )
        .unwrap();

        assert_eq!(config.sensors.min_port, 12000);
        assert_eq!(config.sensors.settle_delay(), Duration::ZERO);
        assert_eq!(config.sensors.host, "localhost");
        assert_eq!(config.datasource.url, "jdbc:mysql://db/artie");
        assert_eq!(config.datasource.password, "");
        assert_eq!(
            config.registry_path(),
            PathBuf::from("/tmp/artie/sensors.toml")
        );
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("artie.toml");
        std::fs::write(&path, "listen = \"0.0.0.0:9999\"\n[events]\ncapacity = 8\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.events.capacity, 8);
        assert_eq!(config.sensors.shutdown_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(dir.path().join("missing.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read configuration file"));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("ARTIE_MIN_SENSOR_PORT", "10000"),
            ("ARTIE_POLL_INTERVAL", " 250 "),
            ("ARTIE_DB_PASSWD", "secret"),
        ]);
        let mut config = Config::default();
        config
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.sensors.min_port, 10000);
        assert_eq!(config.sensors.poll_interval, 250);
        assert_eq!(config.datasource.password, "secret");
        assert_eq!(config.listen, "127.0.0.1:8787");
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let mut config = Config::default();
        let err = config
            .apply_overrides(|key| (key == "ARTIE_POLL_INTERVAL").then(|| "0".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("poll_interval"));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("artie.toml");
        std::fs::write(&path, "[sensors]\npoll_interval = 0\n").unwrap();
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn test_invalid_env_override() {
        let mut config = Config::default();
        let err = config
            .apply_overrides(|key| (key == "ARTIE_MIN_SENSOR_PORT").then(|| "70000".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("ARTIE_MIN_SENSOR_PORT"));
    }
}
