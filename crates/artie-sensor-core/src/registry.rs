//! Durable store of sensor descriptors.

use crate::{Error, Result, SensorDescriptor};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Store of registered sensors, the source of truth across restarts.
pub trait SensorRegistry: Send {
    /// Persists a descriptor and returns it with its assigned id.
    fn save(&mut self, descriptor: SensorDescriptor) -> Result<SensorDescriptor>;

    /// Returns all descriptors in insertion order.
    fn find_all(&self) -> Result<Vec<SensorDescriptor>>;

    /// Returns the descriptor holding the highest sensor port.
    fn find_highest_port(&self) -> Result<Option<SensorDescriptor>>;
}

fn next_id(sensors: &[SensorDescriptor]) -> u64 {
    sensors.iter().map(|s| s.id).max().unwrap_or(0) + 1
}

fn highest_port(sensors: &[SensorDescriptor]) -> Option<SensorDescriptor> {
    sensors.iter().max_by_key(|s| s.sensor_port).cloned()
}

/// In-memory registry.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    sensors: Vec<SensorDescriptor>,
}

impl MemoryRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }
}

impl SensorRegistry for MemoryRegistry {
    fn save(&mut self, mut descriptor: SensorDescriptor) -> Result<SensorDescriptor> {
        descriptor.id = next_id(&self.sensors);
        self.sensors.push(descriptor.clone());
        Ok(descriptor)
    }

    fn find_all(&self) -> Result<Vec<SensorDescriptor>> {
        Ok(self.sensors.clone())
    }

    fn find_highest_port(&self) -> Result<Option<SensorDescriptor>> {
        Ok(highest_port(&self.sensors))
    }
}

/// On-disk layout of the registry file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryFile {
    #[serde(default, rename = "sensor")]
    sensors: Vec<SensorDescriptor>,
}

/// Registry persisted as a TOML file.
#[derive(Debug)]
pub struct FileRegistry {
    path: PathBuf,
    sensors: Vec<SensorDescriptor>,
}

impl FileRegistry {
    /// Opens the registry at `path`, starting empty if the file is missing.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let sensors = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let file: RegistryFile = toml::from_str(&content)
                .map_err(|e| Error::Registry(format!("{}: {}", path.display(), e)))?;
            file.sensors
        } else {
            Vec::new()
        };

        debug!(
            "Opened sensor registry {} ({} sensors)",
            path.display(),
            sensors.len()
        );
        Ok(Self { path, sensors })
    }

    /// Returns the registry file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, sensors: &[SensorDescriptor]) -> Result<()> {
        let file = RegistryFile {
            sensors: sensors.to_vec(),
        };
        let content = toml::to_string_pretty(&file).map_err(|e| Error::Registry(e.to_string()))?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("toml.tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl SensorRegistry for FileRegistry {
    fn save(&mut self, mut descriptor: SensorDescriptor) -> Result<SensorDescriptor> {
        descriptor.id = next_id(&self.sensors);

        let mut sensors = self.sensors.clone();
        sensors.push(descriptor.clone());
        self.persist(&sensors)?;
        self.sensors = sensors;

        debug!(
            "Saved sensor {} (id {}) to {}",
            descriptor.sensor_name,
            descriptor.id,
            self.path.display()
        );
        Ok(descriptor)
    }

    fn find_all(&self) -> Result<Vec<SensorDescriptor>> {
        Ok(self.sensors.clone())
    }

    fn find_highest_port(&self) -> Result<Option<SensorDescriptor>> {
        Ok(highest_port(&self.sensors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(path: &str, port: u16) -> SensorDescriptor {
        SensorDescriptor::new(path, port).unwrap()
    }

    #[test]
    fn test_memory_registry_assigns_ids() {
        let mut registry = MemoryRegistry::new();
        let first = registry.save(descriptor("a-1.jar", 9000)).unwrap();
        let second = registry.save(descriptor("b-1.jar", 9010)).unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(registry.find_all().unwrap(), vec![first, second]);
    }

    #[test]
    fn test_highest_port() {
        let mut registry = MemoryRegistry::new();
        assert!(registry.find_highest_port().unwrap().is_none());

        registry.save(descriptor("a-1.jar", 9020)).unwrap();
        registry.save(descriptor("b-1.jar", 9000)).unwrap();

        let highest = registry.find_highest_port().unwrap().unwrap();
        assert_eq!(highest.sensor_name, "a");
        assert_eq!(highest.sensor_port, 9020);
    }

    #[test]
    fn test_file_registry_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let registry = FileRegistry::open(dir.path().join("sensors.toml")).unwrap();
        assert!(registry.find_all().unwrap().is_empty());
        assert!(registry.find_highest_port().unwrap().is_none());
    }

    #[test]
    fn test_file_registry_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("sensors.toml");

        let mut registry = FileRegistry::open(&path).unwrap();
        registry
            .save(descriptor("/opt/sensors/temperature-1.2.3.jar", 9000))
            .unwrap();
        registry
            .save(descriptor("/opt/sensors/humidity-0.9.jar", 9010))
            .unwrap();
        drop(registry);

        let reopened = FileRegistry::open(&path).unwrap();
        let sensors = reopened.find_all().unwrap();
        assert_eq!(sensors.len(), 2);
        assert_eq!(sensors[0].id, 1);
        assert_eq!(sensors[0].sensor_name, "temperature");
        assert_eq!(sensors[1].management_port, 9011);
        assert!(!path.with_extension("toml.tmp").exists());
    }

    #[test]
    fn test_file_registry_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sensors.toml");
        std::fs::write(&path, "[[sensor]]\nsensor_port = \"nope\"\n").unwrap();

        assert!(matches!(
            FileRegistry::open(&path),
            Err(Error::Registry(_))
        ));
    }
}
