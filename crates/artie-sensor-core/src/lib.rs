//! Artie Sensor Core Library
//!
//! Data model, sensor registry and control-surface transport shared by the
//! Artie sensor daemon, its client library and its command line tool.

pub mod api;
pub mod descriptor;
pub mod error;
pub mod link;
pub mod registry;

pub use descriptor::{sensor_name_from_path, SensorDescriptor, SensorState};
pub use error::{Error, Result};
pub use link::{ConfigurationMap, HttpSensorLink, SensorLink};
pub use registry::{FileRegistry, MemoryRegistry, SensorRegistry};

/// Datasource configuration keys overwritten on every sensor at startup.
pub const DB_URL: &str = "DB_URL";
pub const DB_DRIVER_CLASS: &str = "DB_DRIVER_CLASS";
pub const DB_USER: &str = "DB_USER";
pub const DB_PASSWD: &str = "DB_PASSWD";
