//! Error types for the Artie sensor core library.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while registering or talking to sensors.
#[derive(Error, Debug)]
pub enum Error {
    /// Sensor executable path does not yield a sensor name.
    #[error("Invalid sensor path: {0:?}")]
    InvalidPath(String),

    /// No port pair left above the highest allocated sensor port.
    #[error("Sensor ports exhausted after port {0}")]
    PortsExhausted(u16),

    /// HTTP transport failure (connection refused, timeout, ...).
    #[error("Sensor transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Sensor answered with a non-success status.
    #[error("Sensor at {url} answered {status}")]
    Status { url: String, status: u16 },

    /// Configuration JSON could not be parsed or produced.
    #[error("Sensor configuration error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Registry contents could not be read or written.
    #[error("Registry error: {0}")]
    Registry(String),

    /// Registry file I/O error.
    #[error("Registry I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns true for failures of a control or management surface call.
    ///
    /// Serialization failures count as transport failures for propagation.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::Transport(_) | Error::Status { .. } | Error::Serialization(_)
        )
    }
}
