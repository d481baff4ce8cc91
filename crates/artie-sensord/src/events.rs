//! Lifecycle event notification.
//!
//! The controller publishes events into a bounded queue without waiting; a
//! consumer task drains the other end.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{info, warn};

/// Lifecycle transition an event reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SensorAction {
    Add,
    Run,
    Start,
    Stop,
    Send,
}

impl std::fmt::Display for SensorAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SensorAction::Add => write!(f, "Add"),
            SensorAction::Run => write!(f, "Run"),
            SensorAction::Start => write!(f, "Start"),
            SensorAction::Stop => write!(f, "Stop"),
            SensorAction::Send => write!(f, "Send"),
        }
    }
}

/// A single lifecycle notification.
#[derive(Debug, Clone, Serialize)]
pub struct LifecycleEvent {
    pub action: SensorAction,
    pub sensor_name: String,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
}

impl std::fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let outcome = if self.success { "OK" } else { "FAILED" };
        write!(
            f,
            "Sensor - {} - {} - {}",
            self.action, self.sensor_name, outcome
        )
    }
}

/// Fire-and-forget sender side of the event queue.
#[derive(Debug, Clone)]
pub struct EventPublisher {
    tx: mpsc::Sender<LifecycleEvent>,
}

impl EventPublisher {
    /// Creates a publisher and the receiver a consumer should drain.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<LifecycleEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Queues an event. Never blocks; the event is dropped if the queue is
    /// full or nobody is listening.
    pub fn publish(&self, action: SensorAction, sensor_name: &str, success: bool) {
        let event = LifecycleEvent {
            action,
            sensor_name: sensor_name.to_string(),
            success,
            timestamp: Utc::now(),
        };

        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                warn!("Event queue full, dropping: {}", event);
            }
            Err(TrySendError::Closed(event)) => {
                warn!("Event consumer gone, dropping: {}", event);
            }
        }
    }
}

/// Drains the event queue into the log until every publisher is dropped.
pub async fn log_events(mut rx: mpsc::Receiver<LifecycleEvent>) {
    while let Some(event) = rx.recv().await {
        if event.success {
            info!(target: "artie::events", at = %event.timestamp, "{}", event);
        } else {
            warn!(target: "artie::events", at = %event.timestamp, "{}", event);
        }
    }
}
