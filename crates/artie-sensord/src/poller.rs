//! Periodic sensor data polling.

use artie_sensor_core::SensorState;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{trace, warn};

use crate::controller::{SensorController, SensorOutcome};
use crate::events::SensorAction;

/// Single fleet-wide timer asking every active sensor for its data.
pub struct Poller {
    controller: Arc<SensorController>,
    period: Duration,
}

/// Shortest period the poll timer accepts.
const MIN_PERIOD: Duration = Duration::from_millis(1);

impl Poller {
    /// Creates a poller ticking every `period` (at least one millisecond).
    pub fn new(controller: Arc<SensorController>, period: Duration) -> Self {
        Self {
            controller,
            period: period.max(MIN_PERIOD),
        }
    }

    /// Polls each active sensor once.
    ///
    /// Does nothing until the controller is ready. One sensor failing does
    /// not keep the others from being polled.
    pub async fn tick(&self) -> Vec<SensorOutcome> {
        if !self.controller.is_ready() {
            trace!("Controller not ready, skipping poll");
            return Vec::new();
        }

        let mut polls = Vec::new();
        for sensor in self.controller.active_sensors().await {
            if sensor.state == SensorState::Stopped {
                continue;
            }
            let link = self.controller.link().clone();
            polls.push(async move {
                let result = link.send_sensor_data(&sensor.descriptor).await;
                SensorOutcome {
                    sensor_name: sensor.descriptor.sensor_name,
                    result,
                }
            });
        }
        let outcomes = join_all(polls).await;

        let events = self.controller.events();
        for outcome in &outcomes {
            if let Err(e) = &outcome.result {
                warn!("Polling sensor {} failed: {}", outcome.sensor_name, e);
            }
            events.publish(SensorAction::Send, &outcome.sensor_name, outcome.is_ok());
        }
        outcomes
    }

    /// Ticks forever at a fixed rate, skipping ticks missed while a slow poll
    /// was still running.
    pub async fn run(self) {
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            self.tick().await;
        }
    }
}
