//! Sensor lifecycle controller.
//!
//! Registers sensors, brings every registered sensor up at startup, tracks
//! which ones are active and stops them again on shutdown.

use artie_sensor_core::{
    api::{ControllerStatus, SensorStatus},
    sensor_name_from_path, ConfigurationMap, Error, Result, SensorDescriptor, SensorLink,
    SensorRegistry, SensorState, DB_DRIVER_CLASS, DB_PASSWD, DB_URL, DB_USER,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::config::{Config, DatasourceConfig};
use crate::events::{EventPublisher, SensorAction};
use crate::ports;

/// Controller tuning taken from the daemon configuration.
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub min_sensor_port: u16,
    pub settle_delay: Duration,
    pub shutdown_timeout: Duration,
    pub datasource: DatasourceConfig,
}

impl ControllerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            min_sensor_port: config.sensors.min_port,
            settle_delay: config.sensors.settle_delay(),
            shutdown_timeout: config.sensors.shutdown_timeout(),
            datasource: config.datasource.clone(),
        }
    }
}

/// A sensor the controller currently considers active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSensor {
    pub descriptor: SensorDescriptor,
    pub state: SensorState,
}

/// Result of one lifecycle step for one sensor.
#[derive(Debug)]
pub struct SensorOutcome {
    pub sensor_name: String,
    pub result: Result<()>,
}

impl SensorOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Overwrites the datasource keys present in `configuration`.
///
/// Keys the sensor does not report are left absent; their names are
/// returned so the caller can report them.
pub fn apply_datasource(
    configuration: &mut ConfigurationMap,
    datasource: &DatasourceConfig,
) -> Vec<&'static str> {
    let overrides = [
        (DB_URL, &datasource.url),
        (DB_DRIVER_CLASS, &datasource.driver_class),
        (DB_USER, &datasource.user),
        (DB_PASSWD, &datasource.password),
    ];

    let mut missing = Vec::new();
    for (key, value) in overrides {
        match configuration.get_mut(key) {
            Some(current) => *current = value.clone(),
            None => missing.push(key),
        }
    }
    missing
}

/// Owner of the sensor fleet state.
pub struct SensorController {
    /// Registry; allocation and insertion happen under one guard, on the
    /// blocking pool
    registry: Arc<Mutex<Box<dyn SensorRegistry>>>,

    /// Control and management surface access
    link: Arc<dyn SensorLink>,

    /// Lifecycle event queue
    events: EventPublisher,

    settings: ControllerSettings,

    /// Active sensors in start order
    active: RwLock<Vec<ActiveSensor>>,

    /// Set once the startup run has begun
    run_started: AtomicBool,

    /// Set once the startup run has finished; gates polling
    ready: AtomicBool,

    /// Set once shutdown has begun
    destroyed: AtomicBool,
}

impl SensorController {
    /// Creates a controller over the given registry and sensor link.
    pub fn new(
        registry: Box<dyn SensorRegistry>,
        link: Arc<dyn SensorLink>,
        events: EventPublisher,
        settings: ControllerSettings,
    ) -> Self {
        Self {
            registry: Arc::new(Mutex::new(registry)),
            link,
            events,
            settings,
            active: RwLock::new(Vec::new()),
            run_started: AtomicBool::new(false),
            ready: AtomicBool::new(false),
            destroyed: AtomicBool::new(false),
        }
    }

    /// Returns the sensor link.
    pub fn link(&self) -> &Arc<dyn SensorLink> {
        &self.link
    }

    /// Returns the event publisher.
    pub fn events(&self) -> &EventPublisher {
        &self.events
    }

    /// Returns true once the startup run has finished.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    /// Returns a snapshot of the active sensors.
    pub async fn active_sensors(&self) -> Vec<ActiveSensor> {
        self.active.read().await.clone()
    }

    /// Returns every registered sensor.
    pub async fn registered_sensors(&self) -> Result<Vec<SensorDescriptor>> {
        self.with_registry(|registry| registry.find_all()).await
    }

    /// Runs `f` against the locked registry on the blocking pool, since
    /// registry backends may touch the filesystem.
    async fn with_registry<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Box<dyn SensorRegistry>) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let registry = self.registry.clone();
        tokio::task::spawn_blocking(move || {
            let mut registry = registry
                .lock()
                .map_err(|_| Error::Registry("registry lock poisoned".to_string()))?;
            f(&mut *registry)
        })
        .await
        .map_err(|e| Error::Registry(format!("registry task failed: {}", e)))?
    }

    /// Returns readiness and the active sensors with their states.
    pub async fn status(&self) -> ControllerStatus {
        let active = self
            .active
            .read()
            .await
            .iter()
            .map(|sensor| SensorStatus::new(&sensor.descriptor, sensor.state))
            .collect();

        ControllerStatus {
            ready: self.is_ready(),
            active,
        }
    }

    /// Registers the sensor executable at `path`.
    ///
    /// Nothing is written when the path yields no sensor name.
    pub async fn add(&self, path: &str) -> Result<SensorDescriptor> {
        let sensor_name = sensor_name_from_path(path)?;

        let owned_path = path.to_string();
        let min_port = self.settings.min_sensor_port;
        let saved = self
            .with_registry(move |registry| {
                let port = ports::next_port(&**registry, min_port)?;
                registry.save(SensorDescriptor::new(&owned_path, port)?)
            })
            .await;

        match saved {
            Ok(descriptor) => {
                self.events
                    .publish(SensorAction::Add, &descriptor.sensor_name, true);
                debug!(
                    "Sensor - Add - {} - OK (port {}, management {})",
                    descriptor.sensor_name, descriptor.sensor_port, descriptor.management_port
                );
                Ok(descriptor)
            }
            Err(e) => {
                self.events.publish(SensorAction::Add, &sensor_name, false);
                error!("Sensor - Add - {} - {}", sensor_name, e);
                Err(e)
            }
        }
    }

    /// Brings up every registered sensor, one at a time, then marks the
    /// controller ready.
    ///
    /// A failing sensor is logged and skipped. Only the first call does any
    /// work; later calls return an empty report.
    pub async fn run(&self) -> Vec<SensorOutcome> {
        if self.run_started.swap(true, Ordering::SeqCst) {
            warn!("Sensors already loaded, ignoring run request");
            return Vec::new();
        }

        let descriptors = match self.registered_sensors().await {
            Ok(descriptors) => descriptors,
            Err(e) => {
                error!("Failed to read sensor registry: {}", e);
                Vec::new()
            }
        };
        info!("Loading {} registered sensors", descriptors.len());

        let mut outcomes = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            let result = self.bring_up(&descriptor).await;
            match &result {
                Ok(()) => debug!("Sensor - Start - {} - OK", descriptor.sensor_name),
                Err(e) => error!("Sensor - Start - {} - {}", descriptor.sensor_name, e),
            }
            self.events
                .publish(SensorAction::Start, &descriptor.sensor_name, result.is_ok());
            outcomes.push(SensorOutcome {
                sensor_name: descriptor.sensor_name,
                result,
            });
        }

        self.ready.store(true, Ordering::SeqCst);
        info!(
            "Sensor loading finished: {} of {} running",
            outcomes.iter().filter(|o| o.is_ok()).count(),
            outcomes.len()
        );
        outcomes
    }

    /// Activates, configures and starts one sensor.
    async fn bring_up(&self, descriptor: &SensorDescriptor) -> Result<()> {
        let index = {
            let mut active = self.active.write().await;
            active.push(ActiveSensor {
                descriptor: descriptor.clone(),
                state: SensorState::Started,
            });
            active.len() - 1
        };

        // Give the process time to open its control surface
        tokio::time::sleep(self.settings.settle_delay).await;

        self.events
            .publish(SensorAction::Run, &descriptor.sensor_name, true);
        debug!("Sensor - Run - {} - OK", descriptor.sensor_name);

        let mut configuration = self.link.get_configuration(descriptor).await?;
        for key in apply_datasource(&mut configuration, &self.settings.datasource) {
            // Sensors lacking a key keep their own default for it
            warn!(
                "Sensor {} does not report {}, leaving it unset",
                descriptor.sensor_name, key
            );
        }
        self.link
            .push_configuration(descriptor, &configuration)
            .await?;
        self.set_state(index, descriptor, SensorState::Configured)
            .await;

        self.link.start(descriptor).await?;
        self.set_state(index, descriptor, SensorState::Running).await;
        Ok(())
    }

    async fn set_state(&self, index: usize, descriptor: &SensorDescriptor, state: SensorState) {
        let mut active = self.active.write().await;
        if let Some(sensor) = active
            .get_mut(index)
            .filter(|sensor| sensor.descriptor == *descriptor)
        {
            sensor.state = state;
        }
    }

    /// Stops every active sensor in start order and forgets it.
    ///
    /// Each sensor gets its stop call followed by a management shutdown,
    /// whether or not the stop call succeeded.
    pub async fn stop_sensors(&self) -> Vec<SensorOutcome> {
        let sensors: Vec<SensorDescriptor> = self
            .active
            .read()
            .await
            .iter()
            .filter(|sensor| sensor.state != SensorState::Stopped)
            .map(|sensor| sensor.descriptor.clone())
            .collect();

        let mut outcomes = Vec::with_capacity(sensors.len());
        for descriptor in sensors {
            let stopped = self.link.stop(&descriptor).await;
            if let Err(e) = &stopped {
                warn!("Sensor {} did not stop: {}", descriptor.sensor_name, e);
            }
            let shut_down = self.link.shutdown(&descriptor).await;
            if let Err(e) = &shut_down {
                warn!("Sensor {} did not shut down: {}", descriptor.sensor_name, e);
            }
            let result = stopped.and(shut_down);

            {
                let mut active = self.active.write().await;
                for sensor in active.iter_mut().filter(|s| s.descriptor == descriptor) {
                    sensor.state = SensorState::Stopped;
                }
            }

            self.events
                .publish(SensorAction::Stop, &descriptor.sensor_name, result.is_ok());
            debug!(
                "Sensor - Stop - {} - {}",
                descriptor.sensor_name,
                if result.is_ok() { "OK" } else { "FAILED" }
            );
            outcomes.push(SensorOutcome {
                sensor_name: descriptor.sensor_name,
                result,
            });
        }

        self.active
            .write()
            .await
            .retain(|sensor| sensor.state != SensorState::Stopped);
        outcomes
    }

    /// Stops the fleet during shutdown, bounded by the shutdown timeout.
    ///
    /// Only the first call stops anything. Returns `None` on timeout or when
    /// called again.
    pub async fn destroy(&self) -> Option<Vec<SensorOutcome>> {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            debug!("Sensors already destroyed");
            return None;
        }

        info!("Stopping sensors");
        match tokio::time::timeout(self.settings.shutdown_timeout, self.stop_sensors()).await {
            Ok(outcomes) => {
                info!("Stopped {} sensors", outcomes.len());
                Some(outcomes)
            }
            Err(_) => {
                warn!(
                    "Stopping sensors timed out after {:?}",
                    self.settings.shutdown_timeout
                );
                // Forget the sensors that did stop before the deadline
                self.active
                    .write()
                    .await
                    .retain(|sensor| sensor.state != SensorState::Stopped);
                None
            }
        }
    }
}
