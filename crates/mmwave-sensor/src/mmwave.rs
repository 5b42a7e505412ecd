use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use mmwave_driver::{DriverFactory, RadarDriver, Verbosity, DEFAULT_BAUD, DEFAULT_DEVICE};
use mmwave_proto::Reading;

use crate::error::{ConfigurationFailure, ResourceError};
use crate::resource::{ComponentConfig, Geometry, Model, ModelFamily, Readings, Resource, Sensor};

/// The radar emits a calibration transient after start; frames inside this
/// window are not trusted.
pub const SETTLE_INTERVAL: Duration = Duration::from_secs(2);

/// Where and how the radar is opened. Not read from the component config:
/// `Default` is the wiring of the reference build, and [`Mmwave::with_params`]
/// is the override point.
#[derive(Debug, Clone, PartialEq)]
pub struct RadarParams {
    pub device: String,
    pub baud: u32,
    pub settle: Duration,
    pub verbosity: Verbosity,
}

impl Default for RadarParams {
    fn default() -> Self {
        Self {
            device: DEFAULT_DEVICE.to_string(),
            baud: DEFAULT_BAUD,
            settle: SETTLE_INTERVAL,
            verbosity: Verbosity::Info,
        }
    }
}

/// LD2410 presence sensor. Holds at most one live driver handle; the handle
/// is `None` until a configure succeeds and again after one fails.
pub struct Mmwave {
    name: String,
    params: RadarParams,
    factory: Arc<dyn DriverFactory>,
    radar: Mutex<Option<Box<dyn RadarDriver>>>,
}

impl Mmwave {
    pub async fn new(config: &ComponentConfig, factory: Arc<dyn DriverFactory>) -> Self {
        Self::with_params(config, factory, RadarParams::default()).await
    }

    /// Builds the resource and runs the first configure before handing it out.
    pub async fn with_params(
        config: &ComponentConfig,
        factory: Arc<dyn DriverFactory>,
        params: RadarParams,
    ) -> Self {
        let sensor = Self {
            name: config.name.clone(),
            params,
            factory,
            radar: Mutex::new(None),
        };
        sensor.reconfigure(config).await;
        sensor
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &RadarParams {
        &self.params
    }

    pub async fn is_ready(&self) -> bool {
        self.radar.lock().await.is_some()
    }

    /// Stops the radar and releases the port. The resource reads `Error` afterwards.
    pub async fn close(&self) {
        if let Some(mut radar) = self.radar.lock().await.take() {
            match radar.stop() {
                Ok(()) => info!("{}: LD2410 stopped", self.name),
                Err(e) => warn!("{}: LD2410 stop failed: {:#}", self.name, e),
            }
        }
    }

    /// Latest frame as a typed reading. Never fails; absence and bad data
    /// come back as `Error` and `No Data` readings.
    pub async fn read(&self) -> Reading {
        let radar = self.radar.lock().await;
        let Some(radar) = radar.as_deref() else {
            error!("{}: radar is not initialized", self.name);
            return Reading::error();
        };

        let data = radar.get_data();
        match data.as_deref().and_then(|d| d.first()).and_then(|f| Reading::from_frame(f)) {
            Some(r) => r,
            None => {
                warn!("{}: no valid data received from LD2410", self.name);
                Reading::no_data()
            }
        }
    }

    // Runs with the handle lock held by the caller.
    async fn replace(&self, slot: &mut Option<Box<dyn RadarDriver>>) -> Result<(), ConfigurationFailure> {
        if let Some(mut old) = slot.take() {
            info!("{}: stopping previous LD2410 instance", self.name);
            old.stop().map_err(ConfigurationFailure::StopPrevious)?;
        }

        let p = &self.params;
        let mut radar = self.factory.open(&p.device, p.baud, p.verbosity)
            .map_err(|cause| ConfigurationFailure::Open { device: p.device.clone(), baud: p.baud, cause })?;

        if let Err(e) = radar.start() {
            if let Err(stop_err) = radar.stop() {
                warn!("{}: releasing half-open radar failed: {:#}", self.name, stop_err);
            }
            return Err(ConfigurationFailure::Start(e));
        }

        tokio::time::sleep(p.settle).await;
        *slot = Some(radar);
        Ok(())
    }
}

impl Resource for Mmwave {
    fn model() -> Model {
        Model::new(ModelFamily::new("joyce", "mmwave"), "mmwave")
    }

    fn validate_config(config: &ComponentConfig) -> Result<Vec<String>, ResourceError> {
        if config.name.trim().is_empty() {
            return Err(ResourceError::InvalidConfig("component name is empty".into()));
        }
        let want = Self::model();
        if config.model != want {
            return Err(ResourceError::InvalidConfig(format!("model {} is not {}", config.model, want)));
        }
        Ok(Vec::new())
    }

    async fn reconfigure(&self, config: &ComponentConfig) {
        debug!("{}: reconfigure ({} attributes, not consulted)", self.name, config.attributes.len());
        let mut radar = self.radar.lock().await;
        match self.replace(&mut radar).await {
            Ok(()) => info!("{}: LD2410 radar initialized successfully", self.name),
            Err(e) => {
                error!("{}: error initializing LD2410 radar: {}", self.name, e);
                *radar = None;
            }
        }
    }
}

impl Sensor for Mmwave {
    async fn get_readings(
        &self,
        _extra: Option<&Map<String, Value>>,
        timeout: Option<Duration>,
    ) -> Result<Readings, ResourceError> {
        // Nothing here waits on the device, so the deadline cannot be missed.
        if let Some(t) = timeout {
            debug!("{}: get_readings timeout {:?}", self.name, t);
        }
        Ok(self.read().await.to_map())
    }

    async fn do_command(
        &self,
        _command: &Map<String, Value>,
        _timeout: Option<Duration>,
    ) -> Result<Map<String, Value>, ResourceError> {
        Err(ResourceError::NotImplemented { method: "do_command" })
    }

    async fn get_geometries(
        &self,
        _extra: Option<&Map<String, Value>>,
        _timeout: Option<Duration>,
    ) -> Result<Vec<Geometry>, ResourceError> {
        Err(ResourceError::NotImplemented { method: "get_geometries" })
    }
}

impl Drop for Mmwave {
    fn drop(&mut self) {
        if let Some(mut radar) = self.radar.get_mut().take() {
            if let Err(e) = radar.stop() {
                warn!("{}: LD2410 stop on drop failed: {:#}", self.name, e);
            }
        }
    }
}
