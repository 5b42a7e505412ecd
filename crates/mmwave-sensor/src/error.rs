use thiserror::Error;

/// Errors that cross the sensor contract to the host.
#[derive(Error, Debug)]
pub enum ResourceError {
    #[error("{method} is not implemented")]
    NotImplemented { method: &'static str },
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

/// Why a (re)configure left the radar unconnected. Logged, never returned to the host.
#[derive(Error, Debug)]
pub enum ConfigurationFailure {
    #[error("stop previous radar: {0:#}")]
    StopPrevious(anyhow::Error),
    #[error("open {device} @ {baud}: {cause:#}")]
    Open { device: String, baud: u32, cause: anyhow::Error },
    #[error("start radar: {0:#}")]
    Start(anyhow::Error),
}
