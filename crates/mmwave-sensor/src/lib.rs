//! LD2410 presence radar exposed as a sensor resource.

pub mod error;
pub mod mmwave;
pub mod resource;

pub use error::{ConfigurationFailure, ResourceError};
pub use mmwave::{Mmwave, RadarParams, SETTLE_INTERVAL};
pub use resource::{ComponentConfig, Geometry, Model, ModelFamily, Readings, Resource, Sensor};
