//! The slice of the robot host's resource contract this module implements.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ResourceError;

pub const SENSOR_API: &str = "rdk:component:sensor";

/// Named fields returned by `get_readings`.
pub type Readings = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelFamily {
    pub namespace: String,
    pub family: String,
}

impl ModelFamily {
    pub fn new(namespace: &str, family: &str) -> Self {
        Self { namespace: namespace.into(), family: family.into() }
    }
}

/// `namespace:family:name`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Model {
    pub family: ModelFamily,
    pub name: String,
}

impl Model {
    pub fn new(family: ModelFamily, name: &str) -> Self {
        Self { family, name: name.into() }
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.family.namespace, self.family.family, self.name)
    }
}

impl FromStr for Model {
    type Err = ResourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        match parts.as_slice() {
            [ns, fam, name] if !ns.is_empty() && !fam.is_empty() && !name.is_empty() => {
                Ok(Model::new(ModelFamily::new(ns, fam), name))
            }
            _ => Err(ResourceError::InvalidConfig(format!("model {:?} is not namespace:family:name", s))),
        }
    }
}

impl TryFrom<String> for Model {
    type Error = ResourceError;
    fn try_from(s: String) -> Result<Self, Self::Error> { s.parse() }
}

impl From<Model> for String {
    fn from(m: Model) -> Self { m.to_string() }
}

fn default_api() -> String { SENSOR_API.to_string() }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentConfig {
    pub name: String,
    #[serde(default = "default_api")]
    pub api: String,
    pub model: Model,
    /// Free-form attributes. Accepted, not interpreted.
    #[serde(default)]
    pub attributes: toml::Table,
}

impl ComponentConfig {
    pub fn new(name: &str, model: Model) -> Self {
        Self { name: name.into(), api: default_api(), model, attributes: toml::Table::new() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    pub label: String,
    pub center_mm: Vector3,
    pub dims_mm: Vector3,
}

// Both traits are used through generics only; callers get no Send bound on the futures.

/// Lifecycle half of the contract: how the host builds and refreshes a resource.
#[allow(async_fn_in_trait)]
pub trait Resource {
    fn model() -> Model;

    /// Returns the implicit dependencies of `config`.
    fn validate_config(config: &ComponentConfig) -> Result<Vec<String>, ResourceError>;

    /// Must not fail: problems degrade the resource instead.
    async fn reconfigure(&self, config: &ComponentConfig);
}

#[allow(async_fn_in_trait)]
pub trait Sensor {
    async fn get_readings(
        &self,
        extra: Option<&Map<String, Value>>,
        timeout: Option<Duration>,
    ) -> Result<Readings, ResourceError>;

    async fn do_command(
        &self,
        command: &Map<String, Value>,
        timeout: Option<Duration>,
    ) -> Result<Map<String, Value>, ResourceError>;

    async fn get_geometries(
        &self,
        extra: Option<&Map<String, Value>>,
        timeout: Option<Duration>,
    ) -> Result<Vec<Geometry>, ResourceError>;
}
