//! This module defines the configuration of a maskwatch station.
//! Each external collaborator (perception, LED driver, alarm, snapshots, statistics)
//! is described by a node: a type name and a free form map of parameters given to its
//! constructor. The configuration is serialized in the RON format.

use crate::actuation::IdlePolicy;
use crate::{MwError, MwResult};
use ron::extensions::Extensions;
use ron::Options;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fmt::Display;
use std::fs::{read_to_string, write};
use std::path::Path;

pub const DEFAULT_REPORTS_DIR: &str = "reports";

// The configuration Serialization format is as follows:
// (
//   perception: (type: "replay", config: { "path": "frames.ron" }),
//   led: (type: "serial", config: { "port": "/dev/ttyACM0", "baudrate": 9600 }),
//   alarm: (type: "command", config: { "command": "aplay", "args": ["alarm.wav"] }),
//   reports_dir: "reports",
//   idle_policy: OnTransition,
// )

/// A single configuration value.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Integer(value as i64)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<Vec<String>> for Value {
    fn from(value: Vec<String>) -> Self {
        Value::List(value.into_iter().map(Value::String).collect())
    }
}

fn mismatch(expected: &str, value: &Value) -> MwError {
    MwError::Config(format!("Expected {expected} but got {value}"))
}

impl TryFrom<Value> for bool {
    type Error = MwError;
    fn try_from(value: Value) -> MwResult<Self> {
        match value {
            Value::Bool(b) => Ok(b),
            other => Err(mismatch("a boolean", &other)),
        }
    }
}

impl TryFrom<Value> for i64 {
    type Error = MwError;
    fn try_from(value: Value) -> MwResult<Self> {
        match value {
            Value::Integer(i) => Ok(i),
            other => Err(mismatch("an integer", &other)),
        }
    }
}

impl TryFrom<Value> for u32 {
    type Error = MwError;
    fn try_from(value: Value) -> MwResult<Self> {
        match value {
            Value::Integer(i) => u32::try_from(i).map_err(|_| mismatch("a positive integer", &value)),
            other => Err(mismatch("a positive integer", &other)),
        }
    }
}

impl TryFrom<Value> for u64 {
    type Error = MwError;
    fn try_from(value: Value) -> MwResult<Self> {
        match value {
            Value::Integer(i) => u64::try_from(i).map_err(|_| mismatch("a positive integer", &value)),
            other => Err(mismatch("a positive integer", &other)),
        }
    }
}

impl TryFrom<Value> for f64 {
    type Error = MwError;
    fn try_from(value: Value) -> MwResult<Self> {
        match value {
            Value::Float(f) => Ok(f),
            Value::Integer(i) => Ok(i as f64),
            other => Err(mismatch("a number", &other)),
        }
    }
}

impl TryFrom<Value> for String {
    type Error = MwError;
    fn try_from(value: Value) -> MwResult<Self> {
        match value {
            Value::String(s) => Ok(s),
            other => Err(mismatch("a string", &other)),
        }
    }
}

impl TryFrom<Value> for Vec<String> {
    type Error = MwError;
    fn try_from(value: Value) -> MwResult<Self> {
        match value {
            Value::List(items) => items.into_iter().map(String::try_from).collect(),
            other => Err(mismatch("a list of strings", &other)),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

/// This is the configuration of a component (like a LED driver or a perception engine).
/// It is a map of key-value pairs.
/// It is given to the new method of the component implementation.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ComponentConfig(pub HashMap<String, Value>);

impl Display for ComponentConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&String> = self.0.keys().collect();
        keys.sort();
        write!(f, "{{")?;
        for (i, key) in keys.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", key, self.0[*key])?;
        }
        write!(f, "}}")
    }
}

// forward map interface
impl ComponentConfig {
    pub fn new() -> Self {
        ComponentConfig(HashMap::new())
    }

    /// Returns None if the key is absent, an error if it is there with the wrong type.
    pub fn get<T>(&self, key: &str) -> MwResult<Option<T>>
    where
        T: TryFrom<Value, Error = MwError>,
    {
        self.0
            .get(key)
            .map(|v| {
                T::try_from(v.clone())
                    .map_err(|e| MwError::Config(format!("Invalid value for '{key}': {e}")))
            })
            .transpose()
    }

    pub fn get_or<T>(&self, key: &str, default: T) -> MwResult<T>
    where
        T: TryFrom<Value, Error = MwError>,
    {
        Ok(self.get(key)?.unwrap_or(default))
    }

    pub fn require<T>(&self, key: &str) -> MwResult<T>
    where
        T: TryFrom<Value, Error = MwError>,
    {
        self.get(key)?
            .ok_or_else(|| MwError::Config(format!("Missing required '{key}' config value")))
    }

    pub fn set<T: Into<Value>>(&mut self, key: &str, value: T) {
        self.0.insert(key.to_string(), value.into());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }
}

/// A collaborator of the station: which implementation to use and its parameters.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct NodeConfig {
    #[serde(rename = "type")]
    type_: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    config: Option<ComponentConfig>,
}

impl NodeConfig {
    pub fn new(ptype: &str) -> Self {
        NodeConfig {
            type_: ptype.to_string(),
            config: None,
        }
    }

    pub fn with_param<T: Into<Value>>(mut self, key: &str, value: T) -> Self {
        self.set_param(key, value);
        self
    }

    pub fn get_type(&self) -> &str {
        &self.type_
    }

    pub fn get_instance_config(&self) -> Option<&ComponentConfig> {
        self.config.as_ref()
    }

    pub fn set_param<T: Into<Value>>(&mut self, key: &str, value: T) {
        self.config
            .get_or_insert_with(ComponentConfig::new)
            .set(key, value);
    }

    /// Set a parameter only if the user did not give one.
    pub fn set_default_param<T: Into<Value>>(&mut self, key: &str, value: T) {
        let config = self.config.get_or_insert_with(ComponentConfig::new);
        if !config.contains(key) {
            config.set(key, value);
        }
    }
}

fn default_reports_dir() -> String {
    DEFAULT_REPORTS_DIR.to_string()
}

/// StationConfig is the programmatic representation of the station configuration.
/// It is built once at startup and handed over to the runtime.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StationConfig {
    pub perception: NodeConfig,
    pub led: NodeConfig,
    #[serde(default)]
    pub alarm: Option<NodeConfig>,
    #[serde(default)]
    pub snapshots: Option<NodeConfig>,
    #[serde(default)]
    pub stats: Option<NodeConfig>,
    /// Root of the daily partitions holding statistics and snapshots.
    #[serde(default = "default_reports_dir")]
    pub reports_dir: String,
    #[serde(default)]
    pub idle_policy: IdlePolicy,
}

impl Default for StationConfig {
    fn default() -> Self {
        StationConfig {
            perception: NodeConfig::new("stream").with_param("sensitivity", 0.8),
            led: NodeConfig::new("serial")
                .with_param("port", "/dev/ttyACM0")
                .with_param("baudrate", 9600u32),
            alarm: Some(NodeConfig::new("log")),
            snapshots: Some(NodeConfig::new("jpeg_dir")),
            stats: Some(NodeConfig::new("daily_csv").with_param("demographics", "placeholder")),
            reports_dir: default_reports_dir(),
            idle_policy: IdlePolicy::default(),
        }
    }
}

impl StationConfig {
    fn get_options() -> Options {
        Options::default()
            .with_default_extension(Extensions::IMPLICIT_SOME)
            .with_default_extension(Extensions::UNWRAP_NEWTYPES)
    }

    pub fn serialize_ron(&self) -> MwResult<String> {
        let pretty = ron::ser::PrettyConfig::default();
        Self::get_options()
            .to_string_pretty(self, pretty)
            .map_err(|e| MwError::config_with_cause("Could not serialize the configuration", e))
    }

    pub fn deserialize_ron(ron: &str) -> MwResult<Self> {
        Self::get_options()
            .from_str(ron)
            .map_err(|e| MwError::config_with_cause("Syntax Error in config", e))
    }
}

/// Read a station configuration from a file.
pub fn read_configuration(config_filename: &Path) -> MwResult<StationConfig> {
    let config_content = read_to_string(config_filename).map_err(|e| {
        MwError::config_with_cause(
            &format!("Failed to read configuration file {}", config_filename.display()),
            e,
        )
    })?;
    StationConfig::deserialize_ron(&config_content)
}

/// Read the configuration, or write the default one at this path if there is none yet.
/// Returns true as second member if the default configuration has been written.
pub fn read_or_bootstrap_configuration(config_filename: &Path) -> MwResult<(StationConfig, bool)> {
    if config_filename.exists() {
        return Ok((read_configuration(config_filename)?, false));
    }
    let config = StationConfig::default();
    write(config_filename, config.serialize_ron()?).map_err(|e| {
        MwError::config_with_cause(
            &format!("Failed to write default configuration {}", config_filename.display()),
            e,
        )
    })?;
    Ok((config, true))
}

// tests
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_deserialize() {
        let txt = r#"(
            perception: (type: "replay", config: { "path": "frames.ron", "loop": true }),
            led: (type: "mock"),
        )"#;
        let config = StationConfig::deserialize_ron(txt).unwrap();
        assert_eq!(config.perception.get_type(), "replay");
        let perception = config.perception.get_instance_config().unwrap();
        assert_eq!(
            perception.require::<String>("path").unwrap(),
            "frames.ron".to_string()
        );
        assert!(perception.require::<bool>("loop").unwrap());
        assert!(config.alarm.is_none());
        assert_eq!(config.reports_dir, DEFAULT_REPORTS_DIR);
        assert_eq!(config.idle_policy, IdlePolicy::OnTransition);
    }

    #[test]
    fn test_optional_nodes_and_policy() {
        let txt = r#"(
            perception: (type: "stream"),
            led: (type: "serial", config: { "port": "COM9", "baudrate": 9600 }),
            alarm: (type: "command", config: { "command": "aplay", "args": ["-q", "alarm.wav"] }),
            reports_dir: "/var/lib/maskwatch",
            idle_policy: EveryEmptyStep,
        )"#;
        let config = StationConfig::deserialize_ron(txt).unwrap();
        let alarm = config.alarm.unwrap();
        let args: Vec<String> = alarm.get_instance_config().unwrap().require("args").unwrap();
        assert_eq!(args, vec!["-q".to_string(), "alarm.wav".to_string()]);
        assert_eq!(config.idle_policy, IdlePolicy::EveryEmptyStep);
        assert_eq!(
            config
                .led
                .get_instance_config()
                .unwrap()
                .require::<u32>("baudrate")
                .unwrap(),
            9600
        );
    }

    #[test]
    fn test_round_trip_default() {
        let config = StationConfig::default();
        let serialized = config.serialize_ron().unwrap();
        let deserialized = StationConfig::deserialize_ron(&serialized).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_wrong_types_are_reported() {
        let mut config = ComponentConfig::new();
        config.set("baudrate", "fast");
        assert!(config.get::<u32>("baudrate").is_err());
        assert!(config.require::<String>("port").is_err());
        assert_eq!(config.get_or::<u32>("timeout_ms", 1000).unwrap(), 1000);
        config.set("sensitivity", 1i64);
        assert_eq!(config.require::<f64>("sensitivity").unwrap(), 1.0);
    }

    #[test]
    fn test_default_params_do_not_override() {
        let mut node = NodeConfig::new("daily_csv").with_param("reports_dir", "/data");
        node.set_default_param("reports_dir", "reports");
        node.set_default_param("demographics", "fixed");
        let config = node.get_instance_config().unwrap();
        assert_eq!(config.require::<String>("reports_dir").unwrap(), "/data");
        assert_eq!(config.require::<String>("demographics").unwrap(), "fixed");
    }

    #[test]
    fn test_bootstrap_writes_defaults_once() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("station.ron");
        let (config, created) = read_or_bootstrap_configuration(&path).unwrap();
        assert!(created);
        assert!(path.exists());
        let (again, created) = read_or_bootstrap_configuration(&path).unwrap();
        assert!(!created);
        assert_eq!(config, again);
    }

    #[test]
    fn test_syntax_error() {
        assert!(StationConfig::deserialize_ron("( perception: ").is_err());
    }
}
