//! Parameter registry for localforge.
//!
//! Every component (solver, runner, tabu list, composite explorer) exposes
//! typed, named, optional parameters in a flat namespace scoped by the
//! component's name. A [`ParameterSet`] maps dotted `component.parameter`
//! names to tagged values and can be populated from TOML or YAML files;
//! parsing command lines is the front-end's job.
//!
//! # Examples
//!
//! ```
//! use localforge_config::ParameterSet;
//!
//! let params = ParameterSet::from_toml_str(r#"
//!     [solver]
//!     init_trials = 10
//!     timeout = 30.0
//!
//!     [tabu_search]
//!     min_tenure = 5
//!     max_tenure = 10
//! "#).unwrap();
//!
//! assert_eq!(params.get_u64("solver", "init_trials").unwrap(), Some(10));
//! assert_eq!(params.get_f64("solver", "timeout").unwrap(), Some(30.0));
//! assert_eq!(params.get_u64("tabu_search", "max_tenure").unwrap(), Some(10));
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use thiserror::Error;

use localforge_core::SearchError;

/// Configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("unsupported value for parameter `{0}`")]
    UnsupportedValue(String),
}

/// A tagged parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    FloatVec(Vec<f64>),
}

impl ParameterValue {
    fn type_name(&self) -> &'static str {
        match self {
            ParameterValue::Bool(_) => "bool",
            ParameterValue::Int(_) => "int",
            ParameterValue::Float(_) => "float",
            ParameterValue::Text(_) => "text",
            ParameterValue::FloatVec(_) => "float vector",
        }
    }
}

/// The expected type of a declared parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterKind {
    Bool,
    Int,
    UInt,
    Float,
    Seconds,
    Text,
    FloatVec,
}

/// Schema entry describing one parameter of a component.
#[derive(Debug, Clone)]
pub struct ParameterSpec {
    /// Bare name within the component's namespace.
    pub name: &'static str,
    /// Human-readable description.
    pub description: &'static str,
    /// Expected type.
    pub kind: ParameterKind,
    /// Whether a value must be present before solving starts.
    pub required: bool,
}

impl ParameterSpec {
    pub const fn new(
        name: &'static str,
        description: &'static str,
        kind: ParameterKind,
    ) -> Self {
        ParameterSpec {
            name,
            description,
            kind,
            required: false,
        }
    }

    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// A component with named, typed parameters.
///
/// Implementors declare a schema and accept values from a
/// [`ParameterSet`]; value errors surface as
/// [`SearchError::IncorrectParameterValue`] and missing required values as
/// [`SearchError::ParameterNotSet`].
pub trait Parametrized {
    /// The namespace under which this component's parameters live.
    fn component_name(&self) -> &str;

    /// The declared parameters.
    fn parameter_schema(&self) -> Vec<ParameterSpec>;

    /// Binds values from `params` into this component.
    fn apply_parameters(&mut self, params: &ParameterSet) -> Result<(), SearchError>;

    /// Checks that every required parameter has a value.
    fn check_required(&self, params: &ParameterSet) -> Result<(), SearchError> {
        for spec in self.parameter_schema() {
            if spec.required && params.get(self.component_name(), spec.name).is_none() {
                return Err(SearchError::ParameterNotSet(format!(
                    "{}.{}",
                    self.component_name(),
                    spec.name
                )));
            }
        }
        Ok(())
    }
}

/// A flat mapping from dotted `component.parameter` names to values.
#[derive(Debug, Clone, Default)]
pub struct ParameterSet {
    values: BTreeMap<String, ParameterValue>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a value under `component.name`.
    pub fn set(
        &mut self,
        component: &str,
        name: &str,
        value: ParameterValue,
    ) -> &mut Self {
        self.values.insert(format!("{component}.{name}"), value);
        self
    }

    /// Looks up `component.name`.
    pub fn get(&self, component: &str, name: &str) -> Option<&ParameterValue> {
        self.values.get(&format!("{component}.{name}"))
    }

    /// Iterates over all `(dotted_name, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParameterValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn mismatch(component: &str, name: &str, expected: &str, got: &ParameterValue) -> SearchError {
        SearchError::incorrect_parameter(
            format!("{component}.{name}"),
            format!("expected {expected}, got {}", got.type_name()),
        )
    }

    /// Typed lookup: boolean.
    pub fn get_bool(&self, component: &str, name: &str) -> Result<Option<bool>, SearchError> {
        match self.get(component, name) {
            None => Ok(None),
            Some(ParameterValue::Bool(b)) => Ok(Some(*b)),
            Some(other) => Err(Self::mismatch(component, name, "bool", other)),
        }
    }

    /// Typed lookup: signed integer.
    pub fn get_i64(&self, component: &str, name: &str) -> Result<Option<i64>, SearchError> {
        match self.get(component, name) {
            None => Ok(None),
            Some(ParameterValue::Int(i)) => Ok(Some(*i)),
            Some(other) => Err(Self::mismatch(component, name, "int", other)),
        }
    }

    /// Typed lookup: unsigned integer.
    pub fn get_u64(&self, component: &str, name: &str) -> Result<Option<u64>, SearchError> {
        match self.get(component, name) {
            None => Ok(None),
            Some(ParameterValue::Int(i)) if *i >= 0 => Ok(Some(*i as u64)),
            Some(other) => Err(Self::mismatch(component, name, "non-negative int", other)),
        }
    }

    /// Typed lookup: float (integers are widened).
    pub fn get_f64(&self, component: &str, name: &str) -> Result<Option<f64>, SearchError> {
        match self.get(component, name) {
            None => Ok(None),
            Some(ParameterValue::Float(f)) => Ok(Some(*f)),
            Some(ParameterValue::Int(i)) => Ok(Some(*i as f64)),
            Some(other) => Err(Self::mismatch(component, name, "float", other)),
        }
    }

    /// Typed lookup: duration expressed in (possibly fractional) seconds.
    pub fn get_seconds(
        &self,
        component: &str,
        name: &str,
    ) -> Result<Option<Duration>, SearchError> {
        match self.get_f64(component, name)? {
            None => Ok(None),
            Some(secs) if secs >= 0.0 => Ok(Some(Duration::from_secs_f64(secs))),
            Some(_) => Err(SearchError::incorrect_parameter(
                format!("{component}.{name}"),
                "duration must be non-negative",
            )),
        }
    }

    /// Typed lookup: vector of floats (integers are widened).
    pub fn get_f64_vec(
        &self,
        component: &str,
        name: &str,
    ) -> Result<Option<Vec<f64>>, SearchError> {
        match self.get(component, name) {
            None => Ok(None),
            Some(ParameterValue::FloatVec(v)) => Ok(Some(v.clone())),
            Some(other) => Err(Self::mismatch(component, name, "float vector", other)),
        }
    }

    /// Typed lookup: text.
    pub fn get_text(&self, component: &str, name: &str) -> Result<Option<String>, SearchError> {
        match self.get(component, name) {
            None => Ok(None),
            Some(ParameterValue::Text(t)) => Ok(Some(t.clone())),
            Some(other) => Err(Self::mismatch(component, name, "text", other)),
        }
    }

    /// Loads a parameter file, picking the format from the extension
    /// (`.toml` by default, `.yaml`/`.yml` for YAML).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml_str(&contents),
            _ => Self::from_toml_str(&contents),
        }
    }

    /// Parses a TOML document into a flat parameter set. Nested tables
    /// contribute dotted prefixes.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let value: toml::Value = toml::from_str(s)?;
        let mut set = ParameterSet::new();
        flatten_toml(&mut set, "", &value)?;
        Ok(set)
    }

    /// Parses a YAML document into a flat parameter set.
    pub fn from_yaml_str(s: &str) -> Result<Self, ConfigError> {
        let value: serde_yaml::Value = serde_yaml::from_str(s)?;
        let mut set = ParameterSet::new();
        flatten_yaml(&mut set, "", &value)?;
        Ok(set)
    }

    fn insert_flat(&mut self, key: String, value: ParameterValue) {
        self.values.insert(key, value);
    }
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

fn flatten_toml(set: &mut ParameterSet, prefix: &str, value: &toml::Value) -> Result<(), ConfigError> {
    match value {
        toml::Value::Table(table) => {
            for (key, child) in table {
                flatten_toml(set, &join(prefix, key), child)?;
            }
            Ok(())
        }
        toml::Value::Boolean(b) => {
            set.insert_flat(prefix.to_string(), ParameterValue::Bool(*b));
            Ok(())
        }
        toml::Value::Integer(i) => {
            set.insert_flat(prefix.to_string(), ParameterValue::Int(*i));
            Ok(())
        }
        toml::Value::Float(f) => {
            set.insert_flat(prefix.to_string(), ParameterValue::Float(*f));
            Ok(())
        }
        toml::Value::String(s) => {
            set.insert_flat(prefix.to_string(), ParameterValue::Text(s.clone()));
            Ok(())
        }
        toml::Value::Array(items) => {
            let mut floats = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    toml::Value::Float(f) => floats.push(*f),
                    toml::Value::Integer(i) => floats.push(*i as f64),
                    _ => return Err(ConfigError::UnsupportedValue(prefix.to_string())),
                }
            }
            set.insert_flat(prefix.to_string(), ParameterValue::FloatVec(floats));
            Ok(())
        }
        toml::Value::Datetime(_) => Err(ConfigError::UnsupportedValue(prefix.to_string())),
    }
}

fn flatten_yaml(
    set: &mut ParameterSet,
    prefix: &str,
    value: &serde_yaml::Value,
) -> Result<(), ConfigError> {
    match value {
        serde_yaml::Value::Mapping(map) => {
            for (key, child) in map {
                let key = key
                    .as_str()
                    .ok_or_else(|| ConfigError::UnsupportedValue(prefix.to_string()))?;
                flatten_yaml(set, &join(prefix, key), child)?;
            }
            Ok(())
        }
        serde_yaml::Value::Bool(b) => {
            set.insert_flat(prefix.to_string(), ParameterValue::Bool(*b));
            Ok(())
        }
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                set.insert_flat(prefix.to_string(), ParameterValue::Int(i));
            } else if let Some(f) = n.as_f64() {
                set.insert_flat(prefix.to_string(), ParameterValue::Float(f));
            } else {
                return Err(ConfigError::UnsupportedValue(prefix.to_string()));
            }
            Ok(())
        }
        serde_yaml::Value::String(s) => {
            set.insert_flat(prefix.to_string(), ParameterValue::Text(s.clone()));
            Ok(())
        }
        serde_yaml::Value::Sequence(items) => {
            let mut floats = Vec::with_capacity(items.len());
            for item in items {
                match item.as_f64() {
                    Some(f) => floats.push(f),
                    None => return Err(ConfigError::UnsupportedValue(prefix.to_string())),
                }
            }
            set.insert_flat(prefix.to_string(), ParameterValue::FloatVec(floats));
            Ok(())
        }
        serde_yaml::Value::Null => Ok(()),
        _ => Err(ConfigError::UnsupportedValue(prefix.to_string())),
    }
}
