//! Deployment descriptor model
//!
//! The descriptor arrives as loosely-typed YAML. Every section the pipeline
//! touches is validated once here and lifted into [`Descriptor`]; everything
//! else is carried through untouched and in its original position.

use indexmap::IndexMap;
use serde_yaml::{Mapping, Value};

use crate::compose::labels::{self, scalar_string, split_entry, LabelPolicy, Labels};
use crate::errors::StackError;

/// A validated deployment descriptor
#[derive(Debug, Clone, PartialEq)]
pub struct Descriptor {
    root: Mapping,
    pub services: IndexMap<String, Service>,
    pub networks: IndexMap<String, Mapping>,
    pub volumes: IndexMap<String, Mapping>,
    pub secrets: IndexMap<String, Mapping>,
}

/// A validated service entry
#[derive(Debug, Clone, PartialEq)]
pub struct Service {
    body: Mapping,
    pub network_refs: Vec<String>,
    pub volume_refs: Vec<String>,
    pub secret_refs: Vec<String>,
    pub labels: Option<Labels>,
    pub environment: Option<Mapping>,
}

impl Descriptor {
    /// Parse and validate descriptor text
    pub fn parse(text: &str, policy: LabelPolicy) -> Result<Self, StackError> {
        let value: Value = serde_yaml::from_str(text)?;
        Self::from_value(value, policy)
    }

    /// Validate an already-parsed YAML document
    pub fn from_value(value: Value, policy: LabelPolicy) -> Result<Self, StackError> {
        let root = match value {
            Value::Mapping(root) => root,
            Value::Null => return Err(StackError::MissingField("services".to_string())),
            _ => return Err(StackError::invalid_shape("descriptor", "must be a mapping")),
        };

        let mut services = IndexMap::new();
        for (name, body) in self::services(&root)? {
            let service = Service::from_mapping(&name, body, policy)?;
            services.insert(name, service);
        }

        Ok(Self {
            networks: self::networks(&root)?,
            volumes: section(&root, "volumes")?,
            secrets: section(&root, "secrets")?,
            services,
            root,
        })
    }

    /// Render the descriptor back into YAML
    pub fn to_value(&self) -> Value {
        let mut root = self.root.clone();

        let mut services = Mapping::new();
        for (name, service) in &self.services {
            services.insert(Value::String(name.clone()), Value::Mapping(service.to_mapping()));
        }
        root.insert(Value::from("services"), Value::Mapping(services));

        for (key, entries) in [
            ("networks", &self.networks),
            ("volumes", &self.volumes),
            ("secrets", &self.secrets),
        ] {
            if entries.is_empty() && !root.contains_key(key) {
                continue;
            }
            let mut map = Mapping::new();
            for (name, entry) in entries {
                map.insert(Value::String(name.clone()), Value::Mapping(entry.clone()));
            }
            root.insert(Value::from(key), Value::Mapping(map));
        }

        Value::Mapping(root)
    }

    /// Serialize to block-style YAML
    pub fn to_yaml(&self) -> Result<String, StackError> {
        Ok(serde_yaml::to_string(&self.to_value())?)
    }
}

impl Service {
    fn from_mapping(name: &str, body: Mapping, policy: LabelPolicy) -> Result<Self, StackError> {
        let secret_refs = secret_refs(name, &body)?;
        // Environment is only rewritten when secrets have to be wired into it.
        let environment = if secret_refs.is_empty() {
            None
        } else {
            Some(environment(name, &body)?)
        };

        Ok(Self {
            network_refs: network_refs(name, &body)?,
            volume_refs: volume_refs(name, &body)?,
            labels: labels::labels(name, &body, policy)?,
            secret_refs,
            environment,
            body,
        })
    }

    /// Raw value of a service field
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.body.get(key)
    }

    /// Set a field unless the caller already supplied a value for it
    pub fn set_default(&mut self, key: &str, value: impl Into<Value>) {
        if is_unset(&self.body, key) {
            self.body.insert(Value::from(key), value.into());
        }
    }

    fn to_mapping(&self) -> Mapping {
        let mut body = self.body.clone();
        if let Some(labels) = &self.labels {
            body.insert(Value::from("labels"), labels::to_value(labels));
        }
        if let Some(environment) = &self.environment {
            body.insert(Value::from("environment"), Value::Mapping(environment.clone()));
        }
        body
    }
}

/// True when `key` is absent or explicitly null
pub fn is_unset(map: &Mapping, key: &str) -> bool {
    map.get(key).map_or(true, Value::is_null)
}

/// The `networks` section, empty if absent
pub fn networks(root: &Mapping) -> Result<IndexMap<String, Mapping>, StackError> {
    section(root, "networks")
}

/// The `services` section, each entry checked to be a mapping
pub fn services(root: &Mapping) -> Result<IndexMap<String, Mapping>, StackError> {
    let services = match root.get("services") {
        None | Some(Value::Null) => return Err(StackError::MissingField("services".to_string())),
        Some(Value::Mapping(services)) => services,
        Some(_) => return Err(StackError::invalid_shape("services", "must be a mapping")),
    };

    let mut out = IndexMap::new();
    for (key, value) in services {
        let name = entry_name("services", key)?;
        match value {
            Value::Mapping(body) => {
                out.insert(name, body.clone());
            }
            _ => {
                return Err(StackError::invalid_shape(
                    format!("services.{}", name),
                    "must be a mapping",
                ))
            }
        }
    }
    Ok(out)
}

/// A service's network references; only a list of strings is supported
pub fn network_refs(service_name: &str, service: &Mapping) -> Result<Vec<String>, StackError> {
    string_list(service_name, service, "networks")
}

/// A service's secret references
pub fn secret_refs(service_name: &str, service: &Mapping) -> Result<Vec<String>, StackError> {
    string_list(service_name, service, "secrets")
}

/// Named volumes a service mounts. Bind mounts and anonymous volumes are ignored.
pub fn volume_refs(service_name: &str, service: &Mapping) -> Result<Vec<String>, StackError> {
    let path = format!("services.{}.volumes", service_name);
    let entries = match service.get("volumes") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Sequence(entries)) => entries,
        Some(_) => return Err(StackError::invalid_shape(path, "must be a list")),
    };

    let mut refs = Vec::new();
    for entry in entries {
        let source = match entry {
            Value::String(spec) => {
                let mut parts = spec.splitn(2, ':');
                match (parts.next(), parts.next()) {
                    (Some(source), Some(_)) => Some(source.to_string()),
                    _ => None,
                }
            }
            Value::Mapping(long) => match (long.get("type"), long.get("source")) {
                (Some(Value::String(kind)), Some(Value::String(source))) if kind == "volume" => {
                    Some(source.clone())
                }
                _ => None,
            },
            _ => {
                return Err(StackError::invalid_shape(
                    path,
                    "entries must be strings or mappings",
                ))
            }
        };

        if let Some(source) = source.filter(|s| is_volume_name(s)) {
            if !refs.contains(&source) {
                refs.push(source);
            }
        }
    }
    Ok(refs)
}

/// A service's environment as a mapping; the `KEY=VALUE` list form is converted
pub fn environment(service_name: &str, service: &Mapping) -> Result<Mapping, StackError> {
    let path = format!("services.{}.environment", service_name);
    match service.get("environment") {
        None | Some(Value::Null) => Ok(Mapping::new()),
        Some(Value::Mapping(map)) => Ok(map.clone()),
        Some(Value::Sequence(entries)) => {
            let mut map = Mapping::new();
            for entry in entries {
                let Value::String(entry) = entry else {
                    return Err(StackError::invalid_shape(path, "list entries must be strings"));
                };
                let (key, value) = split_entry(entry);
                let value = value.map_or(Value::Null, Value::from);
                map.insert(Value::from(key), value);
            }
            Ok(map)
        }
        Some(_) => Err(StackError::invalid_shape(
            path,
            "must be a mapping or a list of strings",
        )),
    }
}

fn string_list(service_name: &str, service: &Mapping, key: &str) -> Result<Vec<String>, StackError> {
    let invalid = || {
        StackError::invalid_shape(
            format!("services.{}.{}", service_name, key),
            "only a list of strings is currently supported",
        )
    };
    match service.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Sequence(entries)) => entries
            .iter()
            .map(|entry| match entry {
                Value::String(s) => Ok(s.clone()),
                _ => Err(invalid()),
            })
            .collect(),
        Some(_) => Err(invalid()),
    }
}

/// A top-level name → mapping section; null entries become empty mappings
fn section(root: &Mapping, key: &str) -> Result<IndexMap<String, Mapping>, StackError> {
    let entries = match root.get(key) {
        None | Some(Value::Null) => return Ok(IndexMap::new()),
        Some(Value::Mapping(entries)) => entries,
        Some(_) => return Err(StackError::invalid_shape(key, "must be a mapping")),
    };

    let mut out = IndexMap::new();
    for (name, value) in entries {
        let name = entry_name(key, name)?;
        let body = match value {
            Value::Null => Mapping::new(),
            Value::Mapping(body) => body.clone(),
            _ => {
                return Err(StackError::invalid_shape(
                    format!("{}.{}", key, name),
                    "must be a mapping",
                ))
            }
        };
        out.insert(name, body);
    }
    Ok(out)
}

fn entry_name(section: &str, key: &Value) -> Result<String, StackError> {
    match key {
        Value::Null => Err(StackError::invalid_shape(section, "entry names must not be empty")),
        _ => scalar_string(key)
            .ok_or_else(|| StackError::invalid_shape(section, "entry names must be scalars")),
    }
}

fn is_volume_name(source: &str) -> bool {
    let mut chars = source.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphanumeric() => {
            chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        }
        _ => false,
    }
}
