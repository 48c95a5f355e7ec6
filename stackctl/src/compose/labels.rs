//! Label normalization

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use tracing::warn;

use crate::errors::StackError;

/// Normalized service labels, in declaration order
pub type Labels = IndexMap<String, String>;

/// How malformed label entries are treated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelPolicy {
    /// Skip entries that are not strings or scalars
    #[default]
    Lenient,

    /// Reject the descriptor when an entry is malformed
    Strict,
}

/// Read a service's labels as a string to string mapping.
///
/// Both the mapping form and the `KEY=VALUE` list form are accepted. A list
/// entry without `=` (or whose only `=` is the first character) becomes a key
/// with an empty value.
pub fn labels(
    service_name: &str,
    service: &Mapping,
    policy: LabelPolicy,
) -> Result<Option<Labels>, StackError> {
    let path = format!("services.{}.labels", service_name);
    match service.get("labels") {
        None | Some(Value::Null) => Ok(None),
        Some(value) => normalize(&path, value, policy).map(Some),
    }
}

/// Normalize a mapping or `KEY=VALUE` list into a string map
pub fn normalize(path: &str, value: &Value, policy: LabelPolicy) -> Result<Labels, StackError> {
    let mut labels = Labels::new();
    match value {
        Value::Mapping(map) => {
            for (key, value) in map {
                match (scalar_string(key), scalar_string(value)) {
                    (Some(key), Some(value)) => {
                        labels.insert(key, value);
                    }
                    _ => skip_or_reject(path, policy, "entries must be scalar key/value pairs")?,
                }
            }
        }
        Value::Sequence(entries) => {
            for entry in entries {
                match entry {
                    Value::String(entry) => {
                        let (key, value) = split_entry(entry);
                        labels.insert(key.to_string(), value.unwrap_or_default().to_string());
                    }
                    _ => skip_or_reject(path, policy, "list entries must be strings")?,
                }
            }
        }
        _ => {
            return Err(StackError::invalid_shape(
                path,
                "must be a mapping or a list of strings",
            ))
        }
    }
    Ok(labels)
}

/// Split `KEY=VALUE`; an `=` at index 0 does not count as a separator
pub fn split_entry(entry: &str) -> (&str, Option<&str>) {
    match entry.find('=') {
        Some(idx) if idx > 0 => (&entry[..idx], Some(&entry[idx + 1..])),
        _ => (entry, None),
    }
}

/// Render labels back into a YAML mapping
pub fn to_value(labels: &Labels) -> Value {
    let mut map = Mapping::new();
    for (key, value) in labels {
        map.insert(Value::String(key.clone()), Value::String(value.clone()));
    }
    Value::Mapping(map)
}

/// String form of a scalar YAML value
pub fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => Some(String::new()),
        _ => None,
    }
}

fn skip_or_reject(path: &str, policy: LabelPolicy, reason: &str) -> Result<(), StackError> {
    match policy {
        LabelPolicy::Lenient => {
            warn!("Skipping malformed entry in {}: {}", path, reason);
            Ok(())
        }
        LabelPolicy::Strict => Err(StackError::invalid_shape(path, reason)),
    }
}
