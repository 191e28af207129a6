use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::error::InventoryError;

/// One entity as delivered by a fetcher. Field order is the source's order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceRecord(Map<String, Value>);

impl SourceRecord {
    pub fn new() -> Self {
        Self(Map::new())
    }

    //builder-style insert, mostly for fixtures and adapters
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for SourceRecord {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl FromIterator<(String, Value)> for SourceRecord {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// What a schema field contributes to. A field may carry several roles at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Host,
    Variable,
    Group,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Host => "host",
            Role::Variable => "variable",
            Role::Group => "group",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = InventoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "host" => Ok(Role::Host),
            "variable" => Ok(Role::Variable),
            "group" => Ok(Role::Group),
            _ => Err(InventoryError::UnknownRole(s.trim().to_string())),
        }
    }
}

/// Per-record output of mapping: the host key, variables in application order
/// and the `(field, group name)` pairs that produce memberships.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HostFact {
    pub host_key: String,
    pub variables: Vec<(String, Value)>,
    pub group_values: Vec<(String, String)>,
}

impl HostFact {
    pub fn new(host_key: impl Into<String>) -> Self {
        Self {
            host_key: host_key.into(),
            ..Self::default()
        }
    }
}

/// Coerces a scalar into a host or group label.
///
/// Null, empty strings and non-scalars (arrays, maps) yield `None`; numbers and
/// booleans use their JSON spelling.
pub fn scalar_label(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}
