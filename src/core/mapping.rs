/*
Inputs:

    one SourceRecord

    FieldSchema (field -> roles + optional variable key), in declared order

Outputs:

    HostFact: host key, variables, (field, group) candidates

Rules:

    exactly one field carries the host role

    fields missing from the schema are ignored (allow-list)

    null / empty values never become groups
*/
// schema-driven record mapping
use std::collections::BTreeSet;

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::warn;

use crate::core::error::{InventoryError, Result};
use crate::core::types::{HostFact, Role, SourceRecord, scalar_label};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub roles: BTreeSet<Role>,
    //output variable name; the source field name when absent
    pub variable_key: Option<String>,
}

impl FieldDescriptor {
    pub fn new(roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            roles: roles.into_iter().collect(),
            variable_key: None,
        }
    }

    pub fn with_variable_key(mut self, key: impl Into<String>) -> Self {
        self.variable_key = Some(key.into());
        self
    }

    pub fn has(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

//on-disk shape; CRM schemas spell these `types` / `value`
#[derive(Debug, Deserialize)]
struct RawFieldDescriptor {
    #[serde(alias = "types")]
    roles: Vec<String>,
    #[serde(default, alias = "value")]
    variable_key: Option<String>,
}

/// Declarative field mapping, kept in declared order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "Map<String, Value>")]
pub struct FieldSchema {
    fields: Vec<(String, FieldDescriptor)>,
}

impl FieldSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field, replacing (in place) an earlier descriptor with the same name.
    pub fn field(mut self, name: impl Into<String>, descriptor: FieldDescriptor) -> Self {
        let name = name.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = descriptor,
            None => self.fields.push((name, descriptor)),
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, d)| d)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldDescriptor)> {
        self.fields.iter().map(|(n, d)| (n.as_str(), d))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The single host-role field. Zero or several is a configuration error.
    pub fn host_field(&self) -> Result<&str> {
        let hosts: Vec<&str> = self
            .iter()
            .filter(|(_, d)| d.has(Role::Host))
            .map(|(n, _)| n)
            .collect();

        match hosts.as_slice() {
            [one] => Ok(*one),
            [] => Err(InventoryError::configuration("schema has no field with role `host`")),
            many => Err(InventoryError::configuration(format!(
                "schema marks {} fields with role `host` ({}); exactly one is allowed",
                many.len(),
                many.join(", ")
            ))),
        }
    }

    /// Checks every entry, then the host-field invariant.
    pub fn validate(&self) -> Result<()> {
        for (name, d) in self.iter() {
            if name.is_empty() {
                return Err(InventoryError::schema(name, "field name must not be empty"));
            }
            if d.roles.is_empty() {
                return Err(InventoryError::schema(name, "field declares no roles"));
            }
            if matches!(d.variable_key.as_deref(), Some("")) {
                return Err(InventoryError::schema(name, "variable key override must not be empty"));
            }
        }
        self.host_field().map(|_| ())
    }
}

impl TryFrom<Map<String, Value>> for FieldSchema {
    type Error = InventoryError;

    fn try_from(map: Map<String, Value>) -> Result<Self> {
        let mut schema = FieldSchema::new();
        for (name, entry) in map {
            let raw: RawFieldDescriptor = serde_json::from_value(entry)
                .map_err(|e| InventoryError::schema(&name, e.to_string()))?;

            let mut roles = BTreeSet::new();
            for r in &raw.roles {
                let role = r.parse::<Role>().map_err(|e| InventoryError::schema(&name, e.to_string()))?;
                roles.insert(role);
            }

            schema = schema.field(
                name,
                FieldDescriptor {
                    roles,
                    variable_key: raw.variable_key,
                },
            );
        }
        Ok(schema)
    }
}

/// Maps records through a validated schema.
#[derive(Debug, Clone)]
pub struct SchemaMapper<'a> {
    schema: &'a FieldSchema,
    host_field: &'a str,
}

impl<'a> SchemaMapper<'a> {
    pub fn new(schema: &'a FieldSchema) -> Result<Self> {
        schema.validate()?;
        let host_field = schema.host_field()?;
        Ok(Self { schema, host_field })
    }

    pub fn host_field(&self) -> &str {
        self.host_field
    }

    /// Maps one record. `index` is the record's position in the pass and only
    /// feeds error context.
    pub fn map(&self, index: usize, record: &SourceRecord) -> Result<HostFact> {
        let host_key = record
            .get(self.host_field)
            .and_then(scalar_label)
            .ok_or_else(|| InventoryError::MissingHostKey {
                record: index,
                field: self.host_field.to_string(),
            })?;

        let mut fact = HostFact::new(host_key);

        for (field, d) in self.schema.iter() {
            let Some(value) = record.get(field) else {
                continue;
            };

            if d.has(Role::Variable) {
                let key = d.variable_key.as_deref().unwrap_or(field);
                fact.variables.push((key.to_string(), value.clone()));
            }

            if d.has(Role::Group) {
                if let Some(group) = scalar_label(value) {
                    fact.group_values.push((field.to_string(), group));
                } else if value.is_array() || value.is_object() {
                    warn!(record = index, field, "non-scalar value cannot name a group, skipped");
                }
            }
        }

        Ok(fact)
    }
}
