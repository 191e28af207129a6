/*
Inputs:

    inventory.toon (engine options + optional field schema)

    environment fallbacks for the options a deployment usually injects

Outputs:

    EngineConfig, validated by Engine::new before any record is read
*/
use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::core::error::{InventoryError, Result};
use crate::core::mapping::FieldSchema;
use crate::core::normalize::{KeyNormalizer, NormalizeOptions};

pub const ENV_HOST_KEY_FIELD: &str = "INVENTORY_HOST_KEY_FIELD";
pub const ENV_GROUP_TAGS: &str = "INVENTORY_GROUP_TAGS";

const CONFIG_SUFFIX: &str = "inventory.toon";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NullPolicy {
    #[default]
    Keep,
    Skip,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Schema-driven mapping. When absent, records go through the tag path.
    pub schema: Option<FieldSchema>,
    /// Tags whose values become groups (tag path only).
    #[serde(alias = "groups", alias = "groupTagNames")]
    pub group_tag_names: Vec<String>,
    #[serde(flatten)]
    pub key_normalization: NormalizeOptions,
    /// Host-identifying record field (tag path only).
    #[serde(alias = "hostKeyField")]
    pub host_key_field: Option<String>,
    /// Nested map holding the variables, e.g. a `tags` column.
    #[serde(alias = "tagsField")]
    pub tags_field: Option<String>,
    /// Keep the host field as a variable too (tag path, no `tags_field`).
    pub include_host_field: bool,
    pub null_variables: NullPolicy,
    /// Apply key normalization to schema-derived variable names as well.
    pub normalize_schema_keys: bool,
    /// Fail a pass that yields no hosts instead of returning an empty inventory.
    pub require_hosts: bool,
}

impl EngineConfig {
    pub fn with_schema(schema: FieldSchema) -> Self {
        Self {
            schema: Some(schema),
            ..Self::default()
        }
    }

    pub fn with_host_key_field(field: impl Into<String>) -> Self {
        Self {
            host_key_field: Some(field.into()),
            ..Self::default()
        }
    }

    pub fn group_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.group_tag_names = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn normalization(mut self, options: NormalizeOptions) -> Self {
        self.key_normalization = options;
        self
    }

    /// Parses a TOON document. The `schema` section is decoded on its own so a
    /// bad field entry reports the field it belongs to.
    pub fn from_toon_str(input: &str) -> Result<Self> {
        let mut doc = toon_format::decode_default::<Map<String, Value>>(input)
            .map_err(|e| InventoryError::ConfigLoad(e.to_string()))?;
        let schema = doc.remove("schema");

        let mut config: EngineConfig = serde_json::from_value(Value::Object(doc))
            .map_err(|e| InventoryError::ConfigLoad(e.to_string()))?;
        config.schema = match schema {
            None | Some(Value::Null) => None,
            Some(Value::Object(fields)) => Some(FieldSchema::try_from(fields)?),
            Some(other) => {
                return Err(InventoryError::schema(
                    "schema",
                    format!("expected a map of fields, found `{other}`"),
                ));
            }
        };
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| InventoryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toon_str(&text)
    }

    /// Fills unset options from `lookup`. Values already present always win.
    pub fn fill_defaults_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.host_key_field.is_none() {
            self.host_key_field = lookup(ENV_HOST_KEY_FIELD)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty());
        }
        if self.group_tag_names.is_empty() {
            if let Some(raw) = lookup(ENV_GROUP_TAGS) {
                self.group_tag_names = raw
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect();
            }
        }
        self
    }

    pub fn with_env_defaults(self) -> Self {
        self.fill_defaults_from(|k| std::env::var(k).ok())
    }

    /// Options the engine needs before it can run, independent of any record.
    pub fn validate(&self) -> Result<()> {
        KeyNormalizer::new(&self.key_normalization)?;
        match &self.schema {
            Some(schema) => schema.validate(),
            None => match self.host_key_field.as_deref() {
                Some(f) if !f.trim().is_empty() => Ok(()),
                _ => Err(InventoryError::configuration(
                    "`host_key_field` is required when no schema is given",
                )),
            },
        }
    }
}

/// Whether `path` names a file this crate's configuration loader is meant for.
pub fn is_config_path(path: impl AsRef<Path>) -> bool {
    path.as_ref()
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(CONFIG_SUFFIX))
}
