use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, InventoryError>;

#[derive(Debug, Error)]
pub enum InventoryError {
    /// Invalid engine options, detected before any record is read.
    #[error("configuration error: {reason}")]
    Configuration { reason: String },

    /// A record resolved to an empty, null or absent host identifier.
    #[error("record {record}: host key field `{field}` is missing or empty")]
    MissingHostKey { record: usize, field: String },

    #[error("unknown host `{0}`")]
    UnknownHost(String),

    #[error("unknown group `{0}`")]
    UnknownGroup(String),

    /// Malformed schema entry or a record field that does not fit its declared shape.
    #[error("schema error on field `{field}`: {reason}")]
    Schema { field: String, reason: String },

    #[error("unsupported role `{0}`")]
    UnknownRole(String),

    #[error("{kind} name must not be empty")]
    EmptyName { kind: &'static str },

    #[error("host `{host}`: field `{field}` normalizes to an empty variable key")]
    EmptyVariableKey { host: String, field: String },

    /// Failure while applying one record, with enough context to find it in the input.
    #[error("record {index} (host `{host}`): {source}")]
    Record {
        index: usize,
        host: String,
        #[source]
        source: Box<InventoryError>,
    },

    #[error("transformation produced no hosts")]
    NoHosts,

    #[error("failed to load configuration: {0}")]
    ConfigLoad(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Group name that collides with a key the Ansible inventory document reserves.
    #[error("group name `{0}` is reserved in the Ansible inventory format")]
    ReservedGroupName(String),

    #[error("failed to encode inventory: {0}")]
    Encode(String),
}

impl InventoryError {
    pub fn configuration(reason: impl Into<String>) -> Self {
        InventoryError::Configuration { reason: reason.into() }
    }

    pub fn schema(field: impl Into<String>, reason: impl Into<String>) -> Self {
        InventoryError::Schema {
            field: field.into(),
            reason: reason.into(),
        }
    }

    //unwraps Record context, handy when matching on what actually went wrong
    pub fn root_cause(&self) -> &InventoryError {
        match self {
            InventoryError::Record { source, .. } => source.root_cause(),
            other => other,
        }
    }
}
