//! Turns loosely-typed source records into a normalized host/variable/group inventory.
//!
//! Records come from an external fetcher (database rows, device APIs, CRM
//! queries). The [`Engine`] maps each record onto a host, its variables and its
//! group memberships, and hands back one consistent [`Inventory`] snapshot.
//! Registering that snapshot with an orchestration runtime is left to an
//! [`InventorySink`] implementation.

pub mod core;
pub mod mapping;

pub use crate::core::builder::InventoryBuilder;
pub use crate::core::engine::{Engine, transform};
pub use crate::core::error::{InventoryError, Result};
pub use crate::core::export::InventorySink;
pub use crate::core::inventory::{Group, Host, Inventory};
pub use crate::core::mapping::{FieldDescriptor, FieldSchema, SchemaMapper};
pub use crate::core::normalize::{KeyNormalizer, NormalizeOptions, normalize};
pub use crate::core::tags::TagGroupAssigner;
pub use crate::core::types::{HostFact, Role, SourceRecord};
pub use crate::mapping::config::{EngineConfig, NullPolicy};
