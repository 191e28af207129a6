// inventory accumulator
use std::collections::BTreeMap;

use serde_json::Value;

use crate::core::error::{InventoryError, Result};
use crate::core::inventory::{Group, Host, Inventory};

/// Accumulates hosts, variables and memberships into one consistent inventory.
///
/// Hosts and groups are created explicitly before they are referenced, so the
/// invariants (unique host keys, memberships only between existing entries)
/// hold after every call rather than only at the end. Not meant to be shared
/// between threads; give each source its own builder and merge snapshots.
#[derive(Debug, Clone, Default)]
pub struct InventoryBuilder {
    hosts: BTreeMap<String, Host>,
    groups: BTreeMap<String, Group>,
}

impl InventoryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    //validation helpers
    fn expect_host(&mut self, key: &str) -> Result<&mut Host> {
        self.hosts.get_mut(key).ok_or_else(|| InventoryError::UnknownHost(key.to_string()))
    }

    fn expect_group(&mut self, name: &str) -> Result<&mut Group> {
        self.groups.get_mut(name).ok_or_else(|| InventoryError::UnknownGroup(name.to_string()))
    }

    /// Ensures the host exists. Re-adding keeps its variables and groups.
    pub fn add_host(&mut self, key: &str) -> Result<()> {
        if key.is_empty() {
            return Err(InventoryError::EmptyName { kind: "host" });
        }
        if !self.hosts.contains_key(key) {
            self.hosts.insert(key.to_string(), Host::new(key));
        }
        Ok(())
    }

    /// Upserts one variable; the last write for a key wins.
    pub fn set_variable(&mut self, host: &str, key: &str, value: Value) -> Result<()> {
        let h = self.expect_host(host)?;
        if key.is_empty() {
            return Err(InventoryError::EmptyVariableKey {
                host: host.to_string(),
                field: key.to_string(),
            });
        }
        h.variables.insert(key.to_string(), value);
        Ok(())
    }

    pub fn add_group(&mut self, name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(InventoryError::EmptyName { kind: "group" });
        }
        if !self.groups.contains_key(name) {
            self.groups.insert(name.to_string(), Group::new(name));
        }
        Ok(())
    }

    /// Records `host` as a member of `group`. Idempotent.
    pub fn add_child(&mut self, group: &str, host: &str) -> Result<()> {
        //check both before touching either side of the relation
        self.expect_group(group)?;
        self.expect_host(host)?.groups.insert(group.to_string());
        self.expect_group(group)?.hosts.insert(host.to_string());
        Ok(())
    }

    /// Current state. Does not reset the builder.
    pub fn snapshot(&self) -> Inventory {
        Inventory {
            hosts: self.hosts.clone(),
            groups: self.groups.clone(),
        }
    }

    pub fn into_inventory(self) -> Inventory {
        Inventory {
            hosts: self.hosts,
            groups: self.groups,
        }
    }
}
