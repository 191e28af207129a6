// output consumers: replaying a snapshot into another inventory, Ansible JSON, TOON
use std::collections::BTreeSet;

use serde_json::{Map, Value, json};

use crate::core::builder::InventoryBuilder;
use crate::core::error::{InventoryError, Result};
use crate::core::inventory::Inventory;

/// Registration API of a downstream inventory (an orchestration runtime's live
/// inventory object, another builder, ...).
pub trait InventorySink {
    type Error;

    fn add_host(&mut self, host: &str) -> std::result::Result<(), Self::Error>;
    fn set_variable(&mut self, host: &str, key: &str, value: &Value) -> std::result::Result<(), Self::Error>;
    fn add_group(&mut self, group: &str) -> std::result::Result<(), Self::Error>;
    fn add_child(&mut self, group: &str, host: &str) -> std::result::Result<(), Self::Error>;
}

impl InventorySink for InventoryBuilder {
    type Error = InventoryError;

    fn add_host(&mut self, host: &str) -> Result<()> {
        InventoryBuilder::add_host(self, host)
    }

    fn set_variable(&mut self, host: &str, key: &str, value: &Value) -> Result<()> {
        InventoryBuilder::set_variable(self, host, key, value.clone())
    }

    fn add_group(&mut self, group: &str) -> Result<()> {
        InventoryBuilder::add_group(self, group)
    }

    fn add_child(&mut self, group: &str, host: &str) -> Result<()> {
        InventoryBuilder::add_child(self, group, host)
    }
}

const META_KEY: &str = "_meta";
const UNGROUPED: &str = "ungrouped";

impl Inventory {
    /// Replays the snapshot into `sink`: hosts with their variables, then
    /// groups, then memberships, each in key order.
    pub fn register_into<S: InventorySink>(&self, sink: &mut S) -> std::result::Result<(), S::Error> {
        for host in self.hosts.values() {
            sink.add_host(&host.key)?;
            for (k, v) in &host.variables {
                sink.set_variable(&host.key, k, v)?;
            }
        }
        for group in self.groups.values() {
            sink.add_group(&group.name)?;
        }
        //both sides, so a one-sided relation surfaces as an error instead of vanishing
        for group in self.groups.values() {
            for host in &group.hosts {
                sink.add_child(&group.name, host)?;
            }
        }
        for host in self.hosts.values() {
            for group in &host.groups {
                sink.add_child(group, &host.key)?;
            }
        }
        Ok(())
    }

    /// Dynamic-inventory JSON as consumed by Ansible (`--list` output).
    ///
    /// A group literally named `ungrouped` also receives the hosts that belong
    /// to no group; a group named `_meta` cannot be represented and is an error.
    pub fn to_ansible_json(&self) -> Result<Value> {
        if self.groups.contains_key(META_KEY) {
            return Err(InventoryError::ReservedGroupName(META_KEY.to_string()));
        }

        let hostvars: Map<String, Value> = self
            .hosts
            .values()
            .map(|h| {
                let vars: Map<String, Value> = h.variables.clone().into_iter().collect();
                (h.key.clone(), Value::Object(vars))
            })
            .collect();

        let mut doc = Map::new();
        doc.insert(META_KEY.to_string(), json!({ "hostvars": hostvars }));

        let mut children: Vec<&str> = Vec::new();
        for group in self.groups.values() {
            if group.name == "all" {
                continue;
            }
            doc.insert(group.name.clone(), json!({ "hosts": group.hosts }));
            children.push(&group.name);
        }

        let mut ungrouped: BTreeSet<&str> = self.ungrouped().collect();
        match self.groups.get(UNGROUPED) {
            //already emitted above, widen it with the hostless hosts
            Some(g) => {
                ungrouped.extend(g.hosts.iter().map(String::as_str));
                doc.insert(UNGROUPED.to_string(), json!({ "hosts": ungrouped }));
            }
            None if !ungrouped.is_empty() => {
                doc.insert(UNGROUPED.to_string(), json!({ "hosts": ungrouped }));
                children.push(UNGROUPED);
            }
            None => {}
        }

        let mut all = json!({ "children": children });
        if let Some(g) = self.groups.get("all") {
            all["hosts"] = json!(g.hosts);
        }
        doc.insert("all".to_string(), all);

        Ok(Value::Object(doc))
    }

    pub fn to_toon(&self) -> Result<String> {
        toon_format::encode_default(self).map_err(|e| InventoryError::Encode(e.to_string()))
    }

    /// Decodes a snapshot and rebuilds it, so a hand-edited file with a
    /// dangling membership is rejected rather than trusted.
    pub fn from_toon(input: &str) -> Result<Inventory> {
        let raw: Inventory =
            toon_format::decode_default(input).map_err(|e| InventoryError::ConfigLoad(e.to_string()))?;
        let mut builder = InventoryBuilder::new();
        raw.register_into(&mut builder)?;
        Ok(builder.into_inventory())
    }
}
