// inventory snapshot: hosts, groups and the relations between them
use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Host {
    pub key: String,
    #[serde(default)]
    pub variables: BTreeMap<String, Value>,
    #[serde(default)]
    pub groups: BTreeSet<String>,
}

impl Host {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    pub fn variable(&self, key: &str) -> Option<&Value> {
        self.variables.get(key)
    }

    pub fn in_group(&self, group: &str) -> bool {
        self.groups.contains(group)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
    #[serde(default)]
    pub hosts: BTreeSet<String>,
}

impl Group {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hosts: BTreeSet::new(),
        }
    }
}

/// Result of one transformation pass.
///
/// Host keys are unique, and every group named by a membership exists in
/// `groups`; both sides of the relation are stored so lookups go either way.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Inventory {
    pub(crate) hosts: BTreeMap<String, Host>,
    pub(crate) groups: BTreeMap<String, Group>,
}

impl Inventory {
    pub fn host(&self, key: &str) -> Option<&Host> {
        self.hosts.get(key)
    }

    pub fn group(&self, name: &str) -> Option<&Group> {
        self.groups.get(name)
    }

    pub fn hosts(&self) -> impl Iterator<Item = &Host> {
        self.hosts.values()
    }

    pub fn groups(&self) -> impl Iterator<Item = &Group> {
        self.groups.values()
    }

    pub fn host_count(&self) -> usize {
        self.hosts.len()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty() && self.groups.is_empty()
    }

    pub fn members_of(&self, group: &str) -> Option<&BTreeSet<String>> {
        self.groups.get(group).map(|g| &g.hosts)
    }

    pub fn groups_of(&self, host: &str) -> Option<&BTreeSet<String>> {
        self.hosts.get(host).map(|h| &h.groups)
    }

    //hosts that belong to no group at all
    pub fn ungrouped(&self) -> impl Iterator<Item = &str> {
        self.hosts.values().filter(|h| h.groups.is_empty()).map(|h| h.key.as_str())
    }
}
