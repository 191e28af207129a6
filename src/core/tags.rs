// tag -> group promotion for schema-less records
use std::collections::BTreeSet;

use serde_json::{Map, Value};
use tracing::warn;

use crate::core::types::scalar_label;

/// Promotes the values of designated tags to group names.
///
/// Group names are taken verbatim from the tag values, so callers that own the
/// source data are responsible for them being usable identifiers.
#[derive(Debug, Clone, Copy)]
pub struct TagGroupAssigner<'a> {
    tag_names: &'a [String],
}

impl<'a> TagGroupAssigner<'a> {
    pub fn new(tag_names: &'a [String]) -> Self {
        Self { tag_names }
    }

    /// `(tag, group)` pairs in tag-name order, one per distinct group.
    pub fn matches(&self, variables: &Map<String, Value>) -> Vec<(String, String)> {
        let mut seen = BTreeSet::new();
        let mut out = Vec::new();

        for tag in self.tag_names {
            let Some(value) = variables.get(tag) else {
                continue;
            };
            match scalar_label(value) {
                Some(group) => {
                    if seen.insert(group.clone()) {
                        out.push((tag.clone(), group));
                    }
                }
                None if value.is_array() || value.is_object() => {
                    warn!(tag = tag.as_str(), "non-scalar tag value cannot name a group, skipped");
                }
                None => {}
            }
        }
        out
    }

    /// Group names one host joins.
    pub fn assign(&self, variables: &Map<String, Value>) -> BTreeSet<String> {
        self.matches(variables).into_iter().map(|(_, g)| g).collect()
    }
}
