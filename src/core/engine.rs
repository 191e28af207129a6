// record -> (host, variables, groups) orchestration
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::core::builder::InventoryBuilder;
use crate::core::error::{InventoryError, Result};
use crate::core::inventory::Inventory;
use crate::core::mapping::SchemaMapper;
use crate::core::normalize::KeyNormalizer;
use crate::core::tags::TagGroupAssigner;
use crate::core::types::{HostFact, SourceRecord, scalar_label};
use crate::mapping::config::{EngineConfig, NullPolicy};

/// Runs transformation passes for one validated configuration.
#[derive(Debug, Clone)]
pub struct Engine {
    config: EngineConfig,
    normalizer: KeyNormalizer,
}

impl Engine {
    /// Validates `config` up front so a bad schema fails before any record is read.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let normalizer = KeyNormalizer::new(&config.key_normalization)?;
        Ok(Self { config, normalizer })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// One full pass over `records` into a fresh inventory.
    ///
    /// Either every record is applied or the call fails; a failing record
    /// aborts the pass and nothing is returned.
    pub fn transform<I>(&self, records: I) -> Result<Inventory>
    where
        I: IntoIterator<Item = SourceRecord>,
    {
        let mut builder = InventoryBuilder::new();
        let count = self.run_pass(records, &mut builder)?;
        let inventory = builder.into_inventory();

        if self.config.require_hosts && inventory.host_count() == 0 {
            return Err(InventoryError::NoHosts);
        }

        info!(
            records = count,
            hosts = inventory.host_count(),
            groups = inventory.group_count(),
            "inventory transformation complete"
        );
        Ok(inventory)
    }

    /// Runs a pass against an existing builder.
    ///
    /// The pass is staged separately and merged only on success, so a failure
    /// leaves `target` exactly as it was.
    pub fn transform_into<I>(&self, records: I, target: &mut InventoryBuilder) -> Result<()>
    where
        I: IntoIterator<Item = SourceRecord>,
    {
        let staged = self.transform(records)?;
        staged.register_into(target)
    }

    fn run_pass<I>(&self, records: I, builder: &mut InventoryBuilder) -> Result<usize>
    where
        I: IntoIterator<Item = SourceRecord>,
    {
        //built once per pass, the schema was validated in new()
        let mapper = self.config.schema.as_ref().map(SchemaMapper::new).transpose()?;
        let assigner = TagGroupAssigner::new(&self.config.group_tag_names);

        let mut count = 0;
        for (index, record) in records.into_iter().enumerate() {
            let fact = match &mapper {
                Some(m) => m.map(index, &record),
                None => self.fact_from_tags(index, &record, assigner),
            };

            let applied = fact.and_then(|fact| {
                let host = fact.host_key.clone();
                self.apply(fact, builder).map_err(|source| InventoryError::Record {
                    index,
                    host,
                    source: Box::new(source),
                })
            });

            if let Err(err) = applied {
                warn!(record = index, error = %err, "aborting inventory pass");
                return Err(err);
            }
            count += 1;
        }
        Ok(count)
    }

    //schema-less path: host from host_key_field, variables from the record or its tags map
    fn fact_from_tags(
        &self,
        index: usize,
        record: &SourceRecord,
        assigner: TagGroupAssigner<'_>,
    ) -> Result<HostFact> {
        //validate() guarantees presence
        let host_field = self.config.host_key_field.as_deref().unwrap_or_default();

        let host_key = record
            .get(host_field)
            .and_then(scalar_label)
            .ok_or_else(|| InventoryError::MissingHostKey {
                record: index,
                field: host_field.to_string(),
            })?;

        //from here on the host is known, so failures carry it
        let variables = self
            .tag_variables(record, host_field)
            .map_err(|source| InventoryError::Record {
                index,
                host: host_key.clone(),
                source: Box::new(source),
            })?;

        Ok(HostFact {
            group_values: assigner.matches(&variables),
            variables: variables.into_iter().collect(),
            host_key,
        })
    }

    fn tag_variables(&self, record: &SourceRecord, host_field: &str) -> Result<Map<String, Value>> {
        match self.config.tags_field.as_deref() {
            Some(tags) => match record.get(tags) {
                None | Some(Value::Null) => Ok(Map::new()),
                Some(Value::Object(map)) => Ok(map.clone()),
                Some(other) => Err(InventoryError::schema(
                    tags,
                    format!("expected a map of tags, found `{other}`"),
                )),
            },
            None => Ok(record
                .iter()
                .filter(|(k, _)| self.config.include_host_field || k.as_str() != host_field)
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()),
        }
    }

    //addHost, then variables, then groups + memberships
    fn apply(&self, fact: HostFact, builder: &mut InventoryBuilder) -> Result<()> {
        let normalize_keys = (self.config.schema.is_none() || self.config.normalize_schema_keys)
            && !self.normalizer.is_identity();

        builder.add_host(&fact.host_key)?;

        let mut variable_count = 0;
        for (field, value) in fact.variables {
            if value.is_null() && self.config.null_variables == NullPolicy::Skip {
                continue;
            }
            let key = if normalize_keys { self.normalizer.normalize(&field) } else { field.clone() };
            if key.is_empty() {
                return Err(InventoryError::EmptyVariableKey {
                    host: fact.host_key.clone(),
                    field,
                });
            }
            builder.set_variable(&fact.host_key, &key, value)?;
            variable_count += 1;
        }

        for (_, group) in &fact.group_values {
            builder.add_group(group)?;
            builder.add_child(group, &fact.host_key)?;
        }

        debug!(
            host = %fact.host_key,
            variables = variable_count,
            groups = fact.group_values.len(),
            "mapped record"
        );
        Ok(())
    }
}

/// One-shot convenience: validate `config` and run a single pass.
pub fn transform<I>(records: I, config: &EngineConfig) -> Result<Inventory>
where
    I: IntoIterator<Item = SourceRecord>,
{
    Engine::new(config.clone())?.transform(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::mapping::{FieldDescriptor, FieldSchema};
    use crate::core::normalize::NormalizeOptions;
    use crate::core::types::Role;
    use proptest::prelude::*;
    use serde_json::json;

    fn mk_record(pairs: &[(&str, Value)]) -> SourceRecord {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    fn tag_config(tags: &[&str]) -> EngineConfig {
        EngineConfig::with_host_key_field("host").group_tags(tags.iter().copied())
    }

    fn crm_schema() -> FieldSchema {
        FieldSchema::new()
            .field("Name", FieldDescriptor::new([Role::Host, Role::Variable]).with_variable_key("name"))
            .field("Site__c", FieldDescriptor::new([Role::Variable, Role::Group]).with_variable_key("site"))
            .field("Tier__c", FieldDescriptor::new([Role::Group]))
    }

    #[test]
    fn scenario_a_tags_become_variables_and_groups() {
        let records = vec![mk_record(&[
            ("host", json!("h1")),
            ("env", json!("prod")),
            ("role", json!("web")),
        ])];

        let inv = transform(records, &tag_config(&["env", "role"])).unwrap();

        let h1 = inv.host("h1").unwrap();
        assert_eq!(h1.variables.len(), 2);
        assert_eq!(h1.variable("env"), Some(&json!("prod")));
        assert_eq!(h1.variable("role"), Some(&json!("web")));
        assert_eq!(inv.group_count(), 2);
        assert!(inv.members_of("prod").unwrap().contains("h1"));
        assert!(inv.members_of("web").unwrap().contains("h1"));
    }

    #[test]
    fn scenario_b_empty_tag_is_a_variable_but_not_a_group() {
        let records = vec![mk_record(&[("host", json!("h1")), ("env", json!(""))])];

        let inv = transform(records, &tag_config(&["env"])).unwrap();

        assert_eq!(inv.host("h1").unwrap().variable("env"), Some(&json!("")));
        assert_eq!(inv.group_count(), 0);
        assert!(inv.group("").is_none());
    }

    #[test]
    fn scenario_c_no_records_is_an_empty_inventory() {
        let inv = transform(Vec::new(), &tag_config(&["env"])).unwrap();
        assert_eq!(inv.host_count(), 0);
        assert_eq!(inv.group_count(), 0);
    }

    #[test]
    fn scenario_d_missing_host_field_aborts_the_pass() {
        let records = vec![
            mk_record(&[("host", json!("h1")), ("env", json!("prod"))]),
            mk_record(&[("name", json!("h2")), ("env", json!("dev"))]),
        ];

        match transform(records, &tag_config(&["env"])).unwrap_err() {
            InventoryError::MissingHostKey { record, field } => {
                assert_eq!(record, 1);
                assert_eq!(field, "host");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn later_records_overwrite_earlier_values() {
        let records = vec![
            mk_record(&[("host", json!("h1")), ("env", json!("dev"))]),
            mk_record(&[("host", json!("h1")), ("env", json!("prod"))]),
        ];

        let inv = transform(records, &tag_config(&[])).unwrap();

        assert_eq!(inv.host_count(), 1);
        assert_eq!(inv.host("h1").unwrap().variable("env"), Some(&json!("prod")));
    }

    #[test]
    fn device_records_are_normalized_but_groups_use_raw_tag_names() {
        let config = EngineConfig::with_host_key_field("DeviceName")
            .group_tags(["DeviceType"])
            .normalization(NormalizeOptions {
                lowercase: true,
                drop_prefix: true,
                ..NormalizeOptions::default()
            });
        let config = EngineConfig {
            include_host_field: true,
            ..config
        };
        let records = vec![mk_record(&[
            ("DeviceName", json!("sw01")),
            ("DeviceType", json!("Switch")),
            ("DeviceIPDotted", json!("10.1.1.1")),
        ])];

        let inv = transform(records, &config).unwrap();
        let sw = inv.host("sw01").unwrap();

        assert_eq!(sw.variable("name"), Some(&json!("sw01")));
        assert_eq!(sw.variable("type"), Some(&json!("Switch")));
        assert_eq!(sw.variable("ipdotted"), Some(&json!("10.1.1.1")));
        assert!(sw.in_group("Switch"));
    }

    #[test]
    fn key_collapsing_to_empty_aborts_with_context() {
        let config = EngineConfig::with_host_key_field("host").normalization(NormalizeOptions {
            drop_prefix: true,
            ..NormalizeOptions::default()
        });
        let records = vec![mk_record(&[("host", json!("h1")), ("Device", json!("x"))])];

        let err = transform(records, &config).unwrap_err();

        match &err {
            InventoryError::Record { index, host, .. } => {
                assert_eq!(*index, 0);
                assert_eq!(host, "h1");
            }
            other => panic!("unexpected error: {}", other),
        }
        assert!(matches!(err.root_cause(), InventoryError::EmptyVariableKey { field, .. } if field == "Device"));
    }

    #[test]
    fn tags_field_reads_nested_map() {
        let config = EngineConfig {
            tags_field: Some("tags".into()),
            ..tag_config(&["env"])
        };
        let records = vec![
            mk_record(&[("host", json!("db1")), ("tags", json!({"env": "prod", "disk": 500}))]),
            mk_record(&[("host", json!("db2")), ("tags", Value::Null)]),
        ];

        let inv = transform(records, &config).unwrap();

        let db1 = inv.host("db1").unwrap();
        assert_eq!(db1.variables.len(), 2);
        assert_eq!(db1.variable("disk"), Some(&json!(500)));
        assert!(db1.in_group("prod"));
        assert!(inv.host("db2").unwrap().variables.is_empty());
    }

    #[test]
    fn non_map_tags_field_is_a_schema_error_with_record_context() {
        let config = EngineConfig {
            tags_field: Some("tags".into()),
            ..tag_config(&[])
        };
        let records = vec![
            mk_record(&[("host", json!("db1")), ("tags", json!({"env": "prod"}))]),
            mk_record(&[("host", json!("h9")), ("tags", json!(5))]),
        ];

        let err = transform(records, &config).unwrap_err();

        match &err {
            InventoryError::Record { index, host, .. } => {
                assert_eq!(*index, 1);
                assert_eq!(host, "h9");
            }
            other => panic!("unexpected error: {}", other),
        }
        assert!(matches!(err.root_cause(), InventoryError::Schema { field, .. } if field == "tags"));
    }

    #[test]
    fn null_policy_controls_null_variables() {
        let records = || vec![mk_record(&[("host", json!("h1")), ("owner", Value::Null)])];

        let kept = transform(records(), &tag_config(&[])).unwrap();
        assert_eq!(kept.host("h1").unwrap().variable("owner"), Some(&Value::Null));

        let config = EngineConfig {
            null_variables: NullPolicy::Skip,
            ..tag_config(&[])
        };
        let skipped = transform(records(), &config).unwrap();
        assert!(skipped.host("h1").unwrap().variable("owner").is_none());
    }

    #[test]
    fn schema_path_maps_roles_and_skips_normalization_by_default() {
        let config = EngineConfig::with_schema(crm_schema()).normalization(NormalizeOptions {
            lowercase: true,
            ..NormalizeOptions::default()
        });
        let records = vec![
            mk_record(&[
                ("Name", json!("acme-fw1")),
                ("Site__c", json!("LON")),
                ("Tier__c", json!("")),
                ("Notes", json!("ignored")),
            ]),
            mk_record(&[("Name", json!("acme-fw2")), ("Site__c", json!("LON")), ("Tier__c", json!("edge"))]),
        ];

        let inv = transform(records, &config).unwrap();

        let fw1 = inv.host("acme-fw1").unwrap();
        assert_eq!(fw1.variable("name"), Some(&json!("acme-fw1")));
        assert_eq!(fw1.variable("site"), Some(&json!("LON")));
        assert!(fw1.variable("Notes").is_none());
        assert_eq!(fw1.groups.iter().collect::<Vec<_>>(), vec!["LON"]);

        assert_eq!(inv.members_of("LON").unwrap().len(), 2);
        assert!(inv.members_of("edge").unwrap().contains("acme-fw2"));
    }

    #[test]
    fn schema_keys_are_normalized_when_asked() {
        let schema = FieldSchema::new()
            .field("DeviceName", FieldDescriptor::new([Role::Host, Role::Variable]))
            .field("DeviceModel", FieldDescriptor::new([Role::Variable]));
        let config = EngineConfig {
            normalize_schema_keys: true,
            ..EngineConfig::with_schema(schema).normalization(NormalizeOptions {
                drop_prefix: true,
                ..NormalizeOptions::default()
            })
        };
        let records = vec![mk_record(&[("DeviceName", json!("r1")), ("DeviceModel", json!("ISR"))])];

        let inv = transform(records, &config).unwrap();

        assert_eq!(inv.host("r1").unwrap().variable("Model"), Some(&json!("ISR")));
        assert_eq!(inv.host("r1").unwrap().variable("Name"), Some(&json!("r1")));
    }

    #[test]
    fn host_role_invariant_is_checked_before_records() {
        let none = FieldSchema::new().field("a", FieldDescriptor::new([Role::Variable]));
        let two = FieldSchema::new()
            .field("a", FieldDescriptor::new([Role::Host]))
            .field("b", FieldDescriptor::new([Role::Host]));

        for schema in [none, two] {
            let err = Engine::new(EngineConfig::with_schema(schema)).unwrap_err();
            assert!(matches!(err, InventoryError::Configuration { .. }));
        }
    }

    #[test]
    fn require_hosts_rejects_empty_passes() {
        let config = EngineConfig {
            require_hosts: true,
            ..tag_config(&[])
        };
        assert!(matches!(transform(Vec::new(), &config).unwrap_err(), InventoryError::NoHosts));
    }

    #[test]
    fn transform_into_grows_target_and_leaves_it_untouched_on_failure() {
        let engine = Engine::new(tag_config(&["env"])).unwrap();
        let mut target = InventoryBuilder::new();

        engine
            .transform_into(vec![mk_record(&[("host", json!("h1")), ("env", json!("prod"))])], &mut target)
            .unwrap();
        let before = target.snapshot();

        let bad = vec![
            mk_record(&[("host", json!("h2")), ("env", json!("dev"))]),
            mk_record(&[("env", json!("dev"))]),
        ];
        assert!(engine.transform_into(bad, &mut target).is_err());
        assert_eq!(target.snapshot(), before);

        engine
            .transform_into(vec![mk_record(&[("host", json!("h3")), ("env", json!("prod"))])], &mut target)
            .unwrap();
        let after = target.snapshot();
        assert_eq!(after.host_count(), 2);
        assert_eq!(after.members_of("prod").unwrap().len(), 2);
    }

    fn arb_records() -> impl Strategy<Value = Vec<SourceRecord>> {
        let record = ("[a-c]", prop::option::of("[a-z]{0,3}"), prop::option::of("[a-z]{0,3}")).prop_map(
            |(host, env, role)| {
                let mut r = SourceRecord::new().with("host", host);
                if let Some(e) = env {
                    r = r.with("env", e);
                }
                if let Some(ro) = role {
                    r = r.with("role", ro);
                }
                r
            },
        );
        prop::collection::vec(record, 0..12)
    }

    proptest! {
        #[test]
        fn repeated_transforms_are_identical(records in arb_records()) {
            let config = tag_config(&["env", "role"]);
            let first = transform(records.clone(), &config).unwrap();
            let second = transform(records, &config).unwrap();

            prop_assert_eq!(&first, &second);
            prop_assert_eq!(first.to_toon().unwrap(), second.to_toon().unwrap());
        }

        #[test]
        fn memberships_only_reference_existing_entries(records in arb_records()) {
            let inv = transform(records, &tag_config(&["env", "role"])).unwrap();

            for group in inv.groups() {
                prop_assert!(!group.name.is_empty());
                for host in &group.hosts {
                    prop_assert!(inv.host(host).unwrap().in_group(&group.name));
                }
            }
            for host in inv.hosts() {
                for g in &host.groups {
                    prop_assert!(inv.group(g).is_some());
                }
            }
        }
    }
}
