//! Indexer
//!
//! Replaces an entity's records in the full-text index of every label the
//! entity carries. Re-indexing is idempotent: the records for
//! (namespace, entity) after a call are exactly the requested properties the
//! entity currently defines, whatever was indexed before.

use crate::entity::{EntityId, Properties};
use crate::error::IndexResult;
use crate::namespace;
use crate::store::{EntityStore, IndexConfig, IndexStore, IndexWriter, WriteMode};
use lantern_config::IsolationLevel;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

/// Writes entity properties into per-label full-text indexes
pub struct Indexer<E, I> {
    entities: Arc<E>,
    index: Arc<I>,
    isolation: IsolationLevel,
}

impl<E, I> Clone for Indexer<E, I> {
    fn clone(&self) -> Self {
        Self {
            entities: Arc::clone(&self.entities),
            index: Arc::clone(&self.index),
            isolation: self.isolation,
        }
    }
}

impl<E: EntityStore, I: IndexStore> Indexer<E, I> {
    /// Create an indexer over the given stores
    pub fn new(entities: Arc<E>, index: Arc<I>, isolation: IsolationLevel) -> Self {
        Self {
            entities,
            index,
            isolation,
        }
    }

    /// Transaction grouping used for writes
    pub fn isolation(&self) -> IsolationLevel {
        self.isolation
    }

    /// Index the entity's `property_keys` under every label it carries
    ///
    /// Keys the entity does not define are ignored and duplicate keys are
    /// collapsed. An entity without labels is not an error; nothing is written.
    ///
    /// # Errors
    ///
    /// - `IndexError::EntityNotFound` if the entity does not exist
    /// - any store error, which aborts the remaining labels
    pub fn index<S: AsRef<str>>(
        &self,
        entity_id: EntityId,
        property_keys: &[S],
    ) -> IndexResult<()> {
        let keys: Vec<String> = property_keys
            .iter()
            .map(|k| k.as_ref().to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let properties = self.entities.get_properties(entity_id, &keys)?;
        let labels = self.entities.get_labels(entity_id)?;

        if labels.is_empty() {
            debug!(%entity_id, "Entity has no labels, nothing to index");
            return Ok(());
        }

        debug!(
            %entity_id,
            labels = labels.len(),
            requested = keys.len(),
            found = properties.len(),
            isolation = %self.isolation,
            "Indexing entity"
        );

        match self.isolation {
            IsolationLevel::PerLabel => {
                for label in &labels {
                    self.index.write(WriteMode::Transactional, &mut |writer| {
                        replace_records(writer, label, entity_id, &properties)
                    })?;
                }
            }
            IsolationLevel::PerEntity => {
                self.index.write(WriteMode::Transactional, &mut |writer| {
                    labels.iter().try_for_each(|label| {
                        replace_records(writer, label, entity_id, &properties)
                    })
                })?;
            }
            IsolationLevel::None => {
                for label in &labels {
                    self.index.write(WriteMode::AutoCommit, &mut |writer| {
                        replace_records(writer, label, entity_id, &properties)
                    })?;
                }
            }
        }

        Ok(())
    }
}

/// Swap the entity's records under one label for `properties`
fn replace_records(
    writer: &mut dyn IndexWriter,
    label: &str,
    entity_id: EntityId,
    properties: &Properties,
) -> IndexResult<()> {
    let namespace = namespace::resolve(label);

    writer
        .ensure_index(&namespace, &IndexConfig::FULL_TEXT)
        .map_err(|e| e.with_label(label))?;

    // Drop whatever a previous call indexed so old keys cannot survive
    writer
        .remove_from_index(&namespace, entity_id)
        .map_err(|e| e.with_label(label))?;

    for (key, value) in properties {
        writer
            .add_to_index(&namespace, entity_id, key, value)
            .map_err(|e| e.with_label(label))?;
    }

    debug!(%namespace, %entity_id, records = properties.len(), "Replaced indexed records");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Entity, PropertyValue};
    use crate::error::IndexError;
    use crate::test_support::mocks::{IndexOp, MockEntityStore, MockIndexStore};
    use proptest::prelude::*;

    type MockIndexer = Indexer<MockEntityStore, MockIndexStore>;

    fn setup(
        isolation: IsolationLevel,
    ) -> (Arc<MockEntityStore>, Arc<MockIndexStore>, MockIndexer) {
        let entities = Arc::new(MockEntityStore::new());
        let index = Arc::new(MockIndexStore::new());
        let indexer = Indexer::new(Arc::clone(&entities), Arc::clone(&index), isolation);
        (entities, index, indexer)
    }

    fn brookreson() -> Entity {
        Entity::new(1)
            .with_label("User")
            .with_property("name", "Brookreson")
            .with_property("email", "b@example.com")
            .with_property("age", 41_i64)
    }

    #[test]
    fn test_indexes_requested_properties_under_label() {
        let (entities, index, indexer) = setup(IsolationLevel::PerLabel);
        entities.insert(brookreson());

        indexer.index(EntityId(1), &["name"]).unwrap();

        let records = index.records(&namespace::resolve("User"), EntityId(1));
        assert_eq!(records.len(), 1);
        assert_eq!(records.get("name"), Some(&PropertyValue::from("Brookreson")));
    }

    #[test]
    fn test_missing_entity_fails_without_writes() {
        let (_entities, index, indexer) = setup(IsolationLevel::PerLabel);

        let err = indexer.index(EntityId(99), &["name"]).unwrap_err();

        assert_eq!(err, IndexError::EntityNotFound { entity_id: EntityId(99) });
        assert!(index.operations().is_empty());
    }

    #[test]
    fn test_reindex_supersedes_previous_keys() {
        let (entities, index, indexer) = setup(IsolationLevel::PerLabel);
        entities.insert(brookreson());

        indexer.index(EntityId(1), &["name", "email"]).unwrap();
        indexer.index(EntityId(1), &["age"]).unwrap();

        let records = index.records(&namespace::resolve("User"), EntityId(1));
        assert_eq!(records.len(), 1);
        assert_eq!(records.get("age"), Some(&PropertyValue::Integer(41)));
    }

    #[test]
    fn test_reindex_reflects_current_values() {
        let (entities, index, indexer) = setup(IsolationLevel::PerLabel);
        entities.insert(brookreson());
        indexer.index(EntityId(1), &["name"]).unwrap();

        entities.insert(brookreson().with_property("name", "Whitfield"));
        indexer.index(EntityId(1), &["name"]).unwrap();

        let records = index.records(&namespace::resolve("User"), EntityId(1));
        assert_eq!(records.get("name"), Some(&PropertyValue::from("Whitfield")));
    }

    #[test]
    fn test_duplicate_keys_produce_one_record() {
        let (entities, index, indexer) = setup(IsolationLevel::PerLabel);
        entities.insert(brookreson());

        indexer.index(EntityId(1), &["name", "name", "name"]).unwrap();

        let adds = index
            .operations()
            .into_iter()
            .filter(|op| matches!(op, IndexOp::Add { .. }))
            .count();
        assert_eq!(adds, 1);
    }

    #[test]
    fn test_fans_out_to_every_label() {
        let (entities, index, indexer) = setup(IsolationLevel::PerLabel);
        entities.insert(brookreson().with_label("Admin"));

        indexer.index(EntityId(1), &["name"]).unwrap();

        for label in ["User", "Admin"] {
            let ns = namespace::resolve(label);
            assert!(index.has_index(&ns), "missing index for {}", label);
            assert_eq!(index.records(&ns, EntityId(1)).len(), 1);
        }
    }

    #[test]
    fn test_unlabelled_entity_writes_nothing() {
        let (entities, index, indexer) = setup(IsolationLevel::PerLabel);
        entities.insert(Entity::new(5).with_property("name", "Nobody"));

        indexer.index(EntityId(5), &["name"]).unwrap();

        assert!(index.operations().is_empty());
        assert_eq!(index.commit_count(), 0);
    }

    #[test]
    fn test_labelled_entity_without_requested_keys_still_creates_index() {
        let (entities, index, indexer) = setup(IsolationLevel::PerLabel);
        entities.insert(brookreson());

        indexer.index(EntityId(1), &["ghost"]).unwrap();

        let ns = namespace::resolve("User");
        assert!(index.has_index(&ns));
        assert!(index.records(&ns, EntityId(1)).is_empty());
    }

    #[test]
    fn test_remove_precedes_add_with_full_text_config() {
        let (entities, index, indexer) = setup(IsolationLevel::PerLabel);
        entities.insert(brookreson());

        indexer.index(EntityId(1), &["name"]).unwrap();

        let ns = namespace::resolve("User");
        assert_eq!(
            index.operations(),
            vec![
                IndexOp::Ensure {
                    namespace: ns.clone(),
                    config: IndexConfig::full_text(),
                },
                IndexOp::Remove {
                    namespace: ns.clone(),
                    entity_id: EntityId(1),
                },
                IndexOp::Add {
                    namespace: ns,
                    entity_id: EntityId(1),
                    key: "name".to_string(),
                    value: PropertyValue::from("Brookreson"),
                },
            ]
        );
    }

    #[test]
    fn test_isolation_levels_group_writes() {
        let cases = [
            (IsolationLevel::PerLabel, vec![WriteMode::Transactional, WriteMode::Transactional]),
            (IsolationLevel::PerEntity, vec![WriteMode::Transactional]),
            (IsolationLevel::None, vec![WriteMode::AutoCommit, WriteMode::AutoCommit]),
        ];

        for (isolation, expected) in cases {
            let (entities, index, indexer) = setup(isolation);
            entities.insert(brookreson().with_label("Admin"));

            indexer.index(EntityId(1), &["name"]).unwrap();

            assert_eq!(index.write_modes(), expected, "isolation {}", isolation);
        }
    }

    #[test]
    fn test_failed_label_write_rolls_back_and_aborts() {
        let (entities, index, indexer) = setup(IsolationLevel::PerEntity);
        entities.insert(brookreson().with_label("Admin"));
        index.fail_adds_for(&namespace::resolve("User"));

        let err = indexer.index(EntityId(1), &["name"]).unwrap_err();

        assert!(matches!(
            err,
            IndexError::IndexUnavailable { ref context, .. } if context.contains("User")
        ));
        // Admin sorts first and was written inside the same transaction
        assert!(!index.has_index(&namespace::resolve("Admin")));
        assert_eq!(index.commit_count(), 0);
    }

    #[test]
    fn test_failed_write_keeps_previous_state_per_label() {
        let (entities, index, indexer) = setup(IsolationLevel::PerLabel);
        entities.insert(brookreson());
        indexer.index(EntityId(1), &["name"]).unwrap();

        index.fail_adds_for(&namespace::resolve("User"));
        assert!(indexer.index(EntityId(1), &["email"]).is_err());

        let records = index.records(&namespace::resolve("User"), EntityId(1));
        assert_eq!(records.get("name"), Some(&PropertyValue::from("Brookreson")));
        assert!(records.get("email").is_none());
    }

    proptest! {
        #[test]
        fn reindex_leaves_exactly_second_key_set(
            first in proptest::collection::vec(prop_oneof!["name", "email", "age", "ghost"], 0..5),
            second in proptest::collection::vec(prop_oneof!["name", "email", "age", "ghost"], 0..5),
        ) {
            let (entities, index, indexer) = setup(IsolationLevel::PerLabel);
            let entity = brookreson().with_label("Admin");
            entities.insert(entity.clone());

            indexer.index(EntityId(1), &first).unwrap();
            indexer.index(EntityId(1), &second).unwrap();

            let expected = entity.select_properties(&second);
            for label in ["User", "Admin"] {
                let records = index.records(&namespace::resolve(label), EntityId(1));
                prop_assert_eq!(&records, &expected);
            }
        }
    }
}
