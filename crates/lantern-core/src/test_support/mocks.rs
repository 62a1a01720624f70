//! Mock Implementations for Testing
//!
//! - **MockEntityStore**: entities held in a map
//! - **MockIndexStore**: indexes held in memory, with transactional staging,
//!   an operation log, and error injection
//!
//! The mock index store understands a deliberately tiny query grammar:
//! whitespace-separated clauses of the form `term`, `term*`, `key:term`,
//! `key:term*` or `key:*`, OR-ed together. Parentheses and quotes are
//! rejected as malformed. Hits are ordered by the number of matching
//! clauses, then by entity id.
//!
//! # Examples
//!
//! ```rust,ignore
//! use lantern_core::test_support::mocks::MockIndexStore;
//! use lantern_core::{namespace, EntityId, IndexStore, PropertyValue};
//!
//! let store = MockIndexStore::new();
//! let ns = namespace::resolve("User");
//! store.seed(&ns, EntityId(1), "name", PropertyValue::from("Brookreson"));
//!
//! let hits: Vec<_> = store.query(&ns, "name:brook*").unwrap().collect();
//! assert_eq!(hits.len(), 1);
//! ```

use crate::entity::{Entity, EntityId, Properties, PropertyValue};
use crate::error::{IndexError, IndexResult};
use crate::namespace::Namespace;
use crate::store::{EntityStore, IndexConfig, IndexStore, IndexWriter, RawHit, RawHits, WriteMode};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ============================================================================
// Mock Entity Store
// ============================================================================

/// In-memory entity store
#[derive(Debug, Default)]
pub struct MockEntityStore {
    entities: Mutex<HashMap<EntityId, Entity>>,
    property_reads: AtomicUsize,
}

impl MockEntityStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an entity
    pub fn insert(&self, entity: Entity) {
        self.entities.lock().unwrap().insert(entity.id, entity);
    }

    /// Remove an entity
    pub fn remove(&self, entity_id: EntityId) -> Option<Entity> {
        self.entities.lock().unwrap().remove(&entity_id)
    }

    /// Number of `get_properties` calls so far
    pub fn property_reads(&self) -> usize {
        self.property_reads.load(Ordering::SeqCst)
    }
}

impl EntityStore for MockEntityStore {
    fn get_properties(&self, entity_id: EntityId, keys: &[String]) -> IndexResult<Properties> {
        self.property_reads.fetch_add(1, Ordering::SeqCst);
        let entities = self.entities.lock().unwrap();
        let entity = entities
            .get(&entity_id)
            .ok_or(IndexError::EntityNotFound { entity_id })?;
        Ok(entity.select_properties(keys))
    }

    fn get_labels(&self, entity_id: EntityId) -> IndexResult<BTreeSet<String>> {
        let entities = self.entities.lock().unwrap();
        entities
            .get(&entity_id)
            .map(|e| e.labels.clone())
            .ok_or(IndexError::EntityNotFound { entity_id })
    }
}

// ============================================================================
// Mock Index Store
// ============================================================================

/// A mutation observed by [`MockIndexStore`]
#[derive(Debug, Clone, PartialEq)]
pub enum IndexOp {
    Ensure {
        namespace: Namespace,
        config: IndexConfig,
    },
    Remove {
        namespace: Namespace,
        entity_id: EntityId,
    },
    Add {
        namespace: Namespace,
        entity_id: EntityId,
        key: String,
        value: PropertyValue,
    },
}

#[derive(Debug, Clone)]
struct MockIndex {
    config: IndexConfig,
    docs: BTreeMap<EntityId, Properties>,
}

impl MockIndex {
    fn new(config: IndexConfig) -> Self {
        Self {
            config,
            docs: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Default)]
struct MockState {
    indexes: BTreeMap<Namespace, MockIndex>,
    operations: Vec<IndexOp>,
    write_modes: Vec<WriteMode>,
    commits: usize,
    failing_adds: HashSet<Namespace>,
    read_failure: Option<String>,
    queries: Vec<(Namespace, String)>,
}

/// In-memory index store
#[derive(Debug, Default)]
pub struct MockIndexStore {
    state: Mutex<MockState>,
    pulled: Arc<AtomicUsize>,
}

impl MockIndexStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record directly, creating a full-text index if needed
    pub fn seed(
        &self,
        namespace: &Namespace,
        entity_id: EntityId,
        key: &str,
        value: PropertyValue,
    ) {
        let mut state = self.state.lock().unwrap();
        state
            .indexes
            .entry(namespace.clone())
            .or_insert_with(|| MockIndex::new(IndexConfig::FULL_TEXT))
            .docs
            .entry(entity_id)
            .or_default()
            .insert(key.to_string(), value);
    }

    /// Whether an index exists under the namespace
    pub fn has_index(&self, namespace: &Namespace) -> bool {
        self.state.lock().unwrap().indexes.contains_key(namespace)
    }

    /// Records currently indexed for (namespace, entity)
    pub fn records(&self, namespace: &Namespace, entity_id: EntityId) -> Properties {
        self.state
            .lock()
            .unwrap()
            .indexes
            .get(namespace)
            .and_then(|idx| idx.docs.get(&entity_id).cloned())
            .unwrap_or_default()
    }

    /// Every mutation attempted so far, including rolled back ones
    pub fn operations(&self) -> Vec<IndexOp> {
        self.state.lock().unwrap().operations.clone()
    }

    /// Mode of every `write` call so far
    pub fn write_modes(&self) -> Vec<WriteMode> {
        self.state.lock().unwrap().write_modes.clone()
    }

    /// Committed transactions plus auto-committed operations
    pub fn commit_count(&self) -> usize {
        self.state.lock().unwrap().commits
    }

    /// Make every `add_to_index` for the namespace fail
    pub fn fail_adds_for(&self, namespace: &Namespace) {
        self.state
            .lock()
            .unwrap()
            .failing_adds
            .insert(namespace.clone());
    }

    /// Make `exists_index` and `query` fail with the given reason
    pub fn fail_reads(&self, reason: &str) {
        self.state.lock().unwrap().read_failure = Some(reason.to_string());
    }

    /// Number of `query` calls so far
    pub fn query_count(&self) -> usize {
        self.state.lock().unwrap().queries.len()
    }

    /// Arguments of every `query` call so far
    pub fn queries(&self) -> Vec<(Namespace, String)> {
        self.state.lock().unwrap().queries.clone()
    }

    /// Hits handed out by query iterators so far
    pub fn hits_pulled(&self) -> usize {
        self.pulled.load(Ordering::SeqCst)
    }
}

struct MockWriter<'a> {
    indexes: &'a mut BTreeMap<Namespace, MockIndex>,
    operations: &'a mut Vec<IndexOp>,
    failing_adds: &'a HashSet<Namespace>,
    applied: usize,
}

impl IndexWriter for MockWriter<'_> {
    fn ensure_index(&mut self, namespace: &Namespace, config: &IndexConfig) -> IndexResult<()> {
        self.operations.push(IndexOp::Ensure {
            namespace: namespace.clone(),
            config: *config,
        });

        match self.indexes.get(namespace) {
            Some(existing) if existing.config != *config => Err(IndexError::IndexConfigMismatch {
                namespace: namespace.to_string(),
                stored: existing.config.to_string(),
                requested: config.to_string(),
            }),
            Some(_) => Ok(()),
            None => {
                self.indexes.insert(namespace.clone(), MockIndex::new(*config));
                self.applied += 1;
                Ok(())
            }
        }
    }

    fn remove_from_index(&mut self, namespace: &Namespace, entity_id: EntityId) -> IndexResult<()> {
        self.operations.push(IndexOp::Remove {
            namespace: namespace.clone(),
            entity_id,
        });

        if let Some(index) = self.indexes.get_mut(namespace) {
            index.docs.remove(&entity_id);
        }
        self.applied += 1;
        Ok(())
    }

    fn add_to_index(
        &mut self,
        namespace: &Namespace,
        entity_id: EntityId,
        key: &str,
        value: &PropertyValue,
    ) -> IndexResult<()> {
        self.operations.push(IndexOp::Add {
            namespace: namespace.clone(),
            entity_id,
            key: key.to_string(),
            value: value.clone(),
        });

        if self.failing_adds.contains(namespace) {
            return Err(IndexError::unavailable(
                format!("add entity {} to {}", entity_id, namespace),
                "injected failure",
            ));
        }

        self.indexes
            .entry(namespace.clone())
            .or_insert_with(|| MockIndex::new(IndexConfig::FULL_TEXT))
            .docs
            .entry(entity_id)
            .or_default()
            .insert(key.to_string(), value.clone());
        self.applied += 1;
        Ok(())
    }
}

impl IndexStore for MockIndexStore {
    fn exists_index(&self, namespace: &Namespace) -> IndexResult<bool> {
        let state = self.state.lock().unwrap();
        if let Some(reason) = &state.read_failure {
            return Err(IndexError::unavailable(format!("exists {}", namespace), reason));
        }
        Ok(state.indexes.contains_key(namespace))
    }

    fn write(
        &self,
        mode: WriteMode,
        ops: &mut dyn FnMut(&mut dyn IndexWriter) -> IndexResult<()>,
    ) -> IndexResult<()> {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        state.write_modes.push(mode);

        match mode {
            WriteMode::Transactional => {
                let mut staged = state.indexes.clone();
                let mut writer = MockWriter {
                    indexes: &mut staged,
                    operations: &mut state.operations,
                    failing_adds: &state.failing_adds,
                    applied: 0,
                };
                ops(&mut writer)?;

                state.indexes = staged;
                state.commits += 1;
                Ok(())
            }
            WriteMode::AutoCommit => {
                let mut writer = MockWriter {
                    indexes: &mut state.indexes,
                    operations: &mut state.operations,
                    failing_adds: &state.failing_adds,
                    applied: 0,
                };
                let result = ops(&mut writer);
                let applied = writer.applied;

                state.commits += applied;
                result
            }
        }
    }

    fn query(&self, namespace: &Namespace, query: &str) -> IndexResult<RawHits<'_>> {
        let mut state = self.state.lock().unwrap();
        state.queries.push((namespace.clone(), query.to_string()));

        if let Some(reason) = &state.read_failure {
            return Err(IndexError::unavailable(format!("query {}", namespace), reason));
        }

        let clauses = parse_query(namespace, query)?;
        let index = state.indexes.get(namespace).ok_or_else(|| {
            IndexError::unavailable(format!("query {}", namespace), "no such index")
        })?;

        let mut hits: Vec<RawHit> = index
            .docs
            .iter()
            .filter_map(|(id, props)| {
                let score = clauses.iter().filter(|c| c.matches(props)).count();
                (score > 0).then_some(RawHit {
                    entity_id: *id,
                    score: score as f64,
                })
            })
            .collect();
        hits.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.entity_id.cmp(&b.entity_id))
        });

        Ok(Box::new(MockHits {
            hits: hits.into_iter(),
            pulled: Arc::clone(&self.pulled),
        }))
    }
}

struct MockHits {
    hits: std::vec::IntoIter<RawHit>,
    pulled: Arc<AtomicUsize>,
}

impl Iterator for MockHits {
    type Item = IndexResult<RawHit>;

    fn next(&mut self) -> Option<Self::Item> {
        let hit = self.hits.next()?;
        self.pulled.fetch_add(1, Ordering::SeqCst);
        Some(Ok(hit))
    }
}

// ============================================================================
// Mock query grammar
// ============================================================================

#[derive(Debug)]
struct Clause {
    field: Option<String>,
    term: Term,
}

#[derive(Debug)]
enum Term {
    Any,
    Prefix(String),
    Exact(String),
}

impl Clause {
    fn matches(&self, props: &Properties) -> bool {
        match &self.field {
            Some(field) => props.get(field).is_some_and(|v| self.term.matches(v)),
            None => props.values().any(|v| self.term.matches(v)),
        }
    }
}

impl Term {
    fn parse(raw: &str) -> Self {
        if raw == "*" {
            Self::Any
        } else if let Some(prefix) = raw.strip_suffix('*') {
            Self::Prefix(prefix.to_lowercase())
        } else {
            Self::Exact(raw.to_lowercase())
        }
    }

    fn matches(&self, value: &PropertyValue) -> bool {
        let text = value.index_text().to_lowercase();
        let mut tokens = text.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty());
        match self {
            Self::Any => true,
            Self::Prefix(p) => tokens.any(|t| t.starts_with(p.as_str())),
            Self::Exact(e) => tokens.any(|t| t == e),
        }
    }
}

fn parse_query(namespace: &Namespace, query: &str) -> IndexResult<Vec<Clause>> {
    let malformed = |reason: &str| IndexError::malformed_query(namespace.as_str(), query, reason);

    if query.trim().is_empty() {
        return Err(malformed("empty query"));
    }
    if query.contains(&['(', ')', '"'][..]) {
        return Err(malformed("groups and phrases are not supported"));
    }

    query
        .split_whitespace()
        .map(|token| match token.split_once(':') {
            Some((field, term)) if !field.is_empty() && !term.is_empty() => Ok(Clause {
                field: Some(field.to_string()),
                term: Term::parse(term),
            }),
            Some(_) => Err(malformed("incomplete field clause")),
            None => Ok(Clause {
                field: None,
                term: Term::parse(token),
            }),
        })
        .collect()
}
