// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! In-memory database
//!
//! Collections of records addressed by [`Rid`], schema classes mapped onto
//! collections, and the secondary indexes kept in sync with every write.

use super::indexes::{Index, IndexAlgorithm, IndexDefinition, IndexManager, IndexType};
use super::types::{ClassKind, Entity, Rid, SchemaClass, StorageError};
use super::value::Value;
use crate::exec::stats::QueryStats;
use log::{debug, info};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::Arc;

/// Collection id used for records without a class
pub const DEFAULT_COLLECTION_ID: i32 = 0;

#[derive(Debug)]
struct Collection {
    name: String,
    records: BTreeMap<i64, Entity>,
    next_position: i64,
}

impl Collection {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            records: BTreeMap::new(),
            next_position: 0,
        }
    }
}

#[derive(Debug, Default)]
struct DatabaseState {
    collections: BTreeMap<i32, Collection>,
    collection_names: HashMap<String, i32>,
    classes: HashMap<String, SchemaClass>,
}

impl DatabaseState {
    /// Empty state holding only the `default` collection
    fn new() -> Self {
        let mut state = Self::default();
        state.insert_collection("default");
        state
    }

    fn add_collection(&mut self, name: &str) -> Result<i32, StorageError> {
        if self.collection_names.contains_key(name) {
            return Err(StorageError::CollectionAlreadyExists(name.to_string()));
        }
        Ok(self.insert_collection(name))
    }

    /// Register `name` under the next free id; callers check for duplicates
    fn insert_collection(&mut self, name: &str) -> i32 {
        let id = self
            .collections
            .keys()
            .next_back()
            .map_or(DEFAULT_COLLECTION_ID, |last| last + 1);
        self.collections.insert(id, Collection::new(name));
        self.collection_names.insert(name.to_string(), id);
        id
    }

    fn collection_mut(&mut self, id: i32) -> Result<&mut Collection, StorageError> {
        self.collections
            .get_mut(&id)
            .ok_or_else(|| StorageError::CollectionNotFound(format!("#{}", id)))
    }
}

/// In-memory document/graph database
#[derive(Debug)]
pub struct Database {
    name: String,
    state: RwLock<DatabaseState>,
    indexes: IndexManager,
    stats: QueryStats,
}

impl Database {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: RwLock::new(DatabaseState::new()),
            indexes: IndexManager::new(),
            stats: QueryStats::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Create a class backed by a new collection named after it
    pub fn create_class(&self, name: &str, kind: ClassKind) -> Result<SchemaClass, StorageError> {
        let mut state = self.state.write();
        if state.classes.contains_key(name) {
            return Err(StorageError::ClassAlreadyExists(name.to_string()));
        }
        let collection_ids = if kind == ClassKind::LightweightEdge {
            Vec::new()
        } else {
            vec![state.add_collection(&name.to_lowercase())?]
        };
        let class = SchemaClass {
            name: name.to_string(),
            kind,
            collection_ids,
        };
        state.classes.insert(name.to_string(), class.clone());
        info!("Created class '{}' ({:?})", name, kind);
        Ok(class)
    }

    pub fn class(&self, name: &str) -> Option<SchemaClass> {
        self.state.read().classes.get(name).cloned()
    }

    /// Add an extra collection to an existing class
    pub fn add_collection_to_class(&self, class: &str, collection: &str) -> Result<i32, StorageError> {
        let mut state = self.state.write();
        if !state.classes.contains_key(class) {
            return Err(StorageError::ClassNotFound(class.to_string()));
        }
        let id = state.add_collection(collection)?;
        if let Some(schema) = state.classes.get_mut(class) {
            schema.collection_ids.push(id);
        }
        Ok(id)
    }

    pub fn collection_id(&self, name: &str) -> Option<i32> {
        self.state.read().collection_names.get(name).copied()
    }

    pub fn collection_name(&self, id: i32) -> Option<String> {
        self.state.read().collections.get(&id).map(|c| c.name.clone())
    }

    pub fn collection_ids(&self) -> Vec<i32> {
        self.state.read().collections.keys().copied().collect()
    }

    /// Create an index and fill it from the records already stored
    pub fn create_index(
        &self,
        name: &str,
        definition: IndexDefinition,
        index_type: IndexType,
        algorithm: IndexAlgorithm,
    ) -> Result<Arc<dyn Index>, StorageError> {
        let class = self
            .class(&definition.class_name)
            .ok_or_else(|| StorageError::ClassNotFound(definition.class_name.clone()))?;
        let index = self
            .indexes
            .create_index(name, definition, index_type, algorithm)?;

        let state = self.state.read();
        let mut count = 0usize;
        for id in &class.collection_ids {
            let Some(collection) = state.collections.get(id) else {
                continue;
            };
            for entity in collection.records.values() {
                for key in index.keys_for(&entity.properties)? {
                    index.put(key, entity.rid)?;
                    count += 1;
                }
            }
        }
        debug!("Index '{}' built with {} entries", name, count);
        Ok(index)
    }

    pub fn index(&self, name: &str) -> Option<Arc<dyn Index>> {
        self.indexes.get(name)
    }

    pub fn indexes(&self) -> &IndexManager {
        &self.indexes
    }

    pub fn query_stats(&self) -> &QueryStats {
        &self.stats
    }

    fn collection_for_class(state: &DatabaseState, class: Option<&str>) -> Result<i32, StorageError> {
        let Some(class) = class else {
            return Ok(DEFAULT_COLLECTION_ID);
        };
        let schema = state
            .classes
            .get(class)
            .ok_or_else(|| StorageError::ClassNotFound(class.to_string()))?;
        schema.collection_ids.first().copied().ok_or_else(|| {
            StorageError::InvalidOperation(format!("class '{}' has no records", class))
        })
    }

    /// Store a new record and return it with its assigned identity
    pub fn insert(
        &self,
        class: Option<&str>,
        properties: BTreeMap<String, Value>,
    ) -> Result<Entity, StorageError> {
        let mut state = self.state.write();
        let collection_id = Self::collection_for_class(&state, class)?;
        let collection = state.collection_mut(collection_id)?;
        let rid = Rid::new(collection_id, collection.next_position);
        let entity = Entity {
            rid,
            class: class.map(str::to_string),
            properties,
            version: 1,
        };

        self.indexes.on_record_changed(None, Some(&entity))?;
        collection.next_position += 1;
        collection.records.insert(rid.position, entity.clone());
        Ok(entity)
    }

    pub fn load(&self, rid: Rid) -> Option<Entity> {
        self.state
            .read()
            .collections
            .get(&rid.collection_id)
            .and_then(|c| c.records.get(&rid.position))
            .cloned()
    }

    /// Replace the stored state of an existing record
    pub fn update(&self, mut entity: Entity) -> Result<Entity, StorageError> {
        let mut state = self.state.write();
        let collection = state.collection_mut(entity.rid.collection_id)?;
        let old = collection
            .records
            .get(&entity.rid.position)
            .ok_or(StorageError::RecordNotFound(entity.rid))?;
        entity.version = old.version + 1;
        self.indexes.on_record_changed(Some(old), Some(&entity))?;
        collection.records.insert(entity.rid.position, entity.clone());
        Ok(entity)
    }

    pub fn delete(&self, rid: Rid) -> Result<bool, StorageError> {
        let mut state = self.state.write();
        let collection = state.collection_mut(rid.collection_id)?;
        let Some(old) = collection.records.remove(&rid.position) else {
            return Ok(false);
        };
        self.indexes.on_record_changed(Some(&old), None)?;
        Ok(true)
    }

    /// The record following `after` in position order, for lazy scans
    pub fn next_record(
        &self,
        collection_id: i32,
        after: Option<i64>,
        ascending: bool,
    ) -> Result<Option<Entity>, StorageError> {
        let state = self.state.read();
        let collection = state
            .collections
            .get(&collection_id)
            .ok_or_else(|| StorageError::CollectionNotFound(format!("#{}", collection_id)))?;
        let next = match (ascending, after) {
            (true, None) => collection.records.values().next(),
            (true, Some(pos)) => collection
                .records
                .range((Bound::Excluded(pos), Bound::Unbounded))
                .map(|(_, e)| e)
                .next(),
            (false, None) => collection.records.values().next_back(),
            (false, Some(pos)) => collection
                .records
                .range((Bound::Unbounded, Bound::Excluded(pos)))
                .map(|(_, e)| e)
                .next_back(),
        };
        Ok(next.cloned())
    }

    pub fn count(&self, collection_id: i32) -> usize {
        self.state
            .read()
            .collections
            .get(&collection_id)
            .map_or(0, |c| c.records.len())
    }
}
