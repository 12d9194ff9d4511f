// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Index manager
//!
//! Owns every secondary index of a database and keeps them in sync with
//! record writes.

use log::{debug, info};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use super::hash::HashIndex;
use super::ordered::OrderedIndex;
use super::traits::Index;
use super::{IndexAlgorithm, IndexDefinition, IndexError, IndexType};
use crate::storage::types::Entity;

/// Manager for all indexes in the system
#[derive(Debug, Default)]
pub struct IndexManager {
    indexes: RwLock<HashMap<String, Arc<dyn Index>>>,
}

impl IndexManager {
    /// Create a new index manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new, empty index
    pub fn create_index(
        &self,
        name: &str,
        definition: IndexDefinition,
        index_type: IndexType,
        algorithm: IndexAlgorithm,
    ) -> Result<Arc<dyn Index>, IndexError> {
        info!("Creating index '{}' on {}", name, definition);

        let mut indexes = self.indexes.write();
        if indexes.contains_key(name) {
            return Err(IndexError::AlreadyExists(name.to_string()));
        }

        let index: Arc<dyn Index> = match (algorithm, index_type) {
            (IndexAlgorithm::BTree, IndexType::FullText) => {
                return Err(IndexError::config("full-text indexes use the HASH algorithm"))
            }
            (IndexAlgorithm::BTree, _) => Arc::new(OrderedIndex::new(name, definition, index_type)),
            (IndexAlgorithm::Hash, _) => Arc::new(HashIndex::new(name, definition, index_type)),
            (IndexAlgorithm::Lucene, _) => {
                return Err(IndexError::config("the LUCENE engine is not embedded"))
            }
        };
        indexes.insert(name.to_string(), Arc::clone(&index));

        debug!("Index '{}' created successfully", name);
        Ok(index)
    }

    /// Delete an index
    pub fn drop_index(&self, name: &str) -> Result<(), IndexError> {
        info!("Deleting index '{}'", name);
        self.indexes
            .write()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| IndexError::NotFound(name.to_string()))
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Index>> {
        self.indexes.read().get(name).cloned()
    }

    /// List all index names
    pub fn list_indexes(&self) -> Vec<String> {
        let mut names: Vec<String> = self.indexes.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn indexes_for_class(&self, class: &str) -> Vec<Arc<dyn Index>> {
        self.indexes
            .read()
            .values()
            .filter(|index| index.definition().class_name == class)
            .cloned()
            .collect()
    }

    /// Move index entries from the old state of a record to the new one.
    ///
    /// Unique violations are detected before any index is touched.
    pub fn on_record_changed(
        &self,
        old: Option<&Entity>,
        new: Option<&Entity>,
    ) -> Result<(), IndexError> {
        let Some(class) = new.or(old).and_then(|e| e.class.as_deref()) else {
            return Ok(());
        };

        let mut changes = Vec::new();
        for index in self.indexes_for_class(class) {
            let old_keys = match old {
                Some(entity) => index.keys_for(&entity.properties)?,
                None => Vec::new(),
            };
            let new_keys = match new {
                Some(entity) => index.keys_for(&entity.properties)?,
                None => Vec::new(),
            };
            if old_keys == new_keys {
                continue;
            }
            if let Some(entity) = new {
                if index.is_unique() {
                    for key in new_keys.iter().flatten() {
                        if index.get_rids(Some(key)).iter().any(|rid| *rid != entity.rid) {
                            return Err(IndexError::DuplicateKey {
                                index: index.name().to_string(),
                                key: key.to_string(),
                            });
                        }
                    }
                }
            }
            changes.push((index, old_keys, new_keys));
        }

        for (index, old_keys, new_keys) in changes {
            if let Some(entity) = old {
                for key in &old_keys {
                    index.remove(key.as_ref(), entity.rid);
                }
            }
            if let Some(entity) = new {
                for key in new_keys {
                    index.put(key, entity.rid)?;
                }
            }
        }
        Ok(())
    }
}
