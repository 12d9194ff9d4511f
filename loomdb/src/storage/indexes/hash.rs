// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Hash secondary index
//!
//! Exact-key lookups only. The full-text flavour tokenizes string properties
//! into lowercase words and answers word lookups through the same buckets.

use super::traits::{EntryIter, Index};
use super::{IndexAlgorithm, IndexDefinition, IndexError, IndexKey, IndexType};
use crate::storage::types::Rid;
use crate::storage::value::Value;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

#[derive(Debug, Default)]
struct HashState {
    buckets: HashMap<IndexKey, BTreeSet<Rid>>,
    nulls: BTreeSet<Rid>,
}

/// Hash index; with `index_type == FullText` keys are words
#[derive(Debug)]
pub struct HashIndex {
    name: String,
    definition: IndexDefinition,
    index_type: IndexType,
    state: Arc<RwLock<HashState>>,
}

impl HashIndex {
    pub fn new(name: impl Into<String>, definition: IndexDefinition, index_type: IndexType) -> Self {
        Self {
            name: name.into(),
            definition,
            index_type,
            state: Arc::new(RwLock::new(HashState::default())),
        }
    }

    fn is_full_text(&self) -> bool {
        self.index_type == IndexType::FullText
    }

    fn normalize(&self, key: &IndexKey) -> IndexKey {
        if !self.is_full_text() {
            return key.clone();
        }
        IndexKey::new(
            key.values()
                .iter()
                .map(|v| match v {
                    Value::String(s) => Value::String(s.to_lowercase()),
                    other => other.clone(),
                })
                .collect(),
        )
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
}

impl Index for HashIndex {
    fn name(&self) -> &str {
        &self.name
    }

    fn definition(&self) -> &IndexDefinition {
        &self.definition
    }

    fn index_type(&self) -> IndexType {
        self.index_type
    }

    fn algorithm(&self) -> IndexAlgorithm {
        IndexAlgorithm::Hash
    }

    fn supports_ordered_iterations(&self) -> bool {
        false
    }

    fn stream_entries(&self, keys: &[IndexKey], _ascending: bool) -> EntryIter {
        let state = Arc::clone(&self.state);
        let keys: Vec<IndexKey> = keys.iter().map(|k| self.normalize(k)).collect();
        Box::new(keys.into_iter().flat_map(move |key| {
            let rids: Vec<Rid> = state
                .read()
                .buckets
                .get(&key)
                .map(|rids| rids.iter().copied().collect())
                .unwrap_or_default();
            rids.into_iter().map(move |rid| (key.clone(), rid))
        }))
    }

    fn stream_entries_between(
        &self,
        _from: Option<&IndexKey>,
        _from_inclusive: bool,
        _to: Option<&IndexKey>,
        _to_inclusive: bool,
        _ascending: bool,
    ) -> Result<EntryIter, IndexError> {
        Err(IndexError::UnsupportedOperation)
    }

    fn get_rids(&self, key: Option<&IndexKey>) -> Vec<Rid> {
        let state = self.state.read();
        match key {
            None => state.nulls.iter().copied().collect(),
            Some(key) => state
                .buckets
                .get(&self.normalize(key))
                .map(|rids| rids.iter().copied().collect())
                .unwrap_or_default(),
        }
    }

    fn stream(&self) -> EntryIter {
        let entries: Vec<(IndexKey, Rid)> = self
            .state
            .read()
            .buckets
            .iter()
            .flat_map(|(key, rids)| rids.iter().map(move |rid| (key.clone(), *rid)))
            .collect();
        Box::new(entries.into_iter())
    }

    fn desc_stream(&self) -> Result<EntryIter, IndexError> {
        Err(IndexError::UnsupportedOperation)
    }

    fn put(&self, key: Option<IndexKey>, rid: Rid) -> Result<(), IndexError> {
        let mut state = self.state.write();
        match key {
            None => {
                state.nulls.insert(rid);
            }
            Some(key) => {
                let key = self.normalize(&key);
                let bucket = state.buckets.entry(key.clone()).or_default();
                if self.index_type == IndexType::Unique && bucket.iter().any(|other| *other != rid)
                {
                    return Err(IndexError::DuplicateKey {
                        index: self.name.clone(),
                        key: key.to_string(),
                    });
                }
                bucket.insert(rid);
            }
        }
        Ok(())
    }

    fn remove(&self, key: Option<&IndexKey>, rid: Rid) -> bool {
        let mut state = self.state.write();
        match key {
            None => state.nulls.remove(&rid),
            Some(key) => {
                let key = self.normalize(key);
                let Some(bucket) = state.buckets.get_mut(&key) else {
                    return false;
                };
                let removed = bucket.remove(&rid);
                if bucket.is_empty() {
                    state.buckets.remove(&key);
                }
                removed
            }
        }
    }

    fn size(&self) -> usize {
        let state = self.state.read();
        state.buckets.values().map(BTreeSet::len).sum::<usize>() + state.nulls.len()
    }

    fn keys_for(
        &self,
        properties: &BTreeMap<String, Value>,
    ) -> Result<Vec<Option<IndexKey>>, IndexError> {
        if !self.is_full_text() {
            return self.definition.keys_for_properties(properties);
        }
        let mut words = BTreeSet::new();
        for name in &self.definition.properties {
            if let Some(Value::String(text)) = properties.get(name) {
                words.extend(tokenize(text));
            }
        }
        Ok(words
            .into_iter()
            .map(|word| Some(IndexKey::single(Value::String(word))))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::value::PropertyType;

    #[test]
    fn test_point_lookup_and_null_bucket() {
        let def = IndexDefinition::new("City", vec![("name", PropertyType::String)]).unwrap();
        let index = HashIndex::new("City.name", def, IndexType::NotUnique);
        let rome = IndexKey::single(Value::from("Rome"));
        index.put(Some(rome.clone()), Rid::new(4, 0)).unwrap();
        index.put(Some(rome.clone()), Rid::new(4, 1)).unwrap();
        index.put(None, Rid::new(4, 2)).unwrap();

        let hits: Vec<Rid> = index.stream_entries(&[rome.clone()], true).map(|(_, r)| r).collect();
        assert_eq!(hits, vec![Rid::new(4, 0), Rid::new(4, 1)]);
        assert_eq!(index.get_rids(None), vec![Rid::new(4, 2)]);
        assert_eq!(index.size(), 3);
        assert!(index
            .stream_entries_between(Some(&rome), true, None, true, true)
            .is_err());
        assert!(index.remove(Some(&rome), Rid::new(4, 0)));
        assert_eq!(index.get_rids(Some(&rome)), vec![Rid::new(4, 1)]);
    }

    #[test]
    fn test_full_text_tokenizes() {
        let def = IndexDefinition::new("Post", vec![("body", PropertyType::String)]).unwrap();
        let index = HashIndex::new("Post.body", def, IndexType::FullText);
        let mut props = BTreeMap::new();
        props.insert("body".to_string(), Value::from("Hello, brave new World"));
        let keys = index.keys_for(&props).unwrap();
        assert_eq!(keys.len(), 4);
        for key in keys {
            index.put(key, Rid::new(5, 0)).unwrap();
        }
        let hits = index
            .stream_entries(&[IndexKey::single(Value::from("WORLD"))], true)
            .count();
        assert_eq!(hits, 1);
    }
}
