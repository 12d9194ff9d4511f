// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Type definitions for the indexing system

use super::IndexError;
use crate::storage::value::{PropertyType, Value};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Index type enumeration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum IndexType {
    Unique,
    NotUnique,
    FullText,
}

impl fmt::Display for IndexType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexType::Unique => write!(f, "UNIQUE"),
            IndexType::NotUnique => write!(f, "NOTUNIQUE"),
            IndexType::FullText => write!(f, "FULLTEXT"),
        }
    }
}

/// Engine backing an index
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum IndexAlgorithm {
    /// Ordered B-tree, supports range iteration
    BTree,
    /// Hash table, exact-key lookups only
    Hash,
    /// External inverted-index engine
    Lucene,
}

impl fmt::Display for IndexAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexAlgorithm::BTree => write!(f, "BTREE"),
            IndexAlgorithm::Hash => write!(f, "HASH"),
            IndexAlgorithm::Lucene => write!(f, "LUCENE"),
        }
    }
}

/// Which side of a map property a multi-value index covers
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MapIndexBy {
    Key,
    Value,
}

/// Key stored in an index: one value per indexed property.
///
/// Keys compare component-wise with [`Value::compare`]; a shorter key sorts
/// before any longer key it is a prefix of.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexKey(Vec<Value>);

impl IndexKey {
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    pub fn single(value: Value) -> Self {
        Self(vec![value])
    }

    pub fn values(&self) -> &[Value] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Compare only the first `bound.len()` components against `bound`
    pub fn prefix_cmp(&self, bound: &IndexKey) -> Ordering {
        for (mine, theirs) in self.0.iter().zip(bound.0.iter()) {
            let ord = mine.compare(theirs);
            if ord != Ordering::Equal {
                return ord;
            }
        }
        if self.0.len() < bound.0.len() {
            Ordering::Less
        } else {
            Ordering::Equal
        }
    }

    /// The key as surfaced to query rows: the single component, or the list
    /// of components for composite keys
    pub fn to_value(&self) -> Value {
        match self.0.as_slice() {
            [single] => single.clone(),
            components => Value::List(components.to_vec()),
        }
    }
}

impl PartialEq for IndexKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for IndexKey {}

impl PartialOrd for IndexKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IndexKey {
    fn cmp(&self, other: &Self) -> Ordering {
        for (a, b) in self.0.iter().zip(other.0.iter()) {
            let ord = a.compare(b);
            if ord != Ordering::Equal {
                return ord;
            }
        }
        self.0.len().cmp(&other.0.len())
    }
}

impl Hash for IndexKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.len().hash(state);
        for value in &self.0 {
            value.hash(state);
        }
    }
}

impl fmt::Display for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.to_value().fmt(f)
    }
}

/// Which properties of which class an index covers, and how keys are built
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDefinition {
    pub class_name: String,
    pub properties: Vec<String>,
    pub types: Vec<PropertyType>,
    pub null_values_ignored: bool,
    /// One key per element of a collection (or map side) property
    pub multi_value: bool,
    pub map_index_by: Option<MapIndexBy>,
}

impl IndexDefinition {
    /// Create a definition over one or more properties
    pub fn new(
        class_name: impl Into<String>,
        properties: Vec<(&str, PropertyType)>,
    ) -> Result<Self, IndexError> {
        if properties.is_empty() {
            return Err(IndexError::config("an index needs at least one property"));
        }
        let (names, types) = properties
            .into_iter()
            .map(|(name, ty)| (name.to_string(), ty))
            .unzip();
        Ok(Self {
            class_name: class_name.into(),
            properties: names,
            types,
            null_values_ignored: false,
            multi_value: false,
            map_index_by: None,
        })
    }

    /// Index each element of a collection property instead of the whole value
    pub fn multi_value(mut self) -> Result<Self, IndexError> {
        if self.is_composite() {
            return Err(IndexError::config(
                "multi-value indexes cover a single property",
            ));
        }
        self.multi_value = true;
        Ok(self)
    }

    /// Index the keys or the values of a map property
    pub fn by_map(mut self, by: MapIndexBy) -> Result<Self, IndexError> {
        self = self.multi_value()?;
        self.map_index_by = Some(by);
        Ok(self)
    }

    pub fn ignore_nulls(mut self) -> Self {
        self.null_values_ignored = true;
        self
    }

    pub fn is_composite(&self) -> bool {
        self.properties.len() > 1
    }

    fn first_type(&self) -> PropertyType {
        self.types.first().copied().unwrap_or(PropertyType::Any)
    }

    fn null_bucket(&self) -> Vec<Option<IndexKey>> {
        if self.null_values_ignored {
            Vec::new()
        } else {
            vec![None]
        }
    }

    /// Keys a record contributes to the index; `None` is the null-key bucket
    pub fn keys_for_properties(
        &self,
        properties: &BTreeMap<String, Value>,
    ) -> Result<Vec<Option<IndexKey>>, IndexError> {
        if self.is_composite() {
            let values = self
                .properties
                .iter()
                .zip(&self.types)
                .map(|(name, ty)| ty.convert(properties.get(name).unwrap_or(&Value::Null)))
                .collect::<Result<Vec<_>, _>>()?;
            if values.iter().all(Value::is_null) {
                return Ok(self.null_bucket());
            }
            return Ok(vec![Some(IndexKey::new(values))]);
        }

        let value = self
            .properties
            .first()
            .and_then(|name| properties.get(name))
            .unwrap_or(&Value::Null);
        if value.is_null() {
            return Ok(self.null_bucket());
        }
        if !self.multi_value {
            return Ok(vec![Some(IndexKey::single(self.first_type().convert(value)?))]);
        }
        let mut keys = Vec::new();
        for item in self.element_values(value) {
            if item.is_null() {
                keys.extend(self.null_bucket());
            } else {
                keys.push(Some(IndexKey::single(self.first_type().convert(&item)?)));
            }
        }
        Ok(keys)
    }

    /// Build lookup keys from a query value. An empty result means the null key.
    ///
    /// Composite definitions take a list of components (a shorter list is a
    /// key prefix); multi-value definitions produce one key per element.
    pub fn create_keys(&self, value: &Value) -> Result<Vec<IndexKey>, IndexError> {
        if self.is_composite() {
            let components = match value {
                Value::Null => return Ok(Vec::new()),
                Value::List(items) => items.clone(),
                other => vec![other.clone()],
            };
            if components.len() > self.properties.len() {
                return Err(IndexError::query(format!(
                    "key {} has more components than index properties {:?}",
                    value, self.properties
                )));
            }
            if components.iter().all(Value::is_null) {
                return Ok(Vec::new());
            }
            return Ok(vec![IndexKey::new(components)]);
        }

        if self.multi_value {
            return self
                .element_values(value)
                .iter()
                .filter(|item| !item.is_null())
                .map(|item| Ok(IndexKey::single(self.first_type().convert(item)?)))
                .collect();
        }

        let single = match value {
            Value::List(items) => items.first().cloned().unwrap_or(Value::Null),
            other => other.clone(),
        };
        if single.is_null() {
            return Ok(Vec::new());
        }
        Ok(vec![IndexKey::single(self.first_type().convert(&single)?)])
    }

    fn element_values(&self, value: &Value) -> Vec<Value> {
        match value {
            Value::Null => Vec::new(),
            Value::Map(map) => match self.map_index_by {
                Some(MapIndexBy::Value) => map.values().cloned().collect(),
                _ => map.keys().map(|k| Value::String(k.clone())).collect(),
            },
            Value::LinkMap(map) => match self.map_index_by {
                Some(MapIndexBy::Value) => map.values().map(|rid| Value::Link(*rid)).collect(),
                _ => map.keys().map(|k| Value::String(k.clone())).collect(),
            },
            Value::List(_) | Value::LinkList(_) => value.clone().into_items().unwrap_or_default(),
            other => vec![other.clone()],
        }
    }
}

impl fmt::Display for IndexDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.class_name, self.properties.join(", "))?;
        if let Some(by) = self.map_index_by {
            write!(f, " BY {:?}", by)?;
        }
        Ok(())
    }
}
