// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Record data structures and storage error types
//!
//! Defines record identifiers, stored entities and lightweight edges,
//! along with error types for storage operations.

use crate::storage::indexes::IndexError;
use crate::storage::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error types for storage operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StorageError {
    #[error("Record not found: {0}")]
    RecordNotFound(Rid),

    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    #[error("Class not found: {0}")]
    ClassNotFound(String),

    #[error("Class already exists: {0}")]
    ClassAlreadyExists(String),

    #[error("Collection already exists: {0}")]
    CollectionAlreadyExists(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Session is closed")]
    SessionClosed,

    #[error("Index failure: {0}")]
    IndexFailure(String),
}

impl From<IndexError> for StorageError {
    fn from(error: IndexError) -> Self {
        StorageError::IndexFailure(error.to_string())
    }
}

/// Physical identity of a stored record: collection id plus position
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Rid {
    pub collection_id: i32,
    pub position: i64,
}

impl Rid {
    pub const MIN: Rid = Rid {
        collection_id: i32::MIN,
        position: i64::MIN,
    };

    pub const MAX: Rid = Rid {
        collection_id: i32::MAX,
        position: i64::MAX,
    };

    pub fn new(collection_id: i32, position: i64) -> Self {
        Self {
            collection_id,
            position,
        }
    }
}

impl fmt::Display for Rid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}:{}", self.collection_id, self.position)
    }
}

impl FromStr for Rid {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || StorageError::InvalidOperation(format!("Invalid record id: {}", s));
        let body = s.strip_prefix('#').unwrap_or(s);
        let (collection, position) = body.split_once(':').ok_or_else(invalid)?;
        Ok(Rid {
            collection_id: collection.trim().parse().map_err(|_| invalid())?,
            position: position.trim().parse().map_err(|_| invalid())?,
        })
    }
}

/// Kind of a schema class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassKind {
    Document,
    Vertex,
    Edge,
    /// Edge class whose instances have no record of their own
    LightweightEdge,
}

/// Schema class with its backing collections
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaClass {
    pub name: String,
    pub kind: ClassKind,
    pub collection_ids: Vec<i32>,
}

/// A stored, addressable entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub rid: Rid,
    pub class: Option<String>,
    pub properties: BTreeMap<String, Value>,
    pub version: u32,
}

impl Entity {
    pub fn new(rid: Rid, class: Option<String>) -> Self {
        Self {
            rid,
            class,
            properties: BTreeMap::new(),
            version: 0,
        }
    }

    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    pub fn set_property(&mut self, name: impl Into<String>, value: Value) {
        self.properties.insert(name.into(), value);
    }

    pub fn remove_property(&mut self, name: &str) -> Option<Value> {
        self.properties.remove(name)
    }
}

/// A non-addressable entity stored inline in another record's property
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EmbeddedEntity {
    pub class: Option<String>,
    pub properties: BTreeMap<String, Value>,
}

impl EmbeddedEntity {
    pub fn new(class: Option<String>) -> Self {
        Self {
            class,
            properties: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, value: Value) -> Self {
        self.properties.insert(name.into(), value);
        self
    }
}

/// Graph edge represented only by its endpoints
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LightweightEdge {
    pub class: String,
    pub out: Rid,
    pub r#in: Rid,
}

impl LightweightEdge {
    pub fn new(class: impl Into<String>, out: Rid, r#in: Rid) -> Self {
        Self {
            class: class.into(),
            out,
            r#in,
        }
    }
}

impl fmt::Display for LightweightEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({} -> {})", self.class, self.out, self.r#in)
    }
}
