// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Storage layer
//!
//! In-memory records, schema classes and secondary indexes consumed by the
//! query execution engine.

pub mod database;
pub mod indexes;
pub mod types;
pub mod value;

pub use database::{Database, DEFAULT_COLLECTION_ID};
pub use types::{ClassKind, EmbeddedEntity, Entity, LightweightEdge, Rid, SchemaClass, StorageError};
pub use value::{ConversionError, PropertyType, Value};
