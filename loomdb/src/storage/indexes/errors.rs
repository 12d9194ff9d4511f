// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Error types for the indexing system

use crate::storage::value::ConversionError;
use thiserror::Error;

/// Errors that can occur during index operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IndexError {
    #[error("Index '{0}' already exists")]
    AlreadyExists(String),

    #[error("Index '{0}' not found")]
    NotFound(String),

    #[error("Invalid index configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Duplicate key {key} in unique index '{index}'")]
    DuplicateKey { index: String, key: String },

    #[error("Key conversion failed: {0}")]
    Conversion(#[from] ConversionError),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error("Operation not supported by this index type")]
    UnsupportedOperation,
}

impl IndexError {
    /// Create a query error
    pub fn query<S: Into<String>>(msg: S) -> Self {
        Self::QueryError(msg.into())
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfiguration(msg.into())
    }
}
