// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Execution error types

use crate::config::ConfigError;
use crate::storage::indexes::IndexError;
use crate::storage::{ConversionError, StorageError};
use thiserror::Error;

/// Execution errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecutionError {
    /// A step is wired into a chain it cannot run in
    #[error("Invalid plan: {0}")]
    InvalidPlan(String),

    #[error("Illegal state: {0}")]
    IllegalState(String),

    /// The key condition cannot be answered by the index
    #[error("Cannot evaluate {condition} on index {index}")]
    UnsupportedIndexQuery { condition: String, index: String },

    /// Cooperative cancellation was requested
    #[error("Query execution interrupted")]
    Interrupted,

    #[error("Session is closed")]
    SessionClosed,

    #[error("No more results available")]
    NoSuchElement,

    #[error("Type conversion error: {0}")]
    TypeConversion(String),

    #[error("Command execution error: {0}")]
    CommandExecution(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Index error: {0}")]
    IndexError(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result alias used across the execution engine
pub type ExecResult<T> = Result<T, ExecutionError>;

impl ExecutionError {
    pub fn invalid_plan<S: Into<String>>(msg: S) -> Self {
        Self::InvalidPlan(msg.into())
    }

    pub fn illegal_state<S: Into<String>>(msg: S) -> Self {
        Self::IllegalState(msg.into())
    }

    pub fn command<S: Into<String>>(msg: S) -> Self {
        Self::CommandExecution(msg.into())
    }

    /// True when the query was cancelled rather than failed
    pub fn is_interrupted(&self) -> bool {
        matches!(self, ExecutionError::Interrupted)
    }
}

impl From<StorageError> for ExecutionError {
    fn from(error: StorageError) -> Self {
        match error {
            StorageError::SessionClosed => ExecutionError::SessionClosed,
            other => ExecutionError::StorageError(other.to_string()),
        }
    }
}

impl From<IndexError> for ExecutionError {
    fn from(error: IndexError) -> Self {
        match error {
            IndexError::Conversion(e) => ExecutionError::TypeConversion(e.to_string()),
            other => ExecutionError::IndexError(other.to_string()),
        }
    }
}

impl From<ConversionError> for ExecutionError {
    fn from(error: ConversionError) -> Self {
        ExecutionError::TypeConversion(error.to_string())
    }
}

impl From<ConfigError> for ExecutionError {
    fn from(error: ConfigError) -> Self {
        ExecutionError::Config(error.to_string())
    }
}

impl From<bincode::Error> for ExecutionError {
    fn from(error: bincode::Error) -> Self {
        ExecutionError::Serialization(error.to_string())
    }
}

impl From<serde_json::Error> for ExecutionError {
    fn from(error: serde_json::Error) -> Self {
        ExecutionError::Serialization(error.to_string())
    }
}
