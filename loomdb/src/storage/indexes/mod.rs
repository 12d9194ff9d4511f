// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Secondary indexing for LoomDB
//!
//! This module provides:
//! - Ordered B-tree indexes with prefix-aware range cursors
//! - Hash indexes for point lookups, including a full-text flavour
//! - The index manager that keeps indexes in sync with record writes

pub mod errors;
pub mod hash;
pub mod manager;
pub mod ordered;
pub mod traits;
pub mod types;

// Re-export core types
pub use errors::*;
pub use manager::*;
pub use traits::*;
pub use types::*;
