// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Index access-path planning
//!
//! This module provides the predicate tree handed over by the statement
//! compiler, the descriptor of a single index access, and the compiler that
//! turns a key condition into ordered range scans and point lookups.

pub mod index_search;
pub mod key_range;
pub mod predicate;

pub use index_search::{IndexSearchDescriptor, SerializedIndexSearch};
pub use key_range::{compile, IndexScan};
pub use predicate::{AndBlock, BinaryCondition, CompareOperator, Expression, KeyCondition};
