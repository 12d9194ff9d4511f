// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Core traits for the indexing system

use super::{IndexAlgorithm, IndexDefinition, IndexError, IndexKey, IndexType};
use crate::storage::types::Rid;
use std::fmt;

/// One index entry: a non-null key and the record it points to
pub type IndexEntry = (IndexKey, Rid);

/// Lazy sequence of index entries
pub type EntryIter = Box<dyn Iterator<Item = IndexEntry> + Send>;

/// Core trait that all secondary indexes implement
pub trait Index: Send + Sync + fmt::Debug {
    /// Get the index name
    fn name(&self) -> &str;

    fn definition(&self) -> &IndexDefinition;

    /// Get the index type
    fn index_type(&self) -> IndexType;

    fn algorithm(&self) -> IndexAlgorithm;

    /// Whether `stream_entries_between` is available
    fn supports_ordered_iterations(&self) -> bool;

    /// Entries for each of the exact keys, in key order for the direction
    fn stream_entries(&self, keys: &[IndexKey], ascending: bool) -> EntryIter;

    /// Entries between two key bounds. An absent bound is unbounded; bounds
    /// shorter than the stored keys match by prefix.
    fn stream_entries_between(
        &self,
        from: Option<&IndexKey>,
        from_inclusive: bool,
        to: Option<&IndexKey>,
        to_inclusive: bool,
        ascending: bool,
    ) -> Result<EntryIter, IndexError>;

    /// Point lookup; `None` reads the null-key bucket
    fn get_rids(&self, key: Option<&IndexKey>) -> Vec<Rid>;

    /// All non-null entries in ascending order
    fn stream(&self) -> EntryIter;

    /// All non-null entries in descending order
    fn desc_stream(&self) -> Result<EntryIter, IndexError>;

    /// Add an entry; `None` goes to the null-key bucket
    fn put(&self, key: Option<IndexKey>, rid: Rid) -> Result<(), IndexError>;

    /// Remove an entry, returning whether it existed
    fn remove(&self, key: Option<&IndexKey>, rid: Rid) -> bool;

    /// Get the size of the index (number of entries, null bucket included)
    fn size(&self) -> usize;

    /// Keys a stored record contributes. Full-text indexes tokenize here.
    fn keys_for(
        &self,
        properties: &std::collections::BTreeMap<String, crate::storage::value::Value>,
    ) -> Result<Vec<Option<IndexKey>>, IndexError> {
        self.definition().keys_for_properties(properties)
    }

    fn is_unique(&self) -> bool {
        self.index_type() == IndexType::Unique
    }
}
