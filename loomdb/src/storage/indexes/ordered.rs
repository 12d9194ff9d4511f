// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Ordered (B-tree) secondary index
//!
//! Entries live in a `BTreeSet<(IndexKey, Rid)>`; null keys are kept in a
//! separate bucket because they have no meaningful position in key order.
//! Cursors are lazy: each step re-seeks from the last returned entry, so a
//! cursor holds no lock between calls.

use super::traits::{EntryIter, Index, IndexEntry};
use super::{IndexAlgorithm, IndexDefinition, IndexError, IndexKey, IndexType};
use crate::storage::types::Rid;
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::ops::Bound;
use std::sync::Arc;

#[derive(Debug, Default)]
struct OrderedState {
    entries: BTreeSet<IndexEntry>,
    nulls: BTreeSet<Rid>,
}

/// B-tree index supporting range iteration in both directions
#[derive(Debug)]
pub struct OrderedIndex {
    name: String,
    definition: IndexDefinition,
    index_type: IndexType,
    state: Arc<RwLock<OrderedState>>,
}

impl OrderedIndex {
    pub fn new(name: impl Into<String>, definition: IndexDefinition, index_type: IndexType) -> Self {
        Self {
            name: name.into(),
            definition,
            index_type,
            state: Arc::new(RwLock::new(OrderedState::default())),
        }
    }

    fn cursor(
        &self,
        from: Option<IndexKey>,
        from_inclusive: bool,
        to: Option<IndexKey>,
        to_inclusive: bool,
        ascending: bool,
    ) -> RangeCursor {
        RangeCursor {
            state: Arc::clone(&self.state),
            from,
            from_inclusive,
            to,
            to_inclusive,
            ascending,
            arity: self.definition.properties.len(),
            last: None,
            done: false,
        }
    }
}

/// Lazy cursor over a key range
struct RangeCursor {
    state: Arc<RwLock<OrderedState>>,
    from: Option<IndexKey>,
    from_inclusive: bool,
    to: Option<IndexKey>,
    to_inclusive: bool,
    ascending: bool,
    /// Components in a full key of this index
    arity: usize,
    last: Option<IndexEntry>,
    done: bool,
}

impl RangeCursor {
    fn below_lower(&self, key: &IndexKey) -> bool {
        match &self.from {
            None => false,
            Some(from) => match key.prefix_cmp(from) {
                Ordering::Less => true,
                Ordering::Equal => !self.from_inclusive,
                Ordering::Greater => false,
            },
        }
    }

    fn above_upper(&self, key: &IndexKey) -> bool {
        match &self.to {
            None => false,
            Some(to) => match key.prefix_cmp(to) {
                Ordering::Greater => true,
                Ordering::Equal => !self.to_inclusive,
                Ordering::Less => false,
            },
        }
    }

    fn seek(&self) -> Option<IndexEntry> {
        let state = self.state.read();
        if self.ascending {
            let start = match (&self.last, &self.from) {
                (Some(last), _) => Bound::Excluded(last.clone()),
                (None, Some(from)) => Bound::Included((from.clone(), Rid::MIN)),
                (None, None) => Bound::Unbounded,
            };
            state
                .entries
                .range((start, Bound::Unbounded))
                .find(|(key, _)| !self.below_lower(key))
                .cloned()
        } else {
            let end = match (&self.last, &self.to) {
                (Some(last), _) => Bound::Excluded(last.clone()),
                // Keys extending a prefix bound sort after it, so only a full key can end the range
                (None, Some(to)) if to.len() == self.arity => {
                    if self.to_inclusive {
                        Bound::Included((to.clone(), Rid::MAX))
                    } else {
                        Bound::Excluded((to.clone(), Rid::MIN))
                    }
                }
                (None, _) => Bound::Unbounded,
            };
            state
                .entries
                .range((Bound::Unbounded, end))
                .rev()
                .find(|(key, _)| !self.above_upper(key))
                .cloned()
        }
    }
}

impl Iterator for RangeCursor {
    type Item = IndexEntry;

    fn next(&mut self) -> Option<IndexEntry> {
        if self.done {
            return None;
        }
        let in_range = |cursor: &Self, key: &IndexKey| {
            if cursor.ascending {
                !cursor.above_upper(key)
            } else {
                !cursor.below_lower(key)
            }
        };
        match self.seek() {
            Some(entry) if in_range(self, &entry.0) => {
                self.last = Some(entry.clone());
                Some(entry)
            }
            _ => {
                self.done = true;
                None
            }
        }
    }
}

impl Index for OrderedIndex {
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
        IndexAlgorithm::BTree
    }

    fn supports_ordered_iterations(&self) -> bool {
        true
    }

    fn stream_entries(&self, keys: &[IndexKey], ascending: bool) -> EntryIter {
        let mut keys = keys.to_vec();
        keys.sort();
        keys.dedup();
        if !ascending {
            keys.reverse();
        }
        let cursors: Vec<RangeCursor> = keys
            .into_iter()
            .map(|key| self.cursor(Some(key.clone()), true, Some(key), true, ascending))
            .collect();
        Box::new(cursors.into_iter().flatten())
    }

    fn stream_entries_between(
        &self,
        from: Option<&IndexKey>,
        from_inclusive: bool,
        to: Option<&IndexKey>,
        to_inclusive: bool,
        ascending: bool,
    ) -> Result<EntryIter, IndexError> {
        Ok(Box::new(self.cursor(
            from.cloned(),
            from_inclusive,
            to.cloned(),
            to_inclusive,
            ascending,
        )))
    }

    fn get_rids(&self, key: Option<&IndexKey>) -> Vec<Rid> {
        let state = self.state.read();
        match key {
            None => state.nulls.iter().copied().collect(),
            Some(key) => state
                .entries
                .range((
                    Bound::Included((key.clone(), Rid::MIN)),
                    Bound::Included((key.clone(), Rid::MAX)),
                ))
                .map(|(_, rid)| *rid)
                .collect(),
        }
    }

    fn stream(&self) -> EntryIter {
        Box::new(self.cursor(None, true, None, true, true))
    }

    fn desc_stream(&self) -> Result<EntryIter, IndexError> {
        Ok(Box::new(self.cursor(None, true, None, true, false)))
    }

    fn put(&self, key: Option<IndexKey>, rid: Rid) -> Result<(), IndexError> {
        let mut state = self.state.write();
        match key {
            None => {
                state.nulls.insert(rid);
            }
            Some(key) => {
                if self.index_type == IndexType::Unique {
                    let existing = state
                        .entries
                        .range((
                            Bound::Included((key.clone(), Rid::MIN)),
                            Bound::Included((key.clone(), Rid::MAX)),
                        ))
                        .any(|(_, other)| *other != rid);
                    if existing {
                        return Err(IndexError::DuplicateKey {
                            index: self.name.clone(),
                            key: key.to_string(),
                        });
                    }
                }
                state.entries.insert((key, rid));
            }
        }
        Ok(())
    }

    fn remove(&self, key: Option<&IndexKey>, rid: Rid) -> bool {
        let mut state = self.state.write();
        match key {
            None => state.nulls.remove(&rid),
            Some(key) => state.entries.remove(&(key.clone(), rid)),
        }
    }

    fn size(&self) -> usize {
        let state = self.state.read();
        state.entries.len() + state.nulls.len()
    }
}
