// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Index range-key compiler
//!
//! Turns the key condition of an [`IndexSearchDescriptor`] into the list of
//! index scans that answer it. Multi-valued contributions (`IN` lists,
//! list parameters) are expanded into one scan per key combination; each
//! combination is coerced to the index property types and dispatched to a
//! range scan or a point lookup depending on what the index supports.

use super::index_search::IndexSearchDescriptor;
use super::predicate::{AndBlock, CompareOperator, Expression, KeyCondition};
use crate::exec::context::CommandContext;
use crate::exec::error::{ExecResult, ExecutionError};
use crate::storage::indexes::{Index, IndexAlgorithm, IndexKey, IndexType};
use crate::storage::{PropertyType, Rid, Value};
use log::{debug, trace};
use std::collections::BTreeMap;

/// Entry produced by a scan; a `None` key is the null-key bucket
pub type ScanEntry = (Option<IndexKey>, Rid);

/// Lazy sequence of scan entries
pub type ScanIter = Box<dyn Iterator<Item = ScanEntry> + Send>;

/// One unit of index access
#[derive(Debug, Clone, PartialEq)]
pub enum IndexScan {
    /// Records whose indexed value is null
    NullKeys,
    /// Every non-null entry
    Full { ascending: bool },
    /// Entries between two bounds; an absent bound is open
    Range {
        from: Option<IndexKey>,
        from_inclusive: bool,
        to: Option<IndexKey>,
        to_inclusive: bool,
        ascending: bool,
    },
    /// Entries under each of the keys
    Exact { keys: Vec<IndexKey>, ascending: bool },
}

impl IndexScan {
    /// Open a cursor for this scan
    pub fn open(&self, index: &dyn Index) -> ExecResult<ScanIter> {
        let iter: ScanIter = match self {
            IndexScan::NullKeys => Box::new(index.get_rids(None).into_iter().map(|rid| (None, rid))),
            IndexScan::Full { ascending: true } => Box::new(index.stream().map(with_key)),
            IndexScan::Full { ascending: false } => Box::new(index.desc_stream()?.map(with_key)),
            IndexScan::Range {
                from,
                from_inclusive,
                to,
                to_inclusive,
                ascending,
            } => Box::new(
                index
                    .stream_entries_between(
                        from.as_ref(),
                        *from_inclusive,
                        to.as_ref(),
                        *to_inclusive,
                        *ascending,
                    )?
                    .map(with_key),
            ),
            IndexScan::Exact { keys, ascending } => {
                Box::new(index.stream_entries(keys, *ascending).map(with_key))
            }
        };
        Ok(iter)
    }
}

fn with_key((key, rid): (IndexKey, Rid)) -> ScanEntry {
    (Some(key), rid)
}

/// Scans in construction order, without repeats
#[derive(Debug, Default)]
struct ScanList {
    scans: Vec<IndexScan>,
}

impl ScanList {
    fn push(&mut self, scan: IndexScan) {
        if self.scans.contains(&scan) {
            trace!("Skipping duplicate index scan {:?}", scan);
            return;
        }
        self.scans.push(scan);
    }
}

/// Compile the descriptor's key condition into index scans
pub fn compile(desc: &IndexSearchDescriptor, ctx: &CommandContext) -> ExecResult<Vec<IndexScan>> {
    let index = desc.index().as_ref();
    let mut scans = ScanList::default();
    match desc.key_condition() {
        None => {
            if !index.definition().null_values_ignored {
                scans.push(IndexScan::NullKeys);
            }
            scans.push(IndexScan::Full {
                ascending: desc.is_ascending(),
            });
        }
        Some(block) => {
            KeyRangeCompiler {
                desc,
                block,
                index,
                ctx,
            }
            .compile_block(&mut scans)?;
        }
    }
    debug!(
        "Index {} compiled into {} scan(s)",
        index.name(),
        scans.scans.len()
    );
    Ok(scans.scans)
}

struct KeyRangeCompiler<'a> {
    desc: &'a IndexSearchDescriptor,
    block: &'a AndBlock,
    index: &'a dyn Index,
    ctx: &'a CommandContext,
}

impl<'a> KeyRangeCompiler<'a> {
    fn compile_block(&self, scans: &mut ScanList) -> ExecResult<()> {
        let additional = self.desc.additional_range_condition();
        let from: Vec<&Expression> = self
            .block
            .iter()
            .filter_map(|cond| cond.resolve_key_from(additional))
            .collect();
        let to: Vec<&Expression> = self
            .block
            .iter()
            .filter_map(|cond| cond.resolve_key_to(additional))
            .collect();
        let (from_inclusive, to_inclusive) = match self.block.last() {
            Some(last) => (last.from_inclusive(additional), last.to_inclusive(additional)),
            None => (true, true),
        };

        let from_combinations = cartesian_product(&self.evaluate(&from));
        let to_combinations = cartesian_product(&self.evaluate(&to));
        if from_combinations.len() != to_combinations.len() {
            return Err(ExecutionError::invalid_plan(format!(
                "Size of from and to key combinations do not match: {} != {}",
                from_combinations.len(),
                to_combinations.len()
            )));
        }

        let bounds = Bounds {
            from_inclusive,
            to_inclusive,
            ascending: self.desc.is_ascending(),
        };
        for (from, to) in from_combinations.into_iter().zip(to_combinations) {
            let from = unbox_result(self.unwrap_single(Value::List(from)));
            let to = unbox_result(self.unwrap_single(Value::List(to)));

            let converted = self
                .convert_to_index_types(&from)
                .and_then(|f| Ok((f, self.convert_to_index_types(&to)?)));
            match converted {
                Ok((from, to)) => self.dispatch(&from, &to, bounds, scans)?,
                Err(e) => match &from {
                    // A list that fails as a whole key may still work item by item
                    Value::List(items) if from == to => {
                        debug!(
                            "Key {} does not fit index {}: trying each item ({})",
                            from,
                            self.index.name(),
                            e
                        );
                        for item in items {
                            match self.types().first().copied().unwrap_or(PropertyType::Any).convert(item) {
                                Ok(item) => self.dispatch(&item, &item, bounds, scans)?,
                                Err(e) => debug!("Skipping key item {}: {}", item, e),
                            }
                        }
                    }
                    _ => debug!(
                        "Skipping key combination {} .. {} on index {}: {}",
                        from,
                        to,
                        self.index.name(),
                        e
                    ),
                },
            }
        }
        Ok(())
    }

    fn evaluate(&self, expressions: &[&Expression]) -> Vec<Value> {
        expressions.iter().map(|e| e.evaluate(self.ctx)).collect()
    }

    fn types(&self) -> &[PropertyType] {
        &self.index.definition().types
    }

    /// `[v]` stands for `v` on a plain single-property index
    fn unwrap_single(&self, value: Value) -> Value {
        let definition = self.index.definition();
        match value {
            Value::List(mut items)
                if items.len() == 1 && !definition.is_composite() && !definition.multi_value =>
            {
                items.pop().unwrap_or(Value::Null)
            }
            other => other,
        }
    }

    /// Coerce a key (or key prefix) to the index property types
    fn convert_to_index_types(&self, value: &Value) -> ExecResult<Value> {
        let types = self.types();
        let items = match value {
            Value::Null => return Ok(Value::Null),
            Value::List(_) | Value::LinkList(_) => value.clone().into_items().unwrap_or_default(),
            scalar => {
                let ty = types.first().copied().unwrap_or(PropertyType::Any);
                return Ok(ty.convert(scalar)?);
            }
        };

        let mut converted = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            let ty = types.get(i).ok_or_else(|| {
                ExecutionError::TypeConversion(format!(
                    "key {} has more components than index {}",
                    value,
                    self.index.name()
                ))
            })?;
            converted.push(ty.convert(item)?);
        }

        for (j, cond) in self.block.iter().enumerate() {
            let Some(component) = converted.get_mut(j) else {
                break;
            };
            let wrap_as = match cond {
                KeyCondition::Binary(b) if b.operator == CompareOperator::ContainsKey => {
                    Some(MapSide::Key)
                }
                KeyCondition::Binary(b) if b.operator == CompareOperator::ContainsValue => {
                    Some(MapSide::Value)
                }
                KeyCondition::ContainsValue { .. } => Some(MapSide::Value),
                _ => None,
            };
            if let Some(side) = wrap_as {
                let inner = std::mem::replace(component, Value::Null);
                *component = side.wrap(inner);
            }
        }
        Ok(Value::List(converted))
    }

    /// Index keys for one bound; empty means the null key
    fn bound_keys(&self, value: &Value) -> ExecResult<Vec<IndexKey>> {
        let definition = self.index.definition();
        let value = match value {
            Value::List(items) if !definition.is_composite() => {
                items.first().cloned().unwrap_or(Value::Null)
            }
            other => other.clone(),
        };
        Ok(definition.create_keys(&value)?)
    }

    fn dispatch(&self, from: &Value, to: &Value, bounds: Bounds, scans: &mut ScanList) -> ExecResult<()> {
        let from_keys = self.bound_keys(from)?;
        let to_keys = self.bound_keys(to)?;

        if self.index.supports_ordered_iterations() {
            if from_keys.is_empty() && to_keys.is_empty() {
                scans.push(IndexScan::NullKeys);
                return Ok(());
            }
            let pairs: Vec<(Option<IndexKey>, Option<IndexKey>)> =
                match (from_keys.len(), to_keys.len()) {
                    (f, t) if f == t => from_keys
                        .into_iter()
                        .map(Some)
                        .zip(to_keys.into_iter().map(Some))
                        .collect(),
                    (_, 0) => from_keys.into_iter().map(|k| (Some(k), None)).collect(),
                    (0, _) => to_keys.into_iter().map(|k| (None, Some(k))).collect(),
                    (f, t) => {
                        return Err(ExecutionError::invalid_plan(format!(
                            "Size of from and to keys for index range search do not match: {} != {}",
                            f, t
                        )))
                    }
                };
            for (from, to) in pairs {
                scans.push(bounds.scan(from, to));
            }
            return Ok(());
        }

        let all_equalities = self.desc.additional_range_condition().is_none()
            && self.block.iter().all(KeyCondition::is_equality);
        let native_full_text = self.index.index_type() == IndexType::FullText
            && self.index.algorithm() != IndexAlgorithm::Lucene;
        if all_equalities || native_full_text {
            if from_keys.is_empty() {
                scans.push(IndexScan::NullKeys);
            } else {
                scans.push(IndexScan::Exact {
                    keys: from_keys,
                    ascending: bounds.ascending,
                });
            }
            return Ok(());
        }

        Err(ExecutionError::UnsupportedIndexQuery {
            condition: self.block.to_string(),
            index: self.index.name().to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy)]
struct Bounds {
    from_inclusive: bool,
    to_inclusive: bool,
    ascending: bool,
}

impl Bounds {
    fn scan(self, from: Option<IndexKey>, to: Option<IndexKey>) -> IndexScan {
        match (from, to) {
            // Both bounds on the same key, both included: a point lookup
            (Some(from), Some(to)) if from == to && self.from_inclusive && self.to_inclusive => {
                IndexScan::Exact {
                    keys: vec![from],
                    ascending: self.ascending,
                }
            }
            (from, to) => IndexScan::Range {
                from,
                from_inclusive: self.from_inclusive,
                to,
                to_inclusive: self.to_inclusive,
                ascending: self.ascending,
            },
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum MapSide {
    Key,
    Value,
}

impl MapSide {
    /// Map-indexed properties are looked up through a one-entry map
    fn wrap(self, value: Value) -> Value {
        let mut map = BTreeMap::new();
        match self {
            MapSide::Key => {
                let key = match value {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                map.insert(key, Value::String(String::new()));
            }
            MapSide::Value => {
                map.insert(String::new(), value);
            }
        }
        Value::Map(map)
    }
}

/// Every combination of the key components, expanding list components
fn cartesian_product(components: &[Value]) -> Vec<Vec<Value>> {
    let mut combinations: Vec<Vec<Value>> = vec![Vec::new()];
    for component in components {
        let choices = match component {
            Value::List(_) | Value::LinkList(_) => component.clone().into_items().unwrap_or_default(),
            single => vec![single.clone()],
        };
        combinations = combinations
            .into_iter()
            .flat_map(|head| {
                choices.iter().map(move |choice| {
                    let mut next = head.clone();
                    next.push(choice.clone());
                    next
                })
            })
            .collect();
    }
    combinations
}

/// Rows coming from sub-queries stand for their identity or their only column
fn unbox_result(value: Value) -> Value {
    match value {
        Value::List(items) => Value::List(items.into_iter().map(unbox_result).collect()),
        Value::Row(row) => {
            if let Some(rid) = row.rid() {
                return Value::Link(rid);
            }
            match row.property_names() {
                Ok(names) if names.len() == 1 => match row.get(&names[0]) {
                    Ok(Some(value)) => value,
                    _ => Value::Null,
                },
                _ => Value::Row(row),
            }
        }
        other => other,
    }
}
