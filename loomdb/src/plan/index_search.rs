// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Index search descriptor: which index, under which key condition, in
//! which direction

use super::predicate::{AndBlock, BinaryCondition, KeyCondition};
use crate::exec::stats::QueryStats;
use crate::storage::indexes::Index;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Immutable description of one index access
#[derive(Debug, Clone)]
pub struct IndexSearchDescriptor {
    index: Arc<dyn Index>,
    key_condition: Option<AndBlock>,
    additional_range_condition: Option<BinaryCondition>,
    ascending: bool,
}

/// Serializable form of a descriptor; the index is referenced by name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedIndexSearch {
    pub index_name: String,
    pub key_condition: Option<AndBlock>,
    pub additional_range_condition: Option<BinaryCondition>,
    pub ascending: bool,
}

impl IndexSearchDescriptor {
    pub fn new(
        index: Arc<dyn Index>,
        key_condition: Option<AndBlock>,
        additional_range_condition: Option<BinaryCondition>,
        ascending: bool,
    ) -> Self {
        Self {
            index,
            // An empty conjunction is the same as no condition at all
            key_condition: key_condition.filter(|block| !block.is_empty()),
            additional_range_condition,
            ascending,
        }
    }

    /// Full scan of the index
    pub fn full_scan(index: Arc<dyn Index>, ascending: bool) -> Self {
        Self::new(index, None, None, ascending)
    }

    pub fn index(&self) -> &Arc<dyn Index> {
        &self.index
    }

    pub fn key_condition(&self) -> Option<&AndBlock> {
        self.key_condition.as_ref()
    }

    pub fn additional_range_condition(&self) -> Option<&BinaryCondition> {
        self.additional_range_condition.as_ref()
    }

    pub fn is_ascending(&self) -> bool {
        self.ascending
    }

    fn blocks(&self) -> &[KeyCondition] {
        self.key_condition
            .as_ref()
            .map_or(&[][..], |block| block.conditions.as_slice())
    }

    pub fn block_count(&self) -> usize {
        self.blocks().len()
    }

    /// Any conjunct other than a plain comparison needs one lookup per value
    pub fn requires_multiple_index_lookups(&self) -> bool {
        self.blocks()
            .iter()
            .any(|cond| !matches!(cond, KeyCondition::Binary(_)))
    }

    pub fn requires_distinct_step(&self) -> bool {
        self.requires_multiple_index_lookups() || self.duplicate_results_for_record()
    }

    /// Multi-value indexes hold one entry per element, so a record can match twice
    pub fn duplicate_results_for_record(&self) -> bool {
        self.index.definition().multi_value
    }

    /// Whether the index order already satisfies `order_by`.
    ///
    /// Leading `=` conjuncts fix their key positions, so an ORDER BY may
    /// start with them or skip them entirely.
    pub fn fully_sorted(&self, order_by: &[&str]) -> bool {
        let conditions = self.blocks();
        let mut fixed = Vec::new();
        for (i, cond) in conditions.iter().enumerate() {
            if cond.is_equals() {
                fixed.push(cond.field());
            } else if matches!(cond, KeyCondition::In { .. }) || i != conditions.len() - 1 {
                return false;
            }
        }

        let mut remaining = order_by;
        let mut ordered_fields: Vec<&str> = Vec::new();
        let mut overlapping = false;
        for field in fixed {
            let Some((first, rest)) = remaining.split_first() else {
                return true;
            };
            if *first == field {
                remaining = rest;
                overlapping = true;
            } else if overlapping {
                return false;
            }
            ordered_fields.push(field);
        }
        ordered_fields.extend_from_slice(remaining);

        let properties = &self.index.definition().properties;
        properties.len() >= ordered_fields.len()
            && ordered_fields
                .iter()
                .zip(properties)
                .all(|(field, property)| *field == property.as_str())
    }

    /// Whether this descriptor's conjuncts are a leading subsequence of `other`'s
    pub fn is_prefix_of(&self, other: &IndexSearchDescriptor) -> bool {
        let (left, right) = (self.blocks(), other.blocks());
        left.len() <= right.len() && left.iter().zip(right).all(|(a, b)| a == b)
    }

    /// Same conjuncts, regardless of the index
    pub fn is_same_condition(&self, other: &IndexSearchDescriptor) -> bool {
        self.blocks() == other.blocks()
    }

    /// Expected rows from past executions of the same access shape;
    /// `u64::MAX` when nothing was recorded
    pub fn cost(&self, stats: &QueryStats) -> u64 {
        stats
            .index_stats(
                self.index.name(),
                self.block_count(),
                self.is_range(),
                self.additional_range_condition.is_some(),
            )
            .unwrap_or(u64::MAX)
    }

    /// Whether the last conjunct is a range comparison
    pub fn is_range(&self) -> bool {
        self.blocks().last().map_or(false, KeyCondition::is_range)
    }

    pub fn serialize(&self) -> SerializedIndexSearch {
        SerializedIndexSearch {
            index_name: self.index.name().to_string(),
            key_condition: self.key_condition.clone(),
            additional_range_condition: self.additional_range_condition.clone(),
            ascending: self.ascending,
        }
    }

    /// Rebuild from serialized form against a resolved index
    pub fn from_serialized(index: Arc<dyn Index>, serialized: SerializedIndexSearch) -> Self {
        Self::new(
            index,
            serialized.key_condition,
            serialized.additional_range_condition,
            serialized.ascending,
        )
    }
}

impl fmt::Display for IndexSearchDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index.name())?;
        if let Some(block) = &self.key_condition {
            write!(f, " ({}", block)?;
            if let Some(additional) = &self.additional_range_condition {
                write!(f, " and {}", additional)?;
            }
            write!(f, ")")?;
        }
        write!(f, " {}", if self.ascending { "ASC" } else { "DESC" })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::predicate::{CompareOperator, Expression};
    use crate::storage::indexes::{ordered::OrderedIndex, IndexDefinition, IndexType};
    use crate::storage::{PropertyType, Value};

    fn composite() -> Arc<dyn Index> {
        let def = IndexDefinition::new(
            "Person",
            vec![
                ("city", PropertyType::String),
                ("age", PropertyType::Integer),
                ("name", PropertyType::String),
            ],
        )
        .unwrap();
        Arc::new(OrderedIndex::new("Person.city_age_name", def, IndexType::NotUnique))
    }

    fn eq(field: &str, value: Value) -> KeyCondition {
        KeyCondition::eq(field, value)
    }

    #[test]
    fn test_fully_sorted() {
        let desc = IndexSearchDescriptor::new(
            composite(),
            Some(AndBlock::new(vec![eq("city", Value::from("NYC"))])),
            None,
            true,
        );
        assert!(desc.fully_sorted(&["age", "name"]));
        assert!(desc.fully_sorted(&["city", "age"]));
        assert!(!desc.fully_sorted(&["name"]));
        assert!(desc.fully_sorted(&[]));

        let with_in = IndexSearchDescriptor::new(
            composite(),
            Some(AndBlock::new(vec![KeyCondition::in_list(
                "city",
                Value::from(vec!["A", "B"]),
            )])),
            None,
            true,
        );
        assert!(!with_in.fully_sorted(&["city"]));
    }

    #[test]
    fn test_lookup_shape() {
        let index = composite();
        let single = IndexSearchDescriptor::new(
            index.clone(),
            Some(AndBlock::new(vec![eq("city", Value::from("A"))])),
            None,
            true,
        );
        let double = IndexSearchDescriptor::new(
            index.clone(),
            Some(AndBlock::new(vec![
                eq("city", Value::from("A")),
                KeyCondition::in_list("age", Expression::Parameter("ages".into())),
            ])),
            None,
            true,
        );
        assert_eq!(double.block_count(), 2);
        assert!(!single.requires_multiple_index_lookups());
        assert!(double.requires_multiple_index_lookups());
        assert!(double.requires_distinct_step());
        assert!(single.is_prefix_of(&double));
        assert!(!double.is_prefix_of(&single));
        assert!(!single.is_same_condition(&double));
        assert!(!single.duplicate_results_for_record());
    }

    #[test]
    fn test_cost_uses_recorded_stats() {
        let stats = QueryStats::new();
        let desc = IndexSearchDescriptor::new(
            composite(),
            Some(AndBlock::new(vec![KeyCondition::binary(
                "city",
                CompareOperator::Gt,
                Value::from("M"),
            )])),
            None,
            true,
        );
        assert_eq!(desc.cost(&stats), u64::MAX);
        stats.push_index_stats("Person.city_age_name", 1, true, false, 42);
        assert_eq!(desc.cost(&stats), 42);
    }

    #[test]
    fn test_display_and_serialize() {
        let desc = IndexSearchDescriptor::new(
            composite(),
            Some(AndBlock::new(vec![KeyCondition::binary(
                "city",
                CompareOperator::Ge,
                Value::from("A"),
            )])),
            Some(BinaryCondition::new("city", CompareOperator::Lt, Value::from("C"))),
            false,
        );
        assert_eq!(
            desc.to_string(),
            "Person.city_age_name (city >= \"A\" and city < \"C\") DESC"
        );
        let serialized = desc.serialize();
        assert_eq!(serialized.index_name, "Person.city_age_name");
        assert!(!serialized.ascending);
        let back = IndexSearchDescriptor::from_serialized(composite(), serialized);
        assert!(back.is_same_condition(&desc));
    }
}
