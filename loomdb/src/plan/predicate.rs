// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Key conditions handed to the index access path
//!
//! The statement compiler matches WHERE conjuncts to index key positions and
//! passes them here as an [`AndBlock`]: one [`KeyCondition`] per indexed
//! property, in index property order.

use crate::exec::context::CommandContext;
use crate::storage::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Comparison operators usable against an index key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareOperator {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
    /// Map property contains the key
    ContainsKey,
    /// Map property contains the value
    ContainsValue,
}

impl CompareOperator {
    pub fn is_inclusive(self) -> bool {
        matches!(self, CompareOperator::Ge | CompareOperator::Le)
    }

    /// `>` or `>=`
    pub fn is_greater(self) -> bool {
        matches!(self, CompareOperator::Gt | CompareOperator::Ge)
    }

    /// `<` or `<=`
    pub fn is_less(self) -> bool {
        matches!(self, CompareOperator::Lt | CompareOperator::Le)
    }

    pub fn is_range(self) -> bool {
        self.is_greater() || self.is_less()
    }

    /// Operators that pin a key to a single value
    pub fn is_equality(self) -> bool {
        matches!(
            self,
            CompareOperator::Eq | CompareOperator::ContainsKey | CompareOperator::ContainsValue
        )
    }

    /// Whether the operator bounds the lower end of a key range
    fn bounds_from(self) -> bool {
        self.is_equality() || self.is_greater()
    }

    /// Whether the operator bounds the upper end of a key range
    fn bounds_to(self) -> bool {
        self.is_equality() || self.is_less()
    }
}

impl fmt::Display for CompareOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            CompareOperator::Eq => "=",
            CompareOperator::Lt => "<",
            CompareOperator::Le => "<=",
            CompareOperator::Gt => ">",
            CompareOperator::Ge => ">=",
            CompareOperator::ContainsKey => "CONTAINSKEY",
            CompareOperator::ContainsValue => "CONTAINSVALUE",
        };
        f.write_str(symbol)
    }
}

/// Right-hand side of a key condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expression {
    Literal(Value),
    /// Query parameter; unbound parameters evaluate to null
    Parameter(String),
    /// Context variable; unbound or stream variables evaluate to null
    Variable(String),
}

impl Expression {
    pub fn evaluate(&self, ctx: &CommandContext) -> Value {
        match self {
            Expression::Literal(value) => value.clone(),
            Expression::Parameter(name) => ctx.parameter(name).cloned().unwrap_or(Value::Null),
            Expression::Variable(name) => ctx.variable_value(name).unwrap_or(Value::Null),
        }
    }
}

impl From<Value> for Expression {
    fn from(value: Value) -> Self {
        Expression::Literal(value)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Literal(value) => write!(f, "{}", value),
            Expression::Parameter(name) => write!(f, ":{}", name),
            Expression::Variable(name) => write!(f, "${}", name),
        }
    }
}

/// `field <op> right`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinaryCondition {
    pub field: String,
    pub operator: CompareOperator,
    pub right: Expression,
}

impl BinaryCondition {
    pub fn new(field: impl Into<String>, operator: CompareOperator, right: impl Into<Expression>) -> Self {
        Self {
            field: field.into(),
            operator,
            right: right.into(),
        }
    }

    /// The right side, if this condition bounds the lower end of a range
    fn lower_bound(&self) -> Option<&Expression> {
        self.operator.is_greater().then_some(&self.right)
    }

    fn upper_bound(&self) -> Option<&Expression> {
        self.operator.is_less().then_some(&self.right)
    }
}

impl fmt::Display for BinaryCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.field, self.operator, self.right)
    }
}

/// One conjunct of an index key condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum KeyCondition {
    Binary(BinaryCondition),
    /// `field IN right`
    In { field: String, right: Expression },
    /// `field CONTAINS right`
    Contains { field: String, right: Expression },
    /// `field CONTAINSANY right`
    ContainsAny { field: String, right: Expression },
    /// `field CONTAINSTEXT right`
    ContainsText { field: String, right: Expression },
    /// `field CONTAINSVALUE (<op> right)`
    ContainsValue {
        field: String,
        operator: CompareOperator,
        right: Expression,
    },
}

impl KeyCondition {
    pub fn binary(field: impl Into<String>, operator: CompareOperator, right: impl Into<Expression>) -> Self {
        KeyCondition::Binary(BinaryCondition::new(field, operator, right))
    }

    pub fn eq(field: impl Into<String>, right: impl Into<Expression>) -> Self {
        Self::binary(field, CompareOperator::Eq, right)
    }

    pub fn in_list(field: impl Into<String>, right: impl Into<Expression>) -> Self {
        KeyCondition::In {
            field: field.into(),
            right: right.into(),
        }
    }

    pub fn field(&self) -> &str {
        match self {
            KeyCondition::Binary(cond) => &cond.field,
            KeyCondition::In { field, .. }
            | KeyCondition::Contains { field, .. }
            | KeyCondition::ContainsAny { field, .. }
            | KeyCondition::ContainsText { field, .. }
            | KeyCondition::ContainsValue { field, .. } => field,
        }
    }

    /// Operator of the comparison shapes
    pub fn operator(&self) -> Option<CompareOperator> {
        match self {
            KeyCondition::Binary(cond) => Some(cond.operator),
            KeyCondition::ContainsValue { operator, .. } => Some(*operator),
            _ => None,
        }
    }

    /// Contribution to the lower key bound, if any
    pub fn resolve_key_from<'a>(&'a self, additional: Option<&'a BinaryCondition>) -> Option<&'a Expression> {
        match self {
            KeyCondition::Binary(BinaryCondition { operator, right, .. })
            | KeyCondition::ContainsValue { operator, right, .. } => {
                if operator.bounds_from() {
                    Some(right)
                } else {
                    additional.and_then(BinaryCondition::lower_bound)
                }
            }
            KeyCondition::In { right, .. }
            | KeyCondition::Contains { right, .. }
            | KeyCondition::ContainsAny { right, .. }
            | KeyCondition::ContainsText { right, .. } => Some(right),
        }
    }

    /// Contribution to the upper key bound, if any
    pub fn resolve_key_to<'a>(&'a self, additional: Option<&'a BinaryCondition>) -> Option<&'a Expression> {
        match self {
            KeyCondition::Binary(BinaryCondition { operator, right, .. })
            | KeyCondition::ContainsValue { operator, right, .. } => {
                if operator.bounds_to() {
                    Some(right)
                } else {
                    additional.and_then(BinaryCondition::upper_bound)
                }
            }
            KeyCondition::In { right, .. }
            | KeyCondition::Contains { right, .. }
            | KeyCondition::ContainsAny { right, .. }
            | KeyCondition::ContainsText { right, .. } => Some(right),
        }
    }

    /// Whether the lower bound includes its key when this is the last conjunct
    pub fn from_inclusive(&self, additional: Option<&BinaryCondition>) -> bool {
        let by_additional =
            || additional.map_or(true, |a| a.operator.is_inclusive() && a.operator.is_greater());
        match self {
            KeyCondition::Binary(BinaryCondition { operator, .. })
            | KeyCondition::ContainsValue { operator, .. } => {
                if operator.is_greater() {
                    operator.is_inclusive()
                } else {
                    by_additional()
                }
            }
            KeyCondition::In { .. } | KeyCondition::Contains { .. } | KeyCondition::ContainsAny { .. } => {
                by_additional()
            }
            KeyCondition::ContainsText { .. } => true,
        }
    }

    /// Whether the upper bound includes its key when this is the last conjunct
    pub fn to_inclusive(&self, additional: Option<&BinaryCondition>) -> bool {
        let by_additional =
            || additional.map_or(true, |a| a.operator.is_inclusive() && a.operator.is_less());
        match self {
            KeyCondition::Binary(BinaryCondition { operator, .. })
            | KeyCondition::ContainsValue { operator, .. } => {
                if operator.is_less() {
                    operator.is_inclusive()
                } else {
                    by_additional()
                }
            }
            KeyCondition::In { .. } | KeyCondition::Contains { .. } | KeyCondition::ContainsAny { .. } => {
                by_additional()
            }
            KeyCondition::ContainsText { .. } => true,
        }
    }

    /// Conjuncts answerable by exact key lookups
    pub fn is_equality(&self) -> bool {
        match self {
            KeyCondition::Binary(cond) => cond.operator.is_equality(),
            KeyCondition::In { .. } => true,
            _ => false,
        }
    }

    /// `=` comparisons; the key position is fixed to one value
    pub fn is_equals(&self) -> bool {
        matches!(self, KeyCondition::Binary(cond) if cond.operator == CompareOperator::Eq)
    }

    /// A range comparison such as `>` or `<=`
    pub fn is_range(&self) -> bool {
        matches!(self, KeyCondition::Binary(cond) if cond.operator.is_range())
    }
}

impl From<BinaryCondition> for KeyCondition {
    fn from(cond: BinaryCondition) -> Self {
        KeyCondition::Binary(cond)
    }
}

impl fmt::Display for KeyCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyCondition::Binary(cond) => write!(f, "{}", cond),
            KeyCondition::In { field, right } => write!(f, "{} IN {}", field, right),
            KeyCondition::Contains { field, right } => write!(f, "{} CONTAINS {}", field, right),
            KeyCondition::ContainsAny { field, right } => {
                write!(f, "{} CONTAINSANY {}", field, right)
            }
            KeyCondition::ContainsText { field, right } => {
                write!(f, "{} CONTAINSTEXT {}", field, right)
            }
            KeyCondition::ContainsValue {
                field,
                operator,
                right,
            } => write!(f, "{} CONTAINSVALUE ({} {})", field, operator, right),
        }
    }
}

/// Conjunction of key conditions, one per leading index property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AndBlock {
    pub conditions: Vec<KeyCondition>,
}

impl AndBlock {
    pub fn new(conditions: Vec<KeyCondition>) -> Self {
        Self { conditions }
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn last(&self) -> Option<&KeyCondition> {
        self.conditions.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, KeyCondition> {
        self.conditions.iter()
    }
}

impl From<Vec<KeyCondition>> for AndBlock {
    fn from(conditions: Vec<KeyCondition>) -> Self {
        AndBlock::new(conditions)
    }
}

impl fmt::Display for AndBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, cond) in self.conditions.iter().enumerate() {
            if i > 0 {
                f.write_str(" AND ")?;
            }
            write!(f, "{}", cond)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use CompareOperator::*;

    fn lit(n: i64) -> Expression {
        Expression::Literal(Value::Integer(n))
    }

    #[test]
    fn test_operator_classes() {
        assert!(Ge.is_inclusive() && Le.is_inclusive());
        assert!(!Eq.is_inclusive() && !Gt.is_inclusive());
        assert!(Gt.is_greater() && !Lt.is_greater());
        assert!(ContainsKey.is_equality());
        assert!(!Eq.is_range());
    }

    #[test]
    fn test_binary_resolution() {
        let ge = KeyCondition::binary("a", Ge, lit(5));
        assert_eq!(ge.resolve_key_from(None), Some(&lit(5)));
        assert_eq!(ge.resolve_key_to(None), None);
        assert!(ge.from_inclusive(None));

        let eq = KeyCondition::eq("a", lit(1));
        assert_eq!(eq.resolve_key_from(None), Some(&lit(1)));
        assert_eq!(eq.resolve_key_to(None), Some(&lit(1)));
    }

    #[test]
    fn test_additional_condition_fills_uncovered_side() {
        let ge = KeyCondition::binary("a", Ge, lit(5));
        let lt = BinaryCondition::new("a", Lt, lit(10));
        assert_eq!(ge.resolve_key_to(Some(&lt)), Some(&lit(10)));
        assert!(ge.from_inclusive(Some(&lt)));
        assert!(!ge.to_inclusive(Some(&lt)));

        // A lower-bound additional condition says nothing about the upper side
        let gt = BinaryCondition::new("a", Gt, lit(1));
        assert_eq!(ge.resolve_key_to(Some(&gt)), None);
    }

    #[test]
    fn test_non_directional_inclusion() {
        let eq = KeyCondition::eq("a", lit(1));
        assert!(eq.from_inclusive(None) && eq.to_inclusive(None));
        let le = BinaryCondition::new("a", Le, lit(3));
        assert!(!eq.from_inclusive(Some(&le)));
        assert!(eq.to_inclusive(Some(&le)));

        let text = KeyCondition::ContainsText {
            field: "body".into(),
            right: Expression::Literal(Value::from("x")),
        };
        assert!(text.from_inclusive(Some(&BinaryCondition::new("body", Lt, Value::from("y")))));
    }

    #[test]
    fn test_display() {
        let block = AndBlock::new(vec![
            KeyCondition::in_list("a", Expression::Parameter("ids".into())),
            KeyCondition::eq("b", Value::from("x")),
            KeyCondition::binary("c", Gt, Expression::Variable("min".into())),
        ]);
        assert_eq!(block.to_string(), "a IN :ids AND b = \"x\" AND c > $min");
        assert_eq!(block.len(), 3);
    }
}
