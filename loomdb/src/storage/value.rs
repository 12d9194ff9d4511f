// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Value type system for record properties
//!
//! Supports the data types stored in entities and carried through query rows:
//! - Scalars: Boolean, Integer, Float, String, Binary, DateTime, Null
//! - References: Link, LinkList, LinkMap
//! - Containers: List, Map, Embedded entities
//! - Query-only values: nested result rows and lightweight edges

use crate::exec::result::ResultRow;
use crate::storage::types::{EmbeddedEntity, LightweightEdge, Rid};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use thiserror::Error;

/// Value coercion failure
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Cannot convert {value} ({from}) to {to}")]
pub struct ConversionError {
    pub value: String,
    pub from: &'static str,
    pub to: PropertyType,
}

impl ConversionError {
    fn new(value: &Value, to: PropertyType) -> Self {
        Self {
            value: value.to_string(),
            from: value.type_name(),
            to,
        }
    }
}

/// Value types for entity properties and row values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Binary(Vec<u8>),
    DateTime(DateTime<Utc>),
    Link(Rid),
    LinkList(Vec<Rid>),
    LinkMap(BTreeMap<String, Rid>),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Embedded(EmbeddedEntity),
    Edge(LightweightEdge),
    /// Nested result row, only produced during query execution
    #[serde(skip)]
    Row(Box<ResultRow>),
}

impl Value {
    /// Check if value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Identity referenced by this value: a link, or an entity-backed row
    pub fn as_rid(&self) -> Option<Rid> {
        match self {
            Value::Link(rid) => Some(*rid),
            Value::Row(row) => row.rid(),
            _ => None,
        }
    }

    pub fn as_row(&self) -> Option<&ResultRow> {
        match self {
            Value::Row(row) => Some(row),
            _ => None,
        }
    }

    /// True for values that are iterated element by element
    pub fn is_collection(&self) -> bool {
        matches!(self, Value::List(_) | Value::LinkList(_))
    }

    /// Elements of a list or link list, `None` for anything else
    pub fn into_items(self) -> Option<Vec<Value>> {
        match self {
            Value::List(items) => Some(items),
            Value::LinkList(links) => Some(links.into_iter().map(Value::Link).collect()),
            _ => None,
        }
    }

    /// Get the type name of this value
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Boolean(_) => "Boolean",
            Value::Integer(_) => "Integer",
            Value::Float(_) => "Float",
            Value::String(_) => "String",
            Value::Binary(_) => "Binary",
            Value::DateTime(_) => "DateTime",
            Value::Link(_) => "Link",
            Value::LinkList(_) => "LinkList",
            Value::LinkMap(_) => "LinkMap",
            Value::List(_) => "List",
            Value::Map(_) => "Map",
            Value::Embedded(_) => "Embedded",
            Value::Edge(_) => "Edge",
            Value::Row(_) => "Row",
        }
    }

    fn type_rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Boolean(_) => 1,
            Value::Integer(_) | Value::Float(_) => 2,
            Value::String(_) => 3,
            Value::Binary(_) => 4,
            Value::DateTime(_) => 5,
            Value::Link(_) => 6,
            Value::LinkList(_) => 7,
            Value::LinkMap(_) => 8,
            Value::List(_) => 9,
            Value::Map(_) => 10,
            Value::Embedded(_) => 11,
            Value::Edge(_) => 12,
            Value::Row(_) => 13,
        }
    }

    /// Total order used by index keys.
    ///
    /// Values of different types order by type; integers and floats compare
    /// numerically and NaN sorts after every other number.
    pub fn compare(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
            (Value::Integer(_), Value::Float(_))
            | (Value::Float(_), Value::Integer(_))
            | (Value::Float(_), Value::Float(_)) => {
                let a = self.as_float().unwrap_or(f64::NAN);
                let b = other.as_float().unwrap_or(f64::NAN);
                a.partial_cmp(&b)
                    .unwrap_or_else(|| a.is_nan().cmp(&b.is_nan()))
            }
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Binary(a), Value::Binary(b)) => a.cmp(b),
            (Value::DateTime(a), Value::DateTime(b)) => a.cmp(b),
            (Value::Link(a), Value::Link(b)) => a.cmp(b),
            (Value::LinkList(a), Value::LinkList(b)) => a.cmp(b),
            (Value::LinkMap(a), Value::LinkMap(b)) => a.cmp(b),
            (Value::List(a), Value::List(b)) => compare_slices(a, b),
            (Value::Map(a), Value::Map(b)) => {
                for ((ka, va), (kb, vb)) in a.iter().zip(b.iter()) {
                    let ord = ka.cmp(kb).then_with(|| va.compare(vb));
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                a.len().cmp(&b.len())
            }
            (Value::Embedded(a), Value::Embedded(b)) => a
                .class
                .cmp(&b.class)
                .then_with(|| {
                    let left: Vec<Value> = a.properties.values().cloned().collect();
                    let right: Vec<Value> = b.properties.values().cloned().collect();
                    compare_slices(&left, &right)
                }),
            (Value::Edge(a), Value::Edge(b)) => (&a.class, a.out, a.r#in).cmp(&(&b.class, b.out, b.r#in)),
            (Value::Row(a), Value::Row(b)) => a.rid().cmp(&b.rid()),
            _ => self.type_rank().cmp(&other.type_rank()),
        }
    }

    /// Build a value from the current time
    pub fn now() -> Value {
        Value::DateTime(Utc::now())
    }

    /// Build a date-time value from epoch milliseconds
    pub fn from_epoch_millis(millis: i64) -> Value {
        match Utc.timestamp_millis_opt(millis).single() {
            Some(dt) => Value::DateTime(dt),
            None => Value::Null,
        }
    }
}

fn compare_slices(a: &[Value], b: &[Value]) -> Ordering {
    for (x, y) in a.iter().zip(b.iter()) {
        let ord = x.compare(y);
        if ord != Ordering::Equal {
            return ord;
        }
    }
    a.len().cmp(&b.len())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
            write!(f, "[")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", item)?;
            }
            write!(f, "]")
        }

        match self {
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "\"{}\"", s),
            Value::Binary(bytes) => write!(f, "BINARY({} bytes)", bytes.len()),
            Value::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S UTC")),
            Value::Link(rid) => write!(f, "{}", rid),
            Value::LinkList(links) => write_list(f, links),
            Value::List(items) => write_list(f, items),
            Value::LinkMap(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
            Value::Map(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
            Value::Embedded(entity) => {
                write!(
                    f,
                    "EMBEDDED({}, {} properties)",
                    entity.class.as_deref().unwrap_or("-"),
                    entity.properties.len()
                )
            }
            Value::Edge(edge) => write!(f, "EDGE({})", edge),
            Value::Row(row) => write!(f, "{}", row),
        }
    }
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Value::Null => 0.hash(state),
            Value::Boolean(b) => {
                1.hash(state);
                b.hash(state);
            }
            // Integers and floats that compare equal must hash equal
            Value::Integer(_) | Value::Float(_) => {
                2.hash(state);
                let n = self.as_float().unwrap_or(f64::NAN);
                if n.is_nan() {
                    "NaN".hash(state);
                } else if n == 0.0 {
                    0.0f64.to_bits().hash(state);
                } else {
                    n.to_bits().hash(state);
                }
            }
            Value::String(s) => {
                3.hash(state);
                s.hash(state);
            }
            Value::Binary(bytes) => {
                4.hash(state);
                bytes.hash(state);
            }
            Value::DateTime(dt) => {
                5.hash(state);
                dt.timestamp().hash(state);
                dt.timestamp_subsec_nanos().hash(state);
            }
            Value::Link(rid) => {
                6.hash(state);
                rid.hash(state);
            }
            Value::LinkList(links) => {
                7.hash(state);
                links.hash(state);
            }
            Value::LinkMap(map) => {
                8.hash(state);
                map.hash(state);
            }
            Value::List(items) => {
                9.hash(state);
                items.len().hash(state);
                for item in items {
                    item.hash(state);
                }
            }
            Value::Map(map) => {
                10.hash(state);
                map.len().hash(state);
                for (k, v) in map {
                    k.hash(state);
                    v.hash(state);
                }
            }
            Value::Embedded(entity) => {
                11.hash(state);
                entity.class.hash(state);
                entity.properties.len().hash(state);
            }
            Value::Edge(edge) => {
                12.hash(state);
                edge.hash(state);
            }
            Value::Row(row) => {
                13.hash(state);
                row.rid().hash(state);
            }
        }
    }
}

/// Convert from Rust primitive types to Value
impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(n as i64)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(dt: DateTime<Utc>) -> Self {
        Value::DateTime(dt)
    }
}

impl From<Rid> for Value {
    fn from(rid: Rid) -> Self {
        Value::Link(rid)
    }
}

impl From<EmbeddedEntity> for Value {
    fn from(entity: EmbeddedEntity) -> Self {
        Value::Embedded(entity)
    }
}

impl From<LightweightEdge> for Value {
    fn from(edge: LightweightEdge) -> Self {
        Value::Edge(edge)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(vec: Vec<T>) -> Self {
        Value::List(vec.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Value::Null, Into::into)
    }
}

/// Declared type of an indexed or schema property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyType {
    Any,
    Boolean,
    Integer,
    Float,
    String,
    Binary,
    DateTime,
    Link,
    List,
    Map,
    Embedded,
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PropertyType::Any => "ANY",
            PropertyType::Boolean => "BOOLEAN",
            PropertyType::Integer => "INTEGER",
            PropertyType::Float => "FLOAT",
            PropertyType::String => "STRING",
            PropertyType::Binary => "BINARY",
            PropertyType::DateTime => "DATETIME",
            PropertyType::Link => "LINK",
            PropertyType::List => "LIST",
            PropertyType::Map => "MAP",
            PropertyType::Embedded => "EMBEDDED",
        };
        write!(f, "{}", name)
    }
}

impl PropertyType {
    /// Coerce a value to this type. Null converts to null for every type.
    pub fn convert(&self, value: &Value) -> Result<Value, ConversionError> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        let fail = || ConversionError::new(value, *self);

        match self {
            PropertyType::Any => Ok(value.clone()),
            PropertyType::Boolean => match value {
                Value::Boolean(_) => Ok(value.clone()),
                Value::String(s) => match s.to_ascii_lowercase().as_str() {
                    "true" => Ok(Value::Boolean(true)),
                    "false" => Ok(Value::Boolean(false)),
                    _ => Err(fail()),
                },
                Value::Integer(i) => Ok(Value::Boolean(*i != 0)),
                _ => Err(fail()),
            },
            PropertyType::Integer => match value {
                Value::Integer(_) => Ok(value.clone()),
                Value::Float(f) if f.fract() == 0.0 && f.is_finite() => {
                    Ok(Value::Integer(*f as i64))
                }
                Value::String(s) => s.trim().parse().map(Value::Integer).map_err(|_| fail()),
                Value::Boolean(b) => Ok(Value::Integer(i64::from(*b))),
                Value::DateTime(dt) => Ok(Value::Integer(dt.timestamp_millis())),
                _ => Err(fail()),
            },
            PropertyType::Float => match value {
                Value::Float(_) => Ok(value.clone()),
                Value::Integer(i) => Ok(Value::Float(*i as f64)),
                Value::String(s) => s.trim().parse().map(Value::Float).map_err(|_| fail()),
                _ => Err(fail()),
            },
            PropertyType::String => match value {
                Value::String(_) => Ok(value.clone()),
                Value::Integer(i) => Ok(Value::String(i.to_string())),
                Value::Float(n) => Ok(Value::String(n.to_string())),
                Value::Boolean(b) => Ok(Value::String(b.to_string())),
                Value::Link(rid) => Ok(Value::String(rid.to_string())),
                Value::DateTime(dt) => Ok(Value::String(dt.to_rfc3339())),
                _ => Err(fail()),
            },
            PropertyType::Binary => match value {
                Value::Binary(_) => Ok(value.clone()),
                Value::String(s) => Ok(Value::Binary(s.as_bytes().to_vec())),
                _ => Err(fail()),
            },
            PropertyType::DateTime => match value {
                Value::DateTime(_) => Ok(value.clone()),
                Value::Integer(millis) => match Value::from_epoch_millis(*millis) {
                    Value::Null => Err(fail()),
                    dt => Ok(dt),
                },
                Value::String(s) => DateTime::parse_from_rfc3339(s)
                    .map(|dt| Value::DateTime(dt.with_timezone(&Utc)))
                    .map_err(|_| fail()),
                _ => Err(fail()),
            },
            PropertyType::Link => match value {
                Value::Link(_) => Ok(value.clone()),
                Value::String(s) => s.parse().map(Value::Link).map_err(|_| fail()),
                Value::Row(row) => row.rid().map(Value::Link).ok_or_else(fail),
                _ => Err(fail()),
            },
            PropertyType::List => match value {
                Value::List(_) => Ok(value.clone()),
                Value::LinkList(_) => Ok(value.clone()),
                _ => Err(fail()),
            },
            PropertyType::Map => match value {
                Value::Map(_) | Value::LinkMap(_) => Ok(value.clone()),
                Value::Embedded(entity) => Ok(Value::Map(entity.properties.clone())),
                _ => Err(fail()),
            },
            PropertyType::Embedded => match value {
                Value::Embedded(_) => Ok(value.clone()),
                Value::Map(map) => Ok(Value::Embedded(EmbeddedEntity {
                    class: None,
                    properties: map.clone(),
                })),
                _ => Err(fail()),
            },
        }
    }
}
