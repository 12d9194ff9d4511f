// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Result rows flowing through execution streams
//!
//! A row is exactly one of:
//! - entity-backed: reads through to a stored record, writable only when updatable
//! - edge-backed: a lightweight edge known only by its endpoints
//! - projection: an insertion-ordered map owned by the row
//!
//! Rows stay bound to the session that produced them. Once that session is
//! closed every read fails with [`ExecutionError::SessionClosed`]; `detach`
//! produces a session-free snapshot.

use super::error::{ExecResult, ExecutionError};
use crate::config::ExecutionConfig;
use crate::session::Session;
use crate::storage::{Entity, LightweightEdge, Rid, Value};
use base64::Engine;
use indexmap::IndexMap;
use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
enum RowContent {
    Projection(IndexMap<String, Value>),
    Entity { rid: Rid, updatable: bool },
    Edge(LightweightEdge),
}

/// One row of query output
#[derive(Debug, Clone)]
pub struct ResultRow {
    content: RowContent,
    metadata: IndexMap<String, Value>,
    temporary: IndexMap<String, Value>,
    session: Option<Session>,
}

impl PartialEq for ResultRow {
    fn eq(&self, other: &Self) -> bool {
        self.content == other.content
            && self.metadata == other.metadata
            && self.temporary == other.temporary
    }
}

/// Property order for serialized rows: `@`-prefixed names first, then lexicographic
pub fn property_order(a: &str, b: &str) -> Ordering {
    match (a.starts_with('@'), b.starts_with('@')) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => a.cmp(b),
    }
}

/// Normalize a value before it is stored in a projection
fn convert_property_value(value: Value) -> Value {
    match value {
        Value::List(items) => {
            let all_links = !items.is_empty()
                && items.iter().all(|item| match item {
                    Value::Link(_) => true,
                    Value::Row(row) => row.is_entity(),
                    _ => false,
                });
            if all_links {
                Value::LinkList(items.iter().filter_map(Value::as_rid).collect())
            } else {
                Value::List(items.into_iter().map(convert_property_value).collect())
            }
        }
        Value::Map(map) => Value::Map(
            map.into_iter()
                .map(|(k, v)| (k, convert_property_value(v)))
                .collect(),
        ),
        Value::Row(row) => match row.rid() {
            Some(rid) => Value::Link(rid),
            None => Value::Row(row),
        },
        other => other,
    }
}

fn detach_value(value: Value) -> ExecResult<Value> {
    Ok(match value {
        Value::Row(row) => match row.rid() {
            Some(rid) => Value::Link(rid),
            None => Value::Row(Box::new(row.detach()?)),
        },
        Value::Embedded(entity) => Value::Map(
            entity
                .properties
                .into_iter()
                .map(|(k, v)| Ok((k, detach_value(v)?)))
                .collect::<ExecResult<_>>()?,
        ),
        Value::List(items) => Value::List(
            items
                .into_iter()
                .map(detach_value)
                .collect::<ExecResult<_>>()?,
        ),
        Value::Map(map) => Value::Map(
            map.into_iter()
                .map(|(k, v)| Ok((k, detach_value(v)?)))
                .collect::<ExecResult<_>>()?,
        ),
        other => other,
    })
}

fn sorted(mut map: IndexMap<String, Value>) -> IndexMap<String, Value> {
    map.sort_by(|a, _, b, _| property_order(a, b));
    map
}

impl ResultRow {
    /// Empty projection row bound to a session
    pub fn new(session: &Session) -> Self {
        Self::with_content(RowContent::Projection(IndexMap::new()), Some(session.clone()))
    }

    /// Empty projection row not bound to any session
    pub fn detached() -> Self {
        Self::with_content(RowContent::Projection(IndexMap::new()), None)
    }

    /// Read-only row backed by a stored entity
    pub fn from_entity(session: &Session, rid: Rid) -> Self {
        Self::with_content(
            RowContent::Entity {
                rid,
                updatable: false,
            },
            Some(session.clone()),
        )
    }

    /// Entity-backed row whose writes go to the stored entity
    pub fn updatable(session: &Session, rid: Rid) -> Self {
        Self::with_content(
            RowContent::Entity {
                rid,
                updatable: true,
            },
            Some(session.clone()),
        )
    }

    pub fn from_edge(session: &Session, edge: LightweightEdge) -> Self {
        Self::with_content(RowContent::Edge(edge), Some(session.clone()))
    }

    /// Projection row built from name/value pairs
    pub fn from_pairs<I, K>(session: Option<&Session>, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let content = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), convert_property_value(v)))
            .collect();
        Self::with_content(RowContent::Projection(content), session.cloned())
    }

    fn with_content(content: RowContent, session: Option<Session>) -> Self {
        Self {
            content,
            metadata: IndexMap::new(),
            temporary: IndexMap::new(),
            session,
        }
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn is_entity(&self) -> bool {
        matches!(self.content, RowContent::Entity { .. })
    }

    pub fn is_edge(&self) -> bool {
        matches!(self.content, RowContent::Edge(_))
    }

    pub fn is_projection(&self) -> bool {
        matches!(self.content, RowContent::Projection(_))
    }

    pub fn is_updatable(&self) -> bool {
        matches!(self.content, RowContent::Entity { updatable: true, .. })
    }

    /// Identity of the backing entity
    pub fn rid(&self) -> Option<Rid> {
        match self.content {
            RowContent::Entity { rid, .. } => Some(rid),
            _ => None,
        }
    }

    pub fn edge(&self) -> Option<&LightweightEdge> {
        match &self.content {
            RowContent::Edge(edge) => Some(edge),
            _ => None,
        }
    }

    fn check_session(&self) -> ExecResult<()> {
        match &self.session {
            Some(session) if !session.is_active() => Err(ExecutionError::SessionClosed),
            _ => Ok(()),
        }
    }

    fn bound_session(&self) -> ExecResult<&Session> {
        self.check_session()?;
        self.session.as_ref().ok_or_else(|| {
            ExecutionError::illegal_state("entity-backed row is not bound to a session")
        })
    }

    /// Load the backing entity; `None` for projections and dangling rows
    pub fn entity(&self) -> ExecResult<Option<Entity>> {
        match self.content {
            RowContent::Entity { rid, .. } => Ok(self.bound_session()?.load(rid)?),
            _ => {
                self.check_session()?;
                Ok(None)
            }
        }
    }

    /// Read a property. Unknown names and null values read as `None`.
    pub fn get(&self, name: &str) -> ExecResult<Option<Value>> {
        self.check_session()?;
        if let Some(value) = self.temporary.get(name) {
            return Ok(Some(value.clone()).filter(|v| !v.is_null()));
        }
        let value = match &self.content {
            RowContent::Projection(map) => map.get(name).cloned(),
            RowContent::Entity { rid, .. } => match name {
                "@rid" => Some(Value::Link(*rid)),
                _ => self.entity()?.and_then(|entity| match name {
                    "@class" => entity.class.map(Value::String),
                    _ => entity.properties.get(name).cloned(),
                }),
            },
            RowContent::Edge(edge) => match name {
                "out" => Some(Value::Link(edge.out)),
                "in" => Some(Value::Link(edge.r#in)),
                "@class" => Some(Value::String(edge.class.clone())),
                _ => None,
            },
        };
        Ok(value.filter(|v| !v.is_null()))
    }

    pub fn has_property(&self, name: &str) -> ExecResult<bool> {
        self.check_session()?;
        Ok(match &self.content {
            RowContent::Projection(map) => map.contains_key(name),
            RowContent::Entity { .. } => self
                .entity()?
                .map_or(false, |e| e.properties.contains_key(name)),
            RowContent::Edge(_) => matches!(name, "out" | "in"),
        })
    }

    /// Names of the row's own properties, in insertion order for projections
    pub fn property_names(&self) -> ExecResult<Vec<String>> {
        self.check_session()?;
        Ok(match &self.content {
            RowContent::Projection(map) => map.keys().cloned().collect(),
            RowContent::Entity { .. } => self
                .entity()?
                .map(|e| e.properties.into_keys().collect())
                .unwrap_or_default(),
            RowContent::Edge(_) => vec!["out".to_string(), "in".to_string()],
        })
    }

    /// Write a property on a projection or updatable entity row
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> ExecResult<()> {
        self.check_session()?;
        let value = convert_property_value(value.into());
        if let RowContent::Entity {
            rid,
            updatable: true,
        } = self.content
        {
            self.bound_session()?.set_property(rid, name, value)?;
            return Ok(());
        }
        match &mut self.content {
            RowContent::Projection(map) => {
                map.insert(name.to_string(), value);
                Ok(())
            }
            RowContent::Entity { rid, .. } => Err(ExecutionError::illegal_state(format!(
                "Impossible to mutate result set containing entity {}",
                rid
            ))),
            RowContent::Edge(edge) => Err(ExecutionError::illegal_state(format!(
                "Impossible to mutate result set containing edge {}",
                edge
            ))),
        }
    }

    pub fn remove_property(&mut self, name: &str) -> ExecResult<Option<Value>> {
        self.check_session()?;
        match &mut self.content {
            RowContent::Projection(map) => Ok(map.shift_remove(name)),
            _ => Err(ExecutionError::illegal_state(
                "Impossible to remove a property from an entity or edge row",
            )),
        }
    }

    /// Switch this row to entity mode, dropping any projection content
    pub fn set_entity(&mut self, rid: Rid) {
        self.content = RowContent::Entity {
            rid,
            updatable: false,
        };
    }

    /// Switch this row to edge mode, dropping any projection content
    pub fn set_edge(&mut self, edge: LightweightEdge) {
        self.content = RowContent::Edge(edge);
    }

    pub fn set_metadata(&mut self, key: &str, value: impl Into<Value>) {
        self.metadata.insert(key.to_string(), value.into());
    }

    pub fn metadata(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    pub fn metadata_keys(&self) -> Vec<&str> {
        self.metadata.keys().map(String::as_str).collect()
    }

    /// Temporary properties are readable through `get` but never serialized
    pub fn set_temporary(&mut self, name: &str, value: impl Into<Value>) {
        self.temporary.insert(name.to_string(), value.into());
    }

    pub fn temporary(&self, name: &str) -> Option<&Value> {
        self.temporary.get(name)
    }

    /// Property map in serialization order
    pub fn to_map(&self) -> ExecResult<IndexMap<String, Value>> {
        self.check_session()?;
        let map = match &self.content {
            RowContent::Projection(map) => map.clone(),
            RowContent::Entity { rid, .. } => {
                let mut map = IndexMap::new();
                map.insert("@rid".to_string(), Value::Link(*rid));
                if let Some(entity) = self.entity()? {
                    if let Some(class) = entity.class {
                        map.insert("@class".to_string(), Value::String(class));
                    }
                    map.extend(entity.properties);
                }
                map
            }
            RowContent::Edge(edge) => {
                let mut map = IndexMap::new();
                map.insert("@class".to_string(), Value::String(edge.class.clone()));
                map.insert("out".to_string(), Value::Link(edge.out));
                map.insert("in".to_string(), Value::Link(edge.r#in));
                map
            }
        };
        Ok(sorted(map))
    }

    pub fn to_json_value(&self) -> ExecResult<serde_json::Value> {
        let default_config;
        let config = match &self.session {
            Some(session) => session.config(),
            None => {
                default_config = ExecutionConfig::default();
                &default_config
            }
        };
        let encoder = JsonEncoder::new(config)?;
        let mut object = serde_json::Map::new();
        for (name, value) in self.to_map()? {
            object.insert(name, encoder.encode(&value)?);
        }
        Ok(serde_json::Value::Object(object))
    }

    /// Deterministic JSON rendering of the row
    pub fn to_json(&self) -> ExecResult<String> {
        Ok(serde_json::to_string(&self.to_json_value()?)?)
    }

    /// Session-independent snapshot of this row.
    ///
    /// Nested entities become their identity and embedded entities become
    /// plain maps. Lightweight edges cannot be detached.
    pub fn detach(&self) -> ExecResult<ResultRow> {
        if let RowContent::Edge(_) = self.content {
            return Err(ExecutionError::illegal_state("Cannot detach lightweight edge"));
        }
        let content = self
            .to_map()?
            .into_iter()
            .map(|(k, v)| Ok((k, detach_value(v)?)))
            .collect::<ExecResult<IndexMap<_, _>>>()?;
        Ok(ResultRow {
            content: RowContent::Projection(content),
            metadata: self.metadata.clone(),
            temporary: IndexMap::new(),
            session: None,
        })
    }

    /// Wrap an arbitrary value into a row.
    ///
    /// Rows pass through, links become entity rows, maps become projections
    /// of their entries and anything else is stored under `alias` (or
    /// `value`). Links and maps cannot take an alias.
    pub fn to_result(value: Value, alias: Option<&str>, session: &Session) -> ExecResult<ResultRow> {
        match value {
            Value::Row(row) => Ok(*row),
            Value::Link(rid) => match alias {
                Some(alias) => Err(ExecutionError::command(format!(
                    "Cannot expand a record with a non-null alias: {}",
                    alias
                ))),
                None => Ok(ResultRow::from_entity(session, rid)),
            },
            Value::Map(map) => match alias {
                Some(alias) => Err(ExecutionError::command(format!(
                    "Cannot expand a map with a non-null alias: {}",
                    alias
                ))),
                None => Ok(ResultRow::from_pairs(Some(session), map)),
            },
            Value::Edge(edge) => Ok(ResultRow::from_edge(session, edge)),
            other => {
                let mut row = ResultRow::new(session);
                row.set(alias.unwrap_or("value"), other)?;
                Ok(row)
            }
        }
    }
}

impl From<ResultRow> for Value {
    fn from(row: ResultRow) -> Self {
        Value::Row(Box::new(row))
    }
}

impl fmt::Display for ResultRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.content {
            RowContent::Entity { rid, .. } => write!(f, "{}", rid),
            RowContent::Edge(edge) => write!(f, "{}", edge),
            RowContent::Projection(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// Converts values to JSON with the session's date settings
struct JsonEncoder<'a> {
    config: &'a ExecutionConfig,
    tz: chrono_tz::Tz,
}

impl<'a> JsonEncoder<'a> {
    fn new(config: &'a ExecutionConfig) -> ExecResult<Self> {
        Ok(Self {
            config,
            tz: config.tz()?,
        })
    }

    fn encode(&self, value: &Value) -> ExecResult<serde_json::Value> {
        use serde_json::Value as Json;

        Ok(match value {
            Value::Null => Json::Null,
            Value::Boolean(b) => Json::Bool(*b),
            Value::Integer(i) => Json::from(*i),
            Value::Float(n) => serde_json::Number::from_f64(*n).map_or(Json::Null, Json::Number),
            Value::String(s) => Json::String(s.clone()),
            Value::Binary(bytes) => {
                Json::String(base64::engine::general_purpose::STANDARD.encode(bytes))
            }
            Value::DateTime(dt) => Json::String(
                dt.with_timezone(&self.tz)
                    .format(&self.config.date_time_format)
                    .to_string(),
            ),
            Value::Link(rid) => Json::String(rid.to_string()),
            Value::LinkList(links) => {
                Json::Array(links.iter().map(|rid| Json::String(rid.to_string())).collect())
            }
            Value::LinkMap(map) => Json::Object(
                map.iter()
                    .map(|(k, rid)| (k.clone(), Json::String(rid.to_string())))
                    .collect(),
            ),
            Value::List(items) => Json::Array(
                items
                    .iter()
                    .map(|item| self.encode(item))
                    .collect::<ExecResult<_>>()?,
            ),
            Value::Map(map) => self.encode_object(map.iter())?,
            Value::Embedded(entity) => {
                let mut pairs: Vec<(&String, &Value)> = entity.properties.iter().collect();
                let class = entity.class.clone().map(Value::String);
                let class_key = "@class".to_string();
                if let Some(class) = &class {
                    pairs.push((&class_key, class));
                }
                self.encode_object(pairs.into_iter())?
            }
            Value::Edge(edge) => serde_json::json!({
                "@class": edge.class,
                "out": edge.out.to_string(),
                "in": edge.r#in.to_string(),
            }),
            Value::Row(row) => row.to_json_value()?,
        })
    }

    fn encode_object<'v>(
        &self,
        entries: impl Iterator<Item = (&'v String, &'v Value)>,
    ) -> ExecResult<serde_json::Value> {
        let mut entries: Vec<(&String, &Value)> = entries.collect();
        entries.sort_by(|(a, _), (b, _)| property_order(a, b));
        let mut object = serde_json::Map::new();
        for (k, v) in entries {
            object.insert(k.clone(), self.encode(v)?);
        }
        Ok(serde_json::Value::Object(object))
    }
}
