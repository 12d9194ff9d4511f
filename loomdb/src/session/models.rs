// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Session model

use crate::config::ExecutionConfig;
use crate::storage::{ClassKind, Database, Entity, LightweightEdge, Rid, StorageError, Value};
use chrono::{DateTime, Utc};
use log::{debug, info};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Outcome of creating an edge
#[derive(Debug, Clone, PartialEq)]
pub enum CreatedEdge {
    /// Edge stored as its own record
    Record(Entity),
    /// Edge that exists only as vertex adjacency
    Lightweight(LightweightEdge),
}

struct SessionInner {
    session_id: String,
    database: Arc<Database>,
    config: Arc<ExecutionConfig>,
    created_at: DateTime<Utc>,
    active: AtomicBool,
}

/// Shared handle to an open database session
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("session_id", &self.inner.session_id)
            .field("database", &self.inner.database.name())
            .field("active", &self.is_active())
            .finish()
    }
}

impl PartialEq for Session {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Session {
    /// Open a session with the default configuration
    pub fn open(database: Arc<Database>) -> Self {
        Self::open_with_config(database, ExecutionConfig::default())
    }

    pub fn open_with_config(database: Arc<Database>, config: ExecutionConfig) -> Self {
        let session_id = uuid::Uuid::new_v4().to_string();
        info!("Opened session {} on '{}'", session_id, database.name());
        Self {
            inner: Arc::new(SessionInner {
                session_id,
                database,
                config: Arc::new(config),
                created_at: Utc::now(),
                active: AtomicBool::new(true),
            }),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.inner.session_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.inner.created_at
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.inner.database
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.inner.config
    }

    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::Acquire)
    }

    /// Close the session; rows bound to it fail from now on
    pub fn close(&self) {
        if self.inner.active.swap(false, Ordering::AcqRel) {
            info!("Closed session {}", self.inner.session_id);
        }
    }

    pub fn check_active(&self) -> Result<(), StorageError> {
        if self.is_active() {
            Ok(())
        } else {
            Err(StorageError::SessionClosed)
        }
    }

    pub fn load(&self, rid: Rid) -> Result<Option<Entity>, StorageError> {
        self.check_active()?;
        Ok(self.inner.database.load(rid))
    }

    /// Create and store a new entity
    pub fn new_entity(
        &self,
        class: Option<&str>,
        properties: BTreeMap<String, Value>,
    ) -> Result<Entity, StorageError> {
        self.check_active()?;
        self.inner.database.insert(class, properties)
    }

    /// Store the new state of an existing entity
    pub fn save(&self, entity: Entity) -> Result<Entity, StorageError> {
        self.check_active()?;
        self.inner.database.update(entity)
    }

    /// Write one property of a stored entity
    pub fn set_property(&self, rid: Rid, name: &str, value: Value) -> Result<Entity, StorageError> {
        let mut entity = self.load(rid)?.ok_or(StorageError::RecordNotFound(rid))?;
        entity.set_property(name, value);
        self.save(entity)
    }

    pub fn delete(&self, rid: Rid) -> Result<bool, StorageError> {
        self.check_active()?;
        self.inner.database.delete(rid)
    }

    /// Create an edge of `class` from `from` to `to`.
    ///
    /// Both endpoints record the edge in their `out_<class>` / `in_<class>`
    /// link lists; edge records carry `out` and `in` links.
    pub fn create_edge(&self, class: &str, from: Rid, to: Rid) -> Result<CreatedEdge, StorageError> {
        self.check_active()?;
        let schema = self
            .inner
            .database
            .class(class)
            .ok_or_else(|| StorageError::ClassNotFound(class.to_string()))?;
        for endpoint in [from, to] {
            if self.inner.database.load(endpoint).is_none() {
                return Err(StorageError::RecordNotFound(endpoint));
            }
        }

        let (created, out_link, in_link) = match schema.kind {
            ClassKind::Edge => {
                let mut properties = BTreeMap::new();
                properties.insert("out".to_string(), Value::Link(from));
                properties.insert("in".to_string(), Value::Link(to));
                let record = self.inner.database.insert(Some(class), properties)?;
                let rid = record.rid;
                (CreatedEdge::Record(record), rid, rid)
            }
            ClassKind::LightweightEdge => {
                (CreatedEdge::Lightweight(LightweightEdge::new(class, from, to)), to, from)
            }
            _ => {
                return Err(StorageError::InvalidOperation(format!(
                    "'{}' is not an edge class",
                    class
                )))
            }
        };

        self.append_link(from, &format!("out_{}", class), out_link)?;
        self.append_link(to, &format!("in_{}", class), in_link)?;
        debug!("Created edge {} {} -> {}", class, from, to);
        Ok(created)
    }

    fn append_link(&self, rid: Rid, property: &str, link: Rid) -> Result<(), StorageError> {
        let mut entity = self
            .inner
            .database
            .load(rid)
            .ok_or(StorageError::RecordNotFound(rid))?;
        let mut links = match entity.remove_property(property) {
            Some(Value::LinkList(links)) => links,
            Some(Value::Link(single)) => vec![single],
            _ => Vec::new(),
        };
        links.push(link);
        entity.set_property(property, Value::LinkList(links));
        self.inner.database.update(entity)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph() -> (Session, Rid, Rid) {
        let db = Arc::new(Database::new("graph"));
        db.create_class("V", ClassKind::Vertex).unwrap();
        db.create_class("Knows", ClassKind::Edge).unwrap();
        db.create_class("Likes", ClassKind::LightweightEdge).unwrap();
        let session = Session::open(db);
        let a = session.new_entity(Some("V"), BTreeMap::new()).unwrap().rid;
        let b = session.new_entity(Some("V"), BTreeMap::new()).unwrap().rid;
        (session, a, b)
    }

    #[test]
    fn test_closed_session_rejects_access() {
        let (session, a, _) = graph();
        assert!(session.load(a).unwrap().is_some());
        let other = session.clone();
        session.close();
        assert!(!other.is_active());
        assert_eq!(other.load(a), Err(StorageError::SessionClosed));
    }

    #[test]
    fn test_create_record_edge_updates_adjacency() {
        let (session, a, b) = graph();
        let CreatedEdge::Record(edge) = session.create_edge("Knows", a, b).unwrap() else {
            panic!("expected an edge record");
        };
        assert_eq!(edge.property("out"), Some(&Value::Link(a)));
        assert_eq!(edge.property("in"), Some(&Value::Link(b)));
        let a_entity = session.load(a).unwrap().unwrap();
        assert_eq!(
            a_entity.property("out_Knows"),
            Some(&Value::LinkList(vec![edge.rid]))
        );
    }

    #[test]
    fn test_create_lightweight_edge() {
        let (session, a, b) = graph();
        let created = session.create_edge("Likes", a, b).unwrap();
        assert_eq!(created, CreatedEdge::Lightweight(LightweightEdge::new("Likes", a, b)));
        let b_entity = session.load(b).unwrap().unwrap();
        assert_eq!(b_entity.property("in_Likes"), Some(&Value::LinkList(vec![a])));
    }

    #[test]
    fn test_create_edge_rejects_bad_input() {
        let (session, a, b) = graph();
        assert!(session.create_edge("V", a, b).is_err());
        assert!(session.create_edge("Missing", a, b).is_err());
        assert_eq!(
            session.create_edge("Knows", a, Rid::new(99, 0)),
            Err(StorageError::RecordNotFound(Rid::new(99, 0)))
        );
    }
}
