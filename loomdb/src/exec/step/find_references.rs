// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! `+ FIND REFERENCES`: which stored entities link to the upstream records,
//! and through which fields

use super::{indent, ExecutionStep, SerializedStep, StepBase};
use crate::exec::context::CommandContext;
use crate::exec::error::{ExecResult, ExecutionError};
use crate::exec::result::ResultRow;
use crate::exec::stream::{BoxedStream, ExecutionStream};
use crate::session::Session;
use crate::storage::{Entity, Rid, Value};
use log::debug;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

#[derive(Debug)]
pub struct FindReferencesStep {
    base: StepBase,
    collections: Option<Vec<String>>,
}

impl FindReferencesStep {
    /// Scan only `collections`, or every collection when `None`
    pub fn new(collections: Option<Vec<String>>) -> Self {
        Self {
            base: StepBase::new(),
            collections,
        }
    }

    fn collection_ids(&self, ctx: &CommandContext) -> ExecResult<VecDeque<i32>> {
        let database = ctx.database();
        match &self.collections {
            None => Ok(database.collection_ids().into()),
            Some(names) => names
                .iter()
                .map(|name| {
                    database.collection_id(name).ok_or_else(|| {
                        ExecutionError::command(format!("Collection not found: {}", name))
                    })
                })
                .collect(),
        }
    }
}

/// Rid a row points the search at: its `rid` property, or its own identity
fn target_of(row: &ResultRow) -> ExecResult<Option<Rid>> {
    Ok(row
        .get("rid")?
        .and_then(|value| value.as_rid())
        .or_else(|| row.rid()))
}

type References = BTreeMap<Rid, BTreeSet<String>>;

fn record_hit(rid: Rid, path: String, targets: &BTreeSet<Rid>, found: &mut References) {
    if targets.contains(&rid) {
        found.entry(rid).or_default().insert(path);
    }
}

/// Record every link to one of `targets` found under `path`.
///
/// Embedded values are walked; linked records are not followed.
fn collect_references(
    value: &Value,
    path: &str,
    targets: &BTreeSet<Rid>,
    found: &mut References,
) -> ExecResult<()> {
    match value {
        Value::Link(rid) => record_hit(*rid, path.to_string(), targets, found),
        Value::LinkList(links) => {
            for rid in links {
                record_hit(*rid, path.to_string(), targets, found);
            }
        }
        Value::LinkMap(links) => {
            for (key, rid) in links {
                record_hit(*rid, format!("{}.{}", path, key), targets, found);
            }
        }
        Value::List(items) => {
            for item in items {
                collect_references(item, path, targets, found)?;
            }
        }
        Value::Map(map) => {
            for (key, item) in map {
                collect_references(item, &format!("{}.{}", path, key), targets, found)?;
            }
        }
        Value::Embedded(embedded) => {
            for (name, item) in &embedded.properties {
                collect_references(item, &format!("{}.{}", path, name), targets, found)?;
            }
        }
        Value::Row(row) => match row.rid() {
            Some(rid) => record_hit(rid, path.to_string(), targets, found),
            None => {
                for (name, item) in &row.to_map()? {
                    collect_references(item, &format!("{}.{}", path, name), targets, found)?;
                }
            }
        },
        _ => {}
    }
    Ok(())
}

impl ExecutionStep for FindReferencesStep {
    fn name(&self) -> &'static str {
        "FindReferencesStep"
    }

    fn base(&self) -> &StepBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut StepBase {
        &mut self.base
    }

    fn internal_start(&mut self, ctx: &mut CommandContext) -> ExecResult<BoxedStream> {
        let mut upstream = self.base.start_previous(ctx)?.ok_or_else(|| {
            ExecutionError::invalid_plan("FindReferencesStep requires a previous step")
        })?;
        let mut targets = BTreeSet::new();
        for row in upstream.drain(ctx)? {
            if let Some(rid) = target_of(&row)? {
                targets.insert(rid);
            }
        }
        let collections = self.collection_ids(ctx)?;
        debug!(
            "Looking for references to {} record(s) in {} collection(s)",
            targets.len(),
            collections.len()
        );

        Ok(Box::new(ReferenceScan {
            session: ctx.session().clone(),
            targets,
            collections,
            last_position: None,
            pending: VecDeque::new(),
        }))
    }

    fn pretty_print(&self, depth: usize, indent_by: usize) -> String {
        let spaces = indent(depth, indent_by);
        let mut result = format!("{}+ FIND REFERENCES{}", spaces, self.base.cost_suffix());
        if let Some(names) = &self.collections {
            result.push_str(&format!("\n{}  ({})", spaces, names.join(", ")));
        }
        result
    }

    fn serialize(&self) -> SerializedStep {
        SerializedStep::FindReferences {
            collections: self.collections.clone(),
        }
    }

    fn can_be_cached(&self) -> bool {
        true
    }
}

/// Scans the collections one entity at a time, queueing the rows each
/// referencing entity produces
struct ReferenceScan {
    session: Session,
    targets: BTreeSet<Rid>,
    collections: VecDeque<i32>,
    last_position: Option<i64>,
    pending: VecDeque<ResultRow>,
}

impl ReferenceScan {
    fn next_entity(&mut self) -> ExecResult<Option<Entity>> {
        while let Some(&collection) = self.collections.front() {
            let next = self
                .session
                .database()
                .next_record(collection, self.last_position, true)?;
            match next {
                Some(entity) => {
                    self.last_position = Some(entity.rid.position);
                    return Ok(Some(entity));
                }
                None => {
                    self.collections.pop_front();
                    self.last_position = None;
                }
            }
        }
        Ok(None)
    }

    fn queue_references(&mut self, entity: &Entity) -> ExecResult<()> {
        let mut found = References::new();
        for (name, value) in &entity.properties {
            collect_references(value, name, &self.targets, &mut found)?;
        }
        for (target, fields) in found {
            let mut row = ResultRow::new(&self.session);
            row.set("rid", Value::Link(target))?;
            row.set("referredBy", Value::Link(entity.rid))?;
            row.set(
                "fields",
                Value::List(fields.into_iter().map(Value::String).collect()),
            )?;
            self.pending.push_back(row);
        }
        Ok(())
    }
}

impl ExecutionStream for ReferenceScan {
    fn has_next(&mut self, ctx: &CommandContext) -> ExecResult<bool> {
        while self.pending.is_empty() {
            if self.targets.is_empty() {
                return Ok(false);
            }
            ctx.check_interrupted()?;
            self.session.check_active()?;
            match self.next_entity()? {
                Some(entity) => self.queue_references(&entity)?,
                None => return Ok(false),
            }
        }
        Ok(true)
    }

    fn next(&mut self, ctx: &CommandContext) -> ExecResult<ResultRow> {
        if !self.has_next(ctx)? {
            return Err(ExecutionError::NoSuchElement);
        }
        self.pending.pop_front().ok_or(ExecutionError::NoSuchElement)
    }

    fn close(&mut self, _ctx: &CommandContext) {
        self.collections.clear();
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::step::{FetchFromCollectionStep, ValuesStep};
    use crate::exec::CancellationToken;
    use crate::storage::{ClassKind, Database, EmbeddedEntity};
    use std::sync::Arc;

    struct Fixture {
        db: Arc<Database>,
        alice: Rid,
        bob: Rid,
        carol: Rid,
        post: Rid,
    }

    fn fixture() -> Fixture {
        let db = Arc::new(Database::new("refs"));
        db.create_class("Person", ClassKind::Vertex).unwrap();
        db.create_class("Post", ClassKind::Document).unwrap();
        let alice = db.insert(Some("Person"), BTreeMap::new()).unwrap().rid;
        let bob = db.insert(Some("Person"), BTreeMap::new()).unwrap().rid;

        let mut friends = BTreeMap::new();
        friends.insert("best".to_string(), alice);
        let mut props = BTreeMap::new();
        props.insert("friends".to_string(), Value::LinkMap(friends));
        let carol = db.insert(Some("Person"), props).unwrap().rid;

        let mut meta = BTreeMap::new();
        meta.insert("editor".to_string(), Value::Link(alice));
        let mut props = BTreeMap::new();
        props.insert("author".to_string(), Value::Link(alice));
        props.insert("likes".to_string(), Value::LinkList(vec![alice, bob]));
        props.insert("meta".to_string(), Value::Map(meta));
        props.insert(
            "tags".to_string(),
            Value::List(vec![Value::Embedded(
                EmbeddedEntity::new(None).with_property("owner", Value::Link(bob)),
            )]),
        );
        let post = db.insert(Some("Post"), props).unwrap().rid;
        Fixture {
            db,
            alice,
            bob,
            carol,
            post,
        }
    }

    fn find(
        f: &Fixture,
        collections: Option<Vec<String>>,
        targets: Vec<Rid>,
    ) -> ExecResult<Vec<ResultRow>> {
        let mut ctx = CommandContext::new(Session::open(Arc::clone(&f.db)));
        let mut step = FindReferencesStep::new(collections);
        step.set_previous(Box::new(ValuesStep::column(
            "rid",
            targets.into_iter().map(Value::Link),
        )));
        let mut stream = step.start(&mut ctx)?;
        stream.drain(&ctx)
    }

    fn fields(names: &[&str]) -> Option<Value> {
        Some(Value::List(names.iter().map(|n| Value::from(*n)).collect()))
    }

    #[test]
    fn test_references_across_all_collections() {
        let f = fixture();
        let rows = find(&f, None, vec![f.bob, f.alice]).unwrap();
        assert_eq!(rows.len(), 3);

        assert_eq!(rows[0].get("rid").unwrap(), Some(Value::Link(f.alice)));
        assert_eq!(rows[0].get("referredBy").unwrap(), Some(Value::Link(f.carol)));
        assert_eq!(rows[0].get("fields").unwrap(), fields(&["friends.best"]));

        assert_eq!(rows[1].get("referredBy").unwrap(), Some(Value::Link(f.post)));
        assert_eq!(
            rows[1].get("fields").unwrap(),
            fields(&["author", "likes", "meta.editor"])
        );
        assert_eq!(rows[2].get("rid").unwrap(), Some(Value::Link(f.bob)));
        assert_eq!(rows[2].get("fields").unwrap(), fields(&["likes", "tags.owner"]));
    }

    #[test]
    fn test_named_collections() {
        let f = fixture();
        let rows = find(&f, Some(vec!["person".to_string()]), vec![f.alice]).unwrap();
        assert_eq!(rows.len(), 1);

        let err = find(&f, Some(vec!["nowhere".to_string()]), vec![f.alice]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Command execution error: Collection not found: nowhere"
        );
    }

    #[test]
    fn test_entity_rows_are_targets() {
        let f = fixture();
        let mut ctx = CommandContext::new(Session::open(Arc::clone(&f.db)));
        let mut step = FindReferencesStep::new(Some(vec!["post".to_string()]));
        step.set_previous(Box::new(FetchFromCollectionStep::new("person", true)));
        let rows = step.start(&mut ctx).unwrap().drain(&ctx).unwrap();
        let targets: Vec<Option<Value>> = rows.iter().map(|r| r.get("rid").unwrap()).collect();
        assert_eq!(
            targets,
            vec![Some(Value::Link(f.alice)), Some(Value::Link(f.bob))]
        );
    }

    #[test]
    fn test_interruption_is_polled_per_entity() {
        let f = fixture();
        let token = CancellationToken::new();
        let mut ctx =
            CommandContext::new(Session::open(Arc::clone(&f.db))).with_cancellation(token.clone());
        let mut step = FindReferencesStep::new(None);
        step.set_previous(Box::new(ValuesStep::column("rid", vec![Value::Link(f.alice)])));
        let mut stream = step.start(&mut ctx).unwrap();
        token.cancel();
        assert!(stream.has_next(&ctx).unwrap_err().is_interrupted());
    }

    #[test]
    fn test_stored_rows_of_a_closed_session_fail_the_scan() {
        let f = fixture();
        let writer = Session::open(Arc::clone(&f.db));
        let mut snapshot = ResultRow::new(&writer);
        snapshot.set("owner", Value::Link(f.bob)).unwrap();
        let mut props = BTreeMap::new();
        props.insert("snapshot".to_string(), Value::Row(Box::new(snapshot)));
        f.db.insert(Some("Post"), props).unwrap();

        let rows = find(&f, Some(vec!["post".to_string()]), vec![f.bob]).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].get("fields").unwrap(), fields(&["snapshot.owner"]));

        writer.close();
        let err = find(&f, Some(vec!["post".to_string()]), vec![f.bob]).unwrap_err();
        assert!(matches!(err, ExecutionError::SessionClosed));
    }

    #[test]
    fn test_explain() {
        let step = FindReferencesStep::new(Some(vec!["post".to_string(), "person".to_string()]));
        assert_eq!(step.pretty_print(0, 2), "+ FIND REFERENCES\n  (post, person)");
        assert!(step.can_be_cached());
    }
}
