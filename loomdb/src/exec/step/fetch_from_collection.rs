// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! `+ FETCH FROM COLLECTION`: every record of one collection, in position
//! order

use super::{indent, ExecutionStep, SerializedStep, StepBase};
use crate::exec::context::CommandContext;
use crate::exec::error::{ExecResult, ExecutionError};
use crate::exec::result::ResultRow;
use crate::exec::stream::{BoxedStream, ExecutionStream};
use crate::session::Session;
use crate::storage::Entity;

#[derive(Debug)]
pub struct FetchFromCollectionStep {
    base: StepBase,
    collection: String,
    ascending: bool,
}

impl FetchFromCollectionStep {
    pub fn new(collection: impl Into<String>, ascending: bool) -> Self {
        Self {
            base: StepBase::new(),
            collection: collection.into(),
            ascending,
        }
    }
}

impl ExecutionStep for FetchFromCollectionStep {
    fn name(&self) -> &'static str {
        "FetchFromCollectionStep"
    }

    fn base(&self) -> &StepBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut StepBase {
        &mut self.base
    }

    fn internal_start(&mut self, ctx: &mut CommandContext) -> ExecResult<BoxedStream> {
        self.base.drain_previous(ctx)?;
        let collection_id = ctx.database().collection_id(&self.collection).ok_or_else(|| {
            ExecutionError::command(format!("Collection not found: {}", self.collection))
        })?;
        Ok(Box::new(CollectionScan {
            session: ctx.session().clone(),
            collection_id,
            ascending: self.ascending,
            last_position: None,
            peeked: None,
            finished: false,
        }))
    }

    fn pretty_print(&self, depth: usize, indent_by: usize) -> String {
        format!(
            "{}+ FETCH FROM COLLECTION {} {}{}",
            indent(depth, indent_by),
            self.collection,
            if self.ascending { "ASC" } else { "DESC" },
            self.base.cost_suffix()
        )
    }

    fn serialize(&self) -> SerializedStep {
        SerializedStep::FetchFromCollection {
            collection: self.collection.clone(),
            ascending: self.ascending,
        }
    }

    fn can_be_cached(&self) -> bool {
        true
    }
}

/// Position cursor that re-reads the collection on every pull, so no lock
/// is held between rows
struct CollectionScan {
    session: Session,
    collection_id: i32,
    ascending: bool,
    last_position: Option<i64>,
    peeked: Option<Entity>,
    finished: bool,
}

impl ExecutionStream for CollectionScan {
    fn has_next(&mut self, ctx: &CommandContext) -> ExecResult<bool> {
        if self.peeked.is_some() {
            return Ok(true);
        }
        if self.finished {
            return Ok(false);
        }
        ctx.check_interrupted()?;
        self.session.check_active()?;
        let next = self.session.database().next_record(
            self.collection_id,
            self.last_position,
            self.ascending,
        )?;
        match next {
            Some(entity) => {
                self.last_position = Some(entity.rid.position);
                self.peeked = Some(entity);
                Ok(true)
            }
            None => {
                self.finished = true;
                Ok(false)
            }
        }
    }

    fn next(&mut self, ctx: &CommandContext) -> ExecResult<ResultRow> {
        if !self.has_next(ctx)? {
            return Err(ExecutionError::NoSuchElement);
        }
        let entity = self.peeked.take().ok_or(ExecutionError::NoSuchElement)?;
        Ok(ResultRow::from_entity(&self.session, entity.rid))
    }

    fn close(&mut self, _ctx: &CommandContext) {
        self.peeked = None;
        self.finished = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::CancellationToken;
    use crate::storage::{ClassKind, Database, Value};
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn database() -> Arc<Database> {
        let db = Arc::new(Database::new("scan"));
        db.create_class("City", ClassKind::Document).unwrap();
        for name in ["Oslo", "Rome", "Lima"] {
            let mut props = BTreeMap::new();
            props.insert("name".to_string(), Value::from(name));
            db.insert(Some("City"), props).unwrap();
        }
        db
    }

    fn names(rows: &[ResultRow]) -> Vec<Value> {
        rows.iter()
            .filter_map(|row| row.get("name").unwrap())
            .collect()
    }

    #[test]
    fn test_scan_in_both_directions() {
        let mut ctx = CommandContext::new(Session::open(database()));
        let mut asc = FetchFromCollectionStep::new("city", true);
        let rows = asc.start(&mut ctx).unwrap().drain(&ctx).unwrap();
        assert_eq!(
            names(&rows),
            vec![Value::from("Oslo"), Value::from("Rome"), Value::from("Lima")]
        );
        assert!(rows.iter().all(ResultRow::is_entity));

        let mut desc = FetchFromCollectionStep::new("city", false);
        let rows = desc.start(&mut ctx).unwrap().drain(&ctx).unwrap();
        assert_eq!(names(&rows)[0], Value::from("Lima"));
        assert_eq!(desc.pretty_print(0, 2), "+ FETCH FROM COLLECTION city DESC");
    }

    #[test]
    fn test_unknown_collection() {
        let mut ctx = CommandContext::new(Session::open(database()));
        let err = FetchFromCollectionStep::new("nowhere", true)
            .start(&mut ctx)
            .err()
            .expect("start must fail");
        assert_eq!(
            err.to_string(),
            "Command execution error: Collection not found: nowhere"
        );
    }

    #[test]
    fn test_interrupted_between_entities() {
        let token = CancellationToken::new();
        let mut ctx =
            CommandContext::new(Session::open(database())).with_cancellation(token.clone());
        let mut stream = FetchFromCollectionStep::new("city", true)
            .start(&mut ctx)
            .unwrap();
        stream.next(&ctx).unwrap();
        token.cancel();
        assert!(stream.next(&ctx).unwrap_err().is_interrupted());
    }
}
