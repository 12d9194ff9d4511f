// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! `+ EXPAND`: replaces every single-property row by the rows its value
//! expands into

use super::{indent, ExecutionStep, SerializedStep, StepBase};
use crate::exec::context::CommandContext;
use crate::exec::error::{ExecResult, ExecutionError};
use crate::exec::result::ResultRow;
use crate::exec::stream::{self, BoxedStream, ExecutionStream};
use crate::session::Session;
use crate::storage::Value;
use log::trace;

#[derive(Debug)]
pub struct ExpandStep {
    base: StepBase,
    alias: Option<String>,
}

impl ExpandStep {
    pub fn new(alias: Option<String>) -> Self {
        Self {
            base: StepBase::new(),
            alias,
        }
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }
}

/// The one value an upstream row contributes, `None` when it has nothing to
/// expand
fn expanded_value(row: &ResultRow) -> ExecResult<Option<Value>> {
    if let Some(rid) = row.rid() {
        return Ok(Some(Value::Link(rid)));
    }
    let names = row.property_names()?;
    match names.as_slice() {
        [] => Ok(None),
        [name] => row.get(name),
        _ => Err(ExecutionError::illegal_state(format!(
            "Invalid EXPAND on record {}",
            row
        ))),
    }
}

fn expand_value(value: Value, alias: Option<&str>, session: &Session) -> ExecResult<BoxedStream> {
    match value {
        Value::Null => Ok(stream::empty()),
        Value::Row(row) => Ok(stream::singleton(*row)),
        Value::Link(rid) => {
            if let Some(alias) = alias {
                return Err(ExecutionError::command(format!(
                    "Cannot expand a record with a non-null alias: {}",
                    alias
                )));
            }
            match session.load(rid)? {
                Some(_) => Ok(stream::singleton(ResultRow::from_entity(session, rid))),
                None => {
                    trace!("Skipping dangling link {} in EXPAND", rid);
                    Ok(stream::empty())
                }
            }
        }
        Value::List(_) | Value::LinkList(_) => {
            let items = value.into_items().unwrap_or_default();
            let alias = alias.map(str::to_string);
            let session = session.clone();
            Ok(stream::from_results(items.into_iter().map(move |item| {
                ResultRow::to_result(item, alias.as_deref(), &session)
            })))
        }
        Value::Map(_) | Value::LinkMap(_) if alias.is_some() => {
            Err(ExecutionError::command(format!(
                "Cannot expand a map with a non-null alias: {}",
                alias.unwrap_or_default()
            )))
        }
        Value::Map(map) => Ok(entry_rows(map, session)),
        Value::LinkMap(links) => Ok(entry_rows(
            links.into_iter().map(|(key, rid)| (key, Value::Link(rid))),
            session,
        )),
        _ => Ok(stream::empty()),
    }
}

/// One `{key: value}` row per map entry
fn entry_rows(
    entries: impl IntoIterator<Item = (String, Value)>,
    session: &Session,
) -> BoxedStream {
    stream::from_rows(
        entries
            .into_iter()
            .map(|entry| ResultRow::from_pairs(Some(session), [entry]))
            .collect(),
    )
}

impl ExecutionStep for ExpandStep {
    fn name(&self) -> &'static str {
        "ExpandStep"
    }

    fn base(&self) -> &StepBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut StepBase {
        &mut self.base
    }

    fn internal_start(&mut self, ctx: &mut CommandContext) -> ExecResult<BoxedStream> {
        let upstream = self
            .base
            .start_previous(ctx)?
            .ok_or_else(|| ExecutionError::command("Cannot expand without a target"))?;
        let alias = self.alias.clone();
        Ok(upstream
            .flat_map(move |row, ctx| match expanded_value(&row)? {
                Some(value) => expand_value(value, alias.as_deref(), ctx.session()),
                None => Ok(stream::empty()),
            })
            .boxed())
    }

    fn pretty_print(&self, depth: usize, indent_by: usize) -> String {
        format!(
            "{}+ EXPAND{}",
            indent(depth, indent_by),
            self.base.cost_suffix()
        )
    }

    fn serialize(&self) -> SerializedStep {
        SerializedStep::Expand {
            alias: self.alias.clone(),
        }
    }

    fn can_be_cached(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::step::{FetchFromCollectionStep, ValuesStep};
    use crate::storage::{ClassKind, Database, Rid};
    use indexmap::IndexMap;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn setup() -> (CommandContext, Rid) {
        let db = Arc::new(Database::new("expand"));
        db.create_class("Person", ClassKind::Vertex).unwrap();
        let mut props = BTreeMap::new();
        props.insert("name".to_string(), Value::from("Alice"));
        let alice = db.insert(Some("Person"), props).unwrap();
        (CommandContext::new(Session::open(db)), alice.rid)
    }

    fn expand(
        ctx: &mut CommandContext,
        alias: Option<&str>,
        values: Vec<Value>,
    ) -> ExecResult<Vec<ResultRow>> {
        let mut step = ExpandStep::new(alias.map(str::to_string));
        step.set_previous(Box::new(ValuesStep::column("x", values)));
        let mut stream = step.start(ctx)?;
        stream.drain(ctx)
    }

    #[test]
    fn test_requires_a_target() {
        let (mut ctx, _) = setup();
        let err = ExpandStep::new(None).start(&mut ctx).err().expect("start must fail");
        assert_eq!(
            err.to_string(),
            "Command execution error: Cannot expand without a target"
        );
    }

    #[test]
    fn test_lists_expand_per_element() {
        let (mut ctx, _) = setup();
        let rows = expand(&mut ctx, None, vec![Value::from(vec![1, 2, 3])]).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].get("value").unwrap(), Some(Value::Integer(1)));

        let rows = expand(&mut ctx, Some("n"), vec![Value::from(vec![4, 5])]).unwrap();
        assert_eq!(rows[1].get("n").unwrap(), Some(Value::Integer(5)));
    }

    #[test]
    fn test_links_and_nulls() {
        let (mut ctx, alice) = setup();
        let rows = expand(
            &mut ctx,
            None,
            vec![
                Value::Link(alice),
                Value::Link(Rid::new(alice.collection_id, 404)),
                Value::Null,
                Value::Integer(7),
            ],
        )
        .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("name").unwrap(), Some(Value::from("Alice")));

        let err = expand(&mut ctx, Some("p"), vec![Value::Link(alice)]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Command execution error: Cannot expand a record with a non-null alias: p"
        );
    }

    #[test]
    fn test_entity_rows_expand_to_themselves() {
        let (mut ctx, alice) = setup();
        let mut step = ExpandStep::new(None);
        step.set_previous(Box::new(FetchFromCollectionStep::new("person", true)));
        let rows = step.start(&mut ctx).unwrap().drain(&ctx).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].rid(), Some(alice));
    }

    #[test]
    fn test_maps_expand_per_entry() {
        let (mut ctx, _) = setup();
        let mut map = BTreeMap::new();
        map.insert("a".to_string(), Value::Integer(1));
        map.insert("b".to_string(), Value::Integer(2));
        let rows = expand(&mut ctx, None, vec![Value::Map(map.clone())]).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].get("b").unwrap(), Some(Value::Integer(2)));

        let err = expand(&mut ctx, Some("m"), vec![Value::Map(map)]).unwrap_err();
        assert!(err.to_string().contains("Cannot expand a map with a non-null alias"));
    }

    #[test]
    fn test_rows_need_exactly_one_property() {
        let (mut ctx, _) = setup();
        let mut step = ExpandStep::new(None);
        let mut row = IndexMap::new();
        row.insert("a".to_string(), Value::Integer(1));
        row.insert("b".to_string(), Value::Integer(2));
        step.set_previous(Box::new(ValuesStep::new(vec![IndexMap::new(), row])));
        let err = step.start(&mut ctx).unwrap().drain(&ctx).unwrap_err();
        assert!(matches!(err, ExecutionError::IllegalState(_)));
        assert!(err.to_string().contains("Invalid EXPAND on record"));
    }

    #[test]
    fn test_explain() {
        let step = ExpandStep::new(None);
        assert_eq!(step.pretty_print(2, 2), "    + EXPAND");
        assert!(step.can_be_cached());
        assert_eq!(step.serialize(), SerializedStep::Expand { alias: None });
    }
}
