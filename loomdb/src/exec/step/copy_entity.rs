// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! `+ COPY ENTITY`: stores a copy of every upstream row as a new entity

use super::{indent, ExecutionStep, SerializedStep, StepBase};
use crate::exec::context::CommandContext;
use crate::exec::error::{ExecResult, ExecutionError};
use crate::exec::result::ResultRow;
use crate::exec::stream::{BoxedStream, ExecutionStream};
use crate::storage::Value;
use log::trace;
use std::collections::BTreeMap;

#[derive(Debug)]
pub struct CopyEntityStep {
    base: StepBase,
    target_class: Option<String>,
}

impl CopyEntityStep {
    pub fn new(target_class: Option<String>) -> Self {
        Self {
            base: StepBase::new(),
            target_class,
        }
    }
}

/// Storable form of a property value: nested entity rows become links and
/// projection rows become maps
fn storable(value: Value) -> ExecResult<Value> {
    Ok(match value {
        Value::Row(row) => match row.rid() {
            Some(rid) => Value::Link(rid),
            None => Value::Map(copied_properties(&row)?),
        },
        Value::List(items) => Value::List(
            items
                .into_iter()
                .map(storable)
                .collect::<ExecResult<_>>()?,
        ),
        Value::Map(map) => Value::Map(
            map.into_iter()
                .map(|(k, v)| Ok((k, storable(v)?)))
                .collect::<ExecResult<_>>()?,
        ),
        other => other,
    })
}

/// Every property of the row except `@` attributes
fn copied_properties(row: &ResultRow) -> ExecResult<BTreeMap<String, Value>> {
    row.to_map()?
        .into_iter()
        .filter(|(name, _)| !name.starts_with('@'))
        .map(|(name, value)| Ok((name, storable(value)?)))
        .collect()
}

impl ExecutionStep for CopyEntityStep {
    fn name(&self) -> &'static str {
        "CopyEntityStep"
    }

    fn base(&self) -> &StepBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut StepBase {
        &mut self.base
    }

    fn internal_start(&mut self, ctx: &mut CommandContext) -> ExecResult<BoxedStream> {
        let upstream = self.base.start_previous(ctx)?.ok_or_else(|| {
            ExecutionError::invalid_plan("CopyEntityStep requires a previous step")
        })?;
        let target_class = self.target_class.clone();
        Ok(upstream
            .map(move |row, ctx| {
                let properties = copied_properties(&row)?;
                let copy = ctx
                    .session()
                    .new_entity(target_class.as_deref(), properties)?;
                trace!("Copied {} into {}", row, copy.rid);
                Ok(ResultRow::updatable(ctx.session(), copy.rid))
            })
            .boxed())
    }

    fn pretty_print(&self, depth: usize, indent_by: usize) -> String {
        format!(
            "{}+ COPY ENTITY{}",
            indent(depth, indent_by),
            self.base.cost_suffix()
        )
    }

    fn serialize(&self) -> SerializedStep {
        SerializedStep::CopyEntity {
            target_class: self.target_class.clone(),
        }
    }

    fn can_be_cached(&self) -> bool {
        true
    }
}
