// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! `+ EXTRACT VALUE FROM INDEX ENTRY`: turns `{key, rid}` rows into the
//! records they point at

use super::{indent, ExecutionStep, SerializedStep, StepBase};
use crate::exec::context::CommandContext;
use crate::exec::error::{ExecResult, ExecutionError};
use crate::exec::result::ResultRow;
use crate::exec::stream::{BoxedStream, ExecutionStream};
use crate::storage::{Rid, Value};

/// Loads the entity behind every index entry, optionally keeping only
/// entries that live in some collections
#[derive(Debug)]
pub struct GetValueFromIndexEntryStep {
    base: StepBase,
    collection_filter: Option<Vec<i32>>,
}

impl GetValueFromIndexEntryStep {
    pub fn new(collection_filter: Option<Vec<i32>>) -> Self {
        Self {
            base: StepBase::new(),
            collection_filter,
        }
    }
}

/// Records not yet assigned to a collection always pass
fn accepts(filter: Option<&[i32]>, rid: Rid) -> bool {
    match filter {
        None => true,
        Some(ids) => rid.collection_id < 0 || ids.contains(&rid.collection_id),
    }
}

impl ExecutionStep for GetValueFromIndexEntryStep {
    fn name(&self) -> &'static str {
        "GetValueFromIndexEntryStep"
    }

    fn base(&self) -> &StepBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut StepBase {
        &mut self.base
    }

    fn internal_start(&mut self, ctx: &mut CommandContext) -> ExecResult<BoxedStream> {
        let upstream = self.base.start_previous(ctx)?.ok_or_else(|| {
            ExecutionError::illegal_state("GetValueFromIndexEntryStep requires a previous step")
        })?;
        let filter = self.collection_filter.clone();

        Ok(upstream
            .filter(move |row, ctx| match row.get("rid")? {
                Some(Value::Link(rid)) if accepts(filter.as_deref(), rid) => {
                    match ctx.session().load(rid)? {
                        Some(_) => Ok(Some(ResultRow::from_entity(ctx.session(), rid))),
                        None => Ok(None),
                    }
                }
                // Entries of computed indexes point at rows, not records
                Some(Value::Row(inner)) if filter.is_none() => Ok(Some(*inner)),
                _ => Ok(None),
            })
            .boxed())
    }

    fn pretty_print(&self, depth: usize, indent_by: usize) -> String {
        let spaces = indent(depth, indent_by);
        let mut result = format!(
            "{}+ EXTRACT VALUE FROM INDEX ENTRY{}",
            spaces,
            self.base.cost_suffix()
        );
        if let Some(ids) = &self.collection_filter {
            result.push_str(&format!(
                "\n{}  filtering collections [{}]",
                spaces,
                ids.iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
        }
        result
    }

    fn serialize(&self) -> SerializedStep {
        SerializedStep::GetValueFromIndexEntry {
            collection_filter: self.collection_filter.clone(),
        }
    }

    fn can_be_cached(&self) -> bool {
        true
    }
}
