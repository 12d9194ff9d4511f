// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! `+ VALUES`: literal projection rows

use super::{indent, ExecutionStep, SerializedStep, StepBase};
use crate::exec::context::CommandContext;
use crate::exec::error::ExecResult;
use crate::exec::result::ResultRow;
use crate::exec::stream::{self, BoxedStream};
use crate::storage::Value;
use indexmap::IndexMap;

#[derive(Debug)]
pub struct ValuesStep {
    base: StepBase,
    rows: Vec<IndexMap<String, Value>>,
}

impl ValuesStep {
    pub fn new(rows: Vec<IndexMap<String, Value>>) -> Self {
        Self {
            base: StepBase::new(),
            rows,
        }
    }

    /// One row per item, each holding the item under `name`
    pub fn column(name: &str, items: impl IntoIterator<Item = Value>) -> Self {
        Self::new(
            items
                .into_iter()
                .map(|item| {
                    let mut row = IndexMap::new();
                    row.insert(name.to_string(), item);
                    row
                })
                .collect(),
        )
    }
}

impl ExecutionStep for ValuesStep {
    fn name(&self) -> &'static str {
        "ValuesStep"
    }

    fn base(&self) -> &StepBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut StepBase {
        &mut self.base
    }

    fn internal_start(&mut self, ctx: &mut CommandContext) -> ExecResult<BoxedStream> {
        self.base.drain_previous(ctx)?;
        let session = ctx.session();
        let rows = self
            .rows
            .iter()
            .map(|row| ResultRow::from_pairs(Some(session), row.clone()))
            .collect();
        Ok(stream::from_rows(rows))
    }

    fn pretty_print(&self, depth: usize, indent_by: usize) -> String {
        format!(
            "{}+ VALUES ({} rows){}",
            indent(depth, indent_by),
            self.rows.len(),
            self.base.cost_suffix()
        )
    }

    fn serialize(&self) -> SerializedStep {
        SerializedStep::Values {
            rows: self.rows.clone(),
        }
    }

    fn can_be_cached(&self) -> bool {
        true
    }
}
