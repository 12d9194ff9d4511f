// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! `+ FETCH FROM VARIABLE`: a context variable used as the query target

use super::{indent, ExecutionStep, SerializedStep, StepBase};
use crate::exec::context::CommandContext;
use crate::exec::error::{ExecResult, ExecutionError};
use crate::exec::result::ResultRow;
use crate::exec::stream::{self, BoxedStream};
use crate::exec::variable::BindableSource;
use crate::storage::Value;
use log::debug;

#[derive(Debug)]
pub struct FetchFromVariableStep {
    base: StepBase,
    variable: String,
}

impl FetchFromVariableStep {
    pub fn new(variable: impl Into<String>) -> Self {
        Self {
            base: StepBase::new(),
            variable: variable.into(),
        }
    }

    pub fn variable(&self) -> &str {
        &self.variable
    }

    fn unusable(&self) -> ExecutionError {
        ExecutionError::command(format!(
            "Cannot use variable as query target: {}",
            self.variable
        ))
    }
}

impl ExecutionStep for FetchFromVariableStep {
    fn name(&self) -> &'static str {
        "FetchFromVariableStep"
    }

    fn base(&self) -> &StepBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut StepBase {
        &mut self.base
    }

    fn internal_start(&mut self, ctx: &mut CommandContext) -> ExecResult<BoxedStream> {
        // The predecessor may be what binds the variable
        self.base.drain_previous(ctx)?;

        let source = ctx.variable(&self.variable).ok_or_else(|| self.unusable())?;
        debug!("Fetching from variable {} ({})", self.variable, source.kind());
        let session = ctx.session().clone();
        match source {
            BindableSource::Stream(stream) => Ok(stream),
            BindableSource::ResultSet(rows) => Ok(stream::from_rows(rows)),
            BindableSource::Single(Value::Link(rid)) => {
                Ok(stream::singleton(ResultRow::from_entity(&session, rid)))
            }
            BindableSource::Single(Value::Row(row)) => Ok(stream::singleton(*row)),
            BindableSource::Single(_) => Err(self.unusable()),
            BindableSource::Iterable(items) => Ok(stream::from_results(
                items
                    .into_iter()
                    .map(move |item| ResultRow::to_result(item, None, &session)),
            )),
        }
    }

    fn pretty_print(&self, depth: usize, indent_by: usize) -> String {
        let spaces = indent(depth, indent_by);
        format!(
            "{}+ FETCH FROM VARIABLE{}\n{}  {}",
            spaces,
            self.base.cost_suffix(),
            spaces,
            self.variable
        )
    }

    fn serialize(&self) -> SerializedStep {
        SerializedStep::FetchFromVariable {
            variable: self.variable.clone(),
        }
    }
}
