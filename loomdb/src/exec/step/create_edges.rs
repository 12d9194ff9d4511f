// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! `+ CREATE EDGE`: one edge for every pair of the `from` and `to` vertex
//! sets

use super::{indent, ExecutionStep, SerializedStep, StepBase};
use crate::exec::context::CommandContext;
use crate::exec::error::{ExecResult, ExecutionError};
use crate::exec::result::ResultRow;
use crate::exec::stream::{BoxedStream, ExecutionStream};
use crate::exec::variable::BindableSource;
use crate::session::{CreatedEdge, Session};
use crate::storage::indexes::{Index, IndexKey};
use crate::storage::{Rid, Value};
use log::{debug, trace};
use std::sync::Arc;

/// Creates edges of one class between the vertices bound to two variables.
///
/// With a uniqueness index on `(out, in)` an existing edge between the same
/// pair is returned instead of creating a duplicate.
#[derive(Debug)]
pub struct CreateEdgesStep {
    base: StepBase,
    edge_class: String,
    from_variable: String,
    to_variable: String,
    unique_index: Option<Arc<dyn Index>>,
}

impl CreateEdgesStep {
    pub fn new(
        edge_class: impl Into<String>,
        from_variable: impl Into<String>,
        to_variable: impl Into<String>,
        unique_index: Option<Arc<dyn Index>>,
    ) -> Self {
        Self {
            base: StepBase::new(),
            edge_class: edge_class.into(),
            from_variable: from_variable.into(),
            to_variable: to_variable.into(),
            unique_index,
        }
    }

    /// Every element bound to `name`; an unbound variable is a single null
    fn endpoints(ctx: &mut CommandContext, name: &str) -> ExecResult<Vec<Value>> {
        let source = ctx
            .variable(name)
            .unwrap_or(BindableSource::Single(Value::Null));
        source.into_values(ctx)
    }
}

impl ExecutionStep for CreateEdgesStep {
    fn name(&self) -> &'static str {
        "CreateEdgesStep"
    }

    fn base(&self) -> &StepBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut StepBase {
        &mut self.base
    }

    fn internal_start(&mut self, ctx: &mut CommandContext) -> ExecResult<BoxedStream> {
        self.base.drain_previous(ctx)?;

        let from = Self::endpoints(ctx, &self.from_variable)?;
        let to = Self::endpoints(ctx, &self.to_variable)?;
        debug!(
            "Creating up to {} {} edge(s)",
            from.len() * to.len(),
            self.edge_class
        );
        Ok(Box::new(EdgeCreation {
            session: ctx.session().clone(),
            edge_class: self.edge_class.clone(),
            unique_index: self.unique_index.clone(),
            from,
            to,
            from_pos: 0,
            to_pos: 0,
        }))
    }

    fn pretty_print(&self, depth: usize, indent_by: usize) -> String {
        let spaces = indent(depth, indent_by);
        format!(
            "{spaces}+ FOR EACH x in {}\n{spaces}    + FOR EACH y in {}\n{spaces}       + CREATE EDGE {}{}",
            self.from_variable,
            self.to_variable,
            self.edge_class,
            self.base.cost_suffix(),
        )
    }

    fn serialize(&self) -> SerializedStep {
        SerializedStep::CreateEdges {
            edge_class: self.edge_class.clone(),
            from_variable: self.from_variable.clone(),
            to_variable: self.to_variable.clone(),
            unique_index: self
                .unique_index
                .as_ref()
                .map(|index| index.name().to_string()),
        }
    }
}

fn as_vertex(value: &Value) -> ExecResult<Rid> {
    value.as_rid().ok_or_else(|| {
        ExecutionError::command(format!("Invalid vertex for edge creation: {}", value))
    })
}

/// Walks the cartesian product of the endpoints, `from` major
struct EdgeCreation {
    session: Session,
    edge_class: String,
    unique_index: Option<Arc<dyn Index>>,
    from: Vec<Value>,
    to: Vec<Value>,
    from_pos: usize,
    to_pos: usize,
}

impl EdgeCreation {
    fn existing_edge(&self, from: Rid, to: Rid) -> Option<Rid> {
        let index = self.unique_index.as_ref()?;
        let key = IndexKey::new(vec![Value::Link(from), Value::Link(to)]);
        index.get_rids(Some(&key)).first().copied()
    }
}

impl ExecutionStream for EdgeCreation {
    fn has_next(&mut self, _ctx: &CommandContext) -> ExecResult<bool> {
        Ok(self.from_pos < self.from.len() && self.to_pos < self.to.len())
    }

    fn next(&mut self, ctx: &CommandContext) -> ExecResult<ResultRow> {
        if !self.has_next(ctx)? {
            return Err(ExecutionError::NoSuchElement);
        }
        ctx.check_interrupted()?;
        let from = as_vertex(&self.from[self.from_pos])?;
        let to = as_vertex(&self.to[self.to_pos])?;
        self.to_pos += 1;
        if self.to_pos == self.to.len() {
            self.to_pos = 0;
            self.from_pos += 1;
        }

        if let Some(existing) = self.existing_edge(from, to) {
            trace!("Reusing {} edge {} for {} -> {}", self.edge_class, existing, from, to);
            return Ok(ResultRow::updatable(&self.session, existing));
        }
        Ok(match self.session.create_edge(&self.edge_class, from, to)? {
            CreatedEdge::Record(edge) => ResultRow::updatable(&self.session, edge.rid),
            CreatedEdge::Lightweight(edge) => ResultRow::from_edge(&self.session, edge),
        })
    }

    fn close(&mut self, _ctx: &CommandContext) {
        self.from_pos = self.from.len();
    }
}
