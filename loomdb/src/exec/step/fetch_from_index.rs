// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! `+ FETCH FROM INDEX`: index entries matching a key condition

use super::{indent, ExecutionStep, SerializedStep, StepBase};
use crate::exec::context::CommandContext;
use crate::exec::error::{ExecResult, ExecutionError};
use crate::exec::result::ResultRow;
use crate::exec::stream::{BoxedStream, ExecutionStream, IterProducer, MultipleExecutionStream};
use crate::plan::index_search::IndexSearchDescriptor;
use crate::plan::key_range::{self, ScanIter};
use crate::session::Session;
use crate::storage::Value;
use log::debug;
use std::cell::Cell;
use std::iter::Peekable;
use std::rc::Rc;
use std::sync::Arc;

/// Streams `{key, rid}` rows for every index entry the descriptor selects
#[derive(Debug)]
pub struct FetchFromIndexStep {
    base: StepBase,
    desc: IndexSearchDescriptor,
}

impl FetchFromIndexStep {
    pub fn new(desc: IndexSearchDescriptor) -> Self {
        Self {
            base: StepBase::new(),
            desc,
        }
    }

    pub fn descriptor(&self) -> &IndexSearchDescriptor {
        &self.desc
    }

    pub fn index_name(&self) -> &str {
        self.desc.index().name()
    }
}

impl ExecutionStep for FetchFromIndexStep {
    fn name(&self) -> &'static str {
        "FetchFromIndexStep"
    }

    fn base(&self) -> &StepBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut StepBase {
        &mut self.base
    }

    fn internal_start(&mut self, ctx: &mut CommandContext) -> ExecResult<BoxedStream> {
        self.base.drain_previous(ctx)?;

        let scans = key_range::compile(&self.desc, ctx)?;
        debug!(
            "Fetching from index {} with {} scan(s)",
            self.desc.index().name(),
            scans.len()
        );
        let index = Arc::clone(self.desc.index());
        let producer = IterProducer::new(scans.into_iter(), move |scan, ctx: &CommandContext| {
            let entries = scan.open(index.as_ref())?;
            Ok(IndexEntryStream::new(entries, ctx.session().clone()).boxed())
        });

        let count = Rc::new(Cell::new(0u64));
        let counted = Rc::clone(&count);
        let database = Arc::clone(ctx.database());
        let index_name = self.desc.index().name().to_string();
        let block_count = self.desc.block_count();
        let range = self.desc.is_range();
        let additional = self.desc.additional_range_condition().is_some();

        Ok(MultipleExecutionStream::new(producer)
            .map(move |row, _ctx| {
                counted.set(counted.get() + 1);
                Ok(row)
            })
            .on_close(move |_ctx| {
                database.query_stats().push_index_stats(
                    &index_name,
                    block_count,
                    range,
                    additional,
                    count.get(),
                );
            })
            .boxed())
    }

    fn pretty_print(&self, depth: usize, indent_by: usize) -> String {
        let spaces = indent(depth, indent_by);
        let mut result = format!(
            "{}+ FETCH FROM INDEX {}{}",
            spaces,
            self.desc.index().name(),
            self.base.cost_suffix()
        );
        if let Some(condition) = self.desc.key_condition() {
            result.push_str(&format!("\n{}  {}", spaces, condition));
            if let Some(additional) = self.desc.additional_range_condition() {
                result.push_str(&format!(" and {}", additional));
            }
        }
        result
    }

    fn serialize(&self) -> SerializedStep {
        SerializedStep::FetchFromIndex {
            search: self.desc.serialize(),
        }
    }

    fn can_be_cached(&self) -> bool {
        true
    }
}

/// Rows of one opened index scan
struct IndexEntryStream {
    entries: Option<Peekable<ScanIter>>,
    session: Session,
}

impl IndexEntryStream {
    fn new(entries: ScanIter, session: Session) -> Self {
        Self {
            entries: Some(entries.peekable()),
            session,
        }
    }
}

impl ExecutionStream for IndexEntryStream {
    fn has_next(&mut self, ctx: &CommandContext) -> ExecResult<bool> {
        ctx.check_interrupted()?;
        Ok(self
            .entries
            .as_mut()
            .map_or(false, |entries| entries.peek().is_some()))
    }

    fn next(&mut self, ctx: &CommandContext) -> ExecResult<ResultRow> {
        ctx.check_interrupted()?;
        let (key, rid) = self
            .entries
            .as_mut()
            .and_then(Iterator::next)
            .ok_or(ExecutionError::NoSuchElement)?;
        let mut row = ResultRow::new(&self.session);
        row.set("key", key.map_or(Value::Null, |key| key.to_value()))?;
        row.set("rid", Value::Link(rid))?;
        Ok(row)
    }

    fn close(&mut self, _ctx: &CommandContext) {
        self.entries = None;
    }
}
