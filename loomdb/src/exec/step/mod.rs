// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Execution steps
//!
//! A plan is a backward-linked chain of steps: every step owns its
//! predecessor and, when started, wraps the predecessor's stream or
//! originates one of its own.

pub mod copy_entity;
pub mod create_edges;
pub mod expand;
pub mod fetch_from_collection;
pub mod fetch_from_index;
pub mod fetch_from_variable;
pub mod find_references;
pub mod get_value_from_index_entry;
pub mod values;

pub use copy_entity::CopyEntityStep;
pub use create_edges::CreateEdgesStep;
pub use expand::ExpandStep;
pub use fetch_from_collection::FetchFromCollectionStep;
pub use fetch_from_index::FetchFromIndexStep;
pub use fetch_from_variable::FetchFromVariableStep;
pub use find_references::FindReferencesStep;
pub use get_value_from_index_entry::GetValueFromIndexEntryStep;
pub use values::ValuesStep;

use super::context::CommandContext;
use super::error::{ExecResult, ExecutionError};
use super::stream::{BoxedStream, ExecutionStream, ProfilingStream};
use crate::plan::index_search::{IndexSearchDescriptor, SerializedIndexSearch};
use crate::storage::{Database, Value};
use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Owned, type-erased step
pub type BoxedStep = Box<dyn ExecutionStep>;

/// Lifecycle of a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StepState {
    #[default]
    Created,
    Started,
    Closed,
}

/// State shared by every step: lifecycle, predecessor and profiling cost
#[derive(Debug, Default)]
pub struct StepBase {
    state: StepState,
    previous: Option<BoxedStep>,
    profiling: bool,
    cost: Arc<AtomicU64>,
}

impl StepBase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> StepState {
        self.state
    }

    pub fn previous(&self) -> Option<&dyn ExecutionStep> {
        self.previous.as_deref()
    }

    pub fn previous_mut(&mut self) -> Option<&mut BoxedStep> {
        self.previous.as_mut()
    }

    pub fn set_previous(&mut self, previous: BoxedStep) {
        self.previous = Some(previous);
    }

    /// Start the predecessor, if there is one
    pub fn start_previous(&mut self, ctx: &mut CommandContext) -> ExecResult<Option<BoxedStream>> {
        match self.previous.as_mut() {
            Some(previous) => previous.start(ctx).map(Some),
            None => Ok(None),
        }
    }

    /// Start the predecessor and pull it to the end.
    ///
    /// Source steps run whatever precedes them for its side effects only.
    pub fn drain_previous(&mut self, ctx: &mut CommandContext) -> ExecResult<()> {
        if let Some(mut upstream) = self.start_previous(ctx)? {
            upstream.drain(ctx)?;
        }
        Ok(())
    }

    fn begin(&mut self, ctx: &CommandContext, name: &str) -> ExecResult<()> {
        match self.state {
            StepState::Created => {
                self.state = StepState::Started;
                self.profiling = ctx.profiling_enabled();
                Ok(())
            }
            StepState::Started => Err(ExecutionError::illegal_state(format!(
                "{} was already started; reset it before starting again",
                name
            ))),
            StepState::Closed => Err(ExecutionError::illegal_state(format!(
                "{} is closed",
                name
            ))),
        }
    }

    fn instrument(&self, stream: BoxedStream) -> BoxedStream {
        if self.profiling {
            ProfilingStream::new(stream, Arc::clone(&self.cost)).boxed()
        } else {
            stream
        }
    }

    pub fn is_profiling(&self) -> bool {
        self.profiling
    }

    /// Nanoseconds spent pulling this step's stream
    pub fn cost(&self) -> u64 {
        self.cost.load(Ordering::Relaxed)
    }

    /// ` (Nμs)` when profiling, empty otherwise
    pub fn cost_suffix(&self) -> String {
        if self.profiling {
            format!(" ({}μs)", self.cost() / 1_000)
        } else {
            String::new()
        }
    }
}

/// Indentation of an explain line
pub fn indent(depth: usize, indent: usize) -> String {
    " ".repeat(depth * indent)
}

/// One node of an execution plan.
///
/// Implementors provide [`internal_start`](ExecutionStep::internal_start)
/// and their explain and serialized forms; the lifecycle is handled by the
/// provided methods on top of [`StepBase`].
pub trait ExecutionStep: fmt::Debug {
    /// Short type name used in logs
    fn name(&self) -> &'static str;

    fn base(&self) -> &StepBase;

    fn base_mut(&mut self) -> &mut StepBase;

    /// Build this step's output stream. Called once per start.
    fn internal_start(&mut self, ctx: &mut CommandContext) -> ExecResult<BoxedStream>;

    /// Explain output for this step only
    fn pretty_print(&self, depth: usize, indent: usize) -> String;

    fn serialize(&self) -> SerializedStep;

    /// Whether the step can be part of a cached plan
    fn can_be_cached(&self) -> bool {
        false
    }

    fn start(&mut self, ctx: &mut CommandContext) -> ExecResult<BoxedStream> {
        let name = self.name();
        self.base_mut().begin(ctx, name)?;
        debug!("Starting {}", name);
        let stream = self.internal_start(ctx)?;
        Ok(self.base().instrument(stream))
    }

    /// Close this step and, the first time only, its predecessor
    fn close(&mut self) {
        let base = self.base_mut();
        if base.state == StepState::Closed {
            return;
        }
        base.state = StepState::Closed;
        if let Some(previous) = base.previous.as_mut() {
            previous.close();
        }
        debug!("Closed {}", self.name());
    }

    /// Make the step startable again; propagates to the predecessor
    fn reset(&mut self) -> ExecResult<()> {
        let name = self.name();
        let base = self.base_mut();
        if base.state == StepState::Closed {
            return Err(ExecutionError::illegal_state(format!(
                "{} is closed and cannot be reset",
                name
            )));
        }
        base.state = StepState::Created;
        base.cost.store(0, Ordering::Relaxed);
        match base.previous.as_mut() {
            Some(previous) => previous.reset(),
            None => Ok(()),
        }
    }

    fn set_previous(&mut self, previous: BoxedStep) {
        self.base_mut().set_previous(previous);
    }

    fn previous(&self) -> Option<&dyn ExecutionStep> {
        self.base().previous()
    }

    fn state(&self) -> StepState {
        self.base().state()
    }

    fn cost(&self) -> u64 {
        self.base().cost()
    }
}

/// Serialized form of one step, without its predecessor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SerializedStep {
    FetchFromIndex {
        search: SerializedIndexSearch,
    },
    GetValueFromIndexEntry {
        collection_filter: Option<Vec<i32>>,
    },
    FetchFromCollection {
        collection: String,
        ascending: bool,
    },
    FetchFromVariable {
        variable: String,
    },
    Values {
        rows: Vec<IndexMap<String, Value>>,
    },
    CopyEntity {
        target_class: Option<String>,
    },
    Expand {
        alias: Option<String>,
    },
    CreateEdges {
        edge_class: String,
        from_variable: String,
        to_variable: String,
        unique_index: Option<String>,
    },
    FindReferences {
        collections: Option<Vec<String>>,
    },
}

impl SerializedStep {
    /// Rebuild the step; indexes are resolved by name in `database`
    pub fn deserialize(self, database: &Database) -> ExecResult<BoxedStep> {
        let step: BoxedStep = match self {
            SerializedStep::FetchFromIndex { search } => {
                let index = database.index(&search.index_name).ok_or_else(|| {
                    ExecutionError::command(format!("Index not found: {}", search.index_name))
                })?;
                Box::new(FetchFromIndexStep::new(IndexSearchDescriptor::from_serialized(
                    index, search,
                )))
            }
            SerializedStep::GetValueFromIndexEntry { collection_filter } => {
                Box::new(GetValueFromIndexEntryStep::new(collection_filter))
            }
            SerializedStep::FetchFromCollection {
                collection,
                ascending,
            } => Box::new(FetchFromCollectionStep::new(collection, ascending)),
            SerializedStep::FetchFromVariable { variable } => {
                Box::new(FetchFromVariableStep::new(variable))
            }
            SerializedStep::Values { rows } => Box::new(ValuesStep::new(rows)),
            SerializedStep::CopyEntity { target_class } => {
                Box::new(CopyEntityStep::new(target_class))
            }
            SerializedStep::Expand { alias } => Box::new(ExpandStep::new(alias)),
            SerializedStep::CreateEdges {
                edge_class,
                from_variable,
                to_variable,
                unique_index,
            } => {
                let unique_index = match unique_index {
                    Some(name) => Some(database.index(&name).ok_or_else(|| {
                        ExecutionError::command(format!("Index not found: {}", name))
                    })?),
                    None => None,
                };
                Box::new(CreateEdgesStep::new(
                    edge_class,
                    from_variable,
                    to_variable,
                    unique_index,
                ))
            }
            SerializedStep::FindReferences { collections } => {
                Box::new(FindReferencesStep::new(collections))
            }
        };
        Ok(step)
    }
}
