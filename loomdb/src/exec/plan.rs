// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Execution plans: a chain of steps started from its last step

use super::context::CommandContext;
use super::error::ExecResult;
use super::step::{BoxedStep, ExecutionStep, SerializedStep};
use super::stream::{self, BoxedStream};
use crate::storage::Database;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Serialized plan: its steps, source first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedPlan {
    pub steps: Vec<SerializedStep>,
}

/// A runnable chain of steps.
///
/// The plan owns only its last step; every step owns its predecessor.
/// Pulling from the stream returned by `start` pulls the whole chain.
#[derive(Debug, Default)]
pub struct ExecutionPlan {
    last: Option<BoxedStep>,
}

impl ExecutionPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step; the current last step becomes its predecessor
    pub fn chain(&mut self, mut step: BoxedStep) {
        if let Some(previous) = self.last.take() {
            step.set_previous(previous);
        }
        self.last = Some(step);
    }

    /// Builder form of [`chain`](Self::chain)
    pub fn with_step(mut self, step: impl ExecutionStep + 'static) -> Self {
        self.chain(Box::new(step));
        self
    }

    /// Steps from the source to the last one
    pub fn steps(&self) -> Vec<&dyn ExecutionStep> {
        let mut steps = Vec::new();
        let mut current: Option<&dyn ExecutionStep> = self.last.as_deref();
        while let Some(step) = current {
            steps.push(step);
            current = step.previous();
        }
        steps.reverse();
        steps
    }

    pub fn len(&self) -> usize {
        self.steps().len()
    }

    pub fn is_empty(&self) -> bool {
        self.last.is_none()
    }

    /// Start the chain. An empty plan yields no rows.
    pub fn start(&mut self, ctx: &mut CommandContext) -> ExecResult<BoxedStream> {
        match self.last.as_mut() {
            Some(last) => last.start(ctx),
            None => Ok(stream::empty()),
        }
    }

    pub fn close(&mut self) {
        if let Some(last) = self.last.as_mut() {
            last.close();
        }
    }

    /// Make every step startable again
    pub fn reset(&mut self) -> ExecResult<()> {
        match self.last.as_mut() {
            Some(last) => last.reset(),
            None => Ok(()),
        }
    }

    pub fn pretty_print(&self, depth: usize, indent: usize) -> String {
        self.steps()
            .iter()
            .map(|step| step.pretty_print(depth, indent))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Whether every step of a non-empty plan can be cached
    pub fn can_be_cached(&self) -> bool {
        !self.is_empty() && self.steps().iter().all(|step| step.can_be_cached())
    }

    pub fn serialize(&self) -> SerializedPlan {
        SerializedPlan {
            steps: self.steps().iter().map(|step| step.serialize()).collect(),
        }
    }

    /// Rebuild a plan; index references are resolved in `database`
    pub fn deserialize(plan: SerializedPlan, database: &Database) -> ExecResult<Self> {
        let mut result = Self::new();
        for step in plan.steps {
            result.chain(step.deserialize(database)?);
        }
        debug!("Deserialized plan with {} step(s)", result.len());
        Ok(result)
    }

    /// Fresh, unstarted copy of this plan
    pub fn copy(&self, database: &Database) -> ExecResult<Self> {
        Self::deserialize(self.serialize(), database)
    }
}

impl fmt::Display for ExecutionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.pretty_print(0, 2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::error::ExecutionError;
    use crate::exec::step::{ExpandStep, FetchFromVariableStep, StepState, ValuesStep};
    use crate::exec::stream::ExecutionStream;
    use crate::session::Session;
    use crate::storage::Value;
    use std::sync::Arc;

    fn context() -> CommandContext {
        CommandContext::new(Session::open(Arc::new(Database::new("plans"))))
    }

    fn values_then_expand() -> ExecutionPlan {
        ExecutionPlan::new()
            .with_step(ValuesStep::column("x", vec![Value::from(vec![1, 2])]))
            .with_step(ExpandStep::new(Some("n".to_string())))
    }

    #[test]
    fn test_empty_plan() {
        let mut ctx = context();
        let mut plan = ExecutionPlan::new();
        assert!(plan.start(&mut ctx).unwrap().drain(&ctx).unwrap().is_empty());
        assert!(!plan.can_be_cached());
        assert_eq!(plan.to_string(), "");
    }

    #[test]
    fn test_chain_runs_source_first() {
        let mut ctx = context();
        let mut plan = values_then_expand();
        let names: Vec<&str> = plan.steps().iter().map(|step| step.name()).collect();
        assert_eq!(names, vec!["ValuesStep", "ExpandStep"]);
        assert_eq!(plan.to_string(), "+ VALUES (1 rows)\n+ EXPAND");

        let rows = plan.start(&mut ctx).unwrap().drain(&ctx).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].get("n").unwrap(), Some(Value::Integer(2)));
    }

    #[test]
    fn test_reset_and_close() {
        let mut ctx = context();
        let mut plan = values_then_expand();
        plan.start(&mut ctx).unwrap().drain(&ctx).unwrap();
        plan.reset().unwrap();
        assert!(plan.steps().iter().all(|s| s.state() == StepState::Created));
        assert_eq!(plan.start(&mut ctx).unwrap().drain(&ctx).unwrap().len(), 2);

        plan.close();
        assert!(plan.steps().iter().all(|s| s.state() == StepState::Closed));
        assert!(matches!(plan.reset(), Err(ExecutionError::IllegalState(_))));
    }

    #[test]
    fn test_serialized_copy_is_fresh() {
        let db = Database::new("plans");
        let mut ctx = context();
        let mut plan = values_then_expand();
        assert!(plan.can_be_cached());
        plan.start(&mut ctx).unwrap().drain(&ctx).unwrap();

        let mut copy = plan.copy(&db).unwrap();
        assert_eq!(copy.serialize(), plan.serialize());
        assert!(copy.steps().iter().all(|s| s.state() == StepState::Created));
        assert_eq!(copy.start(&mut ctx).unwrap().drain(&ctx).unwrap().len(), 2);
    }

    #[test]
    fn test_variable_targets_are_not_cacheable() {
        let plan = ExecutionPlan::new()
            .with_step(FetchFromVariableStep::new("v"))
            .with_step(ExpandStep::new(None));
        assert!(!plan.can_be_cached());
        assert_eq!(plan.len(), 2);
    }
}
