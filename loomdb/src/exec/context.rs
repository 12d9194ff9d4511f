// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Per-command execution context: session, parameters, variables and
//! the cancellation token

use super::cancel::CancellationToken;
use super::error::ExecResult;
use super::variable::BindableSource;
use crate::config::ExecutionConfig;
use crate::session::Session;
use crate::storage::{Database, Value};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug)]
pub struct CommandContext {
    session: Session,
    /// Positional and named query parameters
    parameters: HashMap<String, Value>,
    variables: HashMap<String, BindableSource>,
    cancellation: CancellationToken,
}

impl CommandContext {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            parameters: HashMap::new(),
            variables: HashMap::new(),
            cancellation: CancellationToken::new(),
        }
    }

    /// Share a token so another thread can cancel this command
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn with_parameters(mut self, parameters: HashMap<String, Value>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn database(&self) -> &Arc<Database> {
        self.session.database()
    }

    pub fn config(&self) -> &ExecutionConfig {
        self.session.config()
    }

    pub fn profiling_enabled(&self) -> bool {
        self.session.config().profiling_enabled
    }

    pub fn set_parameter(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.parameters.insert(name.into(), value.into());
    }

    pub fn parameter(&self, name: &str) -> Option<&Value> {
        self.parameters.get(name)
    }

    pub fn parameters(&self) -> &HashMap<String, Value> {
        &self.parameters
    }

    pub fn set_variable(&mut self, name: impl Into<String>, source: impl Into<BindableSource>) {
        self.variables.insert(name.into(), source.into());
    }

    /// Read a variable. A bound stream is handed out once and then unbound.
    pub fn variable(&mut self, name: &str) -> Option<BindableSource> {
        match self.variables.get(name)?.try_clone() {
            Some(copy) => Some(copy),
            None => self.variables.remove(name),
        }
    }

    /// Current value of a non-stream variable, without consuming anything
    pub fn variable_value(&self, name: &str) -> Option<Value> {
        match self.variables.get(name)? {
            BindableSource::Single(value) => Some(value.clone()),
            BindableSource::Iterable(items) => Some(Value::List(items.clone())),
            BindableSource::ResultSet(rows) => Some(Value::List(
                rows.iter().cloned().map(Value::from).collect(),
            )),
            BindableSource::Stream(_) => None,
        }
    }

    pub fn has_variable(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_interrupted(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// `Err(Interrupted)` once cancellation has been requested
    pub fn check_interrupted(&self) -> ExecResult<()> {
        self.cancellation.check()
    }
}
