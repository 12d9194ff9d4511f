// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Cooperative cancellation
//!
//! A query owns one token; any thread holding a clone may request
//! cancellation. Execution polls the token at defined points (every index
//! entry, every scanned record, every join pair) and stops with
//! [`ExecutionError::Interrupted`].

use super::error::{ExecResult, ExecutionError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared cancellation flag
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of the query owning this token
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Fail with `Interrupted` once cancellation was requested
    pub fn check(&self) -> ExecResult<()> {
        if self.is_cancelled() {
            Err(ExecutionError::Interrupted)
        } else {
            Ok(())
        }
    }
}
