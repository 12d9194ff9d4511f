// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Query execution engine
//!
//! This module provides the pull-based execution layer: result rows, the
//! streams that carry them, the steps that produce them and the plans that
//! chain steps together.

pub mod cancel;
pub mod context;
pub mod error;
pub mod plan;
pub mod result;
pub mod stats;
pub mod step;
pub mod stream;
pub mod variable;

// Re-export the main types for convenience
pub use cancel::CancellationToken;
pub use context::CommandContext;
pub use error::{ExecResult, ExecutionError};
pub use plan::{ExecutionPlan, SerializedPlan};
pub use result::ResultRow;
pub use stats::QueryStats;
pub use step::{BoxedStep, ExecutionStep, SerializedStep, StepState};
pub use stream::{BoxedStream, ExecutionStream, MultipleExecutionStream, StreamProducer};
pub use variable::BindableSource;
