// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! LoomDB - query execution core for an embedded document/graph database
//!
//! LoomDB runs compiled query plans as chains of execution steps. Each step
//! hands its successor a lazy, closeable stream of result rows; pulling from
//! the last step pulls the whole chain.
//!
//! # Features
//!
//! - **Pull-based streams**: rows are produced one at a time and cursors are
//!   released on close, drained or not
//! - **Index access paths**: key conditions compile into ordered range scans
//!   and point lookups over B-tree and hash indexes
//! - **Cooperative cancellation**: a shared token is polled per index entry,
//!   scanned record and created edge
//! - **Plan caching**: cacheable plans are stored serialized and rebuilt on
//!   every hit
//!
//! # Usage
//!
//! ```ignore
//! let db = Arc::new(Database::new("example"));
//! let mut ctx = CommandContext::new(Session::open(db));
//! let mut plan = ExecutionPlan::new()
//!     .with_step(ValuesStep::column("x", vec![Value::from(vec![1, 2])]))
//!     .with_step(ExpandStep::new(None));
//! let rows = plan.start(&mut ctx)?.drain(&ctx)?;
//! ```

pub mod cache;
pub mod config;
pub mod exec;
pub mod plan;
pub mod session;
pub mod storage;

pub use cache::ExecutionPlanCache;
pub use config::{ConfigError, ExecutionConfig, PlanCacheConfig};
pub use exec::{
    BindableSource, CancellationToken, CommandContext, ExecResult, ExecutionError, ExecutionPlan,
    ExecutionStream, ResultRow,
};
pub use session::Session;
pub use storage::{Database, Rid, Value};

/// LoomDB version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// LoomDB crate name
pub const CRATE_NAME: &str = env!("CARGO_PKG_NAME");
