// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Caching of compiled execution plans
//!
//! Plans are stored in serialized form and rebuilt against the database on
//! every hit, so a cached plan never shares step state with a running one.

pub mod plan_cache;

pub use plan_cache::{ExecutionPlanCache, PlanCacheStats};
