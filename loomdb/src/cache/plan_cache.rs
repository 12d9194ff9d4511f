// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Execution plan caching to avoid re-planning repeated statements

use crate::config::PlanCacheConfig;
use crate::exec::plan::{ExecutionPlan, SerializedPlan};
use crate::storage::Database;
use log::{debug, warn};
use parking_lot::Mutex;
use std::collections::HashMap;

/// Plan cache statistics
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PlanCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub current_entries: usize,
}

impl PlanCacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Cached plan entry: the bincode encoding of a [`SerializedPlan`]
#[derive(Debug)]
struct CachedPlan {
    bytes: Vec<u8>,
    last_used: u64,
    usage_count: u64,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, CachedPlan>,
    /// Logical clock for least-recently-used ordering
    clock: u64,
    stats: PlanCacheStats,
}

impl CacheState {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn evict_least_recently_used(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_used)
            .map(|(statement, _)| statement.clone());
        if let Some(statement) = oldest {
            if let Some(evicted) = self.entries.remove(&statement) {
                self.stats.evictions += 1;
                debug!(
                    "Evicted cached plan for '{}' after {} use(s)",
                    statement, evicted.usage_count
                );
            }
        }
    }
}

/// Statement-keyed cache of execution plans.
///
/// Only plans whose steps are all cacheable are stored. Every `get` builds
/// a fresh plan, so callers may start and close what they receive.
#[derive(Debug)]
pub struct ExecutionPlanCache {
    config: PlanCacheConfig,
    state: Mutex<CacheState>,
}

impl ExecutionPlanCache {
    pub fn new(config: PlanCacheConfig) -> Self {
        Self {
            config,
            state: Mutex::new(CacheState::default()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Fresh copy of the plan cached for `statement`.
    ///
    /// A cached plan that no longer resolves against `database` (for
    /// example because an index it reads was dropped) is discarded.
    pub fn get(&self, statement: &str, database: &Database) -> Option<ExecutionPlan> {
        if !self.config.enabled {
            return None;
        }
        let mut state = self.state.lock();
        let now = state.tick();
        let Some(entry) = state.entries.get_mut(statement) else {
            state.stats.misses += 1;
            debug!("Plan cache miss for '{}'", statement);
            return None;
        };
        entry.last_used = now;
        entry.usage_count += 1;

        let decoded = bincode::deserialize::<SerializedPlan>(&entry.bytes)
            .map_err(Into::into)
            .and_then(|plan| ExecutionPlan::deserialize(plan, database));
        match decoded {
            Ok(plan) => {
                state.stats.hits += 1;
                debug!("Plan cache hit for '{}'", statement);
                Some(plan)
            }
            Err(error) => {
                warn!("Discarding cached plan for '{}': {}", statement, error);
                state.entries.remove(statement);
                state.stats.misses += 1;
                None
            }
        }
    }

    /// Cache `plan` for `statement`; returns whether it was stored
    pub fn put(&self, statement: impl Into<String>, plan: &ExecutionPlan) -> bool {
        let statement = statement.into();
        if !self.config.enabled {
            return false;
        }
        if !plan.can_be_cached() {
            debug!("Plan for '{}' is not cacheable", statement);
            return false;
        }
        let bytes = match bincode::serialize(&plan.serialize()) {
            Ok(bytes) => bytes,
            Err(error) => {
                warn!("Cannot cache plan for '{}': {}", statement, error);
                return false;
            }
        };

        let mut state = self.state.lock();
        if !state.entries.contains_key(&statement) {
            while !state.entries.is_empty() && state.entries.len() >= self.config.max_entries {
                state.evict_least_recently_used();
            }
        }
        let now = state.tick();
        state.entries.insert(
            statement,
            CachedPlan {
                bytes,
                last_used: now,
                usage_count: 0,
            },
        );
        true
    }

    pub fn contains(&self, statement: &str) -> bool {
        self.state.lock().entries.contains_key(statement)
    }

    /// Drop the plan cached for one statement
    pub fn remove(&self, statement: &str) -> bool {
        self.state.lock().entries.remove(statement).is_some()
    }

    /// Drop every cached plan, e.g. after a schema change
    pub fn invalidate(&self) {
        let mut state = self.state.lock();
        let dropped = state.entries.len();
        state.entries.clear();
        debug!("Invalidated {} cached plan(s)", dropped);
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get cache statistics
    pub fn stats(&self) -> PlanCacheStats {
        let state = self.state.lock();
        let mut stats = state.stats.clone();
        stats.current_entries = state.entries.len();
        stats
    }
}

impl Default for ExecutionPlanCache {
    fn default() -> Self {
        Self::new(PlanCacheConfig::default())
    }
}
