// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Query statistics used to estimate index access costs

use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Default)]
struct RunningAverage {
    samples: u64,
    mean: f64,
}

/// Rows returned per index access shape, averaged over past executions
#[derive(Debug, Default)]
pub struct QueryStats {
    index_stats: RwLock<HashMap<String, RunningAverage>>,
}

impl QueryStats {
    pub fn new() -> Self {
        Self::default()
    }

    fn index_key(index: &str, params: usize, range: bool, additional_range: bool) -> String {
        format!("INDEX.{}.{}.{}.{}", index, params, range, additional_range)
    }

    /// Average row count for this access shape, if it was ever recorded
    pub fn index_stats(
        &self,
        index: &str,
        params: usize,
        range: bool,
        additional_range: bool,
    ) -> Option<u64> {
        let key = Self::index_key(index, params, range, additional_range);
        self.index_stats
            .read()
            .get(&key)
            .map(|avg| avg.mean.round() as u64)
    }

    /// Record the row count of one finished index access
    pub fn push_index_stats(
        &self,
        index: &str,
        params: usize,
        range: bool,
        additional_range: bool,
        rows: u64,
    ) {
        let key = Self::index_key(index, params, range, additional_range);
        let mut stats = self.index_stats.write();
        let entry = stats.entry(key).or_default();
        entry.samples += 1;
        entry.mean += (rows as f64 - entry.mean) / entry.samples as f64;
    }

    pub fn clear(&self) {
        self.index_stats.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_average_per_shape() {
        let stats = QueryStats::new();
        assert_eq!(stats.index_stats("Person.age", 1, true, false), None);
        stats.push_index_stats("Person.age", 1, true, false, 10);
        stats.push_index_stats("Person.age", 1, true, false, 20);
        stats.push_index_stats("Person.age", 1, false, false, 1);
        assert_eq!(stats.index_stats("Person.age", 1, true, false), Some(15));
        assert_eq!(stats.index_stats("Person.age", 1, false, false), Some(1));
        stats.clear();
        assert_eq!(stats.index_stats("Person.age", 1, true, false), None);
    }
}
