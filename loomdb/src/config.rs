// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Execution configuration and presets

use chrono::TimeZone;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use thiserror::Error;

/// Configuration validation errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Unknown timezone: {0}")]
    UnknownTimezone(String),

    #[error("Invalid date-time format: {0}")]
    InvalidDateTimeFormat(String),

    #[error("Plan cache must hold at least one entry when enabled")]
    EmptyPlanCache,
}

/// Execution engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Record per-step timings and show them in explain output
    pub profiling_enabled: bool,

    /// `chrono` format string used when dates are rendered to JSON
    pub date_time_format: String,

    /// IANA timezone name dates are rendered in
    pub timezone: String,

    /// Plan cache settings
    pub plan_cache: PlanCacheConfig,
}

/// Plan cache settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanCacheConfig {
    /// Enable/disable plan caching entirely
    pub enabled: bool,

    /// Maximum number of cached plans before the least recently used is evicted
    pub max_entries: usize,
}

impl Default for PlanCacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: 250,
        }
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            profiling_enabled: false,
            date_time_format: "%Y-%m-%d %H:%M:%S%.3f".to_string(),
            timezone: "UTC".to_string(),
            plan_cache: PlanCacheConfig::default(),
        }
    }
}

impl ExecutionConfig {
    /// Development preset: profiling on, small plan cache
    pub fn development() -> Self {
        Self {
            profiling_enabled: true,
            plan_cache: PlanCacheConfig {
                enabled: true,
                max_entries: 32,
            },
            ..Self::default()
        }
    }

    /// Production preset: no profiling, large plan cache
    pub fn production() -> Self {
        Self {
            profiling_enabled: false,
            plan_cache: PlanCacheConfig {
                enabled: true,
                max_entries: 4096,
            },
            ..Self::default()
        }
    }

    /// Profiling preset: profiling on, plan cache off so every plan is fresh
    pub fn profiling() -> Self {
        Self {
            profiling_enabled: true,
            plan_cache: PlanCacheConfig {
                enabled: false,
                max_entries: 1,
            },
            ..Self::default()
        }
    }

    /// Parsed timezone
    pub fn tz(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| ConfigError::UnknownTimezone(self.timezone.clone()))
    }

    /// Check every setting
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.tz()?;
        let mut rendered = String::new();
        let renders = chrono::Utc
            .timestamp_millis_opt(0)
            .single()
            .map(|probe| write!(rendered, "{}", probe.format(&self.date_time_format)).is_ok())
            .unwrap_or(false);
        if self.date_time_format.is_empty() || !renders {
            return Err(ConfigError::InvalidDateTimeFormat(
                self.date_time_format.clone(),
            ));
        }
        if self.plan_cache.enabled && self.plan_cache.max_entries == 0 {
            return Err(ConfigError::EmptyPlanCache);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ExecutionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.tz().unwrap(), Tz::UTC);
        assert!(!config.profiling_enabled);
    }

    #[test]
    fn test_presets() {
        assert!(ExecutionConfig::development().profiling_enabled);
        assert!(!ExecutionConfig::profiling().plan_cache.enabled);
        assert_eq!(ExecutionConfig::production().plan_cache.max_entries, 4096);
        for config in [
            ExecutionConfig::development(),
            ExecutionConfig::production(),
            ExecutionConfig::profiling(),
        ] {
            assert!(config.validate().is_ok());
        }
    }

    #[test]
    fn test_invalid_settings() {
        let config = ExecutionConfig {
            timezone: "Mars/Olympus".to_string(),
            ..ExecutionConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::UnknownTimezone("Mars/Olympus".to_string()))
        );

        let config = ExecutionConfig {
            plan_cache: PlanCacheConfig {
                enabled: true,
                max_entries: 0,
            },
            ..ExecutionConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::EmptyPlanCache));

        let config = ExecutionConfig {
            date_time_format: String::new(),
            ..ExecutionConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_round_trips_through_json() {
        let config = ExecutionConfig::development();
        let json = serde_json::to_string(&config).unwrap();
        let back: ExecutionConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
