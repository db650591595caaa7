// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Coordinator configuration.
//!
//! All tunables have defaults in code; an optional `config.toml` in the
//! state directory overrides individual fields.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Durability mode for the persistence engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PersistenceMode {
    /// No persistence; a crash loses everything.
    #[serde(rename = "memory-only")]
    MemoryOnly,
    /// Full state serialized on a fixed interval; mutations since the last
    /// snapshot are lost on crash.
    #[serde(rename = "periodic-snapshot")]
    PeriodicSnapshot,
    /// Every mutation appended to the WAL before application; periodic
    /// compaction into a snapshot.
    #[default]
    #[serde(rename = "write-ahead-log")]
    WriteAheadLog,
}

impl std::fmt::Display for PersistenceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PersistenceMode::MemoryOnly => "memory-only",
            PersistenceMode::PeriodicSnapshot => "periodic-snapshot",
            PersistenceMode::WriteAheadLog => "write-ahead-log",
        };
        write!(f, "{s}")
    }
}

/// Thresholds for the input validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatorConfig {
    /// Total risk at or above which a submission is rejected.
    #[serde(default = "default_reject_risk")]
    pub reject_risk: u32,
    /// Total risk at or above which a submission is flagged for review.
    #[serde(default = "default_flag_risk")]
    pub flag_risk: u32,
    /// High-severity threat categories explicitly allowed through.
    #[serde(default)]
    pub allow_listed: Vec<String>,
}

fn default_reject_risk() -> u32 {
    40
}

fn default_flag_risk() -> u32 {
    15
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            reject_risk: default_reject_risk(),
            flag_risk: default_flag_risk(),
            allow_listed: Vec::new(),
        }
    }
}

/// Coordinator tunables. Field names mirror the documented option names
/// with `-` replaced by `_`; all durations are milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    pub heartbeat_check_interval_ms: u64,
    pub heartbeat_warning_ms: u64,
    pub heartbeat_timeout_ms: u64,
    pub ttl_sweep_interval_ms: u64,
    pub default_ttl_ms: u64,
    pub snapshot_interval_ms: u64,
    pub persistence_mode: PersistenceMode,
    /// Override for the snapshot file path (defaults under the state dir).
    pub snapshot_path: Option<PathBuf>,
    /// Override for the WAL file path (defaults under the state dir).
    pub wal_path: Option<PathBuf>,
    pub max_tasks_per_worker: u32,
    /// Admissions are refused once this many tasks are queued.
    pub max_queue_depth: usize,
    pub default_max_retries: u32,
    /// Grace period for best-effort cancels and drain deadlines.
    pub dispatch_grace_ms: u64,
    /// How long terminal tasks are retained before pruning.
    pub task_retention_ms: u64,
    pub single_expert_threshold: f64,
    pub parallel_activation_threshold: f64,
    /// Workload history shows low utility for parallel activation, so it
    /// ships disabled.
    pub parallel_activation_enabled: bool,
    pub minimum_confidence: f64,
    pub subscriber_buffer_depth: usize,
    pub validator: ValidatorConfig,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            heartbeat_check_interval_ms: 5_000,
            heartbeat_warning_ms: 10_000,
            heartbeat_timeout_ms: 15_000,
            ttl_sweep_interval_ms: 1_000,
            default_ttl_ms: 300_000,
            snapshot_interval_ms: 30_000,
            persistence_mode: PersistenceMode::WriteAheadLog,
            snapshot_path: None,
            wal_path: None,
            max_tasks_per_worker: 10,
            max_queue_depth: 10_000,
            default_max_retries: 3,
            dispatch_grace_ms: 5_000,
            task_retention_ms: 3_600_000,
            single_expert_threshold: 0.80,
            parallel_activation_threshold: 0.60,
            parallel_activation_enabled: false,
            minimum_confidence: 0.30,
            subscriber_buffer_depth: 256,
            validator: ValidatorConfig::default(),
        }
    }
}

impl CoordinatorConfig {
    /// Parse a TOML document, falling back to defaults for missing fields.
    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    /// Load from `<path>` if it exists; missing file means defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        Ok(Self::from_toml_str(&text)?)
    }

    pub fn heartbeat_check_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_check_interval_ms)
    }

    pub fn ttl_sweep_interval(&self) -> Duration {
        Duration::from_millis(self.ttl_sweep_interval_ms)
    }

    pub fn snapshot_interval(&self) -> Duration {
        Duration::from_millis(self.snapshot_interval_ms)
    }
}

/// Errors from loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
