// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn defaults_match_documented_values() {
    let config = CoordinatorConfig::default();
    assert_eq!(config.heartbeat_check_interval_ms, 5_000);
    assert_eq!(config.heartbeat_warning_ms, 10_000);
    assert_eq!(config.heartbeat_timeout_ms, 15_000);
    assert_eq!(config.ttl_sweep_interval_ms, 1_000);
    assert_eq!(config.default_ttl_ms, 300_000);
    assert_eq!(config.snapshot_interval_ms, 30_000);
    assert_eq!(config.persistence_mode, PersistenceMode::WriteAheadLog);
    assert_eq!(config.max_tasks_per_worker, 10);
    assert_eq!(config.max_queue_depth, 10_000);
    assert_eq!(config.default_max_retries, 3);
    assert_eq!(config.single_expert_threshold, 0.80);
    assert_eq!(config.parallel_activation_threshold, 0.60);
    assert!(!config.parallel_activation_enabled);
    assert_eq!(config.minimum_confidence, 0.30);
}

#[test]
fn partial_toml_overrides_keep_defaults() {
    let config = CoordinatorConfig::from_toml_str(
        r#"
        heartbeat_timeout_ms = 20000
        persistence_mode = "periodic-snapshot"
        "#,
    )
    .unwrap();
    assert_eq!(config.heartbeat_timeout_ms, 20_000);
    assert_eq!(config.persistence_mode, PersistenceMode::PeriodicSnapshot);
    // Untouched fields keep defaults
    assert_eq!(config.heartbeat_warning_ms, 10_000);
    assert_eq!(config.default_max_retries, 3);
}

#[test]
fn validator_thresholds_from_toml() {
    let config = CoordinatorConfig::from_toml_str(
        r#"
        [validator]
        reject_risk = 60
        allow_listed = ["credential-access"]
        "#,
    )
    .unwrap();
    assert_eq!(config.validator.reject_risk, 60);
    assert_eq!(config.validator.flag_risk, 15);
    assert_eq!(config.validator.allow_listed, vec!["credential-access"]);
}

#[test]
fn unknown_mode_is_an_error() {
    let result = CoordinatorConfig::from_toml_str(r#"persistence_mode = "carrier-pigeon""#);
    assert!(result.is_err());
}

#[test]
fn load_missing_file_returns_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = CoordinatorConfig::load(&dir.path().join("config.toml")).unwrap();
    assert_eq!(config, CoordinatorConfig::default());
}

#[test]
fn load_reads_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "max_tasks_per_worker = 4\n").unwrap();
    let config = CoordinatorConfig::load(&path).unwrap();
    assert_eq!(config.max_tasks_per_worker, 4);
}
