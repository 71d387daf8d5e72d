// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    inside_simple = { 22, 23, 22, true },
    outside_simple = { 9, 17, 8, false },
    start_inclusive = { 9, 17, 9, true },
    end_exclusive = { 9, 17, 17, false },
    wraps_midnight_late = { 22, 6, 23, true },
    wraps_midnight_early = { 22, 6, 3, true },
    wraps_midnight_day = { 22, 6, 12, false },
    equal_disables = { 8, 8, 8, false },
)]
fn quiet_hours(start: u32, end: u32, hour: u32, expected: bool) {
    let config = HeartbeatConfig {
        quiet_hours_start_hour: start,
        quiet_hours_end_hour: end,
        ..Default::default()
    };
    assert_eq!(config.in_quiet_hours(hour), expected);
}

#[test]
fn missing_config_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = HeartbeatConfig::load(&dir.path().join("nope.yaml")).unwrap();
    assert!(config.enabled);
    assert_eq!(config.top_k_workers, 3);
}

#[test]
fn partial_config_file_fills_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, "top_k_workers: 7\nenabled: false\n").unwrap();
    let config = HeartbeatConfig::load(&path).unwrap();
    assert!(!config.enabled);
    assert_eq!(config.top_k_workers, 7);
    assert_eq!(config.min_wake_score, 1);
}

#[test]
fn state_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.yaml");
    let mut state = HeartbeatState::default();
    state.pulse_mut("agt-1").last_report_status = Some(ReportStatus::Ok);
    state.pulse_mut("agt-1").suppressed_until = Some(123_456);
    state.run_event_cursors.insert("run-1".to_string(), 17);
    state.ticks = 4;
    state.save(&path).unwrap();

    let loaded = HeartbeatState::load(&path).unwrap();
    assert_eq!(loaded.ticks, 4);
    assert_eq!(loaded.run_event_cursors.get("run-1"), Some(&17));
    let pulse = loaded.workers.get("agt-1").unwrap();
    assert_eq!(pulse.last_report_status, Some(ReportStatus::Ok));
    assert_eq!(pulse.suppressed_until, Some(123_456));
}

#[test]
fn missing_state_file_is_empty_state() {
    let dir = tempfile::tempdir().unwrap();
    let state = HeartbeatState::load(&dir.path().join("state.yaml")).unwrap();
    assert!(state.workers.is_empty());
    assert_eq!(state.ticks, 0);
}

#[test]
fn auto_action_window_prunes() {
    let mut state = HeartbeatState::default();
    let now = 10_000_000;
    state.auto_action_stamps = vec![now - 2 * 60 * 60 * 1000, now - 30 * 60 * 1000, now];
    assert_eq!(state.auto_actions_last_hour(now), 2);
    assert_eq!(state.auto_action_stamps.len(), 2);
}
