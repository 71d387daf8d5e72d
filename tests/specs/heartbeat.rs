// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Heartbeat specs: triage wake and ok-suppression

use crate::prelude::*;
use serde_json::json;

async fn setup(ws: &Ws) {
    ws.agent("agt-a", "worker", "cmd");
    // A due task keeps agt-a's wake score at or above one.
    let tasks_dir = ws
        .controller
        .layout
        .tasks_dir(&ac_core::ProjectId::new("Proj"));
    std::fs::create_dir_all(&tasks_dir).unwrap();
    let due = chrono_now_plus_one_hour();
    std::fs::write(
        tasks_dir.join("t-1.md"),
        format!("---\ntask_id: t-1\ntitle: T1\nstatus: open\nassignee: agt-a\ndue_at: {due}\n---\nbody\n"),
    )
    .unwrap();

    ws.rpc(
        "heartbeat.config.set",
        json!({"config": {
            "enabled": true,
            "tick_interval_minutes": 15,
            "top_k_workers": 2,
            "min_wake_score": 1,
            "ok_suppression_minutes": 30,
            "due_horizon_minutes": 1440,
            "max_auto_actions_per_tick": 3,
            "max_auto_actions_per_hour": 10,
            "quiet_hours_start_hour": 0,
            "quiet_hours_end_hour": 0,
            "quiet_hours_min_score": 3,
            "stuck_job_running_minutes": 90,
            "idempotency_ttl_days": 7,
            "jitter_max_seconds": 0,
        }}),
    )
    .await;
}

fn chrono_now_plus_one_hour() -> String {
    use ac_core::Clock;
    let ms = ac_core::SystemClock.epoch_ms() + 3_600_000;
    chrono::DateTime::from_timestamp_millis(ms as i64)
        .unwrap()
        .to_rfc3339()
}

/// Scenario: with `top_k=2, min_score=1`, the first triage wakes worker
/// A. After an ok report against the unchanged context, the second
/// triage does not include A; once the suppression window expires, it
/// does again.
#[tokio::test]
async fn ok_suppression_until_window_expires() {
    let ws = Ws::new().await;
    setup(&ws).await;

    let first = ws.rpc("heartbeat.tick", json!({})).await;
    assert_eq!(first["woken"], json!(["agt-a"]));

    ws.controller
        .heartbeat
        .ingest_report(
            &ac_core::AgentId::new("agt-a"),
            &ac_core::HeartbeatReport {
                status: ac_core::ReportStatus::Ok,
                summary: "all quiet".to_string(),
                actions: vec![],
            },
            &ac_core::ProjectId::new("Proj"),
        )
        .unwrap();

    let second = ws.rpc("heartbeat.tick", json!({})).await;
    assert_eq!(second["woken"], json!([]), "suppressed: {second}");
    assert_eq!(second["suppressed"], json!(["agt-a"]));

    // Status endpoint reflects the counters.
    let status = ws.rpc("heartbeat.status", json!({})).await;
    assert_eq!(status["ticks"], 2);
    assert!(status["suppressions"].as_u64().unwrap() >= 1);
}

/// Config round-trips through heartbeat.config.get/set.
#[tokio::test]
async fn config_get_set_round_trip() {
    let ws = Ws::new().await;
    setup(&ws).await;
    let config = ws.rpc("heartbeat.config.get", json!({})).await;
    assert_eq!(config["top_k_workers"], 2);
    assert_eq!(config["ok_suppression_minutes"], 30);
}
