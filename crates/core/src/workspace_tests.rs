// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::path::Path;

#[test]
fn paths_compose_under_root() {
    let ws = WorkspaceLayout::new("/ws");
    let project = ProjectId::new("proj");
    let run = RunId::from_string("run-1");
    assert_eq!(
        ws.events_jsonl(&project, &run),
        Path::new("/ws/work/projects/proj/runs/run-1/events.jsonl")
    );
    assert_eq!(ws.index_sqlite(), Path::new("/ws/.local/index.sqlite"));
    assert_eq!(
        ws.stop_flag(&project, &run),
        Path::new("/ws/work/projects/proj/runs/run-1/outputs/stop_requested.flag")
    );
    assert_eq!(
        ws.heartbeat_state_yaml(),
        Path::new("/ws/.local/heartbeat/state.yaml")
    );
}

#[test]
fn worktree_path_embeds_all_keys() {
    let ws = WorkspaceLayout::new("/ws");
    let path = ws.worktree_dir(&ProjectId::new("p"), "t1", &RunId::from_string("run-9"));
    assert_eq!(path, Path::new("/ws/.local/worktrees/p/t1/run-9"));
}

#[test]
fn events_path_reverse_maps_to_run() {
    let path = Path::new("/ws/work/projects/proj/runs/run-42/events.jsonl");
    let (project, run) = WorkspaceLayout::events_path_to_run(path).unwrap();
    assert_eq!(project, "proj");
    assert_eq!(run, "run-42");
}

#[test]
fn events_path_reverse_rejects_foreign_paths() {
    assert!(WorkspaceLayout::events_path_to_run(Path::new("/tmp/events.jsonl")).is_none());
    assert!(WorkspaceLayout::events_path_to_run(Path::new(
        "/ws/work/projects/p/runs/run-1/outputs/stdout.txt"
    ))
    .is_none());
}

#[test]
fn workspace_root_recovered_from_events_path() {
    let path = Path::new("/home/u/acme/work/projects/proj/runs/run-1/events.jsonl");
    assert_eq!(
        WorkspaceLayout::workspace_root_for_events_path(path),
        Some(Path::new("/home/u/acme").to_path_buf())
    );
}
