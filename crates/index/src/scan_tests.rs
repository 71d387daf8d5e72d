// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_fixtures::FixtureWorkspace;
use ac_core::EventKind;

#[test]
fn discovers_runs_artifacts_reviews_and_help_requests() {
    let ws = FixtureWorkspace::new();
    ws.add_run("proj", "run-1", &[EventKind::RunStarted]);
    ws.add_run("proj", "run-2", &[]);
    ws.add_artifact("proj", "art-1");
    ws.add_review("rev-1", "art-1", "proj");
    ws.add_help_request("hlp-1", "agt-m");

    let scanned = scan_workspace(&ws.layout).unwrap();
    assert_eq!(scanned.runs.len(), 2);
    assert_eq!(scanned.artifacts.len(), 1);
    assert_eq!(scanned.reviews.len(), 1);
    assert_eq!(scanned.help_requests.len(), 1);
    assert_eq!(scanned.skipped, 0);

    let run = scanned.runs.iter().find(|r| r.row.run_id == "run-1").unwrap();
    assert_eq!(run.row.project_id, "proj");
    assert_eq!(run.row.status, "running");
    assert!(run.events_path.ends_with("runs/run-1/events.jsonl"));

    let artifact = &scanned.artifacts[0];
    assert_eq!(artifact.artifact_id, "art-1");
    assert_eq!(artifact.relpath, "artifacts/art-1.md");
    assert_eq!(artifact.visibility.as_deref(), Some("team"));
}

#[test]
fn malformed_files_are_skipped_not_fatal() {
    let ws = FixtureWorkspace::new();
    ws.add_run("proj", "run-1", &[]);

    // Malformed run.yaml in a second run dir.
    let bad_run_dir = ws.layout.projects_dir().join("proj/runs/run-bad");
    std::fs::create_dir_all(&bad_run_dir).unwrap();
    std::fs::write(bad_run_dir.join("run.yaml"), ": not yaml {{{").unwrap();

    // Artifact without front matter.
    let artifacts_dir = ws.layout.projects_dir().join("proj/artifacts");
    std::fs::create_dir_all(&artifacts_dir).unwrap();
    std::fs::write(artifacts_dir.join("plain.md"), "# no front matter\n").unwrap();

    let scanned = scan_workspace(&ws.layout).unwrap();
    assert_eq!(scanned.runs.len(), 1);
    assert!(scanned.artifacts.is_empty());
    assert_eq!(scanned.skipped, 2);
}

#[test]
fn empty_workspace_scans_clean() {
    let ws = FixtureWorkspace::new();
    let scanned = scan_workspace(&ws.layout).unwrap();
    assert!(scanned.runs.is_empty());
    assert!(scanned.artifacts.is_empty());
    assert_eq!(scanned.skipped, 0);
}

#[test]
fn non_md_and_non_yaml_files_are_ignored() {
    let ws = FixtureWorkspace::new();
    ws.add_artifact("proj", "art-1");
    let artifacts_dir = ws.layout.projects_dir().join("proj/artifacts");
    std::fs::write(artifacts_dir.join("notes.txt"), "scratch").unwrap();
    std::fs::create_dir_all(ws.layout.reviews_dir()).unwrap();
    std::fs::write(ws.layout.reviews_dir().join("README.md"), "docs").unwrap();

    let scanned = scan_workspace(&ws.layout).unwrap();
    assert_eq!(scanned.artifacts.len(), 1);
    assert!(scanned.reviews.is_empty());
    assert_eq!(scanned.skipped, 0);
}
