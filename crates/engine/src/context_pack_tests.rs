// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::git::run_git;
use ac_core::records::ArtifactFrontMatter;
use tempfile::tempdir;

async fn init_repo(path: &Path) {
    std::fs::create_dir_all(path).unwrap();
    run_git(path, &["init", "-q"]).await.unwrap();
    run_git(path, &["config", "user.email", "t@example.com"]).await.unwrap();
    run_git(path, &["config", "user.name", "t"]).await.unwrap();
    std::fs::write(path.join("main.rs"), "fn main() {}\n").unwrap();
    run_git(path, &["add", "."]).await.unwrap();
    run_git(path, &["commit", "-q", "-m", "init"]).await.unwrap();
}

#[tokio::test]
async fn clean_repo_snapshot_writes_manifest_without_patch() {
    let dir = tempdir().unwrap();
    let repo = dir.path().join("repo");
    init_repo(&repo).await;

    let ws = dir.path().join("ws");
    let layout = WorkspaceLayout::new(&ws);
    let project = ProjectId::new("proj");
    let pack = ContextPackId::from_string("ctx-1");
    let run = RunId::from_string("run-1");

    let manifest = snapshot_context_pack(&layout, &project, &pack, &run, &repo, "t0".into())
        .await
        .unwrap();
    assert!(!manifest.repo_dirty);
    assert!(manifest.dirty_patch_artifact_id.is_none());
    assert_eq!(manifest.repo_head.len(), 40);

    let loaded: ContextPackManifest = serde_yaml::from_str(
        &std::fs::read_to_string(layout.context_pack_manifest(&project, &pack)).unwrap(),
    )
    .unwrap();
    assert_eq!(loaded.repo_head, manifest.repo_head);
}

#[tokio::test]
async fn dirty_repo_snapshot_captures_patch_artifact() {
    let dir = tempdir().unwrap();
    let repo = dir.path().join("repo");
    init_repo(&repo).await;
    std::fs::write(repo.join("main.rs"), "fn main() { println!(\"hi\"); }\n").unwrap();

    let ws = dir.path().join("ws");
    let layout = WorkspaceLayout::new(&ws);
    let project = ProjectId::new("proj");
    let pack = ContextPackId::from_string("ctx-2");
    let run = RunId::from_string("run-2");

    let manifest = snapshot_context_pack(&layout, &project, &pack, &run, &repo, "t0".into())
        .await
        .unwrap();
    assert!(manifest.repo_dirty);
    let artifact_id = manifest.dirty_patch_artifact_id.clone().unwrap();

    let artifact_path = layout.artifact_md(&project, &artifact_id);
    let fm = ArtifactFrontMatter::load(&artifact_path).unwrap();
    assert_eq!(fm.artifact_type, "repo_dirty_patch");
    assert_eq!(fm.run_id, Some(run));

    let body = std::fs::read_to_string(&artifact_path).unwrap();
    assert!(body.contains("println!"));
}
