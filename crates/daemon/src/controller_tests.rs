// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::TempDir;

fn init_workspace() -> TempDir {
    let dir = TempDir::new().unwrap();
    Controller::init_workspace(dir.path(), "Acme").unwrap();
    dir
}

#[tokio::test]
async fn init_creates_a_valid_workspace() {
    let dir = init_workspace();
    let controller = Controller::open(dir.path()).unwrap();
    assert!(controller.validate().is_empty());
    assert_eq!(controller.company().unwrap().name, "Acme");
}

#[tokio::test]
async fn open_refuses_non_workspace() {
    let dir = TempDir::new().unwrap();
    assert!(matches!(
        Controller::open(dir.path()),
        Err(ControllerError::NotAWorkspace(_))
    ));
}

#[tokio::test]
async fn second_owner_is_locked_out() {
    let dir = init_workspace();
    let _first = Controller::open(dir.path()).unwrap();
    assert!(matches!(Controller::open(dir.path()), Err(ControllerError::Locked(_))));
}

#[tokio::test]
async fn project_create_and_list() {
    let dir = init_workspace();
    let controller = Controller::open(dir.path()).unwrap();
    controller.create_project(&ProjectId::new("beta")).unwrap();
    controller.create_project(&ProjectId::new("alpha")).unwrap();
    assert_eq!(controller.list_projects(), vec!["alpha", "beta"]);
}

#[tokio::test]
async fn create_run_is_listed_before_completion_and_finishes() {
    let dir = init_workspace();
    let controller = Controller::open(dir.path()).unwrap();
    let project = ProjectId::new("proj");
    controller.create_project(&project).unwrap();

    let run_id = controller
        .create_run(
            project.clone(),
            AgentId::new("agt-w"),
            RunSpec::Command {
                argv: vec!["sh".into(), "-c".into(), "echo ok".into()],
                workdir_rel: None,
                env: Default::default(),
                stdin: None,
            },
            None,
        )
        .unwrap();

    // Visible immediately.
    assert!(controller.list_runs(&project).iter().any(|r| r.run_id == run_id));

    // Terminates on its own.
    for _ in 0..100 {
        if controller.run_record(&project, &run_id).unwrap().status.is_terminal() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    }
    let record = controller.run_record(&project, &run_id).unwrap();
    assert_eq!(record.status, RunStatus::Ended);

    let collected = controller.collect_run(&project, &run_id).unwrap();
    assert!(collected["stdout"].as_str().unwrap().contains("ok"));
}

#[tokio::test]
async fn stop_run_raises_flag_and_cancels() {
    let dir = init_workspace();
    let controller = Controller::open(dir.path()).unwrap();
    let project = ProjectId::new("proj");
    controller.create_project(&project).unwrap();

    let run_id = controller
        .create_run(
            project.clone(),
            AgentId::new("agt-w"),
            RunSpec::Command {
                argv: vec!["sh".into(), "-c".into(), "sleep 30".into()],
                workdir_rel: None,
                env: Default::default(),
                stdin: None,
            },
            None,
        )
        .unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(300)).await;
    controller.stop_run(&project, &run_id).unwrap();

    for _ in 0..100 {
        if controller.run_record(&project, &run_id).unwrap().status.is_terminal() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    }
    assert_eq!(
        controller.run_record(&project, &run_id).unwrap().status,
        RunStatus::Stopped
    );
}

#[tokio::test]
async fn index_rebuild_and_sync_round_trip() {
    let dir = init_workspace();
    let controller = Controller::open(dir.path()).unwrap();
    let project = ProjectId::new("proj");
    controller.create_project(&project).unwrap();

    let run_id = controller
        .create_run(
            project.clone(),
            AgentId::new("agt-w"),
            RunSpec::Command {
                argv: vec!["true".into()],
                workdir_rel: None,
                env: Default::default(),
                stdin: None,
            },
            None,
        )
        .unwrap();
    for _ in 0..100 {
        if controller.run_record(&project, &run_id).unwrap().status.is_terminal() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    }

    let rebuild = controller.rebuild_index().unwrap();
    assert_eq!(rebuild.runs, 1);
    let sync = controller.sync_index().unwrap();
    assert!(sync.is_noop(), "sync after rebuild is a fixed point: {sync:?}");
}
