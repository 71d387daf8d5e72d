// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

const NOW_MS: u64 = 1_767_225_600_000; // 2026-01-01T00:00:00Z

fn task(id: &str, extra: &str) -> TaskFrontMatter {
    serde_yaml::from_str(&format!("task_id: {id}\ntitle: {id}\n{extra}")).unwrap()
}

#[test]
fn linear_chain_critical_path() {
    let tasks = vec![
        task("a", "estimate_hours: 2\n"),
        task("b", "estimate_hours: 3\ndepends_on: [a]\n"),
        task("c", "estimate_hours: 1\ndepends_on: [b]\n"),
    ];
    let cpm = critical_path(&tasks);
    assert_eq!(cpm.status, "ok");
    assert_eq!(cpm.critical_path, vec!["a", "b", "c"]);
    assert!((cpm.duration_hours - 6.0).abs() < 1e-9);
    assert_eq!(cpm.gantt.len(), 3);
    let b = cpm.gantt.iter().find(|s| s.task_id == "b").unwrap();
    assert!((b.start_hours - 2.0).abs() < 1e-9);
    assert!((b.end_hours - 5.0).abs() < 1e-9);
    assert!(b.on_critical_path);
}

#[test]
fn diamond_picks_longer_branch() {
    let tasks = vec![
        task("start", "estimate_hours: 1\n"),
        task("short", "estimate_hours: 1\ndepends_on: [start]\n"),
        task("long", "estimate_hours: 5\ndepends_on: [start]\n"),
        task("end", "estimate_hours: 1\ndepends_on: [short, long]\n"),
    ];
    let cpm = critical_path(&tasks);
    assert_eq!(cpm.critical_path, vec!["start", "long", "end"]);
    assert!((cpm.duration_hours - 7.0).abs() < 1e-9);
    let short = cpm.gantt.iter().find(|s| s.task_id == "short").unwrap();
    assert!(!short.on_critical_path);
}

#[test]
fn cycle_reports_dependency_cycle_without_spans() {
    let tasks = vec![
        task("a", "depends_on: [b]\n"),
        task("b", "depends_on: [a]\n"),
    ];
    let cpm = critical_path(&tasks);
    assert_eq!(cpm.status, "dependency_cycle");
    assert!(cpm.gantt.is_empty());
    assert!(cpm.critical_path.is_empty());
}

#[test]
fn missing_estimates_default_to_one_hour() {
    let tasks = vec![task("a", ""), task("b", "depends_on: [a]\n")];
    let cpm = critical_path(&tasks);
    assert!((cpm.duration_hours - 2.0).abs() < 1e-9);
}

#[test]
fn unknown_dependency_ids_are_ignored() {
    let tasks = vec![task("a", "depends_on: [ghost]\n")];
    let cpm = critical_path(&tasks);
    assert_eq!(cpm.status, "ok");
    assert_eq!(cpm.critical_path, vec!["a"]);
}

#[test]
fn project_summary_counts_and_flags() {
    let tasks = vec![
        task("done1", "status: done\n"),
        task("open1", "status: open\ndue_at: 2025-12-01T00:00:00Z\n"),
        task("blocked1", "status: blocked\n"),
        task("open2", "status: open\n"),
    ];
    let summary = summarize_project("proj", &tasks, NOW_MS);
    assert_eq!(summary.task_total, 4);
    assert_eq!(summary.task_done, 1);
    assert_eq!(summary.task_blocked, 1);
    assert_eq!(summary.task_overdue, 1);
    assert_eq!(summary.progress_percent, 25);
    assert!(summary.risk_flags.contains(&"overdue_tasks".to_string()));
    assert!(summary.risk_flags.contains(&"blocked_tasks".to_string()));
}

#[test]
fn cycle_sets_risk_flag() {
    let tasks = vec![task("a", "depends_on: [b]\n"), task("b", "depends_on: [a]\n")];
    let summary = summarize_project("proj", &tasks, NOW_MS);
    assert!(summary.risk_flags.contains(&"dependency_cycle".to_string()));
    assert_eq!(summary.cpm.status, "dependency_cycle");
}

#[test]
fn empty_project_is_fully_progressed() {
    let summary = summarize_project("proj", &[], NOW_MS);
    assert_eq!(summary.progress_percent, 100);
    assert_eq!(summary.cpm.status, "ok");
}

#[test]
fn pm_snapshot_scopes_to_project() {
    let dir = tempfile::tempdir().unwrap();
    let layout = WorkspaceLayout::new(dir.path());
    for project in ["alpha", "beta"] {
        let tasks = layout.projects_dir().join(project).join("tasks");
        std::fs::create_dir_all(&tasks).unwrap();
        std::fs::write(
            tasks.join("t1.md"),
            "---\ntask_id: t1\ntitle: T1\nstatus: open\n---\nbody\n",
        )
        .unwrap();
    }

    let all = pm_snapshot(&layout, None, NOW_MS);
    assert_eq!(all.projects.len(), 2);

    let scoped = pm_snapshot(&layout, Some("alpha"), NOW_MS);
    assert_eq!(scoped.projects.len(), 1);
    assert_eq!(scoped.projects[0].project_id, "alpha");
}
