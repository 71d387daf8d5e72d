// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! PM snapshot: per-project task rollups and CPM scheduling

use ac_core::records::TaskFrontMatter;
use ac_core::{TaskId, WorkspaceLayout};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize)]
pub struct GanttSpan {
    pub task_id: String,
    /// Offsets in hours from the schedule start.
    pub start_hours: f64,
    pub end_hours: f64,
    pub on_critical_path: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CpmSummary {
    /// `ok` or `dependency_cycle`.
    pub status: String,
    pub critical_path: Vec<String>,
    pub duration_hours: f64,
    pub gantt: Vec<GanttSpan>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectSummary {
    pub project_id: String,
    pub task_total: usize,
    pub task_done: usize,
    pub task_blocked: usize,
    pub task_overdue: usize,
    pub progress_percent: u32,
    pub risk_flags: Vec<String>,
    pub cpm: CpmSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct PmSnapshot {
    pub projects: Vec<ProjectSummary>,
}

fn dir_entries(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut paths: Vec<PathBuf> = entries.flatten().map(|e| e.path()).collect();
    paths.sort();
    paths
}

fn load_tasks(project_dir: &Path) -> Vec<TaskFrontMatter> {
    dir_entries(&project_dir.join("tasks"))
        .iter()
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("md"))
        .filter_map(|p| TaskFrontMatter::load(p).ok())
        .collect()
}

/// Compose the PM snapshot for every project (or one, when scoped).
pub fn pm_snapshot(layout: &WorkspaceLayout, project: Option<&str>, now_ms: u64) -> PmSnapshot {
    let mut projects = Vec::new();
    for project_dir in dir_entries(&layout.projects_dir()) {
        if !project_dir.is_dir() {
            continue;
        }
        let Some(project_id) = project_dir.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if project.is_some_and(|p| p != project_id) {
            continue;
        }
        let tasks = load_tasks(&project_dir);
        projects.push(summarize_project(project_id, &tasks, now_ms));
    }
    PmSnapshot { projects }
}

fn summarize_project(project_id: &str, tasks: &[TaskFrontMatter], now_ms: u64) -> ProjectSummary {
    let task_total = tasks.len();
    let task_done = tasks.iter().filter(|t| t.status == "done").count();
    let task_blocked = tasks.iter().filter(|t| t.status == "blocked").count();
    let task_overdue = tasks
        .iter()
        .filter(|t| t.status != "done")
        .filter(|t| {
            t.due_at
                .as_deref()
                .and_then(|d| chrono::DateTime::parse_from_rfc3339(d).ok())
                .is_some_and(|d| (d.timestamp_millis() as u64) < now_ms)
        })
        .count();
    let progress_percent = if task_total == 0 {
        100
    } else {
        (task_done * 100 / task_total) as u32
    };

    let cpm = critical_path(tasks);
    let mut risk_flags = Vec::new();
    if task_overdue > 0 {
        risk_flags.push("overdue_tasks".to_string());
    }
    if task_blocked > 0 {
        risk_flags.push("blocked_tasks".to_string());
    }
    if cpm.status == "dependency_cycle" {
        risk_flags.push("dependency_cycle".to_string());
    }

    ProjectSummary {
        project_id: project_id.to_string(),
        task_total,
        task_done,
        task_blocked,
        task_overdue,
        progress_percent,
        risk_flags,
        cpm,
    }
}

/// CPM over task dependencies via Kahn's algorithm.
///
/// A cycle yields `dependency_cycle` with no spans; otherwise the longest
/// path by `estimate_hours` (default 1h) is the critical path.
pub fn critical_path(tasks: &[TaskFrontMatter]) -> CpmSummary {
    let ids: HashMap<&TaskId, usize> = tasks.iter().enumerate().map(|(i, t)| (&t.task_id, i)).collect();
    let n = tasks.len();

    // dependents[i] = tasks that depend on i; in_degree counts unmet deps.
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut in_degree = vec![0usize; n];
    for (i, task) in tasks.iter().enumerate() {
        for dep in &task.depends_on {
            if let Some(&d) = ids.get(dep) {
                dependents[d].push(i);
                in_degree[i] += 1;
            }
        }
    }

    let mut queue: VecDeque<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
    let mut topo = Vec::with_capacity(n);
    let mut in_degree_mut = in_degree.clone();
    while let Some(i) = queue.pop_front() {
        topo.push(i);
        for &next in &dependents[i] {
            in_degree_mut[next] -= 1;
            if in_degree_mut[next] == 0 {
                queue.push_back(next);
            }
        }
    }
    if topo.len() != n {
        return CpmSummary {
            status: "dependency_cycle".to_string(),
            critical_path: Vec::new(),
            duration_hours: 0.0,
            gantt: Vec::new(),
        };
    }

    let estimate = |i: usize| tasks[i].estimate_hours.unwrap_or(1.0);
    let mut start = vec![0.0f64; n];
    let mut predecessor: Vec<Option<usize>> = vec![None; n];
    for &i in &topo {
        let own_start = start[i];
        let own_end = own_start + estimate(i);
        for &next in &dependents[i] {
            if own_end > start[next] {
                start[next] = own_end;
                predecessor[next] = Some(i);
            }
        }
    }

    let mut tail: Option<usize> = None;
    let mut duration = 0.0f64;
    for i in 0..n {
        let end = start[i] + estimate(i);
        if end > duration {
            duration = end;
            tail = Some(i);
        }
    }

    let mut critical = Vec::new();
    let mut cursor = tail;
    while let Some(i) = cursor {
        critical.push(tasks[i].task_id.to_string());
        cursor = predecessor[i];
    }
    critical.reverse();

    let critical_set: Vec<&String> = critical.iter().collect();
    let gantt = topo
        .iter()
        .map(|&i| {
            let id = tasks[i].task_id.to_string();
            let on_critical_path = critical_set.iter().any(|c| **c == id);
            GanttSpan {
                start_hours: start[i],
                end_hours: start[i] + estimate(i),
                task_id: id,
                on_critical_path,
            }
        })
        .collect();

    CpmSummary {
        status: "ok".to_string(),
        critical_path: critical,
        duration_hours: duration,
        gantt,
    }
}

#[cfg(test)]
#[path = "pm_tests.rs"]
mod tests;
