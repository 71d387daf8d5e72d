// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSON-over-HTTP surface and the SSE push channel

use crate::controller::Controller;
use crate::rpc::{self, RpcError};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::Stream;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Debounce window between bus activity and a snapshot push.
const SSE_DEBOUNCE: Duration = Duration::from_millis(150);
/// Keep-alive comment interval.
const SSE_KEEPALIVE: Duration = Duration::from_secs(15);

const DASHBOARD_HTML: &str = r#"<!doctype html>
<html>
<head><meta charset="utf-8"><title>AgentCompany</title></head>
<body>
<h1>AgentCompany</h1>
<pre id="snapshot">loading…</pre>
<script>
const el = document.getElementById('snapshot');
const source = new EventSource('/api/events');
source.addEventListener('snapshot', (e) => { el.textContent = JSON.stringify(JSON.parse(e.data), null, 2); });
source.addEventListener('error', (e) => { el.textContent = 'error: ' + (e.data || 'stream closed'); });
fetch('/api/ui/snapshot').then(r => r.json()).then(s => { el.textContent = JSON.stringify(s, null, 2); });
</script>
</body>
</html>
"#;

fn error_response(e: RpcError) -> Response {
    let status = StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(json!({"error": {"kind": e.kind(), "message": e.to_string()}}))).into_response()
}

fn json_response(result: Result<Value, RpcError>) -> Response {
    match result {
        Ok(value) => Json(value).into_response(),
        Err(e) => error_response(e),
    }
}

fn project_params(query: &HashMap<String, String>) -> Value {
    match query.get("project") {
        Some(project) => json!({"project": project}),
        None => json!({}),
    }
}

/// Build the HTTP router for one controller.
pub fn router(controller: Arc<Controller>) -> Router {
    Router::new()
        .route("/", get(dashboard))
        .route("/api/health", get(health))
        .route("/api/ui/snapshot", get(ui_snapshot))
        .route("/api/monitor/snapshot", get(monitor_snapshot))
        .route("/api/inbox/snapshot", get(inbox_snapshot))
        .route("/api/usage/analytics", get(usage_analytics))
        .route("/api/ui/resolve", post(ui_resolve))
        .route("/api/comments", get(comments_list).post(comments_add))
        .route("/api/sync_worker_status", get(sync_worker_status))
        .route("/api/rpc", post(rpc_call))
        .route("/api/events", get(sse_events))
        .with_state(controller)
}

async fn dashboard() -> Html<&'static str> {
    Html(DASHBOARD_HTML)
}

async fn health(State(controller): State<Arc<Controller>>) -> Response {
    Json(json!({
        "ok": true,
        "workspace": controller.layout.root().display().to_string(),
    }))
    .into_response()
}

async fn ui_snapshot(
    State(controller): State<Arc<Controller>>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    json_response(rpc::dispatch(&controller, "ui.snapshot", project_params(&query)).await)
}

async fn monitor_snapshot(
    State(controller): State<Arc<Controller>>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    json_response(rpc::dispatch(&controller, "monitor.snapshot", project_params(&query)).await)
}

async fn inbox_snapshot(
    State(controller): State<Arc<Controller>>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    json_response(rpc::dispatch(&controller, "inbox.snapshot", project_params(&query)).await)
}

async fn usage_analytics(
    State(controller): State<Arc<Controller>>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    json_response(rpc::dispatch(&controller, "resources.snapshot", project_params(&query)).await)
}

async fn ui_resolve(
    State(controller): State<Arc<Controller>>,
    Json(params): Json<Value>,
) -> Response {
    json_response(rpc::dispatch(&controller, "ui.resolve", params).await)
}

async fn comments_list(
    State(controller): State<Arc<Controller>>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let params = match query.get("subject") {
        Some(subject) => json!({"subject": subject}),
        None => json!({}),
    };
    json_response(rpc::dispatch(&controller, "comment.list", params).await)
}

async fn comments_add(
    State(controller): State<Arc<Controller>>,
    Json(params): Json<Value>,
) -> Response {
    json_response(rpc::dispatch(&controller, "comment.add", params).await)
}

async fn sync_worker_status(State(controller): State<Arc<Controller>>) -> Response {
    json_response(rpc::dispatch(&controller, "index.sync_worker_status", json!({})).await)
}

#[derive(serde::Deserialize)]
struct RpcCall {
    method: String,
    #[serde(default)]
    params: Value,
}

async fn rpc_call(
    State(controller): State<Arc<Controller>>,
    Json(call): Json<RpcCall>,
) -> Response {
    let params = if call.params.is_null() { json!({}) } else { call.params };
    json_response(rpc::dispatch(&controller, &call.method, params).await)
}

/// Bus subscription that cleans up when the SSE stream is dropped.
struct BusGuard {
    bus: ac_journal::EventBus,
    id: ac_journal::SubscriberId,
}

impl Drop for BusGuard {
    fn drop(&mut self) {
        self.bus.unsubscribe(self.id);
    }
}

async fn sse_events(
    State(controller): State<Arc<Controller>>,
    Query(query): Query<HashMap<String, String>>,
) -> Sse<impl Stream<Item = Result<Event, std::convert::Infallible>>> {
    let project_filter = query.get("project").cloned();

    // The bus callback filters to this workspace (and project, when
    // scoped) and pokes the stream; composition happens stream-side.
    let (tx, rx) = mpsc::channel::<()>(16);
    let ws_root = controller.layout.root().to_path_buf();
    let filter_project = project_filter.clone();
    let id = controller.bus.subscribe(move |events_path| {
        if ac_core::WorkspaceLayout::workspace_root_for_events_path(events_path)
            .is_none_or(|root| root != ws_root)
        {
            return;
        }
        if let Some(project) = &filter_project {
            let matches = ac_core::WorkspaceLayout::events_path_to_run(events_path)
                .is_some_and(|(p, _)| p.as_str() == project);
            if !matches {
                return;
            }
        }
        let _ = tx.try_send(());
    });
    let guard = BusGuard { bus: controller.bus.clone(), id };

    struct StreamState {
        controller: Arc<Controller>,
        rx: mpsc::Receiver<()>,
        project: Option<String>,
        first: bool,
        _guard: BusGuard,
    }

    let state = StreamState {
        controller,
        rx,
        project: project_filter,
        first: true,
        _guard: guard,
    };

    let stream = futures_util::stream::unfold(state, |mut st| async move {
        if st.first {
            st.first = false;
        } else {
            // Wait for activity, then debounce and coalesce the burst.
            st.rx.recv().await?;
            tokio::time::sleep(SSE_DEBOUNCE).await;
            while st.rx.try_recv().is_ok() {}
        }

        let params = match &st.project {
            Some(project) => json!({"project": project}),
            None => json!({}),
        };
        let event = match rpc::dispatch(&st.controller, "ui.snapshot", params).await {
            Ok(snapshot) => Event::default()
                .event("snapshot")
                .data(snapshot.to_string()),
            Err(e) => Event::default().event("error").data(e.to_string()),
        };
        Some((Ok(event), st))
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(SSE_KEEPALIVE).text("keepalive"))
}

#[cfg(test)]
#[path = "web_tests.rs"]
mod tests;
