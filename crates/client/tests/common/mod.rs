//! Shared fixtures for client integration tests.
//!
//! [`MockBackend`] is a tiny axum app speaking the backend's live API: the
//! status snapshot, the cursor poll, the trigger endpoint and the job
//! sockets. Tests mutate its state directly and watch the client react.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use livesync_core::{ChannelState, JobStatus, Progress, Stats, StatusSnapshot};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::watch;

/// Key used for the library move job, as the backend does.
pub const MOVE_KEY: i64 = 0;

#[derive(Debug, Default)]
pub struct JobRecord {
    pub logs: Vec<String>,
    pub status: JobStatus,
    pub error: Option<String>,
    pub progress: Option<Progress>,
    pub stats: Option<Stats>,
}

#[derive(Debug, Default, Clone)]
pub struct SocketScript {
    pub frames: Vec<String>,
    /// Close the socket after the last frame instead of holding it open.
    pub close_after: bool,
}

#[derive(Debug, Default)]
struct BackendState {
    jobs: HashMap<i64, JobRecord>,
    sources: BTreeMap<i64, JobStatus>,
    live_scripts: HashMap<i64, VecDeque<Value>>,
    sockets: HashMap<i64, SocketScript>,
    cursors_seen: HashMap<i64, Vec<u64>>,
    triggers: Vec<i64>,
    fail_live: bool,
}

#[derive(Default)]
pub struct MockBackend {
    state: Mutex<BackendState>,
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn with<R>(&self, f: impl FnOnce(&mut BackendState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    pub fn job<R>(&self, id: i64, f: impl FnOnce(&mut JobRecord) -> R) -> R {
        self.with(|s| f(s.jobs.entry(id).or_default()))
    }

    pub fn push_log(&self, id: i64, line: &str) {
        self.job(id, |job| job.logs.push(line.to_string()));
    }

    pub fn set_status(&self, id: i64, status: JobStatus) {
        self.job(id, |job| job.status = status);
    }

    /// Drop the job's buffer, as the backend does when a new run starts.
    pub fn restart(&self, id: i64) {
        self.job(id, |job| *job = JobRecord::default());
    }

    pub fn set_sources(&self, sources: &[(i64, JobStatus)]) {
        self.with(|s| s.sources = sources.iter().copied().collect());
    }

    /// Serve these live responses in order, repeating the last one.
    pub fn script_live(&self, id: i64, responses: Vec<Value>) {
        self.with(|s| {
            s.live_scripts.insert(id, responses.into());
        });
    }

    pub fn script_socket(&self, id: i64, frames: &[&str], close_after: bool) {
        let script = SocketScript {
            frames: frames.iter().map(|f| f.to_string()).collect(),
            close_after,
        };
        self.with(|s| {
            s.sockets.insert(id, script);
        });
    }

    pub fn fail_live(&self, fail: bool) {
        self.with(|s| s.fail_live = fail);
    }

    pub fn cursors_seen(&self, id: i64) -> Vec<u64> {
        self.with(|s| s.cursors_seen.get(&id).cloned().unwrap_or_default())
    }

    pub fn triggers(&self) -> Vec<i64> {
        self.with(|s| s.triggers.clone())
    }

    fn live(&self, id: i64, cursor: u64) -> Response {
        self.with(|s| {
            s.cursors_seen.entry(id).or_default().push(cursor);

            if s.fail_live {
                return (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response();
            }

            if let Some(script) = s.live_scripts.get_mut(&id) {
                let body = if script.len() > 1 {
                    script.pop_front()
                } else {
                    script.front().cloned()
                };
                return Json(body.unwrap_or(Value::Null)).into_response();
            }

            let job = s.jobs.entry(id).or_default();
            let start = (cursor as usize).min(job.logs.len());
            Json(json!({
                "status": job.status,
                "logs": &job.logs[start..],
                "cursor": job.logs.len(),
                "progress": job.progress,
                "stats": job.stats,
                "error": job.error,
            }))
            .into_response()
        })
    }
}

#[derive(Deserialize)]
struct CursorQuery {
    #[serde(default)]
    cursor: u64,
}

async fn source_live(
    State(backend): State<Arc<MockBackend>>,
    Path(id): Path<i64>,
    Query(query): Query<CursorQuery>,
) -> Response {
    backend.live(id, query.cursor)
}

async fn move_live(
    State(backend): State<Arc<MockBackend>>,
    Query(query): Query<CursorQuery>,
) -> Response {
    backend.live(MOVE_KEY, query.cursor)
}

async fn sync_status(State(backend): State<Arc<MockBackend>>) -> Json<StatusSnapshot> {
    backend.with(|s| {
        Json(StatusSnapshot {
            is_syncing: s.sources.values().any(|status| *status == JobStatus::Running),
            sources: s.sources.clone(),
        })
    })
}

async fn trigger(State(backend): State<Arc<MockBackend>>, Path(id): Path<i64>) -> Json<Value> {
    backend.with(|s| {
        s.triggers.push(id);
        s.jobs.insert(
            id,
            JobRecord {
                status: JobStatus::Running,
                ..Default::default()
            },
        );
    });
    Json(json!({ "status": "started", "source_id": id }))
}

async fn job_socket(
    ws: WebSocketUpgrade,
    State(backend): State<Arc<MockBackend>>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    let script = backend.with(|s| s.sockets.get(&id).cloned().unwrap_or_default());
    ws.on_upgrade(move |socket| play(socket, script))
}

async fn play(mut socket: WebSocket, script: SocketScript) {
    for frame in script.frames {
        if socket.send(WsMessage::Text(frame.into())).await.is_err() {
            return;
        }
    }
    if script.close_after {
        let _ = socket.send(WsMessage::Close(None)).await;
        return;
    }
    while let Some(Ok(_)) = socket.recv().await {}
}

/// Base URLs of a running mock backend.
pub struct Server {
    pub api_url: String,
    pub ws_url: String,
}

pub async fn spawn_backend(backend: Arc<MockBackend>) -> Server {
    let app = Router::new()
        .route("/api/sync/status", get(sync_status))
        .route("/api/sync/{id}", post(trigger))
        .route("/api/sync/{id}/live", get(source_live))
        .route("/api/library/move/live", get(move_live))
        .route("/ws/sync/{id}", get(job_socket))
        .with_state(backend);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Server {
        api_url: format!("http://{addr}/api"),
        ws_url: format!("ws://{addr}"),
    }
}

/// Wait (at most 5 s) until the channel state satisfies `pred`.
pub async fn wait_for(
    rx: &mut watch::Receiver<ChannelState>,
    what: &str,
    pred: impl FnMut(&ChannelState) -> bool,
) -> ChannelState {
    let state = tokio::time::timeout(Duration::from_secs(5), rx.wait_for(pred))
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {what}"))
        .unwrap_or_else(|_| panic!("channel state dropped while waiting for {what}"));
    state.clone()
}

pub fn lines(state: &ChannelState) -> Vec<&str> {
    state.logs.iter().map(|l| l.line.as_str()).collect()
}
