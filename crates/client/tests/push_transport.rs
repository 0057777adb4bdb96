//! Integration tests for the WebSocket push transport.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{lines, spawn_backend, wait_for, MockBackend};
use livesync_client::reconnect::BackoffConfig;
use livesync_client::transport::PushTransport;
use livesync_client::{Channel, Transport};
use livesync_core::{JobId, JobStatus, Progress, Stats};

fn push_channel(ws_url: &str, job: JobId) -> Channel {
    let url = format!("{ws_url}{}", job.ws_path());
    let transport = PushTransport::new(url, BackoffConfig::default());
    Channel::open(job, Transport::Push(transport))
}

// ---------------------------------------------------------------------------
// Test: frames are reduced in arrival order
// ---------------------------------------------------------------------------

#[tokio::test]
async fn reduces_a_scripted_run() {
    let backend = MockBackend::new();
    backend.script_socket(
        7,
        &[
            r#"{"type":"status","status":"running"}"#,
            r#"{"type":"progress","current":1,"total":10}"#,
            r#"{"type":"log","line":"track 1 ok"}"#,
            r#"{"type":"progress","current":2,"total":10}"#,
            r#"{"type":"stats","added":1,"removed":0,"skipped":0}"#,
            r#"{"type":"status","status":"completed"}"#,
        ],
        false,
    );
    let server = spawn_backend(backend).await;

    let channel = push_channel(&server.ws_url, JobId::Source(7));
    let mut rx = channel.subscribe();
    let state = wait_for(&mut rx, "completion", |s| s.status == JobStatus::Completed).await;

    assert!(state.connected);
    assert_eq!(lines(&state), ["track 1 ok"]);
    assert_eq!(state.progress, Some(Progress { current: 2, total: 10 }));
    assert_eq!(state.stats, Some(Stats { added: 1, removed: 0, skipped: 0 }));
    assert_eq!(state.error, None);
}

// ---------------------------------------------------------------------------
// Test: a malformed frame is skipped and the stream continues
// ---------------------------------------------------------------------------

#[tokio::test]
async fn malformed_frame_does_not_end_stream() {
    let backend = MockBackend::new();
    backend.script_socket(
        2,
        &[
            r#"{"type":"log","line":"before"}"#,
            "{not json",
            r#"{"type":"unknown_kind"}"#,
            r#"{"type":"log","line":"after"}"#,
        ],
        false,
    );
    let server = spawn_backend(backend).await;

    let channel = push_channel(&server.ws_url, JobId::Source(2));
    let mut rx = channel.subscribe();
    let state = wait_for(&mut rx, "both lines", |s| s.logs.len() == 2).await;
    assert_eq!(lines(&state), ["before", "after"]);
    assert!(state.connected);
}

// ---------------------------------------------------------------------------
// Test: a server close after completion is not a failure
// ---------------------------------------------------------------------------

#[tokio::test]
async fn server_close_only_drops_connectivity() {
    let backend = MockBackend::new();
    backend.script_socket(
        4,
        &[
            r#"{"type":"log","line":"done"}"#,
            r#"{"type":"status","status":"completed"}"#,
        ],
        true,
    );
    let server = spawn_backend(backend).await;

    let channel = push_channel(&server.ws_url, JobId::Source(4));
    let mut rx = channel.subscribe();
    wait_for(&mut rx, "connected", |s| s.connected).await;
    let state = wait_for(&mut rx, "disconnect", |s| !s.connected).await;

    assert_eq!(state.status, JobStatus::Completed);
    assert_eq!(state.error, None);
    assert_eq!(lines(&state), ["done"]);
}

// ---------------------------------------------------------------------------
// Test: closing the channel tears down the socket task
// ---------------------------------------------------------------------------

#[tokio::test]
async fn shutdown_releases_socket() {
    let backend = MockBackend::new();
    backend.script_socket(6, &[r#"{"type":"status","status":"running"}"#], false);
    let server = spawn_backend(backend).await;

    let channel = push_channel(&server.ws_url, JobId::Source(6));
    let mut rx = channel.subscribe();
    wait_for(&mut rx, "running", |s| s.status == JobStatus::Running).await;

    tokio::time::timeout(Duration::from_secs(2), channel.shutdown())
        .await
        .expect("socket task should stop promptly");
    assert!(!rx.borrow().connected);
}

// ---------------------------------------------------------------------------
// Test: an unreachable server leaves the channel disconnected
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unreachable_server_stays_disconnected() {
    let channel = push_channel("ws://127.0.0.1:9", JobId::Source(1));
    tokio::time::sleep(Duration::from_millis(200)).await;

    let state = channel.snapshot();
    assert!(!state.connected);
    assert_eq!(state.status, JobStatus::Idle);
    channel.close();
}

#[tokio::test]
async fn strategy_selector_builds_push_for_browser() {
    let backend = MockBackend::new();
    backend.script_socket(8, &[r#"{"type":"log","line":"hi"}"#], false);
    let server = spawn_backend(backend).await;

    let config = livesync_client::ClientConfig {
        api_url: server.api_url.clone(),
        ws_url: server.ws_url.clone(),
        ..Default::default()
    };
    let api = Arc::new(livesync_client::BackendApi::new(config.api_url.clone()));
    let selector = livesync_client::StrategySelector::new(
        livesync_client::HostEnvironment::Browser,
        api,
        &config,
    );

    let channel = Channel::open(JobId::Source(8), selector.select(JobId::Source(8)));
    let mut rx = channel.subscribe();
    let state = wait_for(&mut rx, "line", |s| s.logs.len() == 1).await;
    assert_eq!(lines(&state), ["hi"]);
}
