//! `livesync-watch` -- follow sync jobs live from a terminal.
//!
//! Polls the backend's status snapshot, keeps a live channel open for every
//! running source (and optionally the library move), and logs each job's
//! output as it arrives. Sources listed in `LIVESYNC_TRIGGER` are cleared
//! and started at launch.
//!
//! # Environment variables
//!
//! | Variable                      | Default                     | Description                         |
//! |-------------------------------|-----------------------------|-------------------------------------|
//! | `LIVESYNC_API_URL`            | `http://127.0.0.1:8000/api` | HTTP API base                       |
//! | `LIVESYNC_WS_URL`             | `ws://127.0.0.1:8000`       | WebSocket base                      |
//! | `LIVESYNC_HOST`               | `browser`                   | `browser`, `webview` or `shell`     |
//! | `LIVESYNC_STATUS_INTERVAL_MS` | `2000`                      | Status snapshot poll interval       |
//! | `LIVESYNC_INCLUDE_QUEUED`     | `false`                     | Also watch queued sources           |
//! | `LIVESYNC_WATCH_MOVE`         | `false`                     | Follow every library move           |
//! | `LIVESYNC_TRIGGER`            | --                          | Comma-separated source ids to start |
//!
//! Poll cadence variables are documented on `ClientConfig::from_env`.

use std::collections::BTreeSet;
use std::sync::Arc;

use livesync_client::{
    rearm_after_finish, run_supervisor, BackendApi, ChannelRegistry, ClientConfig,
    HostEnvironment, HostKind, InterestPolicy, RegistryEvent, StatusAggregator, StrategySelector,
};
use livesync_core::{ChannelState, JobId, JobStatus, LogLine, Timestamp};
use livesync_events::{HostEventBus, RelayConfig, RelayHost};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "livesync_watch=info,livesync_client=info,livesync_events=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ClientConfig::from_env()?;

    tracing::info!(
        api_url = %config.api_url,
        ws_url = %config.ws_url,
        host = ?config.host,
        include_queued = config.include_queued,
        watch_move = config.watch_move,
        "Starting livesync-watch",
    );

    let cancel = CancellationToken::new();
    let api = Arc::new(BackendApi::new(config.api_url.clone()));

    let (environment, relay) = match config.host {
        HostKind::Browser => (HostEnvironment::Browser, None),
        HostKind::Webview => (HostEnvironment::EmbeddedWebview, None),
        HostKind::Shell => {
            let relay = Arc::new(RelayHost::new(
                Arc::new(HostEventBus::default()),
                RelayConfig::new(config.ws_url.clone()),
            ));
            (HostEnvironment::NativeShell(relay.clone()), Some(relay))
        }
    };

    let selector = StrategySelector::new(environment, Arc::clone(&api), &config);
    let registry = Arc::new(ChannelRegistry::new(selector, Arc::clone(&api)));

    let follower = tokio::spawn(follow_registry(registry.subscribe(), cancel.child_token()));

    let (snapshots, aggregator) =
        StatusAggregator::spawn(Arc::clone(&api), config.status_interval, cancel.child_token());

    // Triggered sources stay pinned so the supervisor does not close them
    // before the snapshot reports them as running.
    let mut pinned: BTreeSet<JobId> =
        config.trigger.iter().map(|id| JobId::Source(*id)).collect();
    let rearm = config.watch_move.then(|| {
        pinned.insert(JobId::MoveLibrary);
        // Moves never report idle between runs; clear the channel after each.
        tokio::spawn(rearm_after_finish(
            Arc::clone(&registry),
            JobId::MoveLibrary,
            config.poll.fast_interval,
            cancel.child_token(),
        ))
    });
    let policy = InterestPolicy {
        include_queued: config.include_queued,
        pinned,
    };
    let supervisor = tokio::spawn(run_supervisor(
        Arc::clone(&registry),
        snapshots,
        policy,
        cancel.child_token(),
    ));

    for &source_id in &config.trigger {
        let job = JobId::Source(source_id);
        registry.open(job).await;
        match registry.start_run(job).await {
            Ok(response) => {
                tracing::info!(job = %job, status = %response.status, "Sync triggered")
            }
            Err(e) => tracing::error!(job = %job, error = %e, "Failed to trigger sync"),
        }
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("Interrupted, shutting down");

    cancel.cancel();
    let _ = supervisor.await;
    let _ = aggregator.await;
    if let Some(rearm) = rearm {
        let _ = rearm.await;
    }
    registry.shutdown().await;
    if let Some(relay) = relay {
        relay.shutdown();
    }
    let _ = follower.await;

    Ok(())
}

/// Attach a follower to every channel the registry opens.
async fn follow_registry(
    mut events: broadcast::Receiver<RegistryEvent>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            event = events.recv() => event,
        };

        match event {
            Ok(RegistryEvent::Opened { job, state }) => {
                tokio::spawn(follow(job, state, cancel.clone()));
            }
            Ok(RegistryEvent::Closed { job }) => {
                tracing::info!(job = %job, "No longer watching");
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Registry events lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

/// Log a job's new lines and report its status and progress changes.
async fn follow(job: JobId, mut state: watch::Receiver<ChannelState>, cancel: CancellationToken) {
    let mut cursor = LogCursor::default();
    let mut last_status = None;
    let mut last_percent = None;
    let mut last_connected = None;

    loop {
        {
            let current = state.borrow_and_update();

            for line in cursor.advance(&current.logs) {
                tracing::info!(
                    job = %job,
                    received = %line.ts.format("%H:%M:%S"),
                    "{}",
                    line.line,
                );
            }

            if last_connected != Some(current.connected) {
                tracing::debug!(
                    job = %job,
                    connected = current.connected,
                    "Connectivity changed",
                );
                last_connected = Some(current.connected);
            }

            if last_status != Some(current.status) {
                match current.status {
                    JobStatus::Failed => tracing::error!(
                        job = %job,
                        error = current.error.as_deref().unwrap_or("unknown error"),
                        "Job failed",
                    ),
                    status => tracing::info!(job = %job, status = %status, "Job status"),
                }
                last_status = Some(current.status);
            }

            let percent = current.progress.map(|_| current.percent());
            if percent.is_some() && percent != last_percent {
                if let Some(stats) = current.stats {
                    tracing::info!(
                        job = %job,
                        percent,
                        added = stats.added,
                        removed = stats.removed,
                        skipped = stats.skipped,
                        "Progress",
                    );
                } else {
                    tracing::info!(job = %job, percent, "Progress");
                }
            }
            last_percent = percent;
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
}

/// Tracks which of a channel's log lines were already printed.
#[derive(Debug, Default)]
struct LogCursor {
    seen: usize,
    first: Option<Timestamp>,
}

impl LogCursor {
    /// Lines not yet returned by an earlier call.
    ///
    /// A different first line means the channel was cleared for a new run,
    /// however many lines that run has logged since; the whole log is new.
    fn advance<'a>(&mut self, logs: &'a [LogLine]) -> &'a [LogLine] {
        let first = logs.first().map(|l| l.ts);
        if first != self.first || logs.len() < self.seen {
            self.seen = 0;
            self.first = first;
        }
        let fresh = &logs[self.seen..];
        self.seen = logs.len();
        fresh
    }
}
