use std::collections::BTreeSet;
use std::str::FromStr;
use std::time::Duration;

use livesync_core::DbId;

/// Which host the client runs in; decides the transport strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostKind {
    /// Plain browser: direct WebSocket push.
    Browser,
    /// Embedded webview that blocks raw sockets: cursor polling.
    Webview,
    /// Native shell with an event bridge: host-relayed frames.
    Shell,
}

impl FromStr for HostKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "browser" => Ok(Self::Browser),
            "webview" => Ok(Self::Webview),
            "shell" => Ok(Self::Shell),
            other => Err(format!("unknown host kind '{other}'")),
        }
    }
}

/// Cadence of the polling transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Interval while the job is queued or working.
    pub fast_interval: Duration,
    /// Interval while idle or after a terminal status.
    pub slow_interval: Duration,
    /// Fixed delay after a failed poll request.
    pub retry_backoff: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            fast_interval: Duration::from_millis(500),
            slow_interval: Duration::from_millis(2000),
            retry_backoff: Duration::from_millis(3000),
        }
    }
}

/// Client configuration loaded from environment variables.
///
/// All fields have defaults that match a backend running locally on
/// port 8000.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// HTTP API base URL, including the `/api` prefix.
    pub api_url: String,
    /// WebSocket base URL.
    pub ws_url: String,
    pub host: HostKind,
    /// Interval of the status snapshot poll.
    pub status_interval: Duration,
    pub poll: PollConfig,
    /// Open channels for queued jobs too, not only running ones.
    pub include_queued: bool,
    /// Keep a channel open for the move-library job.
    pub watch_move: bool,
    /// Sources to clear and trigger at startup.
    pub trigger: BTreeSet<DbId>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: "http://127.0.0.1:8000/api".into(),
            ws_url: "ws://127.0.0.1:8000".into(),
            host: HostKind::Browser,
            status_interval: Duration::from_millis(2000),
            poll: PollConfig::default(),
            include_queued: false,
            watch_move: false,
            trigger: BTreeSet::new(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                       | Default                     |
    /// |-------------------------------|-----------------------------|
    /// | `LIVESYNC_API_URL`            | `http://127.0.0.1:8000/api` |
    /// | `LIVESYNC_WS_URL`             | `ws://127.0.0.1:8000`       |
    /// | `LIVESYNC_HOST`               | `browser`                   |
    /// | `LIVESYNC_STATUS_INTERVAL_MS` | `2000`                      |
    /// | `LIVESYNC_POLL_FAST_MS`       | `500`                       |
    /// | `LIVESYNC_POLL_SLOW_MS`       | `2000`                      |
    /// | `LIVESYNC_POLL_RETRY_MS`      | `3000`                      |
    /// | `LIVESYNC_INCLUDE_QUEUED`     | `false`                     |
    /// | `LIVESYNC_WATCH_MOVE`         | `false`                     |
    /// | `LIVESYNC_TRIGGER`            | empty                       |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let api_url = lookup("LIVESYNC_API_URL").unwrap_or(defaults.api_url);
        let ws_url = lookup("LIVESYNC_WS_URL").unwrap_or(defaults.ws_url);

        let host = parse_var(&lookup, "LIVESYNC_HOST", defaults.host)?;

        let status_interval =
            millis_var(&lookup, "LIVESYNC_STATUS_INTERVAL_MS", defaults.status_interval)?;
        let poll = PollConfig {
            fast_interval: millis_var(
                &lookup,
                "LIVESYNC_POLL_FAST_MS",
                defaults.poll.fast_interval,
            )?,
            slow_interval: millis_var(
                &lookup,
                "LIVESYNC_POLL_SLOW_MS",
                defaults.poll.slow_interval,
            )?,
            retry_backoff: millis_var(
                &lookup,
                "LIVESYNC_POLL_RETRY_MS",
                defaults.poll.retry_backoff,
            )?,
        };

        let include_queued =
            parse_var(&lookup, "LIVESYNC_INCLUDE_QUEUED", defaults.include_queued)?;
        let watch_move = parse_var(&lookup, "LIVESYNC_WATCH_MOVE", defaults.watch_move)?;

        let trigger = match lookup("LIVESYNC_TRIGGER") {
            None => defaults.trigger,
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| {
                    s.parse::<DbId>().map_err(|e| ConfigError::Invalid {
                        var: "LIVESYNC_TRIGGER",
                        reason: e.to_string(),
                    })
                })
                .collect::<Result<_, _>>()?,
        };

        Ok(Self {
            api_url,
            ws_url,
            host,
            status_interval,
            poll,
            include_queued,
            watch_move,
            trigger,
        })
    }
}

fn parse_var<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(var) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
        }),
    }
}

fn millis_var<F>(lookup: &F, var: &'static str, default: Duration) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let millis: u64 = parse_var(lookup, var, default.as_millis() as u64)?;
    if millis == 0 {
        return Err(ConfigError::Invalid {
            var,
            reason: "must be greater than zero".into(),
        });
    }
    Ok(Duration::from_millis(millis))
}

/// A configuration variable that could not be used.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },
}
