//! Initial-connect backoff for job sockets.
//!
//! [`connect_with_backoff`] dials a job socket until it answers, sleeping
//! a growing delay between attempts. Both the dial and the sleep give way
//! to the channel's [`CancellationToken`].

use std::time::Duration;

use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

/// An open job socket.
pub type JobSocket = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Delay schedule between connect attempts.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffConfig {
    /// Wait after the first failed attempt.
    pub first: Duration,
    /// No wait is ever longer than this.
    pub ceiling: Duration,
    /// Growth factor applied after every further failure.
    pub factor: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            first: Duration::from_secs(1),
            ceiling: Duration::from_secs(30),
            factor: 2.0,
        }
    }
}

impl BackoffConfig {
    /// The wait that follows `current`, capped at [`ceiling`](Self::ceiling).
    pub fn after(&self, current: Duration) -> Duration {
        current.mul_f64(self.factor).min(self.ceiling)
    }

    /// The full (endless) sequence of waits.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        std::iter::successors(Some(self.first.min(self.ceiling)), move |d| Some(self.after(*d)))
    }
}

/// Dial `url` until it connects.
///
/// Returns `None` only when `cancel` fires first.
pub async fn connect_with_backoff(
    url: &str,
    backoff: &BackoffConfig,
    cancel: &CancellationToken,
) -> Option<JobSocket> {
    for (attempt, wait) in (1u32..).zip(backoff.delays()) {
        let dialed = tokio::select! {
            _ = cancel.cancelled() => return None,
            dialed = connect_async(url) => dialed,
        };

        match dialed {
            Ok((socket, _response)) => {
                tracing::debug!(url, attempt, "Job socket connected");
                return Some(socket);
            }
            Err(e) => tracing::warn!(
                url,
                attempt,
                error = %e,
                retry_in_ms = wait.as_millis() as u64,
                "Job socket connect failed",
            ),
        }

        tokio::select! {
            _ = cancel.cancelled() => return None,
            _ = tokio::time::sleep(wait) => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_grow_then_plateau() {
        let secs: Vec<u64> = BackoffConfig::default()
            .delays()
            .take(8)
            .map(|d| d.as_secs())
            .collect();
        assert_eq!(secs, [1, 2, 4, 8, 16, 30, 30, 30]);
    }

    #[test]
    fn first_delay_respects_ceiling() {
        let backoff = BackoffConfig {
            first: Duration::from_secs(60),
            ceiling: Duration::from_secs(5),
            factor: 3.0,
        };
        assert_eq!(backoff.delays().next(), Some(Duration::from_secs(5)));
        assert_eq!(backoff.after(Duration::from_secs(1)), Duration::from_secs(3));
    }

    #[tokio::test]
    async fn already_cancelled_returns_none() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let socket =
            connect_with_backoff("ws://127.0.0.1:9/ws/sync/1", &BackoffConfig::default(), &cancel)
                .await;
        assert!(socket.is_none());
    }

    #[tokio::test]
    async fn cancel_interrupts_the_wait() {
        let cancel = CancellationToken::new();
        let backoff = BackoffConfig {
            first: Duration::from_secs(60),
            ceiling: Duration::from_secs(60),
            ..Default::default()
        };

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            trigger.cancel();
        });

        let socket = tokio::time::timeout(
            Duration::from_secs(5),
            connect_with_backoff("ws://127.0.0.1:9/ws/sync/1", &backoff, &cancel),
        )
        .await
        .expect("cancel should end the wait");
        assert!(socket.is_none());
    }
}
