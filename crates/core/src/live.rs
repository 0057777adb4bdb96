//! Poll cursor protocol wire types.
//!
//! The polling transport asks `GET <live path>?cursor=N` and receives the
//! log lines appended since `N` together with the *current* status,
//! progress and stats. Replaying a consumed cursor yields no log lines, so
//! a poll can be retried after a timeout without duplicating output.

use serde::{Deserialize, Serialize};

use crate::messages::{Message, Progress, Stats};
use crate::status::JobStatus;

/// Response body of one live-state poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveResponse {
    /// Cursor to echo on the next poll.
    pub cursor: u64,
    pub status: JobStatus,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub progress: Option<Progress>,
    #[serde(default)]
    pub stats: Option<Stats>,
    /// Lines appended since the cursor that was sent.
    #[serde(default)]
    pub logs: Vec<String>,
}

impl LiveResponse {
    /// Translate the response into synthetic messages.
    ///
    /// Order is logs (array order), then progress, then stats, then
    /// status, so a terminal status is applied only after the data it
    /// summarizes.
    pub fn into_messages(self) -> Vec<Message> {
        let mut messages = Vec::with_capacity(self.logs.len() + 3);
        messages.extend(self.logs.into_iter().map(|line| Message::Log { line }));
        if let Some(progress) = self.progress {
            messages.push(Message::Progress(progress));
        }
        if let Some(stats) = self.stats {
            messages.push(Message::Stats(stats));
        }
        messages.push(Message::Status {
            status: self.status,
            error: self.error,
        });
        messages
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parse_minimal_response() {
        let json = r#"{"cursor":5,"status":"running","logs":["a","b"]}"#;
        let resp: LiveResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.cursor, 5);
        assert_eq!(resp.status, JobStatus::Running);
        assert_eq!(resp.logs, vec!["a", "b"]);
        assert!(resp.progress.is_none());
        assert!(resp.stats.is_none());
    }

    #[test]
    fn parse_nulls_as_absent() {
        let json =
            r#"{"cursor":0,"status":"idle","logs":[],"progress":null,"stats":null,"error":null}"#;
        let resp: LiveResponse = serde_json::from_str(json).unwrap();
        assert!(resp.progress.is_none());
        assert!(resp.error.is_none());
    }

    #[test]
    fn messages_are_ordered_logs_progress_stats_status() {
        let resp = LiveResponse {
            cursor: 9,
            status: JobStatus::Completed,
            error: None,
            progress: Some(Progress {
                current: 10,
                total: 10,
            }),
            stats: Some(Stats {
                added: 3,
                removed: 1,
                skipped: 6,
            }),
            logs: vec!["x".into(), "y".into()],
        };

        let messages = resp.into_messages();
        assert_eq!(messages.len(), 5);
        assert_eq!(messages[0], Message::log("x"));
        assert_eq!(messages[1], Message::log("y"));
        assert_matches!(messages[2], Message::Progress(Progress { current: 10, total: 10 }));
        assert_matches!(messages[3], Message::Stats(Stats { added: 3, .. }));
        assert_matches!(
            messages[4],
            Message::Status {
                status: JobStatus::Completed,
                ..
            }
        );
    }

    #[test]
    fn empty_response_still_reports_status() {
        let resp = LiveResponse {
            cursor: 5,
            status: JobStatus::Running,
            error: None,
            progress: None,
            stats: None,
            logs: vec![],
        };
        assert_eq!(resp.into_messages(), vec![Message::status(JobStatus::Running)]);
    }
}
