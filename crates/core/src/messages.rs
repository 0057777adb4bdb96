//! Live job message types and parser.
//!
//! Every transport delivers the same flat JSON shape:
//! `{"type": "<kind>", ...fields}`. This module deserializes it into a
//! strongly-typed [`Message`] enum.

use serde::{Deserialize, Serialize};

use crate::status::JobStatus;

/// One event unit emitted by a running job.
///
/// Deserialized via the internally-tagged `"type"` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// A line of job output. Append-only, order matters.
    Log { line: String },

    /// Replaces the previous status. `error` only accompanies `failed`.
    Status {
        status: JobStatus,
        #[serde(default)]
        error: Option<String>,
    },

    /// Terminal summary of what the run changed.
    Stats(Stats),

    /// Step-level progress within the run.
    Progress(Progress),
}

/// Track counts reported when a sync run finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    #[serde(default)]
    pub added: i64,
    #[serde(default)]
    pub removed: i64,
    #[serde(default)]
    pub skipped: i64,
}

/// Items processed so far out of the current scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub current: i64,
    pub total: i64,
}

impl Progress {
    /// Completion percentage (0-100). Zero when the total is unknown.
    pub fn percent(&self) -> u8 {
        if self.total <= 0 {
            return 0;
        }
        let pct = (self.current.max(0) as f64 / self.total as f64) * 100.0;
        pct.min(100.0) as u8
    }
}

impl Message {
    pub fn log(line: impl Into<String>) -> Self {
        Self::Log { line: line.into() }
    }

    pub fn status(status: JobStatus) -> Self {
        Self::Status {
            status,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self::Status {
            status: JobStatus::Failed,
            error: Some(error.into()),
        }
    }

    pub fn progress(current: i64, total: i64) -> Self {
        Self::Progress(Progress { current, total })
    }

    /// The status carried by a `status` message, if any.
    pub fn status_value(&self) -> Option<JobStatus> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Parse a single text frame into a typed message.
///
/// Returns `Err` for malformed JSON or unknown `type` values.
/// Callers should log and drop the frame, then continue.
pub fn parse_message(text: &str) -> Result<Message, serde_json::Error> {
    serde_json::from_str(text)
}
