//! Per-job channel state and the reducer that folds messages into it.

use serde::Serialize;

use crate::messages::{Message, Progress, Stats};
use crate::status::JobStatus;
use crate::types::Timestamp;

/// One line of job output, stamped with the time it was received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogLine {
    pub line: String,
    pub ts: Timestamp,
}

/// Reduction of every message observed since the channel opened or was
/// last cleared.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChannelState {
    pub logs: Vec<LogLine>,
    pub status: JobStatus,
    pub error: Option<String>,
    pub stats: Option<Stats>,
    pub progress: Option<Progress>,
    /// Whether the underlying transport is provably live.
    pub connected: bool,
    /// Set at a run boundary; the next progress value starts a new baseline.
    #[serde(skip)]
    fresh_run: bool,
}

impl ChannelState {
    /// Fold one message into the state.
    ///
    /// Returns `true` when anything observable changed.
    pub fn apply(&mut self, msg: &Message) -> bool {
        match msg {
            Message::Log { line } => {
                self.logs.push(LogLine {
                    line: line.clone(),
                    ts: chrono::Utc::now(),
                });
                true
            }
            Message::Status { status, error } => self.apply_status(*status, error.as_deref()),
            Message::Stats(stats) => {
                let changed = self.stats != Some(*stats);
                self.stats = Some(*stats);
                changed
            }
            Message::Progress(progress) => self.apply_progress(*progress),
        }
    }

    /// Reset all derived data to empty values. `connected` is left alone
    /// because clearing never touches the transport.
    pub fn clear(&mut self) {
        *self = Self {
            connected: self.connected,
            fresh_run: true,
            ..Self::default()
        };
    }

    /// Completion percentage of the current progress, or 0.
    pub fn percent(&self) -> u8 {
        self.progress.map(|p| p.percent()).unwrap_or(0)
    }

    fn apply_status(&mut self, status: JobStatus, error: Option<&str>) -> bool {
        // A finished run only yields to idle; anything else waits for clear().
        if self.status.is_terminal() && status != self.status && status != JobStatus::Idle {
            return false;
        }

        let error = match status {
            JobStatus::Failed => error.map(str::to_owned),
            _ => None,
        };
        if status == JobStatus::Idle {
            self.fresh_run = true;
        }

        let changed = self.status != status || self.error != error;
        self.status = status;
        self.error = error;
        changed
    }

    fn apply_progress(&mut self, next: Progress) -> bool {
        if let Some(prev) = self.progress {
            if !self.fresh_run && prev.total == next.total && next.current < prev.current {
                return false;
            }
        }
        self.fresh_run = false;
        let changed = self.progress != Some(next);
        self.progress = Some(next);
        changed
    }
}
