//! Job status vocabulary shared by sync and move-library jobs.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Coarse and fine-grained job states.
///
/// Sync jobs use `queued`, `running` and the terminal states. The
/// move-library job additionally reports `scanning`, `moving` and
/// `rewriting` while it works.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[default]
    Idle,
    Queued,
    Scanning,
    Moving,
    Rewriting,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// `completed`, `failed` and `cancelled` end a run.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Neither idle nor terminal: the job is queued or doing work.
    pub fn is_active(self) -> bool {
        !matches!(self, Self::Idle) && !self.is_terminal()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Queued => "queued",
            Self::Scanning => "scanning",
            Self::Moving => "moving",
            Self::Rewriting => "rewriting",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
