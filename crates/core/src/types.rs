use std::fmt;

use serde::{Deserialize, Serialize};

/// Source primary keys as issued by the backend.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Identifies one background job tracked by a live channel.
///
/// Sync jobs are keyed by their source id. The library-move job is a
/// singleton and uses a fixed sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobId {
    Source(DbId),
    MoveLibrary,
}

impl JobId {
    /// Socket path on the server, relative to the WebSocket base URL.
    pub fn ws_path(&self) -> String {
        match self {
            Self::Source(id) => format!("/ws/sync/{id}"),
            Self::MoveLibrary => "/ws/move-library".to_string(),
        }
    }

    /// Live-state poll path, relative to the HTTP API base URL.
    pub fn live_path(&self) -> String {
        match self {
            Self::Source(id) => format!("/sync/{id}/live"),
            Self::MoveLibrary => "/library/move/live".to_string(),
        }
    }

    /// Name of the host event feed carrying this job's frames.
    pub fn event_name(&self) -> String {
        match self {
            Self::Source(id) => format!("sync:{id}"),
            Self::MoveLibrary => "move-library".to_string(),
        }
    }

    pub fn source_id(&self) -> Option<DbId> {
        match self {
            Self::Source(id) => Some(*id),
            Self::MoveLibrary => None,
        }
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source(id) => write!(f, "source:{id}"),
            Self::MoveLibrary => f.write_str("move-library"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_paths() {
        let job = JobId::Source(7);
        assert_eq!(job.ws_path(), "/ws/sync/7");
        assert_eq!(job.live_path(), "/sync/7/live");
        assert_eq!(job.event_name(), "sync:7");
        assert_eq!(job.to_string(), "source:7");
        assert_eq!(job.source_id(), Some(7));
    }

    #[test]
    fn move_library_paths() {
        let job = JobId::MoveLibrary;
        assert_eq!(job.ws_path(), "/ws/move-library");
        assert_eq!(job.event_name(), "move-library");
        assert_eq!(job.to_string(), "move-library");
        assert!(job.source_id().is_none());
    }
}
