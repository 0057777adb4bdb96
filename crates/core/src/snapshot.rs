//! Aggregated status snapshot published by the job scheduler.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::status::JobStatus;
use crate::types::{DbId, JobId};

/// Body of `GET /sync/status`: coarse state of every known source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    #[serde(default)]
    pub is_syncing: bool,
    /// Source id to coarse status (`idle`, `queued`, `running`).
    #[serde(default)]
    pub sources: BTreeMap<DbId, JobStatus>,
}

impl StatusSnapshot {
    /// Jobs that should currently have an open live channel.
    ///
    /// Always includes running sources; queued sources only when
    /// `include_queued` is set.
    pub fn interesting(&self, include_queued: bool) -> BTreeSet<JobId> {
        self.sources
            .iter()
            .filter(|(_, status)| match status {
                JobStatus::Queued => include_queued,
                JobStatus::Running => true,
                _ => false,
            })
            .map(|(id, _)| JobId::Source(*id))
            .collect()
    }
}
