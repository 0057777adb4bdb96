//! Shared live-status model for background sync and move-library jobs.
//!
//! Pure data and reduction logic: the message union every transport
//! delivers, the per-job channel state it folds into, and the wire types
//! of the poll cursor protocol and the scheduler's status snapshot.

pub mod live;
pub mod messages;
pub mod snapshot;
pub mod state;
pub mod status;
pub mod types;

pub use live::LiveResponse;
pub use messages::{parse_message, Message, Progress, Stats};
pub use snapshot::StatusSnapshot;
pub use state::{ChannelState, LogLine};
pub use status::JobStatus;
pub use types::{DbId, JobId, Timestamp};
