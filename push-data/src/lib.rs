//! Builds the payloads that describe a reference change to the outside world.
//!
//! The same [`PushEventPayload`] shape is recorded as an activity event (with
//! only the latest commit) and handed to webhooks and integrations (with the
//! whole [`CommitWindow`]).

mod builder;
pub use builder::PushDataBuilder;

mod bulk;
pub use bulk::BulkPushEvent;

mod payload;
pub use payload::{CommitData, ObjectKind, ProjectData, PushEventPayload};

mod window;
pub use window::{CommitWindow, PROCESS_COMMIT_LIMIT};
