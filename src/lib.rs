//! Post-receive processing for pushes: turns the reference changes of a push
//! into activity events, pipeline creation requests, hook dispatch, issue
//! tracker sync, signature verification and cache maintenance.
//!
//! The collaborators everything is sent to are defined in
//! `git-push-hooks-services`; [`PushOrchestrator`] is the entry point for
//! project pushes and [`WikiChangeProcessor`] for wiki pushes.

mod error;
pub use self::error::{Error, Step, StepFailure};

pub mod file_types;

mod housekeeping;
pub use self::housekeeping::HousekeepingService;

mod orchestrator;
pub use self::orchestrator::{PipelineBudget, PushOrchestrator, PushSummary};

pub mod processor;

pub mod references;

mod settings;
pub use self::settings::{HousekeepingSettings, Settings};

mod wiki;
pub use self::wiki::{Wiki, WikiChangeProcessor, WikiServices, WikiSummary, MAX_CHANGES};

#[cfg(test)]
mod test_utils;
