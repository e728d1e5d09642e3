use std::fmt::Display;

use push_ref::ReferenceChange;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Possible errors while processing a push.
#[derive(Debug, Error)]
pub enum Error {
    #[error("commit window unavailable: {0}")]
    CommitWindow(String),

    #[error(transparent)]
    Service(#[from] git_push_hooks_services::Error),
}

/// A unit of work performed for a reference change. Each step is isolated:
/// one failing never prevents the others from being attempted.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Hash, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Event,
    Pipeline,
    Hooks,
    CacheInvalidation,
    AgentNotification,
    BranchCache,
    DefaultBranchInitialization,
    Gitattributes,
    CrossReferences,
    IssueTracker,
    CiConfigTracking,
    Environments,
    Artifacts,
    MergeRequests,
    Languages,
    TargetPlatforms,
    OverflowMetric,
    Signatures,
    WikiPostReceive,
    WikiPage,
    Housekeeping,
}

impl Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Step::Event => "event",
            Step::Pipeline => "pipeline",
            Step::Hooks => "hooks",
            Step::CacheInvalidation => "cache_invalidation",
            Step::AgentNotification => "agent_notification",
            Step::BranchCache => "branch_cache",
            Step::DefaultBranchInitialization => "default_branch_initialization",
            Step::Gitattributes => "gitattributes",
            Step::CrossReferences => "cross_references",
            Step::IssueTracker => "issue_tracker",
            Step::CiConfigTracking => "ci_config_tracking",
            Step::Environments => "environments",
            Step::Artifacts => "artifacts",
            Step::MergeRequests => "merge_requests",
            Step::Languages => "languages",
            Step::TargetPlatforms => "target_platforms",
            Step::OverflowMetric => "overflow_metric",
            Step::Signatures => "signatures",
            Step::WikiPostReceive => "wiki_post_receive",
            Step::WikiPage => "wiki_page",
            Step::Housekeeping => "housekeeping",
        };
        write!(f, "{}", name)
    }
}

/// A step that failed, kept for the push summary after being logged.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct StepFailure {
    /// The sequence index of the change, if the step belonged to one.
    pub index: Option<usize>,

    #[serde(rename = "ref")]
    pub full_ref: Option<String>,

    pub step: Step,
    pub error: String,
}

impl StepFailure {
    pub fn new(change: Option<&ReferenceChange>, step: Step, error: &Error) -> Self {
        Self {
            index: change.map(ReferenceChange::index),
            full_ref: change.map(|change| change.full_ref().to_string()),
            step,
            error: error.to_string(),
        }
    }
}
