use std::time::Duration;

use push_ref::{ActorId, Commit, ProjectId, PushOptions, Revision};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};

use crate::{Error, FileType};

/// Work deferred to background workers.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "job", rename_all = "snake_case")]
pub enum Job {
    /// Scans a commit message for references to other work items.
    ProcessCommit {
        project_id: ProjectId,
        actor_id: ActorId,
        commit: Commit,
        default_branch: bool,
    },
    UpdateMergeRequests {
        project_id: ProjectId,
        actor_id: ActorId,
        before: String,
        after: String,
        #[serde(rename = "ref")]
        full_ref: String,
        push_options: PushOptions,
    },
    InvalidateProjectCache {
        project_id: ProjectId,
        file_types: Vec<FileType>,
    },
    NotifyAgents {
        project_id: ProjectId,
    },
    SyncIssueTrackerBranch {
        project_id: ProjectId,
        branch: Option<String>,
        shas: Vec<Revision>,
        update_sequence_id: i64,
    },
    RemoveIssueTrackerBranch {
        project_id: ProjectId,
        branch: String,
    },
    StopEnvironments {
        project_id: ProjectId,
        actor_id: ActorId,
        branch: String,
    },
    UnlockArtifacts {
        project_id: ProjectId,
        actor_id: ActorId,
        #[serde(rename = "ref")]
        full_ref: String,
    },
    InitializeDefaultBranch {
        project_id: ProjectId,
        branch: String,
    },
    DetectRepositoryLanguages {
        project_id: ProjectId,
    },
    RecordTargetPlatforms {
        project_id: ProjectId,
    },
    CreateCommitSignatures {
        project_id: ProjectId,
        shas: Vec<Revision>,
    },
}

impl Job {
    pub fn name(&self) -> &'static str {
        match self {
            Job::ProcessCommit { .. } => "process_commit",
            Job::UpdateMergeRequests { .. } => "update_merge_requests",
            Job::InvalidateProjectCache { .. } => "invalidate_project_cache",
            Job::NotifyAgents { .. } => "notify_agents",
            Job::SyncIssueTrackerBranch { .. } => "sync_issue_tracker_branch",
            Job::RemoveIssueTrackerBranch { .. } => "remove_issue_tracker_branch",
            Job::StopEnvironments { .. } => "stop_environments",
            Job::UnlockArtifacts { .. } => "unlock_artifacts",
            Job::InitializeDefaultBranch { .. } => "initialize_default_branch",
            Job::DetectRepositoryLanguages { .. } => "detect_repository_languages",
            Job::RecordTargetPlatforms { .. } => "record_target_platforms",
            Job::CreateCommitSignatures { .. } => "create_commit_signatures",
        }
    }
}

/// A handoff to background workers. Enqueueing never waits for the job to
/// run.
pub trait JobQueue: Send + Sync {
    fn enqueue(&self, job: Job) -> Result<(), Error>;

    fn enqueue_delayed(&self, job: Job, delay: Duration) -> Result<(), Error>;
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct QueuedJob {
    pub job: Job,
    pub delay: Option<Duration>,
}

/// `Queue` sends jobs to the [`Worker`] it was created with.
#[derive(Debug, Clone)]
pub struct Queue {
    tx: UnboundedSender<QueuedJob>,
}

/// Creates a connected [`Queue`] and [`Worker`] pair.
pub fn new() -> (Queue, Worker) {
    let (tx, rx) = mpsc::unbounded_channel();

    (Queue { tx }, Worker { rx })
}

impl Queue {
    fn send(&self, job: Job, delay: Option<Duration>) -> Result<(), Error> {
        log::trace!("enqueueing {} (delay {:?})", job.name(), delay);
        Ok(self.tx.send(QueuedJob { job, delay }).map_err(|e| {
            log::error!("job queue send error: {}", &e);
            e
        })?)
    }
}

impl JobQueue for Queue {
    fn enqueue(&self, job: Job) -> Result<(), Error> {
        self.send(job, None)
    }

    fn enqueue_delayed(&self, job: Job, delay: Duration) -> Result<(), Error> {
        self.send(job, Some(delay))
    }
}

/// `Worker` is the receiving end of a [`Queue`].
#[derive(Debug)]
pub struct Worker {
    rx: UnboundedReceiver<QueuedJob>,
}

impl Worker {
    /// Returns every job enqueued so far without waiting.
    pub fn drain(&mut self) -> Vec<QueuedJob> {
        let mut jobs = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(job) => jobs.push(job),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        jobs
    }

    /// Waits until every [`Queue`] has been dropped, returning all jobs
    /// received.
    pub async fn join(mut self) -> Vec<QueuedJob> {
        let mut jobs = Vec::new();
        while let Some(job) = self.rx.recv().await {
            jobs.push(job);
        }
        jobs
    }
}
