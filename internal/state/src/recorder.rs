use std::{
    collections::HashSet,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use async_trait::async_trait;
use git_push_hooks_services::{
    Error, EventSink, HookDispatcher, HookName, Job, JobQueue, PipelineEngine, PipelineRequest,
    PipelineResponse, RepositoryCache, TrackingAttributes,
};
use push_data::{BulkPushEvent, PushEventPayload};
use push_ref::{Actor, Project};
use serde::{Deserialize, Serialize};

/// An externally visible effect of processing a push.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum Effect {
    Event {
        payload: PushEventPayload,
    },
    BulkEvent {
        event: BulkPushEvent,
    },
    Tracking {
        name: String,
        attributes: TrackingAttributes,
    },
    Hooks {
        name: HookName,
        payload: PushEventPayload,
    },
    Integrations {
        name: HookName,
        payload: PushEventPayload,
        skip_ci: bool,
    },
    Pipeline {
        request: PipelineRequest,
    },
    Cache {
        operation: CacheOperation,
    },
    Job {
        job: Job,
        delay: Option<Duration>,
    },
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum CacheOperation {
    AfterPushCommit { branch: String },
    AfterCreateBranch { expire_cache: bool },
    AfterRemoveBranch { expire_cache: bool },
    CopyGitattributes { full_ref: String },
}

/// A collaborator surface the [`Recorder`] can be told to fail on.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum Surface {
    Cache,
    Events,
    Hooks,
    Jobs,
    Pipelines,
}

impl Surface {
    fn name(&self) -> &'static str {
        match self {
            Surface::Cache => "repository cache",
            Surface::Events => "event sink",
            Surface::Hooks => "hook dispatcher",
            Surface::Jobs => "job queue",
            Surface::Pipelines => "pipeline engine",
        }
    }
}

/// Records every effect sent to the collaborators it implements, in order.
///
/// Job enqueueing is synchronous, so the effect log sits behind a standard
/// mutex rather than an async lock.
#[derive(Debug, Clone)]
pub struct Recorder {
    effects: Arc<Mutex<Vec<Effect>>>,
    failing: Arc<Mutex<HashSet<Surface>>>,
    hooks_active: bool,
    integrations_active: bool,
    persist_pipelines: bool,
}

impl Default for Recorder {
    fn default() -> Self {
        Self {
            effects: Arc::default(),
            failing: Arc::default(),
            hooks_active: true,
            integrations_active: true,
            persist_pipelines: true,
        }
    }
}

impl Recorder {
    /// Creates a recorder with active hooks and integrations that persists
    /// every pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hooks(mut self, hooks_active: bool, integrations_active: bool) -> Self {
        self.hooks_active = hooks_active;
        self.integrations_active = integrations_active;
        self
    }

    /// Makes the pipeline engine accept requests without creating pipelines.
    pub fn without_persisted_pipelines(mut self) -> Self {
        self.persist_pipelines = false;
        self
    }

    /// Makes every call to the given surface fail as unavailable.
    pub fn fail(&self, surface: Surface) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.insert(surface);
        }
    }

    pub fn effects(&self) -> Vec<Effect> {
        match self.effects.lock() {
            Ok(effects) => effects.clone(),
            Err(_) => Vec::new(),
        }
    }

    pub fn events(&self) -> Vec<PushEventPayload> {
        self.effects()
            .into_iter()
            .filter_map(|effect| match effect {
                Effect::Event { payload } => Some(payload),
                _ => None,
            })
            .collect()
    }

    pub fn bulk_events(&self) -> Vec<BulkPushEvent> {
        self.effects()
            .into_iter()
            .filter_map(|effect| match effect {
                Effect::BulkEvent { event } => Some(event),
                _ => None,
            })
            .collect()
    }

    pub fn pipelines(&self) -> Vec<PipelineRequest> {
        self.effects()
            .into_iter()
            .filter_map(|effect| match effect {
                Effect::Pipeline { request } => Some(request),
                _ => None,
            })
            .collect()
    }

    pub fn jobs(&self) -> Vec<Job> {
        self.effects()
            .into_iter()
            .filter_map(|effect| match effect {
                Effect::Job { job, .. } => Some(job),
                _ => None,
            })
            .collect()
    }

    pub fn tracking(&self, name: &str) -> Vec<TrackingAttributes> {
        self.effects()
            .into_iter()
            .filter_map(|effect| match effect {
                Effect::Tracking {
                    name: recorded,
                    attributes,
                } if recorded == name => Some(attributes),
                _ => None,
            })
            .collect()
    }

    fn check(&self, surface: Surface) -> Result<(), Error> {
        let failing = self
            .failing
            .lock()
            .map_err(|e| Error::unavailable(surface.name(), e))?;
        if failing.contains(&surface) {
            Err(Error::unavailable(surface.name(), "injected failure"))
        } else {
            Ok(())
        }
    }

    fn log(&self, surface: Surface) -> Result<MutexGuard<'_, Vec<Effect>>, Error> {
        self.check(surface)?;
        self.effects
            .lock()
            .map_err(|e| Error::unavailable(surface.name(), e))
    }

    fn push(&self, surface: Surface, effect: Effect) -> Result<(), Error> {
        self.log(surface)?.push(effect);
        Ok(())
    }
}

#[async_trait]
impl EventSink for Recorder {
    async fn record(&self, payload: &PushEventPayload) -> Result<(), Error> {
        self.push(
            Surface::Events,
            Effect::Event {
                payload: payload.clone(),
            },
        )
    }

    async fn record_bulk(&self, event: &BulkPushEvent) -> Result<(), Error> {
        self.push(
            Surface::Events,
            Effect::BulkEvent {
                event: event.clone(),
            },
        )
    }

    async fn record_tracking(
        &self,
        name: &str,
        attributes: &TrackingAttributes,
    ) -> Result<(), Error> {
        self.push(
            Surface::Events,
            Effect::Tracking {
                name: name.to_string(),
                attributes: attributes.clone(),
            },
        )
    }
}

#[async_trait]
impl HookDispatcher for Recorder {
    async fn has_active_hooks(&self, _name: HookName) -> Result<bool, Error> {
        self.check(Surface::Hooks)?;
        Ok(self.hooks_active)
    }

    async fn dispatch_hooks(
        &self,
        payload: &PushEventPayload,
        name: HookName,
    ) -> Result<(), Error> {
        self.push(
            Surface::Hooks,
            Effect::Hooks {
                name,
                payload: payload.clone(),
            },
        )
    }

    async fn has_active_integrations(&self, _name: HookName) -> Result<bool, Error> {
        self.check(Surface::Hooks)?;
        Ok(self.integrations_active)
    }

    async fn dispatch_integrations(
        &self,
        payload: &PushEventPayload,
        name: HookName,
        skip_ci: bool,
    ) -> Result<(), Error> {
        self.push(
            Surface::Hooks,
            Effect::Integrations {
                name,
                payload: payload.clone(),
                skip_ci,
            },
        )
    }
}

#[async_trait]
impl PipelineEngine for Recorder {
    async fn submit_creation_request(
        &self,
        _project: &Project,
        _actor: &Actor,
        request: PipelineRequest,
    ) -> Result<PipelineResponse, Error> {
        let mut effects = self.log(Surface::Pipelines)?;
        effects.push(Effect::Pipeline { request });

        if self.persist_pipelines {
            Ok(PipelineResponse {
                persisted: true,
                pipeline_id: Some(effects.len() as u64),
                message: None,
            })
        } else {
            Ok(PipelineResponse {
                persisted: false,
                pipeline_id: None,
                message: Some(String::from("pipeline filtered by workflow rules")),
            })
        }
    }
}

#[async_trait]
impl RepositoryCache for Recorder {
    async fn after_push_commit(&self, branch: &str) -> Result<(), Error> {
        self.push(
            Surface::Cache,
            Effect::Cache {
                operation: CacheOperation::AfterPushCommit {
                    branch: branch.to_string(),
                },
            },
        )
    }

    async fn after_create_branch(&self, expire_cache: bool) -> Result<(), Error> {
        self.push(
            Surface::Cache,
            Effect::Cache {
                operation: CacheOperation::AfterCreateBranch { expire_cache },
            },
        )
    }

    async fn after_remove_branch(&self, expire_cache: bool) -> Result<(), Error> {
        self.push(
            Surface::Cache,
            Effect::Cache {
                operation: CacheOperation::AfterRemoveBranch { expire_cache },
            },
        )
    }

    async fn copy_gitattributes(&self, full_ref: &str) -> Result<(), Error> {
        self.push(
            Surface::Cache,
            Effect::Cache {
                operation: CacheOperation::CopyGitattributes {
                    full_ref: full_ref.to_string(),
                },
            },
        )
    }
}

impl JobQueue for Recorder {
    fn enqueue(&self, job: Job) -> Result<(), Error> {
        self.push(Surface::Jobs, Effect::Job { job, delay: None })
    }

    fn enqueue_delayed(&self, job: Job, delay: Duration) -> Result<(), Error> {
        self.push(
            Surface::Jobs,
            Effect::Job {
                job,
                delay: Some(delay),
            },
        )
    }
}
