//! Per-change processing: the steps shared by every reference change, and
//! the branch and tag specific steps built on top of them.

use std::collections::BTreeSet;

use async_trait::async_trait;
use git_push_hooks_services::{
    FileType, HookName, Job, PipelineRequest, PipelineVariable, Services,
};
use push_data::{CommitWindow, PushDataBuilder};
use push_ref::{Action, Push, ReferenceChange, Revision, BLANK_SHA};

use crate::{Error, Settings, Step, StepFailure};

mod branch;
pub use self::branch::BranchChangeProcessor;

mod tag;
pub use self::tag::TagChangeProcessor;

/// Everything about a push that processors share.
pub struct Context<'a> {
    pub push: &'a Push,
    pub services: &'a Services,
    pub settings: &'a Settings,
}

impl<'a> Context<'a> {
    pub fn enqueue(&self, job: Job) -> Result<(), Error> {
        Ok(self.services.jobs.enqueue(job)?)
    }
}

/// Which of the optional shared steps to run for a change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeFlags {
    pub create_pipelines: bool,
    pub execute_hooks: bool,
    pub create_event: bool,
}

/// What happened while processing a single change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outcome {
    /// Pipeline creation requests the engine accepted, persisted or not.
    pub pipeline_requests: usize,
    pub failures: Vec<StepFailure>,
}

/// Collects the results of the isolated steps run for one change.
pub struct Steps<'a> {
    change: &'a ReferenceChange,
    correlation_id: &'a str,
    outcome: Outcome,
}

impl<'a> Steps<'a> {
    pub fn new(change: &'a ReferenceChange, correlation_id: &'a str) -> Self {
        Self {
            change,
            correlation_id,
            outcome: Outcome::default(),
        }
    }

    /// Logs and keeps a failed step; successful steps are dropped.
    pub fn record(&mut self, step: Step, result: Result<(), Error>) {
        if let Err(err) = result {
            log::warn!(
                "{} step failed for {} (index {}, correlation id {:?}): {}",
                step,
                self.change.full_ref(),
                self.change.index(),
                self.correlation_id,
                err
            );
            self.outcome
                .failures
                .push(StepFailure::new(Some(self.change), step, &err));
        }
    }

    pub fn into_outcome(self) -> Outcome {
        self.outcome
    }
}

/// Processing for one kind of reference change.
///
/// Implementors supply the commit window and the kind specific values; the
/// provided [`process`](ChangeProcessor::process) runs the shared steps and
/// then [`after_shared`](ChangeProcessor::after_shared).
#[async_trait]
pub trait ChangeProcessor: Send + Sync {
    fn context(&self) -> &Context<'_>;

    fn change(&self) -> &ReferenceChange;

    fn hook_name(&self) -> HookName;

    /// The commits of this change, oldest first.
    async fn commit_window(&self) -> Result<CommitWindow, Error>;

    /// The total number of commits in the change, which may exceed the
    /// window.
    async fn commit_count(&self, window: &CommitWindow) -> Result<usize, Error>;

    async fn event_message(&self) -> Result<Option<String>, Error> {
        Ok(None)
    }

    async fn checkout_sha(&self) -> Result<Option<Revision>, Error>;

    /// Whether the change can invalidate cached project file types.
    fn invalidates_cache(&self) -> bool {
        false
    }

    fn invalidated_file_types(&self, _window: &CommitWindow) -> BTreeSet<FileType> {
        BTreeSet::new()
    }

    /// Kind specific steps. `window` is `None` if it could not be loaded.
    async fn after_shared(&self, _window: Option<&CommitWindow>, _steps: &mut Steps<'_>) {}

    async fn process(&self, flags: ChangeFlags) -> Outcome {
        let ctx = self.context();
        let change = self.change();
        let mut steps = Steps::new(change, &ctx.push.context.correlation_id);

        let window = self.commit_window().await.map_err(|err| {
            log::warn!("cannot load commits for {}: {}", change.full_ref(), err);
            err.to_string()
        });
        log::trace!(
            "processing {} {} ({} commits)",
            change.action(),
            change.full_ref(),
            window.as_ref().map(CommitWindow::len).unwrap_or_default()
        );

        if flags.create_event {
            let result = match &window {
                Ok(window) => create_event(self, window).await,
                Err(err) => Err(Error::CommitWindow(err.clone())),
            };
            steps.record(Step::Event, result);
        }

        if flags.create_pipelines && change.action() != Action::Removed {
            let result = create_pipeline(self).await;
            if result.is_ok() {
                steps.outcome.pipeline_requests += 1;
            }
            steps.record(Step::Pipeline, result);
        }

        if flags.execute_hooks {
            let result = match &window {
                Ok(window) => execute_hooks(self, window).await,
                Err(err) => Err(Error::CommitWindow(err.clone())),
            };
            steps.record(Step::Hooks, result);
        }

        if self.invalidates_cache() {
            match &window {
                Ok(window) => {
                    let file_types = self.invalidated_file_types(window);
                    if !file_types.is_empty() {
                        steps.record(
                            Step::CacheInvalidation,
                            ctx.enqueue(Job::InvalidateProjectCache {
                                project_id: ctx.push.project.id,
                                file_types: file_types.into_iter().collect(),
                            }),
                        );
                    }
                }
                Err(err) => steps.record(
                    Step::CacheInvalidation,
                    Err(Error::CommitWindow(err.clone())),
                ),
            }
        }

        if ctx.settings.agent_notifications {
            steps.record(
                Step::AgentNotification,
                ctx.enqueue(Job::NotifyAgents {
                    project_id: ctx.push.project.id,
                }),
            );
        }

        self.after_shared(window.as_ref().ok(), &mut steps).await;

        steps.into_outcome()
    }
}

pub(crate) fn revision_or_blank(revision: Option<&Revision>) -> String {
    match revision {
        Some(revision) => revision.to_string(),
        None => String::from(BLANK_SHA),
    }
}

async fn create_event<P: ChangeProcessor + ?Sized>(
    processor: &P,
    window: &CommitWindow,
) -> Result<(), Error> {
    let ctx = processor.context();
    let push = ctx.push;

    let total = processor.commit_count(window).await?;
    let message = processor.event_message().await?;
    let checkout_sha = processor.checkout_sha().await?;

    let mut builder = PushDataBuilder::new(&push.project, &push.actor, processor.change());
    builder
        .latest_commit(window)
        .total_commits_count(total)
        .message(message)
        .checkout_sha(checkout_sha)
        .push_options(&push.push_options)
        .without_changed_files();

    Ok(ctx.services.events.record(&builder.build()).await?)
}

async fn create_pipeline<P: ChangeProcessor + ?Sized>(processor: &P) -> Result<(), Error> {
    let ctx = processor.context();
    let push = ctx.push;
    let change = processor.change();

    let request = PipelineRequest {
        before: revision_or_blank(change.old()),
        after: revision_or_blank(change.new_revision()),
        full_ref: change.full_ref().to_string(),
        variables_attributes: push
            .push_options
            .ci_variables()
            .into_iter()
            .map(|(key, value)| PipelineVariable::env_var(key, value))
            .collect(),
        push_options: push.push_options.clone(),
        checkout_sha: processor.checkout_sha().await?,
    };
    let params = pipeline_params(&request);

    match ctx
        .services
        .pipelines
        .submit_creation_request(&push.project, &push.actor, request)
        .await
    {
        Ok(response) if response.persisted => Ok(()),
        Ok(response) => {
            log_pipeline_errors(
                processor,
                response.message.as_deref().unwrap_or("pipeline was not persisted"),
                &params,
            );
            Ok(())
        }
        Err(err) => {
            log_pipeline_errors(processor, &err.to_string(), &params);
            Err(err.into())
        }
    }
}

/// The sanitized request as JSON, for logs.
fn pipeline_params(request: &PipelineRequest) -> String {
    match serde_json::to_string(&request.sanitized()) {
        Ok(params) => params,
        Err(err) => {
            log::warn!(
                "cannot serialize pipeline params for {}: {}",
                request.full_ref,
                err
            );
            format!("<unserializable: {}>", err)
        }
    }
}

fn log_pipeline_errors<P: ChangeProcessor + ?Sized>(processor: &P, errors: &str, params: &str) {
    let push = processor.context().push;

    log::warn!(
        "Error creating pipeline: class={} correlation_id={:?} project_id={} project_path={} errors={:?} pipeline_params={}",
        std::any::type_name::<P>(),
        push.context.correlation_id,
        push.project.id,
        push.project.path_with_namespace,
        errors,
        params
    );
}

async fn execute_hooks<P: ChangeProcessor + ?Sized>(
    processor: &P,
    window: &CommitWindow,
) -> Result<(), Error> {
    let ctx = processor.context();
    let push = ctx.push;
    let hooks = &ctx.services.hooks;
    let name = processor.hook_name();

    let run_hooks = hooks.has_active_hooks(name).await?;
    let run_integrations = hooks.has_active_integrations(name).await?;
    if !run_hooks && !run_integrations {
        return Ok(());
    }

    let total = processor.commit_count(window).await?;
    let message = processor.event_message().await?;
    let checkout_sha = processor.checkout_sha().await?;

    let mut builder = PushDataBuilder::new(&push.project, &push.actor, processor.change());
    builder
        .window(window)
        .total_commits_count(total)
        .message(message)
        .checkout_sha(checkout_sha)
        .push_options(&push.push_options);
    let payload = builder.build();

    if run_hooks {
        hooks.dispatch_hooks(&payload, name).await?;
    }
    if run_integrations {
        hooks
            .dispatch_integrations(&payload, name, push.push_options.skip_ci())
            .await?;
    }

    Ok(())
}
