use std::collections::{BTreeMap, HashSet};

use git_push_hooks_services::{HousekeepingTarget, HousekeepingTask, Services};
use itertools::Itertools;
use push_data::BulkPushEvent;
use push_ref::{Action, Push, RefType, ReferenceChange};
use serde::Serialize;

use crate::{
    housekeeping::HousekeepingService,
    processor::{
        BranchChangeProcessor, ChangeFlags, ChangeProcessor, Context, Outcome, TagChangeProcessor,
    },
    Error, Settings, Step, StepFailure,
};

/// Decides which changes of a push may create pipelines. Only the first
/// changes by sequence index do, unless every change is allowed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineBudget {
    limit: Option<usize>,
}

impl PipelineBudget {
    pub fn new(settings: &Settings) -> Self {
        Self {
            limit: if settings.create_all_pipelines {
                None
            } else {
                Some(settings.pipeline_fanout_limit)
            },
        }
    }

    pub fn allows(&self, change: &ReferenceChange) -> bool {
        self.limit.map_or(true, |limit| change.index() < limit)
    }
}

// How the changes of one (ref type, action) group are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct GroupPolicy {
    execute_hooks: bool,
    emit_bulk_event: bool,
}

/// The result of processing a push.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct PushSummary {
    pub changes_processed: usize,
    pub pipeline_requests: usize,
    pub bulk_events: Vec<BulkPushEvent>,
    pub housekeeping: Option<HousekeepingTask>,
    pub failures: Vec<StepFailure>,
}

impl PushSummary {
    fn absorb(&mut self, outcome: Outcome) {
        self.changes_processed += 1;
        self.pipeline_requests += outcome.pipeline_requests;
        self.failures.extend(outcome.failures);
    }

    fn record(&mut self, step: Step, err: Error) {
        log::warn!("{} step failed: {}", step, err);
        self.failures.push(StepFailure::new(None, step, &err));
    }
}

/// Turns a push into the effects of each of its reference changes.
pub struct PushOrchestrator<'a> {
    services: &'a Services,
    settings: &'a Settings,
}

impl<'a> PushOrchestrator<'a> {
    pub fn new(services: &'a Services, settings: &'a Settings) -> Self {
        Self { services, settings }
    }

    pub async fn process(&self, push: &Push) -> PushSummary {
        let ctx = Context {
            push,
            services: self.services,
            settings: self.settings,
        };
        let mut summary = PushSummary::default();

        let groups: BTreeMap<(RefType, Action), Vec<&ReferenceChange>> = push
            .changes
            .iter()
            .into_group_map_by(|change| (change.ref_type(), change.action()))
            .into_iter()
            .collect();
        let policies: BTreeMap<(RefType, Action), GroupPolicy> = groups
            .iter()
            .map(|(key, changes)| {
                let policy = GroupPolicy {
                    execute_hooks: changes.len() <= self.settings.webhook_fanout_limit,
                    emit_bulk_event: changes.len() > self.settings.activity_event_limit,
                };
                (*key, policy)
            })
            .collect();

        let merge_request_branches = self.merge_request_branches(push).await;
        let budget = PipelineBudget::new(self.settings);

        log::debug!(
            "processing {} changes for {} in {} groups",
            push.changes.len(),
            push.project.path_with_namespace,
            groups.len()
        );

        for change in push.ordered_changes() {
            let policy = match policies.get(&(change.ref_type(), change.action())) {
                Some(policy) => *policy,
                None => continue,
            };
            let flags = ChangeFlags {
                create_pipelines: budget.allows(change),
                execute_hooks: policy.execute_hooks,
                create_event: !policy.emit_bulk_event,
            };

            let outcome = match change.ref_type() {
                RefType::Branch => {
                    BranchChangeProcessor::new(&ctx, change, merge_request_branches.as_ref())
                        .await
                        .process(flags)
                        .await
                }
                RefType::Tag => TagChangeProcessor::new(&ctx, change).process(flags).await,
            };
            summary.absorb(outcome);
        }

        for (key, changes) in groups.iter() {
            if !policies.get(key).map_or(false, |policy| policy.emit_bulk_event) {
                continue;
            }

            let (ref_type, action) = *key;
            let event = BulkPushEvent::new(action, ref_type, changes.len());
            match self.services.events.record_bulk(&event).await {
                Ok(()) => summary.bulk_events.push(event),
                Err(err) => summary.record(Step::Event, err.into()),
            }
        }

        let housekeeping = HousekeepingService::new(
            self.services.housekeeping.as_ref(),
            self.services.leases.as_ref(),
            &self.settings.housekeeping,
        );
        match housekeeping
            .perform(HousekeepingTarget::Project(push.project.id))
            .await
        {
            Ok(task) => summary.housekeeping = task,
            Err(err) => summary.record(Step::Housekeeping, err),
        }

        summary
    }

    // The pushed branches that have merge requests, or None if they could not
    // be determined.
    async fn merge_request_branches(&self, push: &Push) -> Option<HashSet<String>> {
        let branches: Vec<String> = push
            .changes
            .iter()
            .filter(|change| change.ref_type() == RefType::Branch)
            .map(|change| change.name().to_string())
            .unique()
            .collect();
        if branches.is_empty() {
            return Some(HashSet::new());
        }

        match self
            .services
            .merge_requests
            .open_merge_request_branches(push.project.id, &branches)
            .await
        {
            Ok(branches) => Some(branches),
            Err(err) => {
                log::warn!("cannot look up merge request branches: {}", err);
                None
            }
        }
    }
}
