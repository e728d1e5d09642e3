use std::collections::{BTreeSet, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use git_push_hooks_services::{FileType, HookName, Job, TrackingAttributes};
use push_data::CommitWindow;
use push_ref::{Commit, ReferenceChange, Revision};
use tokio::sync::OnceCell;

use super::{revision_or_blank, ChangeProcessor, Context, Steps};
use crate::{file_types::FileDetector, references, Error, Step};

const CI_CONFIG_TRACKING_EVENT: &str = "commit_ci_config_file";
const OVERFLOW_TRACKING_EVENT: &str = "push_commit_window_overflow";

/// Processes a change to a branch.
pub struct BranchChangeProcessor<'a> {
    ctx: &'a Context<'a>,
    change: &'a ReferenceChange,

    /// Branches with merge requests, when known.
    merge_request_branches: Option<&'a HashSet<String>>,

    creating: bool,
    removing: bool,
    updating: bool,
    default_branch: bool,

    commit_count: OnceCell<usize>,
}

impl<'a> BranchChangeProcessor<'a> {
    pub async fn new(
        ctx: &'a Context<'a>,
        change: &'a ReferenceChange,
        merge_request_branches: Option<&'a HashSet<String>>,
    ) -> BranchChangeProcessor<'a> {
        let name = change.name();
        let removing = change.new_revision().is_none();

        // A branch that the repository does not know about yet is treated as
        // new even when git reports an old revision.
        let creating = !removing
            && (change.old().is_none()
                || match ctx.services.repository.branch_exists(name).await {
                    Ok(exists) => !exists,
                    Err(err) => {
                        log::warn!("cannot check whether branch {} exists: {}", name, err);
                        false
                    }
                });

        Self {
            ctx,
            change,
            merge_request_branches,
            creating,
            removing,
            updating: !creating && !removing,
            default_branch: ctx.push.project.is_default_branch(name),
            commit_count: OnceCell::new(),
        }
    }

    fn project_id(&self) -> push_ref::ProjectId {
        self.ctx.push.project.id
    }

    async fn branch_create_hooks(&self, steps: &mut Steps<'_>) {
        let cache = &self.ctx.services.cache;
        steps.record(
            Step::BranchCache,
            cache.after_create_branch(false).await.map_err(Error::from),
        );

        if self.default_branch {
            steps.record(
                Step::DefaultBranchInitialization,
                self.ctx.enqueue(Job::InitializeDefaultBranch {
                    project_id: self.project_id(),
                    branch: self.change.name().to_string(),
                }),
            );
        }
    }

    async fn enqueue_process_commit_messages(&self, window: &CommitWindow) -> Result<(), Error> {
        let referencing: Vec<&Commit> = window
            .commits()
            .iter()
            .filter(|commit| references::mentions_work_items(&commit.message))
            .collect();
        if referencing.is_empty() {
            return Ok(());
        }

        // Commits that were already processed in the upstream project are
        // skipped.
        let upstream: HashSet<Revision> = match &self.ctx.services.fork_upstream {
            Some(upstream) => {
                let ids: Vec<Revision> = referencing.iter().map(|c| c.id.clone()).collect();
                upstream
                    .existing_commit_ids(&ids)
                    .await?
                    .into_iter()
                    .collect()
            }
            None => HashSet::new(),
        };

        for commit in referencing {
            if upstream.contains(&commit.id) {
                continue;
            }
            self.ctx.enqueue(Job::ProcessCommit {
                project_id: self.project_id(),
                actor_id: self.ctx.push.actor.id,
                commit: commit.clone(),
                default_branch: self.default_branch,
            })?;
        }

        Ok(())
    }

    async fn branch_has_issue_keys(&self) -> Result<bool, Error> {
        let name = self.change.name();
        if references::has_issue_keys(name) {
            return Ok(true);
        }

        match &self.ctx.services.issue_tracker {
            Some(tracker) => Ok(tracker.has_issue_keys(self.project_id(), name).await?),
            None => Ok(false),
        }
    }

    async fn enqueue_issue_tracker_sync(&self, window: &CommitWindow) -> Result<(), Error> {
        if self.ctx.services.issue_tracker.is_none() {
            return Ok(());
        }

        let branch = if self.branch_has_issue_keys().await? {
            Some(self.change.name().to_string())
        } else {
            None
        };
        let shas: Vec<Revision> = window
            .commits()
            .iter()
            .filter(|commit| references::has_issue_keys(&commit.message))
            .map(|commit| commit.id.clone())
            .collect();

        if branch.is_none() && shas.is_empty() {
            return Ok(());
        }

        let settings = self.ctx.settings;
        if shas.is_empty() || !settings.issue_tracker_batching {
            return self.ctx.enqueue(Job::SyncIssueTrackerBranch {
                project_id: self.project_id(),
                branch,
                shas,
                update_sequence_id: update_sequence_id(),
            });
        }

        for (i, batch) in shas
            .chunks(settings.issue_tracker_batch_size.max(1))
            .enumerate()
        {
            let job = Job::SyncIssueTrackerBranch {
                project_id: self.project_id(),
                branch: branch.clone(),
                shas: batch.to_vec(),
                update_sequence_id: update_sequence_id(),
            };
            let delay = settings.issue_tracker_batch_delay * i as u32;
            self.ctx.services.jobs.enqueue_delayed(job, delay)?;
        }

        Ok(())
    }

    async fn enqueue_issue_tracker_removal(&self) -> Result<(), Error> {
        if self.ctx.services.issue_tracker.is_none() || !self.branch_has_issue_keys().await? {
            return Ok(());
        }

        self.ctx.enqueue(Job::RemoveIssueTrackerBranch {
            project_id: self.project_id(),
            branch: self.change.name().to_string(),
        })
    }

    async fn track_ci_config_change(&self, window: &CommitWindow) -> Result<(), Error> {
        if !self.default_branch {
            return Ok(());
        }

        let path = self.ctx.push.project.ci_config_path();
        for commit in window.commits() {
            if commit.is_merge() || !commit.touches(path) {
                continue;
            }

            let attributes: TrackingAttributes = [
                ("project_id", self.project_id().to_string()),
                ("commit", commit.id.to_string()),
                ("author", commit.author.email.clone()),
            ]
            .into_iter()
            .map(|(key, value)| (key.to_string(), value))
            .collect();
            self.ctx
                .services
                .events
                .record_tracking(CI_CONFIG_TRACKING_EVENT, &attributes)
                .await?;
        }

        Ok(())
    }

    fn enqueue_update_merge_requests(&self) -> Result<(), Error> {
        let name = self.change.name();
        if let Some(branches) = self.merge_request_branches {
            if !branches.contains(name) {
                log::trace!("no merge requests for {}; skipping refresh", name);
                return Ok(());
            }
        }

        self.ctx.enqueue(Job::UpdateMergeRequests {
            project_id: self.project_id(),
            actor_id: self.ctx.push.actor.id,
            before: revision_or_blank(self.change.old()),
            after: revision_or_blank(self.change.new_revision()),
            full_ref: self.change.full_ref().to_string(),
            push_options: self.ctx.push.push_options.clone(),
        })
    }

    async fn record_overflow(&self) -> Result<(), Error> {
        let attributes: TrackingAttributes = [
            ("project_id", self.project_id().to_string()),
            ("ref", self.change.full_ref().to_string()),
        ]
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect();

        Ok(self
            .ctx
            .services
            .events
            .record_tracking(OVERFLOW_TRACKING_EVENT, &attributes)
            .await?)
    }

    // Only commits no signature store has verified, and that actually carry
    // a signature, are worth a verification job.
    async fn enqueue_signature_creation(&self, window: &CommitWindow) -> Result<(), Error> {
        let ids = window.ids();
        if ids.is_empty() {
            return Ok(());
        }

        let mut unsigned: Option<HashSet<Revision>> = None;
        for (kind, store) in self.ctx.services.signatures.iter() {
            let lacking: HashSet<Revision> = store
                .unsigned_commit_ids(&ids)
                .await?
                .into_iter()
                .collect();
            log::trace!("{} commits lack a {} signature", lacking.len(), kind);
            unsigned = Some(match unsigned {
                Some(unsigned) => unsigned.intersection(&lacking).cloned().collect(),
                None => lacking,
            });
        }

        // Keep the window order for the job.
        let unsigned = unsigned.unwrap_or_default();
        let candidates: Vec<Revision> = ids.into_iter().filter(|id| unsigned.contains(id)).collect();
        if candidates.is_empty() {
            return Ok(());
        }

        let signable = self
            .ctx
            .services
            .repository
            .signable_commit_ids(&candidates)
            .await?;
        if signable.is_empty() {
            return Ok(());
        }

        self.ctx.enqueue(Job::CreateCommitSignatures {
            project_id: self.project_id(),
            shas: signable,
        })
    }
}

#[async_trait]
impl<'a> ChangeProcessor for BranchChangeProcessor<'a> {
    fn context(&self) -> &Context<'_> {
        self.ctx
    }

    fn change(&self) -> &ReferenceChange {
        self.change
    }

    fn hook_name(&self) -> HookName {
        HookName::Push
    }

    async fn commit_window(&self) -> Result<CommitWindow, Error> {
        let new = match self.change.new_revision() {
            Some(new) if !self.removing => new,
            _ => return Ok(CommitWindow::empty()),
        };
        let repository = &self.ctx.services.repository;
        let threshold = CommitWindow::THRESHOLD;

        if self.creating && self.default_branch {
            let commits = repository.commits_since(new, threshold).await?;
            return Ok(CommitWindow::from_newest_first(commits));
        }

        // A new branch is compared against the default branch, so its window
        // may include commits that were pushed earlier on another branch.
        let base = match (self.creating, self.change.old()) {
            (false, Some(old)) => old.as_str(),
            _ => match self.ctx.push.project.default_branch.as_deref() {
                Some(default_branch) => default_branch,
                None => return Ok(CommitWindow::empty()),
            },
        };

        let commits = repository.commits_between(base, new, threshold).await?;
        Ok(CommitWindow::from_oldest_first(commits))
    }

    async fn commit_count(&self, window: &CommitWindow) -> Result<usize, Error> {
        match self.change.new_revision() {
            Some(new) if self.creating && self.default_branch => {
                let count = self
                    .commit_count
                    .get_or_try_init(|| async {
                        self.ctx
                            .services
                            .repository
                            .commit_count_between(None, new)
                            .await
                    })
                    .await?;
                Ok(*count)
            }
            _ => Ok(window.len() + usize::from(window.overflowed())),
        }
    }

    async fn checkout_sha(&self) -> Result<Option<Revision>, Error> {
        Ok(self.change.new_revision().cloned())
    }

    fn invalidates_cache(&self) -> bool {
        self.updating && self.default_branch
    }

    fn invalidated_file_types(&self, window: &CommitWindow) -> BTreeSet<FileType> {
        FileDetector::new(self.ctx.push.project.ci_config_path()).types_in_paths(
            window
                .commits()
                .iter()
                .flat_map(|commit| commit.changed_paths.iter())
                .filter_map(|change| change.path()),
        )
    }

    async fn after_shared(&self, window: Option<&CommitWindow>, steps: &mut Steps<'_>) {
        let empty = CommitWindow::empty();
        let window = window.unwrap_or(&empty);
        let cache = &self.ctx.services.cache;
        let name = self.change.name();

        steps.record(
            Step::BranchCache,
            cache.after_push_commit(name).await.map_err(Error::from),
        );

        if self.creating {
            self.branch_create_hooks(steps).await;
        }

        if self.updating && self.default_branch {
            steps.record(
                Step::Gitattributes,
                cache
                    .copy_gitattributes(self.change.full_ref())
                    .await
                    .map_err(Error::from),
            );
        }

        if self.creating || self.updating {
            steps.record(
                Step::CrossReferences,
                self.enqueue_process_commit_messages(window).await,
            );
            steps.record(
                Step::IssueTracker,
                self.enqueue_issue_tracker_sync(window).await,
            );
            steps.record(
                Step::CiConfigTracking,
                self.track_ci_config_change(window).await,
            );
        }

        if self.removing {
            steps.record(
                Step::IssueTracker,
                self.enqueue_issue_tracker_removal().await,
            );
            steps.record(
                Step::BranchCache,
                cache.after_remove_branch(false).await.map_err(Error::from),
            );
            steps.record(
                Step::Environments,
                self.ctx.enqueue(Job::StopEnvironments {
                    project_id: self.project_id(),
                    actor_id: self.ctx.push.actor.id,
                    branch: name.to_string(),
                }),
            );
            steps.record(
                Step::Artifacts,
                self.ctx.enqueue(Job::UnlockArtifacts {
                    project_id: self.project_id(),
                    actor_id: self.ctx.push.actor.id,
                    full_ref: self.change.full_ref().to_string(),
                }),
            );
        }

        steps.record(Step::MergeRequests, self.enqueue_update_merge_requests());

        if self.default_branch && !self.removing {
            steps.record(
                Step::Languages,
                self.ctx.enqueue(Job::DetectRepositoryLanguages {
                    project_id: self.project_id(),
                }),
            );
            steps.record(
                Step::TargetPlatforms,
                self.ctx.enqueue(Job::RecordTargetPlatforms {
                    project_id: self.project_id(),
                }),
            );
        }

        if window.overflowed() {
            steps.record(Step::OverflowMetric, self.record_overflow().await);
        }

        steps.record(
            Step::Signatures,
            self.enqueue_signature_creation(window).await,
        );
    }
}

fn update_sequence_id() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use git_push_hooks_state::{
        CacheOperation, Effect, Environment, Recorder, RepositoryFixture, SignaturesFixture,
        Surface,
    };
    use push_ref::{PathChange, BLANK_SHA};

    use super::*;
    use crate::{
        processor::ChangeFlags,
        test_utils::{chain, change, commit, environment, push, rev, Harness},
    };

    const ALL: ChangeFlags = ChangeFlags {
        create_pipelines: true,
        execute_hooks: true,
        create_event: true,
    };

    fn jobs(recorder: &Recorder) -> Vec<&'static str> {
        recorder.jobs().iter().map(Job::name).collect()
    }

    fn cache_operations(recorder: &Recorder) -> Vec<CacheOperation> {
        recorder
            .effects()
            .into_iter()
            .filter_map(|effect| match effect {
                Effect::Cache { operation } => Some(operation),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_created_branch() -> anyhow::Result<()> {
        let harness = Harness::new(environment(chain(Some(3), 4, 6), &[("feature-x", 6)]));
        let push = push(vec![change(None, Some(6), "refs/heads/feature-x", 0)], &[]);
        let ctx = Context {
            push: &push,
            services: &harness.services,
            settings: &harness.settings,
        };

        let processor = BranchChangeProcessor::new(&ctx, &push.changes[0], None).await;
        assert!(processor.creating);
        assert!(!processor.updating);
        assert!(!processor.default_branch);
        assert_eq!(processor.commit_window().await?.ids(), vec![rev(4), rev(5), rev(6)]);

        let outcome = processor.process(ALL).await;
        assert!(outcome.failures.is_empty());
        assert_eq!(outcome.pipeline_requests, 1);

        let recorder = harness.recorder();
        let pipelines = recorder.pipelines();
        assert_eq!(pipelines.len(), 1);
        assert_eq!(pipelines[0].before, BLANK_SHA);
        assert_eq!(pipelines[0].after, rev(6).to_string());
        assert_eq!(pipelines[0].checkout_sha, Some(rev(6)));

        let events = recorder.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].total_commits_count, 3);
        assert_eq!(events[0].commits.len(), 1);
        assert_eq!(events[0].commits[0].id, rev(6));
        assert!(events[0].commits[0].added.is_empty());

        let hooks: Vec<usize> = recorder
            .effects()
            .into_iter()
            .filter_map(|effect| match effect {
                Effect::Hooks { name, payload } => {
                    assert_eq!(name, HookName::Push);
                    Some(payload.commits.len())
                }
                _ => None,
            })
            .collect();
        assert_eq!(hooks, vec![3]);

        assert_eq!(jobs(recorder), vec!["notify_agents", "update_merge_requests"]);
        assert_eq!(
            cache_operations(recorder),
            vec![
                CacheOperation::AfterPushCommit {
                    branch: "feature-x".into()
                },
                CacheOperation::AfterCreateBranch {
                    expire_cache: false
                },
            ]
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_created_default_branch() -> anyhow::Result<()> {
        let harness = Harness::new(Environment {
            repository: RepositoryFixture {
                commits: chain(None, 1, 150),
                branches: vec![(String::from("main"), rev(150))].into_iter().collect(),
                ..RepositoryFixture::default()
            },
            ..Environment::default()
        });
        let push = push(vec![change(None, Some(150), "refs/heads/main", 0)], &[]);
        let ctx = Context {
            push: &push,
            services: &harness.services,
            settings: &harness.settings,
        };

        let processor = BranchChangeProcessor::new(&ctx, &push.changes[0], None).await;
        assert!(processor.creating);
        assert!(processor.default_branch);

        let window = processor.commit_window().await?;
        assert_eq!(window.len(), 100);
        assert!(window.overflowed());
        assert_eq!(window.commits()[0].id, rev(51));
        assert_eq!(processor.commit_count(&window).await?, 150);

        let outcome = processor.process(ALL).await;
        assert!(outcome.failures.is_empty());

        let recorder = harness.recorder();
        assert_eq!(recorder.events()[0].total_commits_count, 150);
        assert_eq!(
            jobs(recorder),
            vec![
                "notify_agents",
                "initialize_default_branch",
                "update_merge_requests",
                "detect_repository_languages",
                "record_target_platforms",
            ]
        );
        assert_eq!(recorder.tracking(OVERFLOW_TRACKING_EVENT).len(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_updated_default_branch() -> anyhow::Result<()> {
        let ci_commit = commit(
            4,
            &[3],
            "Update CI",
            vec![
                PathChange::modified(".gitlab-ci.yml"),
                PathChange::added("README.md"),
            ],
        );
        let merge_commit = commit(
            5,
            &[4, 3],
            "Merge branch 'ci'",
            vec![PathChange::modified(".gitlab-ci.yml")],
        );
        let harness = Harness::new(environment(vec![ci_commit, merge_commit], &[]));
        let push = push(vec![change(Some(3), Some(5), "refs/heads/main", 0)], &[]);
        let ctx = Context {
            push: &push,
            services: &harness.services,
            settings: &harness.settings,
        };

        let processor = BranchChangeProcessor::new(&ctx, &push.changes[0], None).await;
        assert!(processor.updating);

        let outcome = processor.process(ALL).await;
        assert!(outcome.failures.is_empty());

        let recorder = harness.recorder();
        assert_eq!(
            recorder.jobs()[0],
            Job::InvalidateProjectCache {
                project_id: push.project.id,
                file_types: vec![FileType::GitlabCi, FileType::Readme],
            }
        );
        assert!(cache_operations(recorder).contains(&CacheOperation::CopyGitattributes {
            full_ref: "refs/heads/main".into()
        }));

        assert!(recorder.jobs().contains(&Job::RecordTargetPlatforms {
            project_id: push.project.id
        }));

        // The merge commit does not count as a CI configuration change.
        let tracked = recorder.tracking(CI_CONFIG_TRACKING_EVENT);
        assert_eq!(tracked.len(), 1);
        assert_eq!(tracked[0]["commit"], rev(4).to_string());

        Ok(())
    }

    #[tokio::test]
    async fn test_updated_branch_overflow() -> anyhow::Result<()> {
        let harness = Harness::new(environment(chain(Some(3), 4, 153), &[]));
        let push = push(vec![change(Some(3), Some(153), "refs/heads/main", 0)], &[]);
        let ctx = Context {
            push: &push,
            services: &harness.services,
            settings: &harness.settings,
        };

        let processor = BranchChangeProcessor::new(&ctx, &push.changes[0], None).await;
        let window = processor.commit_window().await?;
        assert_eq!(window.len(), 100);
        assert!(window.overflowed());
        assert_eq!(window.commits()[0].id, rev(54));
        assert_eq!(window.latest().map(|c| c.id.clone()), Some(rev(153)));
        assert_eq!(processor.commit_count(&window).await?, 101);

        processor.process(ALL).await;
        let tracked = harness.recorder().tracking(OVERFLOW_TRACKING_EVENT);
        assert_eq!(tracked.len(), 1);
        assert_eq!(tracked[0]["ref"], "refs/heads/main");

        Ok(())
    }

    #[tokio::test]
    async fn test_removed_branch() -> anyhow::Result<()> {
        let harness = Harness::new(environment(chain(Some(3), 4, 5), &[("old-feature", 5)]));
        let push = push(vec![change(Some(5), None, "refs/heads/old-feature", 0)], &[]);
        let ctx = Context {
            push: &push,
            services: &harness.services,
            settings: &harness.settings,
        };

        let processor = BranchChangeProcessor::new(&ctx, &push.changes[0], None).await;
        assert!(processor.removing);
        assert!(!processor.creating);
        assert!(processor.commit_window().await?.is_empty());

        let outcome = processor.process(ALL).await;
        assert!(outcome.failures.is_empty());
        assert_eq!(outcome.pipeline_requests, 0);

        let recorder = harness.recorder();
        assert!(recorder.pipelines().is_empty());
        let events = recorder.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].after, BLANK_SHA);
        assert!(events[0].commits.is_empty());

        assert_eq!(
            jobs(recorder),
            vec![
                "notify_agents",
                "stop_environments",
                "unlock_artifacts",
                "update_merge_requests",
            ]
        );
        assert_eq!(
            cache_operations(recorder),
            vec![
                CacheOperation::AfterPushCommit {
                    branch: "old-feature".into()
                },
                CacheOperation::AfterRemoveBranch {
                    expire_cache: false
                },
            ]
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_cross_references_skip_upstream_commits() -> anyhow::Result<()> {
        let commits = vec![
            commit(4, &[3], "Fixes #1", vec![]),
            commit(5, &[4], "Refs group/other!2", vec![]),
            commit(6, &[5], "No references", vec![]),
        ];
        let mut env = environment(commits.clone(), &[("feature", 6)]);
        env.fork_upstream = Some(RepositoryFixture {
            commits: vec![commits[0].clone()],
            ..RepositoryFixture::default()
        });
        let harness = Harness::new(env);
        let push = push(vec![change(None, Some(6), "refs/heads/feature", 0)], &[]);
        let ctx = Context {
            push: &push,
            services: &harness.services,
            settings: &harness.settings,
        };

        BranchChangeProcessor::new(&ctx, &push.changes[0], None)
            .await
            .process(ChangeFlags::default())
            .await;

        let processed: Vec<Revision> = harness
            .recorder()
            .jobs()
            .into_iter()
            .filter_map(|job| match job {
                Job::ProcessCommit {
                    commit,
                    default_branch,
                    ..
                } => {
                    assert!(!default_branch);
                    Some(commit.id)
                }
                _ => None,
            })
            .collect();
        assert_eq!(processed, vec![rev(5)]);

        Ok(())
    }

    fn sync_jobs(recorder: &Recorder) -> Vec<(Option<String>, usize, Option<Duration>)> {
        recorder
            .effects()
            .into_iter()
            .filter_map(|effect| match effect {
                Effect::Job {
                    job: Job::SyncIssueTrackerBranch { branch, shas, .. },
                    delay,
                } => Some((branch, shas.len(), delay)),
                _ => None,
            })
            .collect()
    }

    fn keyed_commits() -> Vec<Commit> {
        (4..=48)
            .map(|n| commit(n, &[n - 1], &format!("PROJ-{} change", n), vec![]))
            .collect()
    }

    #[tokio::test]
    async fn test_issue_tracker_batches() -> anyhow::Result<()> {
        let mut env = environment(keyed_commits(), &[("feature", 48)]);
        env.issue_tracker = Some(vec![]);
        let harness = Harness::new(env);
        let push = push(vec![change(Some(3), Some(48), "refs/heads/feature", 0)], &[]);
        let ctx = Context {
            push: &push,
            services: &harness.services,
            settings: &harness.settings,
        };

        BranchChangeProcessor::new(&ctx, &push.changes[0], None)
            .await
            .process(ChangeFlags::default())
            .await;

        assert_eq!(
            sync_jobs(harness.recorder()),
            vec![
                (None, 20, Some(Duration::ZERO)),
                (None, 20, Some(Duration::from_secs(10))),
                (None, 5, Some(Duration::from_secs(20))),
            ]
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_issue_tracker_without_batching() -> anyhow::Result<()> {
        let mut env = environment(keyed_commits(), &[("feature", 48)]);
        env.issue_tracker = Some(vec![]);
        let mut harness = Harness::new(env);
        harness.settings.issue_tracker_batching = false;
        let push = push(vec![change(Some(3), Some(48), "refs/heads/feature", 0)], &[]);
        let ctx = Context {
            push: &push,
            services: &harness.services,
            settings: &harness.settings,
        };

        BranchChangeProcessor::new(&ctx, &push.changes[0], None)
            .await
            .process(ChangeFlags::default())
            .await;

        assert_eq!(sync_jobs(harness.recorder()), vec![(None, 45, None)]);

        Ok(())
    }

    #[tokio::test]
    async fn test_issue_tracker_branch() -> anyhow::Result<()> {
        let mut env = environment(chain(Some(3), 4, 5), &[("PROJ-1-login", 5), ("gone", 5)]);
        env.issue_tracker = Some(vec!["gone".into()]);
        let harness = Harness::new(env);
        let push = push(
            vec![
                change(None, Some(5), "refs/heads/PROJ-1-login", 0),
                change(Some(5), None, "refs/heads/gone", 1),
            ],
            &[],
        );
        let ctx = Context {
            push: &push,
            services: &harness.services,
            settings: &harness.settings,
        };

        for change in push.changes.iter() {
            BranchChangeProcessor::new(&ctx, change, None)
                .await
                .process(ChangeFlags::default())
                .await;
        }

        let recorder = harness.recorder();
        assert_eq!(
            sync_jobs(recorder),
            vec![(Some("PROJ-1-login".into()), 0, None)]
        );
        assert!(recorder.jobs().contains(&Job::RemoveIssueTrackerBranch {
            project_id: push.project.id,
            branch: "gone".into(),
        }));

        Ok(())
    }

    #[tokio::test]
    async fn test_no_issue_tracker() -> anyhow::Result<()> {
        let harness = Harness::new(environment(keyed_commits(), &[("feature", 48)]));
        let push = push(vec![change(Some(3), Some(48), "refs/heads/feature", 0)], &[]);
        let ctx = Context {
            push: &push,
            services: &harness.services,
            settings: &harness.settings,
        };

        BranchChangeProcessor::new(&ctx, &push.changes[0], None)
            .await
            .process(ChangeFlags::default())
            .await;

        assert!(sync_jobs(harness.recorder()).is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_signatures() -> anyhow::Result<()> {
        let mut env = environment(chain(Some(3), 4, 6), &[("feature", 6)]);
        env.repository.signed = vec![rev(5), rev(6)];
        env.signatures = SignaturesFixture {
            gpg: vec![rev(4)],
            x509: vec![rev(5)],
            ssh: vec![],
        };
        let harness = Harness::new(env);
        let push = push(vec![change(None, Some(6), "refs/heads/feature", 0)], &[]);
        let ctx = Context {
            push: &push,
            services: &harness.services,
            settings: &harness.settings,
        };

        BranchChangeProcessor::new(&ctx, &push.changes[0], None)
            .await
            .process(ChangeFlags::default())
            .await;

        // 4 and 5 each have a verified signature somewhere; only 6 is
        // unverified everywhere and signed.
        assert!(harness.recorder().jobs().contains(&Job::CreateCommitSignatures {
            project_id: push.project.id,
            shas: vec![rev(6)],
        }));

        Ok(())
    }

    #[tokio::test]
    async fn test_merge_request_branches() -> anyhow::Result<()> {
        let harness = Harness::new(environment(chain(Some(3), 4, 4), &[("feature", 4)]));
        let push = push(vec![change(Some(3), Some(4), "refs/heads/feature", 0)], &[]);
        let ctx = Context {
            push: &push,
            services: &harness.services,
            settings: &harness.settings,
        };
        let unrelated: HashSet<String> = vec!["other".to_string()].into_iter().collect();

        BranchChangeProcessor::new(&ctx, &push.changes[0], Some(&unrelated))
            .await
            .process(ChangeFlags::default())
            .await;

        assert!(!jobs(harness.recorder()).contains(&"update_merge_requests"));

        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_branch_is_created() -> anyhow::Result<()> {
        // The old revision is set, but the repository has no such branch.
        let harness = Harness::new(environment(chain(Some(3), 4, 4), &[]));
        let push = push(vec![change(Some(3), Some(4), "refs/heads/feature", 0)], &[]);
        let ctx = Context {
            push: &push,
            services: &harness.services,
            settings: &harness.settings,
        };

        let processor = BranchChangeProcessor::new(&ctx, &push.changes[0], None).await;
        assert!(processor.creating);
        assert!(!processor.updating);

        Ok(())
    }

    #[tokio::test]
    async fn test_window_failure() -> anyhow::Result<()> {
        let harness = Harness::new(environment(vec![], &[]));
        let push = push(vec![change(Some(3), Some(99), "refs/heads/main", 0)], &[]);
        let ctx = Context {
            push: &push,
            services: &harness.services,
            settings: &harness.settings,
        };

        let outcome = BranchChangeProcessor::new(&ctx, &push.changes[0], None)
            .await
            .process(ALL)
            .await;

        // Updating the default branch needs the commits to invalidate caches.
        let failed: Vec<Step> = outcome.failures.iter().map(|failure| failure.step).collect();
        assert_eq!(failed, vec![Step::Event, Step::Hooks, Step::CacheInvalidation]);
        assert_eq!(outcome.failures[0].index, Some(0));
        assert_eq!(outcome.failures[0].full_ref.as_deref(), Some("refs/heads/main"));

        // The pipeline and the notification do not depend on the commits.
        assert_eq!(outcome.pipeline_requests, 1);
        assert!(jobs(harness.recorder()).contains(&"notify_agents"));
        assert!(!jobs(harness.recorder()).contains(&"invalidate_project_cache"));

        // Other branches have no caches to invalidate.
        let harness = Harness::new(environment(vec![], &[("feature", 3)]));
        let push = crate::test_utils::push(vec![change(Some(3), Some(99), "refs/heads/feature", 0)], &[]);
        let ctx = Context {
            push: &push,
            services: &harness.services,
            settings: &harness.settings,
        };

        let outcome = BranchChangeProcessor::new(&ctx, &push.changes[0], None)
            .await
            .process(ALL)
            .await;

        let failed: Vec<Step> = outcome.failures.iter().map(|failure| failure.step).collect();
        assert_eq!(failed, vec![Step::Event, Step::Hooks]);

        Ok(())
    }

    #[tokio::test]
    async fn test_failures_are_isolated() -> anyhow::Result<()> {
        let recorder = Recorder::new();
        recorder.fail(Surface::Pipelines);
        recorder.fail(Surface::Events);
        let harness = Harness::with_recorder(
            environment(chain(Some(3), 4, 4), &[("feature", 4)]),
            recorder,
        );
        let push = push(vec![change(Some(3), Some(4), "refs/heads/feature", 0)], &[]);
        let ctx = Context {
            push: &push,
            services: &harness.services,
            settings: &harness.settings,
        };

        let outcome = BranchChangeProcessor::new(&ctx, &push.changes[0], None)
            .await
            .process(ALL)
            .await;

        let failed: Vec<Step> = outcome.failures.iter().map(|failure| failure.step).collect();
        assert_eq!(failed, vec![Step::Event, Step::Pipeline]);
        assert_eq!(outcome.pipeline_requests, 0);

        let recorder = harness.recorder();
        assert!(recorder
            .effects()
            .iter()
            .any(|effect| matches!(effect, Effect::Hooks { .. })));
        assert_eq!(jobs(recorder), vec!["notify_agents", "update_merge_requests"]);

        Ok(())
    }

    #[tokio::test]
    async fn test_unpersisted_pipeline() -> anyhow::Result<()> {
        let harness = Harness::with_recorder(
            environment(vec![], &[]),
            Recorder::new().without_persisted_pipelines(),
        );
        let push = push(
            vec![change(Some(2), Some(3), "refs/heads/main", 0)],
            &["ci.variable=DEPLOY=1"],
        );
        let ctx = Context {
            push: &push,
            services: &harness.services,
            settings: &harness.settings,
        };

        let outcome = BranchChangeProcessor::new(&ctx, &push.changes[0], None)
            .await
            .process(ChangeFlags {
                create_pipelines: true,
                ..ChangeFlags::default()
            })
            .await;

        assert!(outcome.failures.is_empty());
        assert_eq!(outcome.pipeline_requests, 1);

        let pipelines = harness.recorder().pipelines();
        assert_eq!(pipelines[0].variables_attributes.len(), 1);
        assert_eq!(pipelines[0].variables_attributes[0].key, "DEPLOY");
        assert_eq!(pipelines[0].variables_attributes[0].secret_value, "1");

        Ok(())
    }
}
