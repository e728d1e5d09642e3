use std::sync::Arc;

use git_push_hooks_services::{
    EventSink, HousekeepingStore, HousekeepingTarget, MutualExclusionLease, RepositoryService,
    TrackingAttributes, WikiAction, WikiPage, WikiStore,
};
use push_ref::{Actor, PathChange, PathOperation, ProjectId, RefType, ReferenceChange, Revision};
use serde::Serialize;

use crate::{housekeeping::HousekeepingService, Error, Settings, Step, StepFailure};

/// The most page changes processed for a single push.
pub const MAX_CHANGES: usize = 100;

const WIKI_PAGE_TRACKING_EVENT: &str = "wiki_page_event";

// Markup formats a wiki page may be written in.
const MARKUP_EXTENSIONS: &[&str] = &[
    "adoc", "asciidoc", "asc", "creole", "markdown", "md", "mdown", "mediawiki", "mkd", "mkdn",
    "org", "pod", "rdoc", "rst", "textile", "wiki",
];

/// A project's wiki repository.
#[derive(Debug, Clone)]
pub struct Wiki {
    pub project_id: ProjectId,
    pub default_branch: String,
}

/// The collaborators a wiki push is processed against.
#[derive(Clone)]
pub struct WikiServices {
    pub repository: Arc<dyn RepositoryService>,
    pub store: Arc<dyn WikiStore>,
    pub events: Arc<dyn EventSink>,
    pub housekeeping: Arc<dyn HousekeepingStore>,
    pub leases: Arc<dyn MutualExclusionLease>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct WikiSummary {
    pub events_recorded: usize,
    pub failures: Vec<StepFailure>,
}

// A path level change that resolved to a page.
#[derive(Debug)]
struct PageChange {
    page: WikiPage,
    action: WikiAction,
    fingerprint: Revision,
}

/// Turns pushes to a wiki repository into page events.
pub struct WikiChangeProcessor<'a> {
    wiki: &'a Wiki,
    services: &'a WikiServices,
    settings: &'a Settings,
}

impl<'a> WikiChangeProcessor<'a> {
    pub fn new(wiki: &'a Wiki, services: &'a WikiServices, settings: &'a Settings) -> Self {
        Self {
            wiki,
            services,
            settings,
        }
    }

    pub async fn process(&self, actor: &Actor, changes: &[ReferenceChange]) -> WikiSummary {
        let mut summary = WikiSummary::default();

        if let Err(err) = self.services.store.after_post_receive().await {
            summary.record(None, Step::WikiPostReceive, err.into());
        }

        let mut page_changes = Vec::new();
        let mut budget = MAX_CHANGES;
        for change in changes.iter().filter(|change| self.on_default_branch(change)) {
            match self.page_changes(change, &mut budget).await {
                Ok(mut pages) => page_changes.append(&mut pages),
                Err(err) => summary.record(Some(change), Step::WikiPage, err),
            }
        }

        for page_change in page_changes {
            match self.create_event(actor, &page_change).await {
                Ok(true) => summary.events_recorded += 1,
                Ok(false) => log::trace!(
                    "page {} already has an event at {}",
                    page_change.page.slug,
                    page_change.fingerprint.short()
                ),
                Err(err) => summary.record(None, Step::WikiPage, err),
            }
        }

        if self.settings.wiki_housekeeping {
            let housekeeping = HousekeepingService::new(
                self.services.housekeeping.as_ref(),
                self.services.leases.as_ref(),
                &self.settings.housekeeping,
            );
            if let Err(err) = housekeeping
                .perform(HousekeepingTarget::Wiki(self.wiki.project_id))
                .await
            {
                summary.record(None, Step::Housekeeping, err);
            }
        }

        summary
    }

    fn on_default_branch(&self, change: &ReferenceChange) -> bool {
        change.ref_type() == RefType::Branch
            && change.name() == self.wiki.default_branch
            && change.new_revision().is_some()
    }

    /// Resolves the pages a change touched. Every page lookup is taken from
    /// `budget`, and nothing is looked up once it runs out.
    async fn page_changes(
        &self,
        change: &ReferenceChange,
        budget: &mut usize,
    ) -> Result<Vec<PageChange>, Error> {
        if *budget == 0 {
            log::debug!(
                "wiki push already looked up {} pages; skipping {}",
                MAX_CHANGES,
                change.full_ref()
            );
            return Ok(Vec::new());
        }

        let new = match change.new_revision() {
            Some(new) => new,
            None => return Ok(Vec::new()),
        };
        let diffs = self
            .services
            .repository
            .raw_diffs_between(change.old(), new)
            .await?;

        let mut pages = Vec::new();
        for diff in diffs.iter() {
            // Deleted pages only exist at the old revision.
            let (path, revision) = match (diff.operation, change.old()) {
                (PathOperation::Deleted, Some(old)) => (diff.old_path.as_deref(), old),
                (PathOperation::Deleted, None) => continue,
                _ => (diff.new_path.as_deref(), new),
            };
            let slug = match path.and_then(strip_markup_extension) {
                Some(slug) => slug,
                None => continue,
            };

            if *budget == 0 {
                log::debug!(
                    "wiki push changed more than {} pages; the rest are not recorded",
                    MAX_CHANGES
                );
                break;
            }
            *budget -= 1;

            if let Some(page) = self.services.store.find_page(slug, revision).await? {
                pages.push(PageChange {
                    page,
                    action: action_for(diff),
                    fingerprint: new.clone(),
                });
            }
        }

        Ok(pages)
    }

    async fn create_event(&self, actor: &Actor, change: &PageChange) -> Result<bool, Error> {
        let meta = self.services.store.find_or_create_meta(&change.page).await?;
        if !self
            .services
            .store
            .record_event_once(&meta, change.action, &change.fingerprint)
            .await?
        {
            return Ok(false);
        }

        let attributes: TrackingAttributes = [
            ("action", change.action.to_string()),
            ("page", meta.canonical_slug.clone()),
            ("page_id", meta.id.to_string()),
            ("actor_id", actor.id.to_string()),
            ("fingerprint", change.fingerprint.to_string()),
        ]
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect();
        self.services
            .events
            .record_tracking(WIKI_PAGE_TRACKING_EVENT, &attributes)
            .await?;

        Ok(true)
    }
}

impl WikiSummary {
    fn record(&mut self, change: Option<&ReferenceChange>, step: Step, err: Error) {
        log::warn!("wiki {} step failed: {}", step, err);
        self.failures.push(StepFailure::new(change, step, &err));
    }
}

fn action_for(diff: &PathChange) -> WikiAction {
    match diff.operation {
        PathOperation::Added => WikiAction::Created,
        PathOperation::Deleted => WikiAction::Destroyed,
        _ => WikiAction::Updated,
    }
}

/// Returns the page slug for a path, or `None` if the path is not a page.
fn strip_markup_extension(path: &str) -> Option<&str> {
    let (slug, extension) = path.rsplit_once('.')?;
    if slug.is_empty() || slug.ends_with('/') {
        return None;
    }

    MARKUP_EXTENSIONS
        .iter()
        .any(|known| known.eq_ignore_ascii_case(extension))
        .then(|| slug)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use git_push_hooks_services::{Error as ServiceError, WikiPageMeta};
    use git_push_hooks_state::{
        Housekeeping, InMemoryRepository, Leases, Recorder, RepositoryFixture, Wiki as WikiState,
        WikiFixture,
    };
    use push_ref::BLANK_SHA;

    use super::*;
    use crate::test_utils::{actor, commit, rev};

    #[test]
    fn test_strip_markup_extension() {
        assert_eq!(strip_markup_extension("home.md"), Some("home"));
        assert_eq!(strip_markup_extension("docs/setup.AsciiDoc"), Some("docs/setup"));
        assert_eq!(strip_markup_extension("image.png"), None);
        assert_eq!(strip_markup_extension("README"), None);
        assert_eq!(strip_markup_extension(".md"), None);
    }

    fn page(slug: &str, revision: usize) -> WikiPage {
        WikiPage {
            slug: slug.into(),
            title: slug.into(),
            format: "markdown".into(),
            revision: rev(revision),
        }
    }

    struct Harness {
        wiki: Wiki,
        services: WikiServices,
        store: WikiState,
        recorder: Recorder,
        housekeeping: Housekeeping,
    }

    // 1 adds home and setup; 2 edits home, deletes setup and adds an image;
    // 3 adds two pages on another branch.
    fn harness() -> Harness {
        let repository = InMemoryRepository::from_fixture(RepositoryFixture {
            commits: vec![
                commit(
                    1,
                    &[],
                    "init",
                    vec![PathChange::added("home.md"), PathChange::added("setup.md")],
                ),
                commit(
                    2,
                    &[1],
                    "edit",
                    vec![
                        PathChange::modified("home.md"),
                        PathChange::deleted("setup.md"),
                        PathChange::added("logo.png"),
                    ],
                ),
                commit(3, &[1], "draft", vec![PathChange::added("draft.md")]),
            ],
            ..RepositoryFixture::default()
        });
        let store = WikiState::from_fixture(WikiFixture {
            pages: vec![page("home", 1), page("setup", 1), page("home", 2), page("draft", 3)],
        });
        let recorder = Recorder::new();
        let housekeeping = Housekeeping::new();

        Harness {
            wiki: Wiki {
                project_id: ProjectId::from(1),
                default_branch: "main".into(),
            },
            services: WikiServices {
                repository: Arc::new(repository),
                store: Arc::new(store.clone()),
                events: Arc::new(recorder.clone()),
                housekeeping: Arc::new(housekeeping.clone()),
                leases: Arc::new(Leases::new()),
            },
            store,
            recorder,
            housekeeping,
        }
    }

    #[tokio::test]
    async fn test_process() -> anyhow::Result<()> {
        let harness = harness();
        let settings = Settings::default();
        let processor = WikiChangeProcessor::new(&harness.wiki, &harness.services, &settings);
        let changes = vec![
            ReferenceChange::from_raw(rev(1).as_str(), rev(2).as_str(), "refs/heads/main", 0)?,
            ReferenceChange::from_raw(BLANK_SHA, rev(3).as_str(), "refs/heads/drafts", 1)?,
        ];

        let summary = processor.process(&actor(), &changes).await;
        assert!(summary.failures.is_empty());
        assert_eq!(summary.events_recorded, 2);
        assert_eq!(harness.store.post_receives().await, 1);

        let events = harness.recorder.tracking(WIKI_PAGE_TRACKING_EVENT);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0]["page"], "home");
        assert_eq!(events[0]["action"], "updated");
        assert_eq!(events[1]["page"], "setup");
        assert_eq!(events[1]["action"], "destroyed");
        assert_eq!(events[1]["fingerprint"], rev(2).to_string());

        // Running the same push again records nothing new.
        let summary = processor.process(&actor(), &changes).await;
        assert_eq!(summary.events_recorded, 0);
        assert_eq!(harness.recorder.tracking(WIKI_PAGE_TRACKING_EVENT).len(), 2);
        assert_eq!(harness.store.events().await.len(), 2);
        assert_eq!(
            harness
                .housekeeping
                .push_count(HousekeepingTarget::Wiki(ProjectId::from(1)))
                .await,
            2
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_created_wiki() -> anyhow::Result<()> {
        let harness = harness();
        let settings = Settings {
            wiki_housekeeping: false,
            ..Settings::default()
        };
        let processor = WikiChangeProcessor::new(&harness.wiki, &harness.services, &settings);
        let changes = vec![ReferenceChange::from_raw(
            BLANK_SHA,
            rev(1).as_str(),
            "refs/heads/main",
            0,
        )?];

        let summary = processor.process(&actor(), &changes).await;
        assert_eq!(summary.events_recorded, 2);

        let actions: Vec<WikiAction> = harness
            .store
            .events()
            .await
            .into_iter()
            .map(|event| event.action)
            .collect();
        assert_eq!(actions, vec![WikiAction::Created, WikiAction::Created]);
        assert_eq!(
            harness
                .housekeeping
                .push_count(HousekeepingTarget::Wiki(ProjectId::from(1)))
                .await,
            0
        );

        Ok(())
    }

    // Counts the page lookups made against the wrapped store.
    #[derive(Clone)]
    struct CountingStore {
        inner: WikiState,
        lookups: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl WikiStore for CountingStore {
        async fn after_post_receive(&self) -> Result<(), ServiceError> {
            self.inner.after_post_receive().await
        }

        async fn find_page(
            &self,
            slug: &str,
            revision: &Revision,
        ) -> Result<Option<WikiPage>, ServiceError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.inner.find_page(slug, revision).await
        }

        async fn find_or_create_meta(&self, page: &WikiPage) -> Result<WikiPageMeta, ServiceError> {
            self.inner.find_or_create_meta(page).await
        }

        async fn record_event_once(
            &self,
            meta: &WikiPageMeta,
            action: WikiAction,
            fingerprint: &Revision,
        ) -> Result<bool, ServiceError> {
            self.inner.record_event_once(meta, action, fingerprint).await
        }
    }

    #[tokio::test]
    async fn test_page_changes_are_capped() -> anyhow::Result<()> {
        let slugs: Vec<String> = (0..MAX_CHANGES + 50)
            .map(|n| format!("page-{}", n))
            .collect();
        let repository = InMemoryRepository::from_fixture(RepositoryFixture {
            commits: vec![commit(
                1,
                &[],
                "import",
                slugs
                    .iter()
                    .map(|slug| PathChange::added(format!("{}.md", slug)))
                    .collect(),
            )],
            ..RepositoryFixture::default()
        });
        let store = CountingStore {
            inner: WikiState::from_fixture(WikiFixture {
                pages: slugs.iter().map(|slug| page(slug, 1)).collect(),
            }),
            lookups: Arc::default(),
        };
        let recorder = Recorder::new();

        let wiki = Wiki {
            project_id: ProjectId::from(1),
            default_branch: "main".into(),
        };
        let services = WikiServices {
            repository: Arc::new(repository),
            store: Arc::new(store.clone()),
            events: Arc::new(recorder.clone()),
            housekeeping: Arc::new(Housekeeping::new()),
            leases: Arc::new(Leases::new()),
        };
        let settings = Settings::default();
        let processor = WikiChangeProcessor::new(&wiki, &services, &settings);

        // A second change to the default branch finds the budget spent.
        let changes = vec![
            ReferenceChange::from_raw(BLANK_SHA, rev(1).as_str(), "refs/heads/main", 0)?,
            ReferenceChange::from_raw(BLANK_SHA, rev(1).as_str(), "refs/heads/main", 1)?,
        ];
        let summary = processor.process(&actor(), &changes).await;

        assert!(summary.failures.is_empty());
        assert_eq!(summary.events_recorded, MAX_CHANGES);
        assert_eq!(
            recorder.tracking(WIKI_PAGE_TRACKING_EVENT).len(),
            MAX_CHANGES
        );
        assert_eq!(store.lookups.load(Ordering::SeqCst), MAX_CHANGES);

        Ok(())
    }
}
