use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context;
use flexi_logger::Logger;
use git_push_hooks::{
    PushOrchestrator, PushSummary, Settings, Wiki, WikiChangeProcessor, WikiServices, WikiSummary,
};
use git_push_hooks_services::queue::{self, QueuedJob};
use git_push_hooks_state::{
    Effect, Environment, InMemoryRepository, RepositoryFixture, State, Wiki as WikiState,
    WikiFixture,
};
use push_ref::{Push, ReferenceChange};
use serde::{Deserialize, Serialize};
use structopt::StructOpt;
use tokio::io::AsyncWriteExt;

#[derive(Debug, StructOpt)]
#[structopt(
    about = "Replays a recorded push against in-memory collaborators. Provide a JSON fixture describing the push and the project it was made to, and the resulting effects are output as JSON on STDOUT."
)]
struct Opt {
    #[structopt(flatten)]
    settings: Settings,

    #[structopt(parse(from_os_str), help = "push fixture to replay")]
    fixture: PathBuf,
}

/// A push, the project state it is replayed against, and optionally a push
/// to the project's wiki.
#[derive(Debug, Deserialize)]
struct Fixture {
    push: Push,

    #[serde(default)]
    environment: Environment,

    #[serde(default)]
    wiki: Option<WikiFixtures>,
}

#[derive(Debug, Deserialize)]
struct WikiFixtures {
    default_branch: String,

    #[serde(default)]
    repository: RepositoryFixture,

    #[serde(default)]
    pages: WikiFixture,

    changes: Vec<ReferenceChange>,
}

#[derive(Debug, Serialize)]
struct Report {
    summary: PushSummary,
    effects: Vec<Effect>,
    jobs: Vec<QueuedJob>,
    wiki: Option<WikiSummary>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments.
    let opt = Opt::from_args();

    // Set up logging. Log lines go to STDERR, leaving STDOUT for the report.
    let _logger = Logger::try_with_env_or_str("info")?.start()?;

    let fixture = load_fixture(&opt.fixture).await?;
    let report = replay(fixture, &opt.settings).await;

    let mut stdout = tokio::io::stdout();
    stdout
        .write_all(serde_json::to_string_pretty(&report)?.as_bytes())
        .await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await?;

    Ok(())
}

async fn load_fixture(path: &Path) -> anyhow::Result<Fixture> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("cannot read fixture {}", path.display()))?;

    serde_json::from_slice(&data)
        .with_context(|| format!("cannot parse fixture {}", path.display()))
}

async fn replay(fixture: Fixture, settings: &Settings) -> Report {
    let (queue, worker) = queue::new();
    let (services, state) = fixture
        .environment
        .services(Default::default(), Arc::new(queue));

    log::debug!(
        "replaying {} changes to {}",
        fixture.push.changes.len(),
        fixture.push.project.path_with_namespace
    );
    let summary = PushOrchestrator::new(&services, settings)
        .process(&fixture.push)
        .await;
    log::info!(
        "processed {} changes: {} pipeline requests, {} failed steps",
        summary.changes_processed,
        summary.pipeline_requests,
        summary.failures.len()
    );

    let wiki = match fixture.wiki {
        Some(wiki) => Some(replay_wiki(wiki, &fixture.push, &state, settings).await),
        None => None,
    };

    // The worker only finishes once the last queue handle is gone.
    drop(services);
    let jobs = worker.join().await;

    Report {
        summary,
        effects: state.recorder.effects(),
        jobs,
        wiki,
    }
}

async fn replay_wiki(
    fixtures: WikiFixtures,
    push: &Push,
    state: &State,
    settings: &Settings,
) -> WikiSummary {
    let wiki = Wiki {
        project_id: push.project.id,
        default_branch: fixtures.default_branch,
    };
    let services = WikiServices {
        repository: Arc::new(InMemoryRepository::from_fixture(fixtures.repository)),
        store: Arc::new(WikiState::from_fixture(fixtures.pages)),
        events: Arc::new(state.recorder.clone()),
        housekeeping: Arc::new(state.housekeeping.clone()),
        leases: Arc::new(state.leases.clone()),
    };

    WikiChangeProcessor::new(&wiki, &services, settings)
        .process(&push.actor, &fixtures.changes)
        .await
}
