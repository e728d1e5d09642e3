use std::{str::FromStr, sync::Arc};

use chrono::{TimeZone, Utc};
use git_push_hooks_services::Services;
use git_push_hooks_state::{Environment, Recorder, RepositoryFixture, State};
use push_ref::{
    Actor, ActorId, Commit, Identity, PathChange, Project, ProjectId, Push, PushContext,
    PushOptions, ReferenceChange, Revision,
};

use crate::Settings;

pub(crate) fn rev(n: usize) -> Revision {
    Revision::from_str(&format!("{:040x}", n)).unwrap()
}

/// A commit whose ID and timestamp are both derived from `n`.
pub(crate) fn commit(n: usize, parents: &[usize], message: &str, paths: Vec<PathChange>) -> Commit {
    Commit {
        id: rev(n),
        parent_ids: parents.iter().map(|parent| rev(*parent)).collect(),
        message: message.into(),
        author: Identity::new("Jane Doe", "jane@example.com"),
        authored_date: Utc.timestamp_opt(1_600_000_000 + n as i64, 0).unwrap(),
        changed_paths: paths,
    }
}

/// Commits `first..=last`, each the parent of the next. `first` has the
/// given parent, if any.
pub(crate) fn chain(parent: Option<usize>, first: usize, last: usize) -> Vec<Commit> {
    (first..=last)
        .map(|n| {
            let parents: Vec<usize> = if n == first {
                parent.into_iter().collect()
            } else {
                vec![n - 1]
            };
            commit(
                n,
                &parents,
                &format!("commit {}", n),
                vec![PathChange::added(format!("file-{}.txt", n))],
            )
        })
        .collect()
}

pub(crate) fn actor() -> Actor {
    Actor {
        id: ActorId::from(7),
        username: "jane".into(),
        name: "Jane Doe".into(),
        email: "jane@example.com".into(),
    }
}

pub(crate) fn project() -> Project {
    Project {
        id: ProjectId::from(1),
        path_with_namespace: "group/project".into(),
        default_branch: Some("main".into()),
        ci_config_path: None,
        fork_source: None,
    }
}

pub(crate) fn change(old: Option<usize>, new: Option<usize>, full_ref: &str, index: usize) -> ReferenceChange {
    ReferenceChange::new(full_ref, old.map(rev), new.map(rev), index).unwrap()
}

pub(crate) fn push(changes: Vec<ReferenceChange>, options: &[&str]) -> Push {
    Push::new(
        actor(),
        project(),
        changes,
        PushOptions::parse(options),
        PushContext {
            correlation_id: "test-correlation-id".into(),
        },
    )
    .unwrap()
}

/// In-memory collaborators that record every effect, jobs included, in a
/// single ordered log.
pub(crate) struct Harness {
    pub services: Services,
    pub state: State,
    pub settings: Settings,
}

impl Harness {
    pub fn new(environment: Environment) -> Self {
        Self::with_recorder(environment, Recorder::new())
    }

    pub fn with_recorder(environment: Environment, recorder: Recorder) -> Self {
        let (services, state) = environment.services(recorder.clone(), Arc::new(recorder));

        Self {
            services,
            state,
            settings: Settings::default(),
        }
    }

    pub fn recorder(&self) -> &Recorder {
        &self.state.recorder
    }
}

/// `main` holds commits 1 to 3, plus whatever else is given.
pub(crate) fn environment(mut commits: Vec<Commit>, branches: &[(&str, usize)]) -> Environment {
    commits.extend(chain(None, 1, 3));

    let mut repository = RepositoryFixture {
        commits,
        ..RepositoryFixture::default()
    };
    repository.branches.insert("main".into(), rev(3));
    for (name, n) in branches {
        repository.branches.insert((*name).into(), rev(*n));
    }

    Environment {
        repository,
        ..Environment::default()
    }
}
