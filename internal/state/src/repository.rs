use std::{
    collections::{BTreeMap, HashMap, HashSet},
    str::FromStr,
    sync::Arc,
};

use async_trait::async_trait;
use git_push_hooks_services::{Error, RepositoryService};
use push_ref::{Commit, PathChange, PathOperation, Revision, Tag};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

const SERVICE: &str = "repository";

/// The serialised form of a repository: a commit graph plus refs.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RepositoryFixture {
    #[serde(default)]
    pub commits: Vec<Commit>,

    #[serde(default)]
    pub branches: BTreeMap<String, Revision>,

    #[serde(default)]
    pub tags: Vec<Tag>,

    /// Commits that carry a signature.
    #[serde(default)]
    pub signed: Vec<Revision>,
}

/// A repository backed by an in-memory commit graph.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRepository {
    store: Arc<RwLock<Store>>,
}

#[derive(Debug, Default)]
struct Store {
    commits: HashMap<Revision, Commit>,
    branches: BTreeMap<String, Revision>,
    tags: HashMap<String, Tag>,
    signed: HashSet<Revision>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fixture(fixture: RepositoryFixture) -> Self {
        let store = Store {
            commits: fixture
                .commits
                .into_iter()
                .map(|commit| (commit.id.clone(), commit))
                .collect(),
            branches: fixture.branches,
            tags: fixture
                .tags
                .into_iter()
                .map(|tag| (tag.name.clone(), tag))
                .collect(),
            signed: fixture.signed.into_iter().collect(),
        };

        Self {
            store: Arc::new(RwLock::new(store)),
        }
    }

    pub async fn add_commit(&self, commit: Commit) {
        self.store
            .write()
            .await
            .commits
            .insert(commit.id.clone(), commit);
    }

    pub async fn set_branch(&self, name: &str, revision: Revision) {
        self.store
            .write()
            .await
            .branches
            .insert(name.to_string(), revision);
    }

    pub async fn add_tag(&self, tag: Tag) {
        self.store.write().await.tags.insert(tag.name.clone(), tag);
    }

    pub async fn sign(&self, revision: Revision) {
        self.store.write().await.signed.insert(revision);
    }
}

impl Store {
    fn resolve(&self, name: &str) -> Option<Revision> {
        if let Some(revision) = self.branches.get(name) {
            return Some(revision.clone());
        }

        match Revision::from_str(name) {
            Ok(revision) if self.commits.contains_key(&revision) => Some(revision),
            _ => None,
        }
    }

    // Every commit reachable from tip, including tip itself.
    fn ancestors(&self, tip: &Revision) -> Result<HashSet<Revision>, Error> {
        if !self.commits.contains_key(tip) {
            return Err(Error::not_found(SERVICE, tip));
        }

        let mut seen = HashSet::new();
        let mut pending = vec![tip.clone()];
        while let Some(id) = pending.pop() {
            if !seen.insert(id.clone()) {
                continue;
            }
            if let Some(commit) = self.commits.get(&id) {
                pending.extend(commit.parent_ids.iter().cloned());
            }
        }

        Ok(seen)
    }

    // Oldest first; ties are broken by ID so that the order is stable.
    fn sorted(&self, ids: HashSet<Revision>) -> Vec<Commit> {
        let mut commits: Vec<Commit> = ids
            .iter()
            .filter_map(|id| self.commits.get(id))
            .cloned()
            .collect();
        commits.sort_by(|a, b| {
            a.authored_date
                .cmp(&b.authored_date)
                .then_with(|| a.id.cmp(&b.id))
        });
        commits
    }

    fn between(&self, from: Option<&str>, to: &Revision) -> Result<Vec<Commit>, Error> {
        let mut ids = self.ancestors(to)?;
        if let Some(from) = from {
            let base = self
                .resolve(from)
                .ok_or_else(|| Error::not_found(SERVICE, from))?;
            for id in self.ancestors(&base)? {
                ids.remove(&id);
            }
        }

        Ok(self.sorted(ids))
    }
}

#[async_trait]
impl RepositoryService for InMemoryRepository {
    async fn commits_since(
        &self,
        revision: &Revision,
        limit: usize,
    ) -> Result<Vec<Commit>, Error> {
        let mut commits = self.store.read().await.between(None, revision)?;
        commits.reverse();
        commits.truncate(limit);
        Ok(commits)
    }

    async fn commits_between(
        &self,
        from: &str,
        to: &Revision,
        limit: usize,
    ) -> Result<Vec<Commit>, Error> {
        let mut commits = self.store.read().await.between(Some(from), to)?;
        if commits.len() > limit {
            commits.drain(..commits.len() - limit);
        }
        Ok(commits)
    }

    async fn commit_count_between(
        &self,
        from: Option<&str>,
        to: &Revision,
    ) -> Result<usize, Error> {
        Ok(self.store.read().await.between(from, to)?.len())
    }

    async fn raw_diffs_between(
        &self,
        from: Option<&Revision>,
        to: &Revision,
    ) -> Result<Vec<PathChange>, Error> {
        let commits = self
            .store
            .read()
            .await
            .between(from.map(Revision::as_str), to)?;
        Ok(squash(&commits))
    }

    async fn find_tag(&self, name: &str) -> Result<Option<Tag>, Error> {
        Ok(self.store.read().await.tags.get(name).cloned())
    }

    async fn branch_exists(&self, name: &str) -> Result<bool, Error> {
        Ok(self.store.read().await.branches.contains_key(name))
    }

    async fn signable_commit_ids(&self, ids: &[Revision]) -> Result<Vec<Revision>, Error> {
        let store = self.store.read().await;
        Ok(ids
            .iter()
            .filter(|id| store.signed.contains(id))
            .cloned()
            .collect())
    }

    async fn existing_commit_ids(&self, ids: &[Revision]) -> Result<Vec<Revision>, Error> {
        let store = self.store.read().await;
        Ok(ids
            .iter()
            .filter(|id| store.commits.contains_key(id))
            .cloned()
            .collect())
    }
}

// Collapses the per commit path changes of an oldest first range into the net
// change of each path. Renames are treated as a deletion plus an addition.
fn squash(commits: &[Commit]) -> Vec<PathChange> {
    let mut paths: BTreeMap<String, PathOperation> = BTreeMap::new();

    for change in commits.iter().flat_map(|commit| commit.changed_paths.iter()) {
        let steps = match (change.operation, &change.old_path, &change.new_path) {
            (PathOperation::Renamed, Some(old), Some(new)) => vec![
                (old.as_str(), PathOperation::Deleted),
                (new.as_str(), PathOperation::Added),
            ],
            (operation, _, _) => change
                .path()
                .map(|path| vec![(path, operation)])
                .unwrap_or_default(),
        };

        for (path, operation) in steps {
            let net = match (paths.get(path).copied(), operation) {
                (Some(PathOperation::Added), PathOperation::Deleted) => None,
                (Some(PathOperation::Added), _) => Some(PathOperation::Added),
                (Some(PathOperation::Deleted), _) => Some(PathOperation::Modified),
                (_, operation) => Some(operation),
            };

            match net {
                Some(operation) => {
                    paths.insert(path.to_string(), operation);
                }
                None => {
                    paths.remove(path);
                }
            }
        }
    }

    paths
        .into_iter()
        .map(|(path, operation)| match operation {
            PathOperation::Added => PathChange::added(path),
            PathOperation::Deleted => PathChange::deleted(path),
            _ => PathChange::modified(path),
        })
        .collect()
}
