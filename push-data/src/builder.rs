use push_ref::{
    Actor, Commit, PathOperation, Project, PushOptions, ReferenceChange, Revision, BLANK_SHA,
};

use crate::{CommitData, CommitWindow, ObjectKind, ProjectData, PushEventPayload};

/// A builder to create a [`PushEventPayload`] for a single reference change.
#[derive(Debug)]
pub struct PushDataBuilder<'a> {
    project: &'a Project,
    actor: &'a Actor,
    change: &'a ReferenceChange,
    commits: &'a [Commit],
    total_commits_count: Option<usize>,
    message: Option<String>,
    checkout_sha: Option<Revision>,
    push_options: Option<&'a PushOptions>,
    with_changed_files: bool,
}

impl<'a> PushDataBuilder<'a> {
    /// Constructs a new builder with no commits.
    pub fn new(project: &'a Project, actor: &'a Actor, change: &'a ReferenceChange) -> Self {
        Self {
            project,
            actor,
            change,
            commits: &[],
            total_commits_count: None,
            message: None,
            checkout_sha: None,
            push_options: None,
            with_changed_files: true,
        }
    }

    /// Includes every commit in the window.
    pub fn window(&mut self, window: &'a CommitWindow) -> &mut Self {
        self.commits = window.commits();
        self
    }

    /// Includes only the newest commit in the window.
    pub fn latest_commit(&mut self, window: &'a CommitWindow) -> &mut Self {
        let commits = window.commits();
        self.commits = &commits[commits.len().saturating_sub(1)..];
        self
    }

    /// Sets the total number of commits in the change, which may exceed the
    /// number of commits included. Defaults to the included commits.
    pub fn total_commits_count(&mut self, count: usize) -> &mut Self {
        self.total_commits_count = Some(count);
        self
    }

    pub fn message(&mut self, message: Option<String>) -> &mut Self {
        self.message = message;
        self
    }

    pub fn checkout_sha(&mut self, checkout_sha: Option<Revision>) -> &mut Self {
        self.checkout_sha = checkout_sha;
        self
    }

    pub fn push_options(&mut self, push_options: &'a PushOptions) -> &mut Self {
        self.push_options = Some(push_options);
        self
    }

    /// Omits the added, modified and removed path lists from each commit.
    pub fn without_changed_files(&mut self) -> &mut Self {
        self.with_changed_files = false;
        self
    }

    /// Builds a [`PushEventPayload`] from the builder.
    pub fn build(self) -> PushEventPayload {
        let kind = ObjectKind::from(self.change.ref_type());
        let revision = |rev: Option<&Revision>| match rev {
            Some(rev) => rev.to_string(),
            None => String::from(BLANK_SHA),
        };

        let commits: Vec<CommitData> = self
            .commits
            .iter()
            .map(|commit| commit_data(commit, self.with_changed_files))
            .collect();

        PushEventPayload {
            object_kind: kind,
            event_name: kind,
            before: revision(self.change.old()),
            after: revision(self.change.new_revision()),
            full_ref: self.change.full_ref().to_string(),
            checkout_sha: self.checkout_sha,
            message: self.message,
            user_id: self.actor.id,
            user_name: self.actor.name.clone(),
            user_username: self.actor.username.clone(),
            user_email: self.actor.email.clone(),
            project_id: self.project.id,
            project: ProjectData {
                id: self.project.id,
                path_with_namespace: self.project.path_with_namespace.clone(),
                default_branch: self.project.default_branch.clone(),
                ci_config_path: self.project.ci_config_path().to_string(),
            },
            total_commits_count: self
                .total_commits_count
                .unwrap_or(commits.len())
                .max(commits.len()),
            commits,
            push_options: self.push_options.cloned().unwrap_or_default(),
        }
    }
}

fn commit_data(commit: &Commit, with_changed_files: bool) -> CommitData {
    let mut data = CommitData {
        id: commit.id.clone(),
        message: commit.message.clone(),
        title: commit.title().to_string(),
        timestamp: commit.authored_date,
        author: commit.author.clone(),
        added: Vec::new(),
        modified: Vec::new(),
        removed: Vec::new(),
    };

    if !with_changed_files {
        return data;
    }

    for change in commit.changed_paths.iter() {
        match change.operation {
            PathOperation::Added => data.added.extend(change.new_path.clone()),
            PathOperation::Modified => data.modified.extend(change.new_path.clone()),
            PathOperation::Deleted => data.removed.extend(change.old_path.clone()),
            // A rename is reported as the old path going away and the new one
            // appearing.
            PathOperation::Renamed => {
                data.removed.extend(change.old_path.clone());
                data.added.extend(change.new_path.clone());
            }
        }
    }

    data
}
