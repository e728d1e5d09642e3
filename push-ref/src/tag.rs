use serde::{Deserialize, Serialize};

use crate::{Commit, Revision};

/// A tag as reported by the repository.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Tag {
    pub name: String,

    /// The object the tag ref points at: the tag object for annotated tags,
    /// the commit itself for lightweight ones.
    pub target: Revision,

    /// The annotation, if this is an annotated tag.
    #[serde(default)]
    pub message: Option<String>,

    /// The commit reached by peeling the tag.
    #[serde(default)]
    pub dereferenced_target: Option<Commit>,
}

impl Tag {
    /// Returns the annotation text, if there is any meaningful text.
    pub fn annotation(&self) -> Option<&str> {
        self.message
            .as_deref()
            .map(str::trim_end)
            .filter(|message| !message.is_empty())
    }

    /// Returns true if the tag ref currently points at the given revision.
    ///
    /// A tag that has since been moved again must not be reported against an
    /// older push.
    pub fn points_at(&self, revision: &Revision) -> bool {
        &self.target == revision
    }
}
