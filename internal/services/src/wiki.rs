use std::fmt::Display;

use async_trait::async_trait;
use push_ref::Revision;
use serde::{Deserialize, Serialize};

use crate::Error;

#[derive(Debug, Clone, Copy, Deserialize, Serialize, Hash, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WikiAction {
    Created,
    Updated,
    Destroyed,
}

impl Display for WikiAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WikiAction::Created => write!(f, "created"),
            WikiAction::Updated => write!(f, "updated"),
            WikiAction::Destroyed => write!(f, "destroyed"),
        }
    }
}

/// A page as it exists at one revision of the wiki repository.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct WikiPage {
    pub slug: String,
    pub title: String,
    pub format: String,
    pub revision: Revision,
}

/// The persistent record of a page, which survives renames and deletion.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct WikiPageMeta {
    pub id: u64,
    pub canonical_slug: String,
    pub title: String,
}

#[async_trait]
pub trait WikiStore: Send + Sync {
    /// Refreshes whatever the store caches about the wiki repository.
    async fn after_post_receive(&self) -> Result<(), Error>;

    async fn find_page(&self, slug: &str, revision: &Revision) -> Result<Option<WikiPage>, Error>;

    async fn find_or_create_meta(&self, page: &WikiPage) -> Result<WikiPageMeta, Error>;

    /// Records a page event unless the page already has one at `fingerprint`.
    /// Returns true if a new event was recorded.
    async fn record_event_once(
        &self,
        meta: &WikiPageMeta,
        action: WikiAction,
        fingerprint: &Revision,
    ) -> Result<bool, Error>;
}
