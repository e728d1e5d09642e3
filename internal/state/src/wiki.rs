use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::Arc,
};

use async_trait::async_trait;
use git_push_hooks_services::{Error, WikiAction, WikiPage, WikiPageMeta, WikiStore};
use push_ref::Revision;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// The pages of a wiki repository, listed per revision.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct WikiFixture {
    #[serde(default)]
    pub pages: Vec<WikiPage>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct WikiEvent {
    pub page_id: u64,
    pub action: WikiAction,
    pub fingerprint: Revision,
}

#[derive(Debug, Clone, Default)]
pub struct Wiki {
    store: Arc<RwLock<Store>>,
}

#[derive(Debug, Default)]
struct Store {
    pages: HashMap<(String, Revision), WikiPage>,
    metas: BTreeMap<String, WikiPageMeta>,
    fingerprints: HashSet<(u64, Revision)>,
    events: Vec<WikiEvent>,
    post_receives: usize,
}

impl Wiki {
    pub fn from_fixture(fixture: WikiFixture) -> Self {
        let store = Store {
            pages: fixture
                .pages
                .into_iter()
                .map(|page| ((page.slug.clone(), page.revision.clone()), page))
                .collect(),
            ..Store::default()
        };

        Self {
            store: Arc::new(RwLock::new(store)),
        }
    }

    pub async fn events(&self) -> Vec<WikiEvent> {
        self.store.read().await.events.clone()
    }

    pub async fn post_receives(&self) -> usize {
        self.store.read().await.post_receives
    }
}

#[async_trait]
impl WikiStore for Wiki {
    async fn after_post_receive(&self) -> Result<(), Error> {
        self.store.write().await.post_receives += 1;
        Ok(())
    }

    async fn find_page(&self, slug: &str, revision: &Revision) -> Result<Option<WikiPage>, Error> {
        Ok(self
            .store
            .read()
            .await
            .pages
            .get(&(slug.to_string(), revision.clone()))
            .cloned())
    }

    async fn find_or_create_meta(&self, page: &WikiPage) -> Result<WikiPageMeta, Error> {
        let mut store = self.store.write().await;
        let next_id = store.metas.len() as u64 + 1;

        Ok(store
            .metas
            .entry(page.slug.clone())
            .or_insert_with(|| WikiPageMeta {
                id: next_id,
                canonical_slug: page.slug.clone(),
                title: page.title.clone(),
            })
            .clone())
    }

    async fn record_event_once(
        &self,
        meta: &WikiPageMeta,
        action: WikiAction,
        fingerprint: &Revision,
    ) -> Result<bool, Error> {
        let mut store = self.store.write().await;
        if !store.fingerprints.insert((meta.id, fingerprint.clone())) {
            return Ok(false);
        }

        store.events.push(WikiEvent {
            page_id: meta.id,
            action,
            fingerprint: fingerprint.clone(),
        });
        Ok(true)
    }
}
