use std::{collections::HashSet, sync::Arc};

use async_trait::async_trait;
use git_push_hooks_services::{Error, SignatureStore, SignatureStores};
use push_ref::Revision;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Verified signatures of one kind.
#[derive(Debug, Clone, Default)]
pub struct Signatures {
    verified: Arc<RwLock<HashSet<Revision>>>,
}

impl Signatures {
    pub fn new<I: IntoIterator<Item = Revision>>(verified: I) -> Self {
        Self {
            verified: Arc::new(RwLock::new(verified.into_iter().collect())),
        }
    }

    pub async fn verify(&self, revision: Revision) {
        self.verified.write().await.insert(revision);
    }
}

#[async_trait]
impl SignatureStore for Signatures {
    async fn unsigned_commit_ids(&self, ids: &[Revision]) -> Result<Vec<Revision>, Error> {
        let verified = self.verified.read().await;
        Ok(ids
            .iter()
            .filter(|id| !verified.contains(id))
            .cloned()
            .collect())
    }
}

/// Verified commit IDs per signature kind.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SignaturesFixture {
    #[serde(default)]
    pub gpg: Vec<Revision>,

    #[serde(default)]
    pub x509: Vec<Revision>,

    #[serde(default)]
    pub ssh: Vec<Revision>,
}

impl SignaturesFixture {
    pub fn stores(&self) -> SignatureStores {
        SignatureStores {
            gpg: Arc::new(Signatures::new(self.gpg.iter().cloned())),
            x509: Arc::new(Signatures::new(self.x509.iter().cloned())),
            ssh: Arc::new(Signatures::new(self.ssh.iter().cloned())),
        }
    }
}
