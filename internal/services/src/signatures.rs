use std::{fmt::Display, sync::Arc};

use async_trait::async_trait;
use push_ref::Revision;
use serde::{Deserialize, Serialize};

use crate::Error;

#[derive(Debug, Clone, Copy, Deserialize, Serialize, Hash, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SignatureKind {
    Gpg,
    X509,
    Ssh,
}

impl Display for SignatureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignatureKind::Gpg => write!(f, "gpg"),
            SignatureKind::X509 => write!(f, "x509"),
            SignatureKind::Ssh => write!(f, "ssh"),
        }
    }
}

/// Verified signatures of one kind.
#[async_trait]
pub trait SignatureStore: Send + Sync {
    /// Filters `ids` down to commits with no verified signature in this store.
    async fn unsigned_commit_ids(&self, ids: &[Revision]) -> Result<Vec<Revision>, Error>;
}

#[derive(Clone)]
pub struct SignatureStores {
    pub gpg: Arc<dyn SignatureStore>,
    pub x509: Arc<dyn SignatureStore>,
    pub ssh: Arc<dyn SignatureStore>,
}

impl SignatureStores {
    pub fn iter(&self) -> impl Iterator<Item = (SignatureKind, &Arc<dyn SignatureStore>)> {
        [
            (SignatureKind::Gpg, &self.gpg),
            (SignatureKind::X509, &self.x509),
            (SignatureKind::Ssh, &self.ssh),
        ]
        .into_iter()
    }
}
