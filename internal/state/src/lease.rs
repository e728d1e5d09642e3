use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use git_push_hooks_services::{Error, MutualExclusionLease};
use tokio::sync::RwLock;

/// Leases held in process memory, each expiring after its TTL.
#[derive(Debug, Clone, Default)]
pub struct Leases {
    held: Arc<RwLock<HashMap<String, Instant>>>,
}

impl Leases {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn release(&self, key: &str) {
        self.held.write().await.remove(key);
    }
}

#[async_trait]
impl MutualExclusionLease for Leases {
    async fn try_acquire(&self, key: &str, ttl: Duration) -> Result<bool, Error> {
        let now = Instant::now();
        let mut held = self.held.write().await;

        match held.get(key) {
            Some(expiry) if *expiry > now => Ok(false),
            _ => {
                held.insert(key.to_string(), now + ttl);
                Ok(true)
            }
        }
    }
}
