use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use git_push_hooks_services::{Error, HousekeepingStore, HousekeepingTarget, HousekeepingTask};
use tokio::sync::RwLock;

#[derive(Debug, Clone, Default)]
pub struct Housekeeping {
    counters: Arc<RwLock<HashMap<HousekeepingTarget, u64>>>,
    executed: Arc<RwLock<Vec<(HousekeepingTarget, HousekeepingTask)>>>,
}

impl Housekeeping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts the counter of a target at the given value.
    pub async fn set_push_count(&self, target: HousekeepingTarget, count: u64) {
        self.counters.write().await.insert(target, count);
    }

    pub async fn push_count(&self, target: HousekeepingTarget) -> u64 {
        self.counters
            .read()
            .await
            .get(&target)
            .copied()
            .unwrap_or_default()
    }

    pub async fn executed(&self) -> Vec<(HousekeepingTarget, HousekeepingTask)> {
        self.executed.read().await.clone()
    }
}

#[async_trait]
impl HousekeepingStore for Housekeeping {
    async fn increment_push_count(&self, target: HousekeepingTarget) -> Result<u64, Error> {
        let mut counters = self.counters.write().await;
        let count = counters.entry(target).or_default();
        *count += 1;
        Ok(*count)
    }

    async fn reset_push_count(&self, target: HousekeepingTarget) -> Result<(), Error> {
        self.counters.write().await.insert(target, 0);
        Ok(())
    }

    async fn execute(
        &self,
        target: HousekeepingTarget,
        task: HousekeepingTask,
    ) -> Result<(), Error> {
        log::debug!("executing {:?} for {}", task, target);
        self.executed.write().await.push((target, task));
        Ok(())
    }
}
