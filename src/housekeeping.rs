use git_push_hooks_services::{
    HousekeepingStore, HousekeepingTarget, HousekeepingTask, MutualExclusionLease,
};

use crate::{settings::HousekeepingSettings, Error};

/// Counts pushes to a repository and runs maintenance when the count reaches
/// one of the configured periods.
pub struct HousekeepingService<'a> {
    store: &'a dyn HousekeepingStore,
    leases: &'a dyn MutualExclusionLease,
    settings: &'a HousekeepingSettings,
}

impl<'a> HousekeepingService<'a> {
    pub fn new(
        store: &'a dyn HousekeepingStore,
        leases: &'a dyn MutualExclusionLease,
        settings: &'a HousekeepingSettings,
    ) -> Self {
        Self {
            store,
            leases,
            settings,
        }
    }

    /// Records a push to `target`, running maintenance if it is due and no
    /// other run holds the lease. Returns the task that was run, if any.
    pub async fn perform(
        &self,
        target: HousekeepingTarget,
    ) -> Result<Option<HousekeepingTask>, Error> {
        let count = self.store.increment_push_count(target).await?;
        let task = match self.task_for(count) {
            Some(task) => task,
            None => return Ok(None),
        };

        let key = target.lease_key();
        if !self
            .leases
            .try_acquire(&key, self.settings.housekeeping_lease)
            .await?
        {
            log::debug!("housekeeping lease {} is taken; skipping {:?}", key, task);
            return Ok(None);
        }

        log::debug!("running {:?} for {} after {} pushes", task, target, count);
        self.store.execute(target, task).await?;
        if task == HousekeepingTask::Gc {
            self.store.reset_push_count(target).await?;
        }

        Ok(Some(task))
    }

    // The longest period that divides the count wins.
    fn task_for(&self, count: u64) -> Option<HousekeepingTask> {
        let due = |period: u64| period > 0 && count > 0 && count % period == 0;

        if due(self.settings.gc_period) {
            Some(HousekeepingTask::Gc)
        } else if due(self.settings.full_repack_period) {
            Some(HousekeepingTask::FullRepack)
        } else if due(self.settings.incremental_repack_period) {
            Some(HousekeepingTask::IncrementalRepack)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use git_push_hooks_state::{Housekeeping, Leases};
    use push_ref::ProjectId;

    use super::*;

    #[test]
    fn test_task_for() {
        let store = Housekeeping::new();
        let leases = Leases::new();
        let settings = HousekeepingSettings::default();
        let service = HousekeepingService::new(&store, &leases, &settings);

        assert_eq!(service.task_for(0), None);
        assert_eq!(service.task_for(9), None);
        assert_eq!(service.task_for(10), Some(HousekeepingTask::IncrementalRepack));
        assert_eq!(service.task_for(50), Some(HousekeepingTask::FullRepack));
        assert_eq!(service.task_for(100), Some(HousekeepingTask::FullRepack));
        assert_eq!(service.task_for(200), Some(HousekeepingTask::Gc));
        assert_eq!(service.task_for(210), Some(HousekeepingTask::IncrementalRepack));
    }

    #[tokio::test]
    async fn test_perform() -> anyhow::Result<()> {
        let store = Housekeeping::new();
        let leases = Leases::new();
        let settings = HousekeepingSettings {
            housekeeping_lease: Duration::ZERO,
            ..HousekeepingSettings::default()
        };
        let service = HousekeepingService::new(&store, &leases, &settings);
        let target = HousekeepingTarget::Project(ProjectId::from(1));

        for _ in 0..9 {
            assert_eq!(service.perform(target).await?, None);
        }
        assert_eq!(
            service.perform(target).await?,
            Some(HousekeepingTask::IncrementalRepack)
        );

        store.set_push_count(target, 199).await;
        assert_eq!(service.perform(target).await?, Some(HousekeepingTask::Gc));
        assert_eq!(store.push_count(target).await, 0);
        assert_eq!(
            store.executed().await,
            vec![
                (target, HousekeepingTask::IncrementalRepack),
                (target, HousekeepingTask::Gc)
            ]
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_lease_taken() -> anyhow::Result<()> {
        let store = Housekeeping::new();
        let leases = Leases::new();
        let settings = HousekeepingSettings::default();
        let service = HousekeepingService::new(&store, &leases, &settings);
        let target = HousekeepingTarget::Wiki(ProjectId::from(1));

        assert!(
            leases
                .try_acquire("wiki_housekeeping:1", Duration::from_secs(60))
                .await?
        );
        store.set_push_count(target, 9).await;

        // A held lease skips the run without an error, and the push still
        // counts.
        assert_eq!(service.perform(target).await?, None);
        assert_eq!(store.push_count(target).await, 10);
        assert!(store.executed().await.is_empty());

        Ok(())
    }
}
