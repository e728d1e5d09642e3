use std::time::Duration;

use async_trait::async_trait;

use crate::Error;

/// An exclusive, expiring lease keyed by name.
#[async_trait]
pub trait MutualExclusionLease: Send + Sync {
    /// Returns false without waiting if another holder has the lease.
    async fn try_acquire(&self, key: &str, ttl: Duration) -> Result<bool, Error>;
}
