use std::collections::BTreeMap;

use async_trait::async_trait;
use push_data::{BulkPushEvent, PushEventPayload};

use crate::Error;

/// Free form attributes attached to a tracking event.
pub type TrackingAttributes = BTreeMap<String, String>;

/// The activity feed and product analytics.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn record(&self, payload: &PushEventPayload) -> Result<(), Error>;

    async fn record_bulk(&self, event: &BulkPushEvent) -> Result<(), Error>;

    async fn record_tracking(
        &self,
        name: &str,
        attributes: &TrackingAttributes,
    ) -> Result<(), Error>;
}
