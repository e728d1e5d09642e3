use std::fmt::Display;

use async_trait::async_trait;
use push_data::PushEventPayload;
use push_ref::RefType;
use serde::{Deserialize, Serialize};

use crate::Error;

/// The event name project hooks and integrations subscribe to.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Hash, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HookName {
    Push,
    TagPush,
}

impl From<RefType> for HookName {
    fn from(ref_type: RefType) -> Self {
        match ref_type {
            RefType::Branch => HookName::Push,
            RefType::Tag => HookName::TagPush,
        }
    }
}

impl Display for HookName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HookName::Push => write!(f, "push"),
            HookName::TagPush => write!(f, "tag_push"),
        }
    }
}

#[async_trait]
pub trait HookDispatcher: Send + Sync {
    async fn has_active_hooks(&self, name: HookName) -> Result<bool, Error>;

    async fn dispatch_hooks(&self, payload: &PushEventPayload, name: HookName)
        -> Result<(), Error>;

    async fn has_active_integrations(&self, name: HookName) -> Result<bool, Error>;

    async fn dispatch_integrations(
        &self,
        payload: &PushEventPayload,
        name: HookName,
        skip_ci: bool,
    ) -> Result<(), Error>;
}
