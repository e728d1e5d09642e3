use push_ref::{Action, RefType};
use serde::{Deserialize, Serialize};

/// A single activity record summarising many changes of the same kind.
///
/// Recorded instead of per-change events when a group of changes is too large
/// for individual events to be useful.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct BulkPushEvent {
    pub action: Action,
    pub ref_type: RefType,
    pub ref_count: usize,
}

impl BulkPushEvent {
    pub fn new(action: Action, ref_type: RefType, ref_count: usize) -> Self {
        Self {
            action,
            ref_type,
            ref_count,
        }
    }
}
