use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// One durable session record. Unknown keys round-trip untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEntry {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub updated_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub untrusted_memory_pending: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub untrusted_memory_pending_at: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SessionEntry {
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            updated_at: now_ms(),
            untrusted_memory_pending: None,
            untrusted_memory_pending_at: None,
            extra: Map::new(),
        }
    }

    pub fn is_untrusted_pending(&self) -> bool {
        self.untrusted_memory_pending == Some(true)
    }
}

/// Partial update applied by [`super::SessionStore::update_entry`].
///
/// `untrusted_memory_pending_at`: `None` leaves the field, `Some(None)` removes it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionEntryPatch {
    pub untrusted_memory_pending: Option<bool>,
    pub untrusted_memory_pending_at: Option<Option<i64>>,
}

impl SessionEntryPatch {
    pub fn mark_pending(at_ms: i64) -> Self {
        Self {
            untrusted_memory_pending: Some(true),
            untrusted_memory_pending_at: Some(Some(at_ms)),
        }
    }

    pub fn clear_pending() -> Self {
        Self {
            untrusted_memory_pending: Some(false),
            untrusted_memory_pending_at: Some(None),
        }
    }

    pub fn apply(self, entry: &mut SessionEntry) {
        if let Some(pending) = self.untrusted_memory_pending {
            entry.untrusted_memory_pending = Some(pending);
        }
        if let Some(pending_at) = self.untrusted_memory_pending_at {
            entry.untrusted_memory_pending_at = pending_at;
        }
        entry.updated_at = entry.updated_at.max(now_ms());
    }
}

/// Result of a conditional entry update.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    /// No entry exists for the key; the update function was not called.
    Missing,
    /// The update function asked for no change; nothing was written.
    Unchanged(SessionEntry),
    /// The patch was applied and persisted.
    Updated(SessionEntry),
}

impl UpdateOutcome {
    pub fn was_updated(&self) -> bool {
        matches!(self, Self::Updated(_))
    }

    pub fn entry(&self) -> Option<&SessionEntry> {
        match self {
            Self::Missing => None,
            Self::Unchanged(entry) | Self::Updated(entry) => Some(entry),
        }
    }
}

pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}
