//! Durable "confirmation owed" flag for sessions that saw untrusted content.
//!
//! The in-turn [`ToolGate`](super::tool_gate::ToolGate) is the primary control.
//! This flag makes the requirement survive restarts so replaying the same
//! untrusted content cannot wear the gate down.

use super::tool_gate::is_explicit_untrusted_confirmation;
use crate::agent::scope::resolve_session_agent_id;
use crate::config::Config;
use crate::session::{
    SessionEntry, SessionEntryPatch, SessionStore, UpdateOutcome, now_ms, resolve_store_path,
};
use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Process-local fast path: once set, marking skips the store entirely.
#[derive(Debug, Clone, Default)]
pub struct PendingMarker(Arc<AtomicBool>);

impl PendingMarker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn set(&self, value: bool) {
        self.0.store(value, Ordering::Release);
    }
}

/// Inputs for marking or clearing. Every field is optional; missing `config`
/// or `session_key` turns the call into a no-op. `agent_id` defaults to the
/// agent resolved from the session key.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkPendingParams<'a> {
    pub config: Option<&'a Config>,
    pub session_key: Option<&'a str>,
    pub agent_id: Option<&'a str>,
    pub pending_marker: Option<&'a PendingMarker>,
}

impl<'a> MarkPendingParams<'a> {
    pub fn new(config: &'a Config, session_key: &'a str) -> Self {
        Self {
            config: Some(config),
            session_key: Some(session_key),
            ..Self::default()
        }
    }

    pub fn with_agent_id(mut self, agent_id: Option<&'a str>) -> Self {
        self.agent_id = agent_id;
        self
    }

    pub fn with_marker(mut self, marker: &'a PendingMarker) -> Self {
        self.pending_marker = Some(marker);
        self
    }

    fn target(&self) -> Option<(PathBuf, &'a str)> {
        let config = self.config?;
        let session_key = self.session_key.filter(|key| !key.trim().is_empty())?;
        Some((session_store_path(config, session_key, self.agent_id), session_key))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkOutcome {
    /// Missing config/session key, or the in-memory marker was already set.
    Skipped,
    /// No session entry exists yet for the key.
    MissingEntry,
    /// The durable flag was already set; the record was left untouched.
    AlreadyPending,
    /// The durable flag was written by this call.
    Marked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearOutcome {
    /// Reply was not an explicit confirmation; the store was not touched.
    NotConfirmed,
    /// Missing config or session key.
    Skipped,
    MissingEntry,
    NotPending,
    Cleared,
}

fn session_store_path(config: &Config, session_key: &str, agent_id: Option<&str>) -> PathBuf {
    let agent_id = agent_id
        .map(str::to_string)
        .unwrap_or_else(|| resolve_session_agent_id(Some(session_key), config));
    resolve_store_path(config.session.store.as_deref(), &agent_id, &config.state_dir)
}

/// Record that `session_key` owes an explicit confirmation.
///
/// Writes `untrustedMemoryPending = true` with a timestamp only when the flag
/// is not already set, so repeat calls never refresh the timestamp. The
/// marker is set only when this call changed the record.
pub async fn try_mark_untrusted_confirmation_pending(
    store: &dyn SessionStore,
    params: MarkPendingParams<'_>,
) -> Result<MarkOutcome> {
    let Some((store_path, session_key)) = params.target() else {
        return Ok(MarkOutcome::Skipped);
    };
    if params.pending_marker.is_some_and(PendingMarker::value) {
        return Ok(MarkOutcome::Skipped);
    }

    let outcome = store
        .update_entry(
            &store_path,
            session_key,
            Box::new(|entry: &SessionEntry| {
                (!entry.is_untrusted_pending()).then(|| SessionEntryPatch::mark_pending(now_ms()))
            }),
        )
        .await?;

    Ok(match outcome {
        UpdateOutcome::Missing => MarkOutcome::MissingEntry,
        UpdateOutcome::Unchanged(_) => MarkOutcome::AlreadyPending,
        UpdateOutcome::Updated(_) => {
            if let Some(marker) = params.pending_marker {
                marker.set(true);
            }
            MarkOutcome::Marked
        }
    })
}

/// Best-effort form of [`try_mark_untrusted_confirmation_pending`].
///
/// Never fails: a store outage only weakens durability, the in-turn gate has
/// already blocked tools.
pub async fn mark_untrusted_confirmation_pending(
    store: &dyn SessionStore,
    params: MarkPendingParams<'_>,
) {
    if let Err(error) = try_mark_untrusted_confirmation_pending(store, params).await {
        tracing::debug!(
            session_key = params.session_key.unwrap_or_default(),
            %error,
            "untrusted confirmation marker not persisted"
        );
    }
}

/// Read-only query of the durable flag. Missing context or entry reads as `false`.
pub async fn is_untrusted_confirmation_pending(
    store: &dyn SessionStore,
    params: MarkPendingParams<'_>,
) -> Result<bool> {
    let Some((store_path, session_key)) = params.target() else {
        return Ok(false);
    };
    Ok(store
        .load_entry(&store_path, session_key)
        .await?
        .is_some_and(|entry| entry.is_untrusted_pending()))
}

/// Clear the durable flag after an operator reply.
///
/// Only an explicit confirmation reaches the store; anything else returns
/// [`ClearOutcome::NotConfirmed`] with no store traffic. On success the
/// in-memory marker is reset so the next untrusted observation marks again.
pub async fn clear_untrusted_confirmation_pending(
    store: &dyn SessionStore,
    params: MarkPendingParams<'_>,
    operator_reply: Option<&str>,
) -> Result<ClearOutcome> {
    if !is_explicit_untrusted_confirmation(operator_reply) {
        return Ok(ClearOutcome::NotConfirmed);
    }
    let Some((store_path, session_key)) = params.target() else {
        return Ok(ClearOutcome::Skipped);
    };

    let outcome = store
        .update_entry(
            &store_path,
            session_key,
            Box::new(|entry: &SessionEntry| {
                entry
                    .is_untrusted_pending()
                    .then(SessionEntryPatch::clear_pending)
            }),
        )
        .await?;

    let cleared = match outcome {
        UpdateOutcome::Missing => return Ok(ClearOutcome::MissingEntry),
        UpdateOutcome::Unchanged(_) => ClearOutcome::NotPending,
        UpdateOutcome::Updated(_) => ClearOutcome::Cleared,
    };
    if let Some(marker) = params.pending_marker {
        marker.set(false);
    }
    Ok(cleared)
}
