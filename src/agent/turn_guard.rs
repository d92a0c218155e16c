//! Per-session composition of the tool gate and the durable confirmation flag.
//!
//! Each turn starts with [`TurnGuard::begin_turn`], which yields a fresh
//! [`ToolGate`]. Untrusted content observed mid-turn blocks that gate at once
//! and records the pending flag in the background.

use crate::config::Config;
use crate::error::ToolError;
use crate::security::tool_gate::{ToolGate, UntrustedSource};
use crate::security::untrusted_confirmation::{
    ClearOutcome, MarkPendingParams, PendingMarker, clear_untrusted_confirmation_pending,
    is_untrusted_confirmation_pending, try_mark_untrusted_confirmation_pending,
};
use crate::session::SessionStore;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::task::JoinHandle;

pub const TOOL_GATE_CONFIRMATION_PENDING_REASON: &str = "Untrusted content was seen earlier in this session; reply \"confirm\" or \"yes, proceed\" to re-enable tools.";
pub const TOOL_GATE_CONFIRMATION_UNRECORDED_REASON: &str =
    "Confirmation received but could not be recorded; tools stay disabled.";
pub const CONFIRMATION_SOURCE: &str = "untrusted-confirmation";

/// How the durable flag shaped the start of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnStatus {
    /// No confirmation owed.
    Open,
    /// A confirmation is owed and the operator input was not one.
    AwaitingConfirmation,
    /// The operator input confirmed and the flag was cleared.
    Confirmed,
}

#[derive(Debug, Clone)]
pub struct TurnStart {
    pub gate: ToolGate,
    pub status: TurnStatus,
}

impl TurnStart {
    fn open(status: TurnStatus) -> Self {
        Self {
            gate: ToolGate::new(),
            status,
        }
    }

    fn blocked(reason: &str) -> Self {
        let mut gate = ToolGate::new();
        gate.block(Some(reason), Some(CONFIRMATION_SOURCE));
        Self {
            gate,
            status: TurnStatus::AwaitingConfirmation,
        }
    }
}

pub struct TurnGuard {
    config: Arc<Config>,
    store: Arc<dyn SessionStore>,
    session_key: String,
    agent_id: Option<String>,
    marker: PendingMarker,
    /// Set as soon as untrusted content is observed, independent of the store.
    /// Only an explicit confirmation resets it.
    owed: Arc<AtomicBool>,
}

impl TurnGuard {
    pub fn new(
        config: Arc<Config>,
        store: Arc<dyn SessionStore>,
        session_key: impl Into<String>,
    ) -> Self {
        Self {
            config,
            store,
            session_key: session_key.into(),
            agent_id: None,
            marker: PendingMarker::new(),
            owed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_agent_id(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    pub fn session_key(&self) -> &str {
        &self.session_key
    }

    pub fn pending_marker(&self) -> &PendingMarker {
        &self.marker
    }

    /// Whether this process saw untrusted content that is not yet confirmed.
    pub fn confirmation_owed(&self) -> bool {
        self.owed.load(Ordering::Acquire)
    }

    fn params(&self) -> MarkPendingParams<'_> {
        MarkPendingParams::new(&self.config, &self.session_key)
            .with_agent_id(self.agent_id.as_deref())
            .with_marker(&self.marker)
    }

    /// Open a new turn. A pending confirmation keeps tools blocked unless
    /// `operator_input` is an explicit confirmation, which clears the flag.
    ///
    /// Pending means either the durable flag is set or this guard observed
    /// untrusted content whose write failed or has not landed yet.
    pub async fn begin_turn(&self, operator_input: Option<&str>) -> TurnStart {
        let owed = self.confirmation_owed();
        let durable = match is_untrusted_confirmation_pending(self.store.as_ref(), self.params())
            .await
        {
            Ok(pending) => {
                if !pending {
                    self.marker.set(false);
                }
                pending
            }
            Err(error) => {
                tracing::warn!(
                    session_key = %self.session_key,
                    %error,
                    "pending confirmation lookup failed; using in-process state"
                );
                self.marker.value()
            }
        };

        if !(durable || owed) {
            return TurnStart::open(TurnStatus::Open);
        }

        match clear_untrusted_confirmation_pending(
            self.store.as_ref(),
            self.params(),
            operator_input,
        )
        .await
        {
            Ok(ClearOutcome::NotConfirmed) => {
                tracing::info!(
                    session_key = %self.session_key,
                    "tools held until explicit confirmation"
                );
                TurnStart::blocked(TOOL_GATE_CONFIRMATION_PENDING_REASON)
            }
            Ok(outcome) => {
                self.owed.store(false, Ordering::Release);
                self.marker.set(false);
                tracing::info!(
                    session_key = %self.session_key,
                    ?outcome,
                    "untrusted content confirmation accepted"
                );
                TurnStart::open(TurnStatus::Confirmed)
            }
            Err(error) => {
                tracing::warn!(
                    session_key = %self.session_key,
                    %error,
                    "failed to clear pending confirmation"
                );
                TurnStart::blocked(TOOL_GATE_CONFIRMATION_UNRECORDED_REASON)
            }
        }
    }

    /// Block `gate` for the rest of the turn and record the pending flag.
    ///
    /// The store write runs on a spawned task and is never awaited here.
    /// Returns `None` when called outside a tokio runtime; the gate is blocked
    /// either way.
    pub fn observe_untrusted(
        &self,
        gate: &mut ToolGate,
        source: UntrustedSource,
    ) -> Option<JoinHandle<()>> {
        gate.block_untrusted(source);
        self.owed.store(true, Ordering::Release);
        tracing::info!(
            session_key = %self.session_key,
            source = source.as_str(),
            "untrusted content observed; tools disabled"
        );

        let runtime = tokio::runtime::Handle::try_current().ok()?;
        let config = Arc::clone(&self.config);
        let store = Arc::clone(&self.store);
        let session_key = self.session_key.clone();
        let agent_id = self.agent_id.clone();
        let marker = self.marker.clone();

        Some(runtime.spawn(async move {
            let params = MarkPendingParams::new(&config, &session_key)
                .with_agent_id(agent_id.as_deref())
                .with_marker(&marker);
            match try_mark_untrusted_confirmation_pending(store.as_ref(), params).await {
                Ok(outcome) => {
                    tracing::debug!(%session_key, ?outcome, "untrusted confirmation marker");
                }
                Err(error) => {
                    tracing::debug!(
                        %session_key,
                        %error,
                        "untrusted confirmation marker not persisted"
                    );
                }
            }
        }))
    }

    /// Refuse any tool call while `gate` is blocked.
    pub fn authorize_tool(&self, gate: &ToolGate, tool_name: &str) -> Result<(), ToolError> {
        if !gate.is_blocked() {
            return Ok(());
        }
        Err(ToolError::PolicyDenied {
            name: tool_name.to_string(),
            reason: gate
                .reason()
                .unwrap_or("tools disabled for safety")
                .to_string(),
        })
    }
}
