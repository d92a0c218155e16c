//! Per-turn tool execution gate.
//!
//! A gate starts unblocked and can be blocked at most once. The first blocker's
//! reason and source stick; later block requests in the same turn are ignored.
//! A blocked gate is never reopened in place, a new turn gets a new gate.

use serde::{Deserialize, Serialize};

pub const TOOL_GATE_UNTRUSTED_REASON: &str =
    "Untrusted memory content detected; tools disabled for safety.";
pub const TOOL_GATE_UNTRUSTED_HOOK_REASON: &str =
    "Untrusted hook context detected; tools disabled for safety.";

const CONFIRM_PREFIXES: [&str; 3] = ["confirm", "yes, proceed", "yes proceed"];
// Chat clients sometimes prepend one; not covered by `char::is_whitespace`.
const BYTE_ORDER_MARK: char = '\u{feff}';

/// Subsystem that observed untrusted content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UntrustedSource {
    Memory,
    Hook,
}

impl UntrustedSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Memory => "untrusted-memory",
            Self::Hook => "untrusted-hook",
        }
    }

    pub fn reason(self) -> &'static str {
        match self {
            Self::Memory => TOOL_GATE_UNTRUSTED_REASON,
            Self::Hook => TOOL_GATE_UNTRUSTED_HOOK_REASON,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolGate {
    pub blocked: bool,
    pub reason: Option<String>,
    pub source: Option<String>,
}

impl ToolGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(blocked: bool, reason: Option<&str>, source: Option<&str>) -> Self {
        Self {
            blocked,
            reason: reason.map(str::to_string),
            source: source.map(str::to_string),
        }
    }

    /// Block tool execution for the rest of the turn.
    ///
    /// No-op when the gate is already blocked. Empty `reason`/`source` values
    /// are treated as absent and leave the field unset.
    pub fn block(&mut self, reason: Option<&str>, source: Option<&str>) {
        if self.blocked {
            return;
        }
        self.blocked = true;
        if let Some(reason) = reason.filter(|value| !value.is_empty()) {
            self.reason = Some(reason.to_string());
        }
        if let Some(source) = source.filter(|value| !value.is_empty()) {
            self.source = Some(source.to_string());
        }
    }

    pub fn block_untrusted(&mut self, source: UntrustedSource) {
        self.block(Some(source.reason()), Some(source.as_str()));
    }

    pub fn is_blocked(&self) -> bool {
        self.blocked
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }
}

/// Whether an operator reply is a deliberate confirmation to re-enable tools.
///
/// Bare assent ("yes", "ok") never qualifies.
pub fn is_explicit_untrusted_confirmation(text: Option<&str>) -> bool {
    let cleaned = text
        .map(|value| value.trim_matches(|c: char| c.is_whitespace() || c == BYTE_ORDER_MARK))
        .unwrap_or_default()
        .to_lowercase();
    if cleaned.is_empty() {
        return false;
    }
    CONFIRM_PREFIXES.iter().any(|prefix| {
        cleaned == *prefix
            || cleaned
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.starts_with(' '))
    })
}
