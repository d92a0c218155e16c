use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for `toolgate`.
///
/// Library callers can match on these to decide how to report a refusal;
/// internal code uses `anyhow::Result` for context chains.
#[derive(Debug, Error)]
pub enum GateError {
    // ── Session ─────────────────────────────────────────────────────────
    #[error("session: {0}")]
    Session(#[from] SessionError),

    // ── Tools ───────────────────────────────────────────────────────────
    #[error("tool: {0}")]
    Tool(#[from] ToolError),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Session errors ─────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session not found: {0}")]
    NotFound(String),

    #[error("store: {0}")]
    Store(#[source] anyhow::Error),
}

// ─── Tool errors ────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("tool {name} denied by policy: {reason}")]
    PolicyDenied { name: String, reason: String },
}

/// Shorthand result type for the crate.
pub type Result<T> = std::result::Result<T, GateError>;
