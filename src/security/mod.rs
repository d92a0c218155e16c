pub mod tool_gate;
pub mod untrusted_confirmation;

pub use tool_gate::{
    TOOL_GATE_UNTRUSTED_HOOK_REASON, TOOL_GATE_UNTRUSTED_REASON, ToolGate, UntrustedSource,
    is_explicit_untrusted_confirmation,
};
pub use untrusted_confirmation::{
    ClearOutcome, MarkOutcome, MarkPendingParams, PendingMarker,
    clear_untrusted_confirmation_pending, is_untrusted_confirmation_pending,
    mark_untrusted_confirmation_pending, try_mark_untrusted_confirmation_pending,
};
