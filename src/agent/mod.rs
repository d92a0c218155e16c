pub mod scope;
pub mod turn_guard;

pub use scope::{
    normalize_agent_id, resolve_agent_workspace_dir, resolve_default_agent_id,
    resolve_session_agent_id,
};
pub use turn_guard::{TurnGuard, TurnStart, TurnStatus};
