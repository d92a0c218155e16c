use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Session store file. Supports `{agentId}` and `~`; relative paths resolve
    /// against the state directory. Unset means
    /// `<state_dir>/agents/<agentId>/sessions/sessions.json`.
    #[serde(default)]
    pub store: Option<String>,
}
