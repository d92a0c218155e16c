use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentsConfig {
    #[serde(default)]
    pub list: Vec<AgentEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentEntry {
    pub id: String,
    /// Marks the agent used for session keys that do not name one.
    #[serde(default)]
    pub default: bool,
    /// Workspace override; supports `~`.
    #[serde(default)]
    pub workspace: Option<String>,
}
