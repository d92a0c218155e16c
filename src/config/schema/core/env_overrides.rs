use super::Config;
use crate::config::AgentEntry;
use std::path::PathBuf;

impl Config {
    pub fn apply_env_overrides(&mut self) {
        if let Ok(store) = std::env::var("TOOLGATE_SESSION_STORE")
            && !store.is_empty()
        {
            self.session.store = Some(store);
        }

        if let Ok(workspace) = std::env::var("TOOLGATE_WORKSPACE")
            && !workspace.is_empty()
        {
            self.workspace_dir = PathBuf::from(workspace);
        }

        if let Ok(agent_id) = std::env::var("TOOLGATE_DEFAULT_AGENT")
            && !agent_id.trim().is_empty()
        {
            let wanted = crate::agent::scope::normalize_agent_id(Some(&agent_id));
            let mut found = false;
            for agent in &mut self.agents.list {
                agent.default = crate::agent::scope::normalize_agent_id(Some(&agent.id)) == wanted;
                found |= agent.default;
            }
            if !found {
                self.agents.list.push(AgentEntry {
                    id: wanted,
                    default: true,
                    workspace: None,
                });
            }
        }

        if let Ok(level) = std::env::var("TOOLGATE_LOG_LEVEL")
            && !level.is_empty()
        {
            self.observability.log_level = level;
        }
    }
}
