use super::super::{AgentsConfig, ObservabilityConfig, SessionConfig};
use anyhow::{Result, bail};
use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

pub(super) const STATE_DIR_NAME: &str = ".toolgate";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// State directory (`~/.toolgate`) - computed, not serialized
    #[serde(skip)]
    pub state_dir: PathBuf,
    /// Default agent workspace - computed from state dir, not serialized
    #[serde(skip)]
    pub workspace_dir: PathBuf,
    /// Path to config.toml - computed from state dir, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub agents: AgentsConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Default for Config {
    fn default() -> Self {
        let home =
            UserDirs::new().map_or_else(|| PathBuf::from("."), |u| u.home_dir().to_path_buf());
        Self::with_state_dir(home.join(STATE_DIR_NAME))
    }
}

impl Config {
    /// Default config rooted at `state_dir`.
    pub fn with_state_dir(state_dir: PathBuf) -> Self {
        Self {
            workspace_dir: state_dir.join("workspace"),
            config_path: state_dir.join("config.toml"),
            state_dir,
            session: SessionConfig::default(),
            agents: AgentsConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        let mut defaults = 0usize;
        for agent in &self.agents.list {
            if agent.id.trim().is_empty() {
                bail!("agents.list entries must have a non-empty id");
            }
            let normalized = crate::agent::scope::normalize_agent_id(Some(&agent.id));
            if !seen.insert(normalized.clone()) {
                bail!("duplicate agent id in agents.list: {normalized}");
            }
            if agent.default {
                defaults += 1;
            }
        }
        if defaults > 1 {
            bail!("at most one agents.list entry may set default = true");
        }
        Ok(())
    }
}
