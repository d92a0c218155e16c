use super::Config;
use super::types::STATE_DIR_NAME;
use anyhow::{Context, Result};
use directories::UserDirs;
use std::fs;
use std::path::Path;

impl Config {
    pub fn load_or_init() -> Result<Self> {
        let home = UserDirs::new()
            .map(|u| u.home_dir().to_path_buf())
            .context("Could not find home directory")?;
        Self::load_or_init_at(&home.join(STATE_DIR_NAME))
    }

    /// Load `config.toml` from `state_dir`, writing defaults on first run.
    pub fn load_or_init_at(state_dir: &Path) -> Result<Self> {
        let defaults = Self::with_state_dir(state_dir.to_path_buf());

        if !state_dir.exists() {
            fs::create_dir_all(state_dir).context("Failed to create state directory")?;
            fs::create_dir_all(&defaults.workspace_dir)
                .context("Failed to create workspace directory")?;
        }

        let mut config = if defaults.config_path.exists() {
            let contents = fs::read_to_string(&defaults.config_path)
                .context("Failed to read config file")?;
            let mut config: Config =
                toml::from_str(&contents).context("Failed to parse config file")?;
            config.state_dir = defaults.state_dir;
            config.workspace_dir = defaults.workspace_dir;
            config.config_path = defaults.config_path;
            config
        } else {
            defaults.save()?;
            defaults
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let toml_str = toml::to_string_pretty(self).context("Failed to serialize config")?;
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        fs::write(&self.config_path, toml_str).context("Failed to write config file")?;
        Ok(())
    }
}
