//! Agent identity and workspace resolution.

use crate::config::{AgentEntry, Config};
use std::path::PathBuf;

pub const DEFAULT_AGENT_ID: &str = "main";
const MAX_AGENT_ID_LEN: usize = 64;

/// Canonical agent id: lower-case `[a-z0-9_-]`, at most 64 chars, `main` when empty.
pub fn normalize_agent_id(value: Option<&str>) -> String {
    let trimmed = value.map(str::trim).unwrap_or_default();
    if trimmed.is_empty() {
        return DEFAULT_AGENT_ID.to_string();
    }

    let mut out = String::with_capacity(trimmed.len());
    for c in trimmed.chars() {
        let c = c.to_ascii_lowercase();
        if c.is_ascii_alphanumeric() || matches!(c, '_' | '-') {
            out.push(c);
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }

    let compact: String = out
        .trim_matches('-')
        .chars()
        .take(MAX_AGENT_ID_LEN)
        .collect();
    let compact = compact.trim_end_matches('-');
    if compact.is_empty() {
        DEFAULT_AGENT_ID.to_string()
    } else {
        compact.to_string()
    }
}

/// Split `agent:<id>:<rest>` session keys. Returns the normalized agent id.
pub fn parse_agent_session_key(session_key: &str) -> Option<String> {
    let mut parts = session_key.trim().splitn(3, ':');
    let prefix = parts.next()?;
    let agent_id = parts.next()?;
    let rest = parts.next()?;
    if !prefix.eq_ignore_ascii_case("agent") || agent_id.trim().is_empty() || rest.is_empty() {
        return None;
    }
    Some(normalize_agent_id(Some(agent_id)))
}

fn default_agent_entry(config: &Config) -> Option<&AgentEntry> {
    config
        .agents
        .list
        .iter()
        .find(|agent| agent.default)
        .or_else(|| config.agents.list.first())
}

pub fn resolve_default_agent_id(config: &Config) -> String {
    normalize_agent_id(default_agent_entry(config).map(|agent| agent.id.as_str()))
}

/// Agent owning a session: the id embedded in the key, else the default agent.
pub fn resolve_session_agent_id(session_key: Option<&str>, config: &Config) -> String {
    session_key
        .and_then(parse_agent_session_key)
        .unwrap_or_else(|| resolve_default_agent_id(config))
}

pub fn resolve_agent_workspace_dir(config: &Config, agent_id: &str) -> PathBuf {
    let agent_id = normalize_agent_id(Some(agent_id));
    let configured = config
        .agents
        .list
        .iter()
        .find(|agent| normalize_agent_id(Some(&agent.id)) == agent_id)
        .and_then(|agent| agent.workspace.as_deref())
        .map(str::trim)
        .filter(|workspace| !workspace.is_empty());

    if let Some(workspace) = configured {
        let expanded = PathBuf::from(shellexpand::tilde(workspace).into_owned());
        return if expanded.is_absolute() {
            expanded
        } else {
            config.state_dir.join(expanded)
        };
    }

    if agent_id == resolve_default_agent_id(config) {
        config.workspace_dir.clone()
    } else {
        config.state_dir.join(format!("workspace-{agent_id}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(agents: &[(&str, bool, Option<&str>)]) -> Config {
        let mut config = Config::with_state_dir(PathBuf::from("/state"));
        config.agents.list = agents
            .iter()
            .map(|(id, default, workspace)| AgentEntry {
                id: (*id).to_string(),
                default: *default,
                workspace: workspace.map(str::to_string),
            })
            .collect();
        config
    }

    #[test]
    fn normalize_agent_id_cleans_input() {
        assert_eq!(normalize_agent_id(None), "main");
        assert_eq!(normalize_agent_id(Some("  ")), "main");
        assert_eq!(normalize_agent_id(Some("Ops")), "ops");
        assert_eq!(normalize_agent_id(Some("team lead/bot")), "team-lead-bot");
        assert_eq!(normalize_agent_id(Some("!!!")), "main");
        assert_eq!(normalize_agent_id(Some(&"a".repeat(80))).len(), 64);
    }

    #[test]
    fn parse_agent_session_key_requires_three_parts() {
        assert_eq!(
            parse_agent_session_key("agent:Work:whatsapp:dm:+15550001"),
            Some("work".to_string())
        );
        assert_eq!(parse_agent_session_key("agent:work"), None);
        assert_eq!(parse_agent_session_key("agent::main"), None);
        assert_eq!(parse_agent_session_key("whatsapp:dm:+1555"), None);
    }

    #[test]
    fn session_agent_falls_back_to_default_agent() {
        let config = config_with(&[("alpha", false, None), ("beta", true, None)]);
        assert_eq!(resolve_session_agent_id(Some("global"), &config), "beta");
        assert_eq!(resolve_session_agent_id(None, &config), "beta");
        assert_eq!(
            resolve_session_agent_id(Some("agent:alpha:main"), &config),
            "alpha"
        );
    }

    #[test]
    fn default_agent_is_first_when_none_flagged() {
        let config = config_with(&[("alpha", false, None), ("beta", false, None)]);
        assert_eq!(resolve_default_agent_id(&config), "alpha");
        assert_eq!(
            resolve_default_agent_id(&Config::with_state_dir(PathBuf::from("/s"))),
            "main"
        );
    }

    #[test]
    fn workspace_dir_resolution() {
        let config = config_with(&[
            ("main", true, None),
            ("ops", false, Some("/srv/ops")),
            ("rel", false, Some("rel-ws")),
        ]);

        assert_eq!(
            resolve_agent_workspace_dir(&config, "main"),
            PathBuf::from("/state/workspace")
        );
        assert_eq!(
            resolve_agent_workspace_dir(&config, "OPS"),
            PathBuf::from("/srv/ops")
        );
        assert_eq!(
            resolve_agent_workspace_dir(&config, "rel"),
            PathBuf::from("/state/rel-ws")
        );
        assert_eq!(
            resolve_agent_workspace_dir(&config, "other"),
            PathBuf::from("/state/workspace-other")
        );
    }
}
