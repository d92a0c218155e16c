use crate::agent::scope::{resolve_agent_workspace_dir, resolve_default_agent_id};
use crate::config::Config;
use crate::session::{SessionEntry, resolve_store_path};
use chrono::DateTime;
use std::path::Path;

fn format_ms(ms: i64) -> String {
    DateTime::from_timestamp_millis(ms).map_or_else(|| ms.to_string(), |at| at.to_rfc3339())
}

pub fn render_session_status(
    session_key: &str,
    agent_id: &str,
    store_path: &Path,
    entry: Option<&SessionEntry>,
) -> String {
    let mut lines = vec![
        format!("session   {session_key}"),
        format!("agent     {agent_id}"),
        format!("store     {}", store_path.display()),
    ];

    let Some(entry) = entry else {
        lines.push("entry     (none)".to_string());
        return lines.join("\n");
    };

    lines.push(format!("entry     {}", entry.session_id));
    lines.push(format!("updated   {}", format_ms(entry.updated_at)));
    if entry.is_untrusted_pending() {
        let since = entry
            .untrusted_memory_pending_at
            .map_or_else(|| "unknown".to_string(), format_ms);
        lines.push(format!("tools     held (confirmation pending since {since})"));
    } else {
        lines.push("tools     enabled".to_string());
    }
    lines.join("\n")
}

pub fn render_config(config: &Config) -> String {
    let default_agent = resolve_default_agent_id(config);
    let mut lines = vec![
        format!("◆ toolgate {}", env!("CARGO_PKG_VERSION")),
        String::new(),
        format!("  state dir     {}", config.state_dir.display()),
        format!("  config        {}", config.config_path.display()),
        format!("  log level     {}", config.observability.log_level),
        format!(
            "  session store {}",
            config.session.store.as_deref().unwrap_or("(default)")
        ),
        String::new(),
    ];

    let mut agent_ids: Vec<String> = config
        .agents
        .list
        .iter()
        .map(|agent| crate::agent::scope::normalize_agent_id(Some(&agent.id)))
        .collect();
    if agent_ids.is_empty() {
        agent_ids.push(default_agent.clone());
    }
    for agent_id in agent_ids {
        let marker = if agent_id == default_agent { "*" } else { " " };
        lines.push(format!("{marker} {agent_id}"));
        lines.push(format!(
            "    workspace   {}",
            resolve_agent_workspace_dir(config, &agent_id).display()
        ));
        lines.push(format!(
            "    sessions    {}",
            resolve_store_path(config.session.store.as_deref(), &agent_id, &config.state_dir)
                .display()
        ));
    }
    lines.join("\n")
}
