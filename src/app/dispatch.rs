use crate::agent::scope::resolve_session_agent_id;
use crate::app::status::{render_config, render_session_status};
use crate::cli::{Cli, Commands};
use crate::config::Config;
use crate::error::{Result, SessionError};
use crate::security::untrusted_confirmation::{
    ClearOutcome, MarkOutcome, MarkPendingParams, clear_untrusted_confirmation_pending,
    try_mark_untrusted_confirmation_pending,
};
use crate::security::UntrustedSource;
use crate::session::{SessionStore, resolve_store_path};
use std::path::PathBuf;

fn session_target(config: &Config, session_key: &str, agent: Option<&str>) -> (String, PathBuf) {
    let agent_id = agent.map_or_else(
        || resolve_session_agent_id(Some(session_key), config),
        |agent| crate::agent::scope::normalize_agent_id(Some(agent)),
    );
    let store_path =
        resolve_store_path(config.session.store.as_deref(), &agent_id, &config.state_dir);
    (agent_id, store_path)
}

pub async fn run_status(
    store: &dyn SessionStore,
    config: &Config,
    session_key: &str,
    agent: Option<&str>,
) -> Result<String> {
    let (agent_id, store_path) = session_target(config, session_key, agent);
    let entry = store
        .load_entry(&store_path, session_key)
        .await
        .map_err(SessionError::Store)?;
    Ok(render_session_status(
        session_key,
        &agent_id,
        &store_path,
        entry.as_ref(),
    ))
}

pub async fn run_mark(
    store: &dyn SessionStore,
    config: &Config,
    session_key: &str,
    agent: Option<&str>,
    source: UntrustedSource,
    create: bool,
) -> Result<String> {
    let (agent_id, store_path) = session_target(config, session_key, agent);
    if create {
        store
            .ensure_entry(&store_path, session_key)
            .await
            .map_err(SessionError::Store)?;
    }

    let params =
        MarkPendingParams::new(config, session_key).with_agent_id(Some(agent_id.as_str()));
    let outcome = try_mark_untrusted_confirmation_pending(store, params)
        .await
        .map_err(SessionError::Store)?;
    tracing::info!(session_key, source = source.as_str(), ?outcome, "mark");

    match outcome {
        MarkOutcome::MissingEntry => {
            Err(SessionError::NotFound(format!("{session_key} (use --create)")).into())
        }
        MarkOutcome::AlreadyPending => {
            Ok(format!("{session_key}: confirmation already pending; tools held"))
        }
        MarkOutcome::Marked | MarkOutcome::Skipped => {
            Ok(format!("{session_key}: {}", source.reason()))
        }
    }
}

pub async fn run_confirm(
    store: &dyn SessionStore,
    config: &Config,
    session_key: &str,
    agent: Option<&str>,
    reply: &str,
) -> Result<String> {
    let (agent_id, _) = session_target(config, session_key, agent);
    let params =
        MarkPendingParams::new(config, session_key).with_agent_id(Some(agent_id.as_str()));
    let outcome = clear_untrusted_confirmation_pending(store, params, Some(reply))
        .await
        .map_err(SessionError::Store)?;
    tracing::info!(session_key, ?outcome, "confirm");

    match outcome {
        ClearOutcome::NotConfirmed => Ok(format!(
            "{session_key}: not an explicit confirmation; reply \"confirm\" or \"yes, proceed\""
        )),
        ClearOutcome::MissingEntry | ClearOutcome::Skipped => {
            Err(SessionError::NotFound(session_key.to_string()).into())
        }
        ClearOutcome::NotPending => Ok(format!("{session_key}: no confirmation was pending")),
        ClearOutcome::Cleared => Ok(format!("{session_key}: confirmed; tools re-enabled")),
    }
}

pub async fn dispatch(cli: Cli, config: Config, store: &dyn SessionStore) -> anyhow::Result<()> {
    let output = match cli.command {
        Commands::Status { session, agent } => {
            run_status(store, &config, &session, agent.as_deref()).await?
        }
        Commands::Mark {
            session,
            agent,
            source,
            create,
        } => {
            run_mark(
                store,
                &config,
                &session,
                agent.as_deref(),
                source.into(),
                create,
            )
            .await?
        }
        Commands::Confirm {
            session,
            agent,
            reply,
        } => run_confirm(store, &config, &session, agent.as_deref(), &reply.join(" ")).await?,
        Commands::Config => render_config(&config),
    };
    println!("{output}");
    Ok(())
}
