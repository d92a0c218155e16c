//! Passive WhatsApp transcript archive.
//!
//! Appends every observed message to `<workspace>/memory/whatsapp/<date>.md`.
//! Archiving is best-effort and never touches tool gate state.

use crate::agent::scope::resolve_agent_workspace_dir;
use crate::config::Config;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

const DIR_MODE: u32 = 0o700;
const FILE_MODE: u32 = 0o600;

#[derive(Debug, Clone, Default)]
pub struct PassiveWhatsAppMessage {
    pub agent_id: String,
    pub timestamp_ms: i64,
    pub group: bool,
    pub chat_id: String,
    pub group_subject: Option<String>,
    pub sender_e164: Option<String>,
    pub push_name: Option<String>,
    pub is_from_me: bool,
    pub body: String,
}

fn normalize_name(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|name| !name.is_empty())
}

fn normalize_body(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn build_direct_label(chat_id: &str, name: Option<&str>) -> String {
    match name {
        Some(name) => format!("{chat_id} ({name})"),
        None => chat_id.to_string(),
    }
}

fn build_group_label<'a>(group_subject: Option<&'a str>, chat_id: &'a str) -> &'a str {
    group_subject.unwrap_or(chat_id)
}

fn build_group_speaker(name: Option<&str>, sender_e164: Option<&str>, is_from_me: bool) -> String {
    if is_from_me {
        return "You".to_string();
    }
    match (name, sender_e164) {
        (Some(name), Some(sender)) => format!("{name} ({sender})"),
        (Some(name), None) => name.to_string(),
        (None, Some(sender)) => sender.to_string(),
        (None, None) => "Unknown".to_string(),
    }
}

/// Markdown entry for one message: a section heading plus a timestamped line.
fn render_entry(message: &PassiveWhatsAppMessage, body: &str, time: &str) -> String {
    let name = normalize_name(message.push_name.as_deref());
    let sender = normalize_name(message.sender_e164.as_deref());

    let (section_title, speaker) = if message.group {
        let subject = normalize_name(message.group_subject.as_deref());
        (
            format!("Group: {}", build_group_label(subject, &message.chat_id)),
            build_group_speaker(name, sender, message.is_from_me),
        )
    } else {
        let label = build_direct_label(&message.chat_id, name);
        let direction = if message.is_from_me { "To" } else { "From" };
        (format!("Direct: {label}"), format!("{direction} {label}"))
    };

    format!("\n## {section_title}\n- **{time}** {speaker}: {body}\n")
}

async fn create_private_dir(dir: &Path) -> Result<()> {
    let mut builder = tokio::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(DIR_MODE);
    builder
        .create(dir)
        .await
        .with_context(|| format!("failed to create archive directory '{}'", dir.display()))
}

fn private_file_options() -> tokio::fs::OpenOptions {
    let mut options = tokio::fs::OpenOptions::new();
    #[cfg(unix)]
    options.mode(FILE_MODE);
    options
}

async fn ensure_file_header(file_path: &Path, header: &str) -> Result<()> {
    match private_file_options()
        .write(true)
        .create_new(true)
        .open(file_path)
        .await
    {
        Ok(mut file) => {
            file.write_all(header.as_bytes()).await?;
            file.flush().await?;
            Ok(())
        }
        Err(error) if error.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
        Err(error) => Err(error)
            .with_context(|| format!("failed to create archive file '{}'", file_path.display())),
    }
}

/// Append one message to the daily archive. Returns the file written, or
/// `None` when the body is blank.
pub async fn try_append_passive_whatsapp_message(
    config: &Config,
    message: &PassiveWhatsAppMessage,
) -> Result<Option<PathBuf>> {
    let body = normalize_body(&message.body);
    if body.is_empty() {
        return Ok(None);
    }

    let timestamp: DateTime<Utc> = DateTime::from_timestamp_millis(message.timestamp_ms)
        .with_context(|| format!("timestamp out of range: {}", message.timestamp_ms))?;
    let date = timestamp.format("%Y-%m-%d").to_string();
    let time = timestamp.format("%H:%M:%S").to_string();

    let workspace_dir = resolve_agent_workspace_dir(config, &message.agent_id);
    let memory_dir = workspace_dir.join("memory").join("whatsapp");
    let file_path = memory_dir.join(format!("{date}.md"));

    create_private_dir(&memory_dir).await?;
    ensure_file_header(&file_path, &format!("# WhatsApp Messages - {date}\n")).await?;

    let entry = render_entry(message, &body, &time);
    let mut file = private_file_options()
        .append(true)
        .open(&file_path)
        .await
        .with_context(|| format!("failed to open archive file '{}'", file_path.display()))?;
    file.write_all(entry.as_bytes()).await?;
    file.flush().await?;

    Ok(Some(file_path))
}

/// Best-effort archive append; failures are logged, never returned.
pub async fn append_passive_whatsapp_message(config: &Config, message: &PassiveWhatsAppMessage) {
    if let Err(error) = try_append_passive_whatsapp_message(config, message).await {
        tracing::warn!(
            agent_id = %message.agent_id,
            error = %format!("{error:#}"),
            "passive monitor write failed"
        );
    }
}
