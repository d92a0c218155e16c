use super::types::{SessionEntry, SessionEntryPatch, UpdateOutcome};
use crate::agent::scope::normalize_agent_id;
use anyhow::{Context, Result};
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use uuid::Uuid;

const AGENT_ID_PLACEHOLDER: &str = "{agentId}";
const DEFAULT_STORE_FILENAME: &str = "sessions.json";

/// Conditional update callback: `None` means "no change needed".
pub type EntryUpdateFn<'a> =
    Box<dyn FnOnce(&SessionEntry) -> Option<SessionEntryPatch> + Send + 'a>;

/// Async session persistence contract.
///
/// `update_entry` must run the callback against a consistent view of the
/// entry and apply its patch atomically with respect to other updates of the
/// same `(store_path, session_key)`.
pub trait SessionStore: Send + Sync {
    fn load_entry<'a>(
        &'a self,
        store_path: &'a Path,
        session_key: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<SessionEntry>>> + Send + 'a>>;

    fn ensure_entry<'a>(
        &'a self,
        store_path: &'a Path,
        session_key: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<SessionEntry>> + Send + 'a>>;

    fn update_entry<'a>(
        &'a self,
        store_path: &'a Path,
        session_key: &'a str,
        update: EntryUpdateFn<'a>,
    ) -> Pin<Box<dyn Future<Output = Result<UpdateOutcome>> + Send + 'a>>;
}

/// Resolve the session store file for an agent.
///
/// A configured path may contain `{agentId}` and a leading `~`; relative
/// paths resolve against `state_dir`. Without configuration the store lives at
/// `<state_dir>/agents/<agentId>/sessions/sessions.json`.
pub fn resolve_store_path(store: Option<&str>, agent_id: &str, state_dir: &Path) -> PathBuf {
    let agent_id = normalize_agent_id(Some(agent_id));
    match store.map(str::trim).filter(|value| !value.is_empty()) {
        Some(configured) => {
            let substituted = configured.replace(AGENT_ID_PLACEHOLDER, &agent_id);
            let expanded = PathBuf::from(shellexpand::tilde(&substituted).into_owned());
            if expanded.is_absolute() {
                expanded
            } else {
                state_dir.join(expanded)
            }
        }
        None => state_dir
            .join("agents")
            .join(agent_id)
            .join("sessions")
            .join(DEFAULT_STORE_FILENAME),
    }
}

type EntryMap = BTreeMap<String, SessionEntry>;

/// JSON-file session store, one file per agent keyed by session key.
#[derive(Debug, Default)]
pub struct JsonFileSessionStore {
    locks: Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>,
}

impl JsonFileSessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn path_lock(&self, store_path: &Path) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            locks
                .entry(store_path.to_path_buf())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
        )
    }
}

async fn read_entries(store_path: &Path) -> Result<EntryMap> {
    match tokio::fs::read_to_string(store_path).await {
        Ok(content) if content.trim().is_empty() => Ok(EntryMap::new()),
        Ok(content) => serde_json::from_str(&content)
            .with_context(|| format!("failed to parse session store '{}'", store_path.display())),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(EntryMap::new()),
        Err(error) => Err(error)
            .with_context(|| format!("failed to read session store '{}'", store_path.display())),
    }
}

async fn write_entries(store_path: &Path, entries: &EntryMap) -> Result<()> {
    let content = serde_json::to_string_pretty(entries).context("serialize session store")?;
    if let Some(parent) = store_path.parent() {
        tokio::fs::create_dir_all(parent).await.with_context(|| {
            format!(
                "failed to create session store directory '{}'",
                parent.display()
            )
        })?;
    }

    let temp_path = store_path.with_extension(format!("{}.tmp", Uuid::new_v4().simple()));
    tokio::fs::write(&temp_path, content)
        .await
        .with_context(|| format!("failed to write session temp file '{}'", temp_path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(&temp_path, std::fs::Permissions::from_mode(0o600))
            .await
            .with_context(|| format!("failed to set permissions on '{}'", temp_path.display()))?;
    }

    if let Err(rename_error) = tokio::fs::rename(&temp_path, store_path).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(rename_error).with_context(|| {
            format!(
                "failed replacing session store atomically: {}",
                store_path.display()
            )
        });
    }

    Ok(())
}

impl SessionStore for JsonFileSessionStore {
    fn load_entry<'a>(
        &'a self,
        store_path: &'a Path,
        session_key: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<SessionEntry>>> + Send + 'a>> {
        Box::pin(async move {
            let lock = self.path_lock(store_path);
            let _guard = lock.lock().await;
            let mut entries = read_entries(store_path).await?;
            Ok(entries.remove(session_key))
        })
    }

    fn ensure_entry<'a>(
        &'a self,
        store_path: &'a Path,
        session_key: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<SessionEntry>> + Send + 'a>> {
        Box::pin(async move {
            let lock = self.path_lock(store_path);
            let _guard = lock.lock().await;
            let mut entries = read_entries(store_path).await?;
            if let Some(existing) = entries.get(session_key) {
                return Ok(existing.clone());
            }

            let created = SessionEntry::new();
            entries.insert(session_key.to_string(), created.clone());
            write_entries(store_path, &entries).await?;
            tracing::debug!(
                store = %store_path.display(),
                session_key,
                session_id = %created.session_id,
                "session entry created"
            );
            Ok(created)
        })
    }

    fn update_entry<'a>(
        &'a self,
        store_path: &'a Path,
        session_key: &'a str,
        update: EntryUpdateFn<'a>,
    ) -> Pin<Box<dyn Future<Output = Result<UpdateOutcome>> + Send + 'a>> {
        Box::pin(async move {
            let lock = self.path_lock(store_path);
            let _guard = lock.lock().await;
            let mut entries = read_entries(store_path).await?;
            let Some(existing) = entries.get_mut(session_key) else {
                return Ok(UpdateOutcome::Missing);
            };

            let Some(patch) = update(existing) else {
                return Ok(UpdateOutcome::Unchanged(existing.clone()));
            };
            patch.apply(existing);
            let next = existing.clone();
            write_entries(store_path, &entries).await?;
            Ok(UpdateOutcome::Updated(next))
        })
    }
}

/// Process-local store. Counts every call so callers can assert on store traffic.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    entries: Mutex<HashMap<(PathBuf, String), SessionEntry>>,
    interactions: AtomicUsize,
    writes: AtomicUsize,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, store_path: &Path, session_key: &str, entry: SessionEntry) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((store_path.to_path_buf(), session_key.to_string()), entry);
    }

    pub fn entry(&self, store_path: &Path, session_key: &str) -> Option<SessionEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(store_path.to_path_buf(), session_key.to_string()))
            .cloned()
    }

    /// Number of trait calls served (reads and updates).
    pub fn interactions(&self) -> usize {
        self.interactions.load(Ordering::SeqCst)
    }

    /// Number of calls that persisted a change.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl SessionStore for MemorySessionStore {
    fn load_entry<'a>(
        &'a self,
        store_path: &'a Path,
        session_key: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<SessionEntry>>> + Send + 'a>> {
        Box::pin(async move {
            self.interactions.fetch_add(1, Ordering::SeqCst);
            Ok(self.entry(store_path, session_key))
        })
    }

    fn ensure_entry<'a>(
        &'a self,
        store_path: &'a Path,
        session_key: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<SessionEntry>> + Send + 'a>> {
        Box::pin(async move {
            self.interactions.fetch_add(1, Ordering::SeqCst);
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            let key = (store_path.to_path_buf(), session_key.to_string());
            if let Some(existing) = entries.get(&key) {
                return Ok(existing.clone());
            }
            let created = SessionEntry::new();
            entries.insert(key, created.clone());
            self.writes.fetch_add(1, Ordering::SeqCst);
            Ok(created)
        })
    }

    fn update_entry<'a>(
        &'a self,
        store_path: &'a Path,
        session_key: &'a str,
        update: EntryUpdateFn<'a>,
    ) -> Pin<Box<dyn Future<Output = Result<UpdateOutcome>> + Send + 'a>> {
        Box::pin(async move {
            self.interactions.fetch_add(1, Ordering::SeqCst);
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            let key = (store_path.to_path_buf(), session_key.to_string());
            let Some(existing) = entries.get_mut(&key) else {
                return Ok(UpdateOutcome::Missing);
            };
            let Some(patch) = update(existing) else {
                return Ok(UpdateOutcome::Unchanged(existing.clone()));
            };
            patch.apply(existing);
            self.writes.fetch_add(1, Ordering::SeqCst);
            Ok(UpdateOutcome::Updated(existing.clone()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn mark_if_not_pending(at_ms: i64) -> EntryUpdateFn<'static> {
        Box::new(move |entry: &SessionEntry| {
            (!entry.is_untrusted_pending()).then(|| SessionEntryPatch::mark_pending(at_ms))
        })
    }

    #[test]
    fn default_store_path_is_per_agent() {
        let path = resolve_store_path(None, "Ops", Path::new("/state"));
        assert_eq!(
            path,
            PathBuf::from("/state/agents/ops/sessions/sessions.json")
        );
    }

    #[test]
    fn configured_store_path_substitutes_agent_id() {
        let path = resolve_store_path(
            Some("/data/{agentId}/sessions.json"),
            "main",
            Path::new("/state"),
        );
        assert_eq!(path, PathBuf::from("/data/main/sessions.json"));
    }

    #[test]
    fn relative_store_path_resolves_against_state_dir() {
        let path = resolve_store_path(Some("stores/{agentId}.json"), "work", Path::new("/state"));
        assert_eq!(path, PathBuf::from("/state/stores/work.json"));
    }

    #[test]
    fn blank_store_path_falls_back_to_default() {
        let path = resolve_store_path(Some("   "), "main", Path::new("/state"));
        assert!(path.ends_with("agents/main/sessions/sessions.json"));
    }

    #[tokio::test]
    async fn json_store_update_on_missing_entry_is_missing() {
        let tmp = TempDir::new().expect("tempdir");
        let store = JsonFileSessionStore::new();
        let path = tmp.path().join("sessions.json");

        let outcome = store
            .update_entry(&path, "agent:main:dm", mark_if_not_pending(1))
            .await
            .expect("update");

        assert_eq!(outcome, UpdateOutcome::Missing);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn json_store_persists_updates_across_instances() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("agents/main/sessions/sessions.json");
        let store = JsonFileSessionStore::new();
        store
            .ensure_entry(&path, "agent:main:dm")
            .await
            .expect("ensure entry");

        let outcome = store
            .update_entry(&path, "agent:main:dm", mark_if_not_pending(1_700_000_000_000))
            .await
            .expect("update");
        assert!(outcome.was_updated());

        let reopened = JsonFileSessionStore::new();
        let entry = reopened
            .load_entry(&path, "agent:main:dm")
            .await
            .expect("load")
            .expect("entry exists");
        assert!(entry.is_untrusted_pending());
        assert_eq!(entry.untrusted_memory_pending_at, Some(1_700_000_000_000));
    }

    #[tokio::test]
    async fn json_store_unchanged_update_does_not_rewrite_file() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("sessions.json");
        let store = JsonFileSessionStore::new();
        store.ensure_entry(&path, "k").await.expect("ensure entry");
        let before = std::fs::read_to_string(&path).expect("read store");

        let outcome = store
            .update_entry(&path, "k", Box::new(|_: &SessionEntry| None))
            .await
            .expect("update");

        assert!(matches!(outcome, UpdateOutcome::Unchanged(_)));
        assert_eq!(std::fs::read_to_string(&path).expect("read store"), before);
    }

    #[tokio::test]
    async fn json_store_preserves_foreign_fields() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("sessions.json");
        std::fs::write(
            &path,
            r#"{"k":{"sessionId":"abc","updatedAt":5,"channel":"whatsapp"}}"#,
        )
        .expect("seed store");

        let store = JsonFileSessionStore::new();
        store
            .update_entry(&path, "k", mark_if_not_pending(9))
            .await
            .expect("update");

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).expect("read")).expect("json");
        assert_eq!(raw["k"]["channel"], "whatsapp");
        assert_eq!(raw["k"]["sessionId"], "abc");
        assert_eq!(raw["k"]["untrustedMemoryPending"], true);
    }

    #[tokio::test]
    async fn json_store_rejects_corrupt_file() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("sessions.json");
        std::fs::write(&path, "{not json").expect("seed store");

        let store = JsonFileSessionStore::new();
        let err = store
            .load_entry(&path, "k")
            .await
            .expect_err("corrupt store must fail");
        assert!(err.to_string().contains("failed to parse session store"));
    }

    #[tokio::test]
    async fn concurrent_updates_write_once() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("sessions.json");
        let store = Arc::new(JsonFileSessionStore::new());
        store.ensure_entry(&path, "k").await.expect("ensure entry");

        let mut handles = Vec::new();
        for at in 0..8 {
            let store = Arc::clone(&store);
            let path = path.clone();
            handles.push(tokio::spawn(async move {
                store
                    .update_entry(&path, "k", mark_if_not_pending(at))
                    .await
                    .expect("update")
                    .was_updated()
            }));
        }

        let mut updated = 0;
        for handle in handles {
            if handle.await.expect("join") {
                updated += 1;
            }
        }
        assert_eq!(updated, 1);
    }

    #[tokio::test]
    async fn memory_store_counts_interactions() {
        let store = MemorySessionStore::new();
        let path = Path::new("/mem/sessions.json");
        store.insert(path, "k", SessionEntry::new());

        store
            .update_entry(path, "k", mark_if_not_pending(3))
            .await
            .expect("update");
        store
            .update_entry(path, "k", mark_if_not_pending(4))
            .await
            .expect("update");

        assert_eq!(store.interactions(), 2);
        assert_eq!(store.writes(), 1);
        assert_eq!(
            store.entry(path, "k").and_then(|e| e.untrusted_memory_pending_at),
            Some(3)
        );
    }
}
