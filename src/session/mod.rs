pub mod store;
pub mod types;

pub use store::{
    EntryUpdateFn, JsonFileSessionStore, MemorySessionStore, SessionStore, resolve_store_path,
};
pub use types::{SessionEntry, SessionEntryPatch, UpdateOutcome, now_ms};
