pub mod schema;

pub use schema::{AgentEntry, AgentsConfig, Config, ObservabilityConfig, SessionConfig};
