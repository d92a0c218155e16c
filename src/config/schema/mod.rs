pub mod agents;
pub mod core;
pub mod observability;
pub mod session;

pub use self::core::Config;
pub use agents::{AgentEntry, AgentsConfig};
pub use observability::ObservabilityConfig;
pub use session::SessionConfig;
