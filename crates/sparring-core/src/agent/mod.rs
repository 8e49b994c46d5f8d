pub mod types;

pub use types::{ActionLogEntry, AgentFilter, AgentRecord, AgentStatus, AgentUpdate};
