pub mod agent;
pub mod chat;
pub mod config;
pub mod environment;
pub mod error;
pub mod lifecycle;
pub mod orchestrator;
pub mod profile;
pub mod prompt;
pub mod scheduler;
pub mod storage;

pub use agent::{ActionLogEntry, AgentFilter, AgentRecord, AgentStatus, AgentUpdate};
pub use chat::ResponsePolicy;
pub use config::{load_config, EnvironmentConfig, SparringConfig, StoreBackend};
pub use environment::{
    ConnectionHandle, ConnectionParams, DispatchOutcome, EnvironmentAdapter, EnvironmentError,
    HttpEnvironmentAdapter, SimulatedEnvironment,
};
pub use error::{Result, SparringError};
pub use lifecycle::{HealthReport, LifecycleManager};
pub use orchestrator::{AgentOrchestrator, CreateAgentRequest, DEFAULT_ACTION_LIMIT};
pub use profile::{ProfileDefinition, ProfileId, ProfileRegistry};
pub use scheduler::{BehaviorScheduler, SkipReason, TickOutcome};
pub use storage::{AgentStore, MemoryAgentStore, SqliteAgentStore, StoreError, StoreResult};
