//! State Store: the single source of truth for agent records and their
//! action logs.
//!
//! Every operation is atomic from the caller's point of view; a concurrent
//! `update` and `find_by_id` never observe a half-merged record.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use thiserror::Error;

use crate::agent::{ActionLogEntry, AgentFilter, AgentRecord, AgentUpdate};

pub use memory::MemoryAgentStore;
pub use sqlite::SqliteAgentStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    #[error("Agent already exists: {0}")]
    DuplicateAgent(String),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid stored data: {0}")]
    InvalidData(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage task join error: {0}")]
    Task(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait AgentStore: Send + Sync {
    /// Fails with `DuplicateAgent` if the id is taken.
    async fn create(&self, record: AgentRecord) -> StoreResult<()>;

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<AgentRecord>>;

    /// Matching records, newest created first.
    async fn find_all(&self, filter: &AgentFilter) -> StoreResult<Vec<AgentRecord>>;

    /// Shallow merge; returns the record as stored after the merge.
    async fn update(&self, id: &str, update: AgentUpdate) -> StoreResult<AgentRecord>;

    /// Removes the agent together with its action log. Returns whether it existed.
    async fn delete(&self, id: &str) -> StoreResult<bool>;

    async fn append_action(&self, entry: ActionLogEntry) -> StoreResult<()>;

    /// At most `limit` entries, newest first.
    async fn list_actions(&self, agent_id: &str, limit: usize) -> StoreResult<Vec<ActionLogEntry>>;

    async fn count(&self, filter: &AgentFilter) -> StoreResult<usize>;
}
