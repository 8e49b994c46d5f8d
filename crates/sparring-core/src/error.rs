use thiserror::Error;

use crate::agent::AgentStatus;
use crate::environment::EnvironmentError;
use crate::storage::StoreError;

/// Failures surfaced to callers of the orchestration core.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SparringError {
    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    #[error("Agent already exists: {0}")]
    DuplicateAgent(String),

    #[error("Environment unavailable: {reason}")]
    EnvironmentUnavailable { reason: String, retryable: bool },

    #[error("Unknown profile: {0}")]
    UnknownProfile(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Agent {agent_id} cannot move from {from} to {to}")]
    InvalidTransition {
        agent_id: String,
        from: AgentStatus,
        to: AgentStatus,
    },

    #[error("Store error: {0}")]
    Store(String),
}

impl SparringError {
    /// Stable snake_case name, used in API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            SparringError::AgentNotFound(_) => "agent_not_found",
            SparringError::DuplicateAgent(_) => "duplicate_agent",
            SparringError::EnvironmentUnavailable { .. } => "environment_unavailable",
            SparringError::UnknownProfile(_) => "unknown_profile",
            SparringError::Validation(_) => "validation",
            SparringError::InvalidTransition { .. } => "invalid_transition",
            SparringError::Store(_) => "store",
        }
    }
}

impl From<StoreError> for SparringError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::AgentNotFound(id) => SparringError::AgentNotFound(id),
            StoreError::DuplicateAgent(id) => SparringError::DuplicateAgent(id),
            other => SparringError::Store(other.to_string()),
        }
    }
}

impl From<EnvironmentError> for SparringError {
    fn from(e: EnvironmentError) -> Self {
        let retryable = e.is_retryable();
        SparringError::EnvironmentUnavailable {
            reason: e.to_string(),
            retryable,
        }
    }
}

pub type Result<T> = std::result::Result<T, SparringError>;
