//! Boundary to the virtual world the agents act in.

pub mod http;
pub mod simulated;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use http::HttpEnvironmentAdapter;
pub use simulated::SimulatedEnvironment;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EnvironmentError {
    #[error("connection failed: {reason}")]
    ConnectFailed { reason: String, retryable: bool },

    #[error("connection not found: {0}")]
    ConnectionNotFound(String),

    #[error("disconnect failed: {0}")]
    DisconnectFailed(String),

    #[error("dispatch failed: {0}")]
    DispatchFailed(String),

    #[error("transport error: {0}")]
    Transport(String),
}

impl EnvironmentError {
    pub fn is_retryable(&self) -> bool {
        match self {
            EnvironmentError::ConnectFailed { retryable, .. } => *retryable,
            EnvironmentError::Transport(_) => true,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for EnvironmentError {
    fn from(e: reqwest::Error) -> Self {
        EnvironmentError::Transport(e.to_string())
    }
}

/// Where a new connection should be opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionParams {
    pub host: String,
    pub port: u16,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub options: HashMap<String, String>,
}

impl Default for ConnectionParams {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 25565,
            options: HashMap::new(),
        }
    }
}

/// A live connection as seen by the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionHandle {
    pub connection_id: String,
    pub identity: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchOutcome {
    pub success: bool,
    #[serde(default)]
    pub detail: String,
}

impl DispatchOutcome {
    pub fn ok(detail: impl Into<String>) -> Self {
        Self {
            success: true,
            detail: detail.into(),
        }
    }

    pub fn failed(detail: impl Into<String>) -> Self {
        Self {
            success: false,
            detail: detail.into(),
        }
    }
}

#[async_trait]
pub trait EnvironmentAdapter: Send + Sync {
    /// Open a connection for `identity`, returning its connection id.
    async fn connect(
        &self,
        identity: &str,
        params: &ConnectionParams,
    ) -> Result<String, EnvironmentError>;

    async fn get_connection(&self, connection_id: &str) -> Option<ConnectionHandle>;

    async fn disconnect(&self, connection_id: &str) -> Result<(), EnvironmentError>;

    /// Perform one action tag through an open connection.
    async fn dispatch(
        &self,
        handle: &ConnectionHandle,
        action: &str,
    ) -> Result<DispatchOutcome, EnvironmentError>;
}
