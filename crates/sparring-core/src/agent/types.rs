use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::profile::ProfileId;

/// Lifecycle status of a spawned agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Idle,
    Spawning,
    Active,
    Paused,
    Terminated,
    Error,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatus::Idle => "idle",
            AgentStatus::Spawning => "spawning",
            AgentStatus::Active => "active",
            AgentStatus::Paused => "paused",
            AgentStatus::Terminated => "terminated",
            AgentStatus::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AgentStatus::Terminated | AgentStatus::Error)
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(AgentStatus::Idle),
            "spawning" => Ok(AgentStatus::Spawning),
            "active" => Ok(AgentStatus::Active),
            "paused" => Ok(AgentStatus::Paused),
            "terminated" => Ok(AgentStatus::Terminated),
            "error" => Ok(AgentStatus::Error),
            other => Err(format!("unknown agent status: {}", other)),
        }
    }
}

/// Authoritative record of one spawned agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRecord {
    pub id: String,
    pub profile_id: ProfileId,
    pub status: AgentStatus,
    pub connection_id: String,
    pub prompt: String,
    pub created_at: DateTime<Utc>,
    pub last_action_at: Option<DateTime<Utc>>,
    pub action_count: u64,
    /// Free-form settings captured at spawn time (e.g. "intensity")
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl AgentRecord {
    pub fn new(
        id: impl Into<String>,
        profile_id: ProfileId,
        connection_id: impl Into<String>,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            profile_id,
            status: AgentStatus::Spawning,
            connection_id: connection_id.into(),
            prompt: prompt.into(),
            created_at: Utc::now(),
            last_action_at: None,
            action_count: 0,
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Shallow merge of a partial update into this record.
    pub fn apply(&mut self, update: &AgentUpdate) {
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(connection_id) = &update.connection_id {
            self.connection_id = connection_id.clone();
        }
        if let Some(last_action_at) = update.last_action_at {
            self.last_action_at = Some(last_action_at);
        }
        if let Some(metadata) = &update.metadata {
            self.metadata = metadata.clone();
        }
        self.action_count = self.action_count.saturating_add(update.actions_performed);
    }
}

/// Partial record for `AgentStore::update`.
///
/// Present fields replace the stored value. The action counter is advanced by
/// `actions_performed` rather than overwritten so it can only grow.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentUpdate {
    pub status: Option<AgentStatus>,
    pub connection_id: Option<String>,
    pub last_action_at: Option<DateTime<Utc>>,
    pub actions_performed: u64,
    pub metadata: Option<HashMap<String, String>>,
}

impl AgentUpdate {
    pub fn status(status: AgentStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn action_recorded(at: DateTime<Utc>) -> Self {
        Self {
            last_action_at: Some(at),
            actions_performed: 1,
            ..Self::default()
        }
    }
}

/// Conjunctive filter for listing agents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<AgentStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_id: Option<ProfileId>,
}

impl AgentFilter {
    pub fn with_status(status: AgentStatus) -> Self {
        Self {
            status: Some(status),
            profile_id: None,
        }
    }

    pub fn matches(&self, record: &AgentRecord) -> bool {
        self.status.map_or(true, |status| record.status == status)
            && self
                .profile_id
                .map_or(true, |profile_id| record.profile_id == profile_id)
    }
}

/// One append-only entry in an agent's action history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionLogEntry {
    pub id: String,
    pub agent_id: String,
    pub action: String,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    #[serde(default)]
    pub note: String,
}

impl ActionLogEntry {
    pub fn new(
        agent_id: impl Into<String>,
        action: impl Into<String>,
        success: bool,
        note: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            agent_id: agent_id.into(),
            action: action.into(),
            timestamp: Utc::now(),
            success,
            note: note.into(),
        }
    }
}
