//! Lifecycle Manager: the only component that changes an agent's status.
//!
//! The status is always written to the store before any side effect runs,
//! so after a crash the store, not the scheduler, is the source of truth.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::agent::{AgentFilter, AgentRecord, AgentStatus, AgentUpdate};
use crate::environment::EnvironmentAdapter;
use crate::error::{Result, SparringError};
use crate::scheduler::BehaviorScheduler;
use crate::storage::AgentStore;

pub const AGENT_NOT_FOUND: &str = "Agent not found";
pub const CONNECTION_NOT_FOUND: &str = "Environment connection not found";
pub const LOOP_NOT_RUNNING: &str = "Agent is active but has no running behavior loop";

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub agent_id: String,
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<AgentStatus>,
    pub loop_running: bool,
    pub connection_found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_action_at: Option<DateTime<Utc>>,
    pub issues: Vec<String>,
    pub checked_at: DateTime<Utc>,
}

impl HealthReport {
    fn missing(agent_id: &str) -> Self {
        Self {
            agent_id: agent_id.to_string(),
            healthy: false,
            status: None,
            loop_running: false,
            connection_found: false,
            last_action_at: None,
            issues: vec![AGENT_NOT_FOUND.to_string()],
            checked_at: Utc::now(),
        }
    }
}

pub struct LifecycleManager {
    store: Arc<dyn AgentStore>,
    environment: Arc<dyn EnvironmentAdapter>,
    scheduler: Arc<BehaviorScheduler>,
    staleness_threshold: Duration,
    /// Serializes transitions of the same agent
    transition_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl LifecycleManager {
    pub fn new(
        store: Arc<dyn AgentStore>,
        environment: Arc<dyn EnvironmentAdapter>,
        scheduler: Arc<BehaviorScheduler>,
        staleness_threshold: Duration,
    ) -> Self {
        Self {
            store,
            environment,
            scheduler,
            staleness_threshold,
            transition_locks: DashMap::new(),
        }
    }

    pub async fn activate(&self, agent_id: &str) -> Result<AgentRecord> {
        self.transition(agent_id, AgentStatus::Active).await
    }

    pub async fn pause(&self, agent_id: &str) -> Result<AgentRecord> {
        self.transition(agent_id, AgentStatus::Paused).await
    }

    pub async fn terminate(&self, agent_id: &str) -> Result<AgentRecord> {
        self.transition(agent_id, AgentStatus::Terminated).await
    }

    /// Move an agent to `error`, keeping the reason in its metadata.
    pub async fn fail(&self, agent_id: &str, reason: &str) -> Result<AgentRecord> {
        let lock = self.transition_lock(agent_id);
        let _guard = lock.lock().await;

        let record = self.load_for_transition(agent_id).await?;
        if check_transition(&record, AgentStatus::Error)? {
            return Ok(record);
        }

        let mut metadata = record.metadata.clone();
        metadata.insert("error_reason".to_string(), reason.to_string());
        let updated = self
            .store
            .update(
                agent_id,
                AgentUpdate {
                    status: Some(AgentStatus::Error),
                    metadata: Some(metadata),
                    ..AgentUpdate::default()
                },
            )
            .await?;

        log::warn!("[{}] {} -> error: {}", agent_id, record.status, reason);
        self.scheduler.stop(agent_id);
        Ok(updated)
    }

    pub async fn transition(&self, agent_id: &str, target: AgentStatus) -> Result<AgentRecord> {
        let lock = self.transition_lock(agent_id);
        let _guard = lock.lock().await;

        let record = self.load_for_transition(agent_id).await?;
        if check_transition(&record, target)? {
            log::debug!("[{}] Already {}, nothing to do", agent_id, target);
            return Ok(record);
        }

        let updated = self
            .store
            .update(agent_id, AgentUpdate::status(target))
            .await?;
        log::info!("[{}] {} -> {}", agent_id, record.status, target);

        match target {
            AgentStatus::Active => {
                if !self.scheduler.start(agent_id, updated.profile_id) {
                    log::debug!("[{}] Behavior loop already running", agent_id);
                }
            }
            AgentStatus::Paused | AgentStatus::Error => {
                self.scheduler.stop(agent_id);
            }
            AgentStatus::Terminated => {
                self.scheduler.stop(agent_id);
                if let Err(e) = self.environment.disconnect(&updated.connection_id).await {
                    log::warn!(
                        "[{}] Failed to disconnect {} during termination: {}",
                        agent_id,
                        updated.connection_id,
                        e
                    );
                }
                // Every later transition is a no-op or rejected
                self.forget(agent_id);
            }
            AgentStatus::Idle | AgentStatus::Spawning => {}
        }

        Ok(updated)
    }

    /// Terminate every active agent, one after another.
    pub async fn terminate_all(&self) -> Result<usize> {
        let active = self
            .store
            .find_all(&AgentFilter::with_status(AgentStatus::Active))
            .await?;

        let mut processed = 0;
        for record in active {
            match self.terminate(&record.id).await {
                Ok(_) => processed += 1,
                // Removed between the listing and the transition
                Err(SparringError::AgentNotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }

        log::info!("Terminated {} active agents", processed);
        Ok(processed)
    }

    /// Read-only health check; reports problems without repairing them.
    pub async fn health(&self, agent_id: &str) -> Result<HealthReport> {
        let Some(record) = self.store.find_by_id(agent_id).await? else {
            return Ok(HealthReport::missing(agent_id));
        };

        let mut issues = Vec::new();

        let connection_found = self
            .environment
            .get_connection(&record.connection_id)
            .await
            .is_some();
        if !connection_found {
            issues.push(CONNECTION_NOT_FOUND.to_string());
        }

        let loop_running = self.scheduler.is_running(agent_id);
        if record.status == AgentStatus::Active {
            if !loop_running {
                issues.push(LOOP_NOT_RUNNING.to_string());
            }

            let baseline = record.last_action_at.unwrap_or(record.created_at);
            if let Ok(idle) = Utc::now().signed_duration_since(baseline).to_std() {
                if idle > self.staleness_threshold {
                    issues.push(format!(
                        "No action for {}s (threshold {}s)",
                        idle.as_secs(),
                        self.staleness_threshold.as_secs()
                    ));
                }
            }
        }

        Ok(HealthReport {
            agent_id: record.id,
            healthy: issues.is_empty(),
            status: Some(record.status),
            loop_running,
            connection_found,
            last_action_at: record.last_action_at,
            issues,
            checked_at: Utc::now(),
        })
    }

    /// Drop bookkeeping for an agent whose record is gone.
    pub fn forget(&self, agent_id: &str) {
        self.transition_locks.remove(agent_id);
    }

    /// Load under the transition lock, dropping the lock entry for agents
    /// that are gone or already terminated.
    async fn load_for_transition(&self, agent_id: &str) -> Result<AgentRecord> {
        let loaded = self.load(agent_id).await;
        match &loaded {
            Ok(record) if record.status != AgentStatus::Terminated => {}
            _ => self.forget(agent_id),
        }
        loaded
    }

    async fn load(&self, agent_id: &str) -> Result<AgentRecord> {
        self.store
            .find_by_id(agent_id)
            .await?
            .ok_or_else(|| SparringError::AgentNotFound(agent_id.to_string()))
    }

    fn transition_lock(&self, agent_id: &str) -> Arc<Mutex<()>> {
        self.transition_locks
            .entry(agent_id.to_string())
            .or_default()
            .clone()
    }
}

/// Returns `Ok(true)` when the request is a no-op repeat of a terminal state.
fn check_transition(record: &AgentRecord, target: AgentStatus) -> Result<bool> {
    let invalid = || SparringError::InvalidTransition {
        agent_id: record.id.clone(),
        from: record.status,
        to: target,
    };

    match (record.status, target) {
        (_, AgentStatus::Idle | AgentStatus::Spawning) => Err(invalid()),
        (from, to) if from == to && from.is_terminal() => Ok(true),
        (AgentStatus::Error, AgentStatus::Terminated) => Ok(false),
        (from, _) if from.is_terminal() => Err(invalid()),
        _ => Ok(false),
    }
}
