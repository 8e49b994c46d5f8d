//! One injectable value wiring the registry, store, environment, scheduler
//! and lifecycle manager together.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::agent::{ActionLogEntry, AgentFilter, AgentRecord, AgentStatus};
use crate::chat::ResponsePolicy;
use crate::config::SparringConfig;
use crate::environment::{ConnectionParams, EnvironmentAdapter};
use crate::error::{Result, SparringError};
use crate::lifecycle::{HealthReport, LifecycleManager};
use crate::profile::{ProfileDefinition, ProfileRegistry};
use crate::prompt;
use crate::scheduler::BehaviorScheduler;
use crate::storage::AgentStore;

pub const DEFAULT_ACTION_LIMIT: usize = 50;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateAgentRequest {
    pub profile: String,
    #[serde(default)]
    pub intensity: Option<f64>,
    #[serde(default)]
    pub overrides: BTreeMap<String, String>,
    /// Overrides the configured default connection target
    #[serde(default)]
    pub connection: Option<ConnectionParams>,
}

impl CreateAgentRequest {
    pub fn new(profile: impl Into<String>) -> Self {
        Self {
            profile: profile.into(),
            ..Self::default()
        }
    }

    pub fn with_intensity(mut self, intensity: f64) -> Self {
        self.intensity = Some(intensity);
        self
    }
}

pub struct AgentOrchestrator {
    config: SparringConfig,
    profiles: Arc<ProfileRegistry>,
    store: Arc<dyn AgentStore>,
    environment: Arc<dyn EnvironmentAdapter>,
    scheduler: Arc<BehaviorScheduler>,
    lifecycle: LifecycleManager,
}

impl AgentOrchestrator {
    pub fn new(
        config: SparringConfig,
        store: Arc<dyn AgentStore>,
        environment: Arc<dyn EnvironmentAdapter>,
    ) -> Result<Self> {
        config.validate()?;
        let profiles = Arc::new(ProfileRegistry::builtin()?);
        let scheduler = Arc::new(BehaviorScheduler::new(
            store.clone(),
            environment.clone(),
            profiles.clone(),
        ));
        let lifecycle = LifecycleManager::new(
            store.clone(),
            environment.clone(),
            scheduler.clone(),
            config.staleness_threshold(),
        );

        Ok(Self {
            config,
            profiles,
            store,
            environment,
            scheduler,
            lifecycle,
        })
    }

    /// Build the store and environment named by `config`.
    pub async fn from_config(config: SparringConfig) -> Result<Self> {
        let store = config.build_store().await?;
        let environment = config.build_environment()?;
        Self::new(config, store, environment)
    }

    pub fn config(&self) -> &SparringConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &BehaviorScheduler {
        &self.scheduler
    }

    pub fn profiles(&self) -> &[ProfileDefinition] {
        self.profiles.list()
    }

    /// Spawn a new agent and put it to work.
    ///
    /// Nothing is persisted until the environment connection is open, so a
    /// failed spawn leaves no orphan record behind.
    pub async fn create_agent(&self, request: CreateAgentRequest) -> Result<AgentRecord> {
        let profile_id = self.profiles.resolve(&request.profile)?;
        let intensity = request.intensity.unwrap_or(self.config.default_intensity);
        if !(0.0..=1.0).contains(&intensity) {
            return Err(SparringError::Validation(format!(
                "intensity {} outside [0, 1]",
                intensity
            )));
        }

        let prompt = prompt::compose(&self.profiles, profile_id, intensity, &request.overrides);

        let agent_id = Uuid::new_v4().to_string();
        let short_id = agent_id.split('-').next().unwrap_or(&agent_id);
        let identity = format!("{}_{}", profile_id, short_id);
        let params = request
            .connection
            .unwrap_or_else(|| self.config.environment.connection.clone());

        let connection_id = self.environment.connect(&identity, &params).await?;
        log::info!(
            "[{}] Connected as {} to {}:{} ({})",
            agent_id,
            identity,
            params.host,
            params.port,
            connection_id
        );

        let mut record = AgentRecord::new(&agent_id, profile_id, &connection_id, prompt)
            .with_metadata("intensity", intensity.to_string())
            .with_metadata("identity", identity);
        for (key, value) in &request.overrides {
            record = record.with_metadata(format!("override.{}", key), value.clone());
        }

        if let Err(e) = self.store.create(record).await {
            log::error!("[{}] Failed to persist new agent: {}", agent_id, e);
            self.release_connection(&agent_id, &connection_id).await;
            return Err(e.into());
        }

        match self.lifecycle.activate(&agent_id).await {
            Ok(record) => Ok(record),
            Err(e) => {
                log::error!("[{}] Failed to activate new agent: {}", agent_id, e);
                self.scheduler.stop(&agent_id);
                if let Err(delete_err) = self.store.delete(&agent_id).await {
                    log::warn!(
                        "[{}] Failed to delete unactivated record: {}",
                        agent_id,
                        delete_err
                    );
                }
                self.lifecycle.forget(&agent_id);
                self.release_connection(&agent_id, &connection_id).await;
                Err(e)
            }
        }
    }

    async fn release_connection(&self, agent_id: &str, connection_id: &str) {
        if let Err(e) = self.environment.disconnect(connection_id).await {
            log::warn!(
                "[{}] Failed to release connection {}: {}",
                agent_id,
                connection_id,
                e
            );
        }
    }

    pub async fn list_agents(&self, filter: &AgentFilter) -> Result<Vec<AgentRecord>> {
        Ok(self.store.find_all(filter).await?)
    }

    pub async fn get_agent(&self, agent_id: &str) -> Result<AgentRecord> {
        self.store
            .find_by_id(agent_id)
            .await?
            .ok_or_else(|| SparringError::AgentNotFound(agent_id.to_string()))
    }

    pub async fn pause(&self, agent_id: &str) -> Result<AgentRecord> {
        self.lifecycle.pause(agent_id).await
    }

    pub async fn resume(&self, agent_id: &str) -> Result<AgentRecord> {
        self.lifecycle.activate(agent_id).await
    }

    pub async fn terminate(&self, agent_id: &str) -> Result<AgentRecord> {
        self.lifecycle.terminate(agent_id).await
    }

    /// Move an agent to `error`. Its connection stays open until terminated.
    pub async fn fail(&self, agent_id: &str, reason: &str) -> Result<AgentRecord> {
        if reason.trim().is_empty() {
            return Err(SparringError::Validation(
                "error reason must not be empty".to_string(),
            ));
        }
        self.lifecycle.fail(agent_id, reason).await
    }

    /// Terminate (when still live) and delete the record and its log.
    pub async fn remove(&self, agent_id: &str) -> Result<()> {
        let record = self.get_agent(agent_id).await?;
        if record.status != AgentStatus::Terminated {
            self.lifecycle.terminate(agent_id).await?;
        }

        if !self.store.delete(agent_id).await? {
            return Err(SparringError::AgentNotFound(agent_id.to_string()));
        }
        self.lifecycle.forget(agent_id);
        log::info!("[{}] Agent removed", agent_id);
        Ok(())
    }

    pub async fn terminate_all(&self) -> Result<usize> {
        self.lifecycle.terminate_all().await
    }

    pub async fn health(&self, agent_id: &str) -> Result<HealthReport> {
        self.lifecycle.health(agent_id).await
    }

    pub async fn actions(&self, agent_id: &str, limit: usize) -> Result<Vec<ActionLogEntry>> {
        self.get_agent(agent_id).await?;
        Ok(self.store.list_actions(agent_id, limit).await?)
    }

    /// Chat response policy for an agent, for the external chat adapter.
    pub async fn response_policy(&self, agent_id: &str) -> Result<ResponsePolicy> {
        let record = self.get_agent(agent_id).await?;
        Ok(ResponsePolicy::for_profile(
            self.profiles.get(record.profile_id),
        ))
    }

    /// Terminate every active agent and stop any loop left behind.
    pub async fn shutdown(&self) -> Result<usize> {
        log::info!("Shutting down agent orchestrator");
        let terminated = self.terminate_all().await?;
        let stray = self.scheduler.stop_all();
        if stray > 0 {
            log::warn!("Stopped {} behavior loops without an active agent", stray);
        }
        Ok(terminated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::SimulatedEnvironment;
    use crate::storage::MemoryAgentStore;

    fn orchestrator() -> (AgentOrchestrator, Arc<SimulatedEnvironment>) {
        let environment = Arc::new(SimulatedEnvironment::new());
        let orchestrator = AgentOrchestrator::new(
            SparringConfig::default(),
            Arc::new(MemoryAgentStore::new()),
            environment.clone(),
        )
        .unwrap();
        (orchestrator, environment)
    }

    #[tokio::test]
    async fn create_agent_records_spawn_settings() {
        let (orchestrator, environment) = orchestrator();
        let mut request = CreateAgentRequest::new("dominant").with_intensity(0.9);
        request
            .overrides
            .insert("callsign".to_string(), "Red Leader".to_string());

        let record = orchestrator.create_agent(request).await.unwrap();

        assert_eq!(record.status, AgentStatus::Active);
        assert_eq!(record.metadata.get("intensity").map(String::as_str), Some("0.9"));
        assert_eq!(
            record.metadata.get("override.callsign").map(String::as_str),
            Some("Red Leader")
        );
        assert!(record.metadata["identity"].starts_with("dominant_"));
        assert!(record.prompt.contains("aggressive"));
        assert!(record.prompt.ends_with("callsign: Red Leader"));
        assert!(environment.get_connection(&record.connection_id).await.is_some());
        assert!(orchestrator.scheduler().is_running(&record.id));
    }

    #[tokio::test]
    async fn invalid_intensity_is_rejected_before_connecting() {
        let (orchestrator, environment) = orchestrator();
        let err = orchestrator
            .create_agent(CreateAgentRequest::new("chaotic").with_intensity(1.2))
            .await
            .unwrap_err();

        assert!(matches!(err, SparringError::Validation(_)));
        assert_eq!(environment.connection_count(), 0);
    }

    #[tokio::test]
    async fn remove_deletes_record_and_log() {
        let (orchestrator, environment) = orchestrator();
        let record = orchestrator
            .create_agent(CreateAgentRequest::new("cooperative"))
            .await
            .unwrap();
        orchestrator.scheduler().run_tick(&record.id).await.unwrap();

        orchestrator.remove(&record.id).await.unwrap();

        assert_eq!(environment.connection_count(), 0);
        assert!(matches!(
            orchestrator.get_agent(&record.id).await,
            Err(SparringError::AgentNotFound(_))
        ));
        assert!(matches!(
            orchestrator.actions(&record.id, 10).await,
            Err(SparringError::AgentNotFound(_))
        ));
        assert!(orchestrator.remove(&record.id).await.is_err());
    }

    #[tokio::test]
    async fn profile_names_are_matched_exactly() {
        let (orchestrator, environment) = orchestrator();
        for profile in [" cooperative ", "Cooperative", ""] {
            let err = orchestrator
                .create_agent(CreateAgentRequest::new(profile))
                .await
                .unwrap_err();
            assert_eq!(err, SparringError::UnknownProfile(profile.to_string()));
        }
        assert_eq!(environment.connection_count(), 0);
    }

    #[tokio::test]
    async fn fail_moves_agent_to_error_state() {
        let (orchestrator, environment) = orchestrator();
        let record = orchestrator
            .create_agent(CreateAgentRequest::new("chaotic"))
            .await
            .unwrap();

        assert!(matches!(
            orchestrator.fail(&record.id, "  ").await,
            Err(SparringError::Validation(_))
        ));

        let failed = orchestrator.fail(&record.id, "fell into lava").await.unwrap();
        assert_eq!(failed.status, AgentStatus::Error);
        assert_eq!(
            failed.metadata.get("error_reason").map(String::as_str),
            Some("fell into lava")
        );
        assert!(!orchestrator.scheduler().is_running(&record.id));
        assert_eq!(environment.connection_count(), 1);

        assert!(matches!(
            orchestrator.resume(&record.id).await,
            Err(SparringError::InvalidTransition { .. })
        ));
        let terminated = orchestrator.terminate(&record.id).await.unwrap();
        assert_eq!(terminated.status, AgentStatus::Terminated);
        assert_eq!(environment.connection_count(), 0);
    }

    #[tokio::test]
    async fn response_policy_follows_profile() {
        let (orchestrator, _) = orchestrator();
        let record = orchestrator
            .create_agent(CreateAgentRequest::new("passive"))
            .await
            .unwrap();

        let policy = orchestrator.response_policy(&record.id).await.unwrap();
        assert_eq!(policy.profile_id, record.profile_id);
        assert_eq!(policy.ignore_rate, 0.6);
    }

    #[tokio::test]
    async fn shutdown_terminates_everything() {
        let (orchestrator, environment) = orchestrator();
        for profile in ["cooperative", "adversarial", "chaotic"] {
            orchestrator
                .create_agent(CreateAgentRequest::new(profile))
                .await
                .unwrap();
        }

        assert_eq!(orchestrator.shutdown().await.unwrap(), 3);
        assert!(orchestrator.scheduler().running_agents().is_empty());
        assert_eq!(environment.connection_count(), 0);
    }
}
