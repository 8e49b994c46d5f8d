//! Runtime configuration, loaded from an optional JSON file.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::environment::{
    ConnectionParams, EnvironmentAdapter, HttpEnvironmentAdapter, SimulatedEnvironment,
};
use crate::error::{Result, SparringError};
use crate::storage::{AgentStore, MemoryAgentStore, SqliteAgentStore};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SparringConfig {
    pub staleness_threshold_secs: u64,
    /// Used when a spawn request carries no intensity
    pub default_intensity: f64,
    pub environment: EnvironmentConfig,
    pub store: StoreBackend,
}

impl Default for SparringConfig {
    fn default() -> Self {
        Self {
            staleness_threshold_secs: 300,
            default_intensity: 0.5,
            environment: EnvironmentConfig::default(),
            store: StoreBackend::Memory,
        }
    }
}

impl SparringConfig {
    pub fn staleness_threshold(&self) -> Duration {
        Duration::from_secs(self.staleness_threshold_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.default_intensity) {
            return Err(SparringError::Validation(format!(
                "default_intensity {} outside [0, 1]",
                self.default_intensity
            )));
        }
        if self.staleness_threshold_secs == 0 {
            return Err(SparringError::Validation(
                "staleness_threshold_secs must be positive".to_string(),
            ));
        }
        if self.environment.request_timeout_secs == 0 {
            return Err(SparringError::Validation(
                "environment.request_timeout_secs must be positive".to_string(),
            ));
        }
        if let Some(url) = &self.environment.bridge_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(SparringError::Validation(format!(
                    "bridge_url must be an http(s) URL, got {}",
                    url
                )));
            }
        }
        Ok(())
    }

    /// Build the configured state store, creating its schema if needed.
    pub async fn build_store(&self) -> Result<Arc<dyn AgentStore>> {
        match &self.store {
            StoreBackend::Memory => {
                log::info!("Using in-memory agent store");
                Ok(Arc::new(MemoryAgentStore::new()))
            }
            StoreBackend::Sqlite { path } => {
                if let Some(parent) = path.parent() {
                    tokio::fs::create_dir_all(parent)
                        .await
                        .map_err(|e| SparringError::Store(e.to_string()))?;
                }
                let store = SqliteAgentStore::new(path);
                store.init().await?;
                log::info!("Using SQLite agent store at {:?}", path);
                Ok(Arc::new(store))
            }
        }
    }

    pub fn build_environment(&self) -> Result<Arc<dyn EnvironmentAdapter>> {
        match &self.environment.bridge_url {
            Some(url) => {
                let adapter = HttpEnvironmentAdapter::with_timeout(
                    url.as_str(),
                    Duration::from_secs(self.environment.request_timeout_secs),
                )?;
                log::info!("Using world bridge at {}", url);
                Ok(Arc::new(adapter))
            }
            None => {
                log::info!("No world bridge configured, using simulated environment");
                Ok(Arc::new(SimulatedEnvironment::new()))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    /// Default connection target for new agents
    pub connection: ConnectionParams,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bridge_url: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionParams::default(),
            bridge_url: None,
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Sqlite { path: PathBuf },
}

/// Load configuration from `path`.
///
/// A missing or unparsable file falls back to defaults; a parsed file that
/// fails validation is an error.
pub async fn load_config(path: &Path) -> Result<SparringConfig> {
    if !path.exists() {
        log::info!("No config file found at {:?}, using defaults", path);
        return Ok(SparringConfig::default());
    }

    let config = match tokio::fs::read_to_string(path).await {
        Ok(content) => match serde_json::from_str::<SparringConfig>(&content) {
            Ok(config) => {
                log::info!("Loaded config from {:?}", path);
                config
            }
            Err(e) => {
                log::error!("Failed to parse config {:?}: {}", path, e);
                SparringConfig::default()
            }
        },
        Err(e) => {
            log::error!("Failed to read config {:?}: {}", path, e);
            SparringConfig::default()
        }
    };

    config.validate()?;
    Ok(config)
}
