use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{AgentStore, StoreError, StoreResult};
use crate::agent::{ActionLogEntry, AgentFilter, AgentRecord, AgentUpdate};

struct StoredAgent {
    /// Insertion order, breaks `created_at` ties
    seq: u64,
    record: AgentRecord,
    actions: Vec<ActionLogEntry>,
}

#[derive(Default)]
struct Inner {
    agents: HashMap<String, StoredAgent>,
    next_seq: u64,
}

/// In-process store. A single lock covers records and logs so every
/// operation, including cascading deletes, is atomic.
#[derive(Default)]
pub struct MemoryAgentStore {
    inner: RwLock<Inner>,
}

impl MemoryAgentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AgentStore for MemoryAgentStore {
    async fn create(&self, record: AgentRecord) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if inner.agents.contains_key(&record.id) {
            return Err(StoreError::DuplicateAgent(record.id));
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.agents.insert(
            record.id.clone(),
            StoredAgent {
                seq,
                record,
                actions: Vec::new(),
            },
        );
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<AgentRecord>> {
        let inner = self.inner.read().await;
        Ok(inner.agents.get(id).map(|stored| stored.record.clone()))
    }

    async fn find_all(&self, filter: &AgentFilter) -> StoreResult<Vec<AgentRecord>> {
        let inner = self.inner.read().await;
        let mut matching: Vec<&StoredAgent> = inner
            .agents
            .values()
            .filter(|stored| filter.matches(&stored.record))
            .collect();

        matching.sort_by(|a, b| {
            b.record
                .created_at
                .cmp(&a.record.created_at)
                .then(b.seq.cmp(&a.seq))
        });

        Ok(matching
            .into_iter()
            .map(|stored| stored.record.clone())
            .collect())
    }

    async fn update(&self, id: &str, update: AgentUpdate) -> StoreResult<AgentRecord> {
        let mut inner = self.inner.write().await;
        let stored = inner
            .agents
            .get_mut(id)
            .ok_or_else(|| StoreError::AgentNotFound(id.to_string()))?;

        stored.record.apply(&update);
        Ok(stored.record.clone())
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        let mut inner = self.inner.write().await;
        Ok(inner.agents.remove(id).is_some())
    }

    async fn append_action(&self, entry: ActionLogEntry) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let stored = inner
            .agents
            .get_mut(&entry.agent_id)
            .ok_or_else(|| StoreError::AgentNotFound(entry.agent_id.clone()))?;

        stored.actions.push(entry);
        Ok(())
    }

    async fn list_actions(&self, agent_id: &str, limit: usize) -> StoreResult<Vec<ActionLogEntry>> {
        let inner = self.inner.read().await;
        let Some(stored) = inner.agents.get(agent_id) else {
            return Ok(Vec::new());
        };

        // Reverse first so equal timestamps keep newest-appended first after the stable sort.
        let mut entries: Vec<ActionLogEntry> = stored.actions.iter().rev().cloned().collect();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        entries.truncate(limit);
        Ok(entries)
    }

    async fn count(&self, filter: &AgentFilter) -> StoreResult<usize> {
        let inner = self.inner.read().await;
        Ok(inner
            .agents
            .values()
            .filter(|stored| filter.matches(&stored.record))
            .count())
    }
}
