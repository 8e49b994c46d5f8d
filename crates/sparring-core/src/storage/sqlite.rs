use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};

use super::{AgentStore, StoreError, StoreResult};
use crate::agent::{ActionLogEntry, AgentFilter, AgentRecord, AgentStatus, AgentUpdate};
use crate::profile::ProfileId;

const AGENT_COLUMNS: &str = "id, profile_id, status, connection_id, prompt, created_at, \
     last_action_at, action_count, metadata";

/// Relational backend. Each contract operation runs in its own immediate
/// transaction on a blocking task.
#[derive(Debug, Clone)]
pub struct SqliteAgentStore {
    db_path: PathBuf,
}

impl SqliteAgentStore {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    pub async fn init(&self) -> StoreResult<()> {
        self.with_connection(|connection| {
            connection.execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS agents (
                    id TEXT PRIMARY KEY,
                    profile_id TEXT NOT NULL,
                    status TEXT NOT NULL,
                    connection_id TEXT NOT NULL,
                    prompt TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    last_action_at TEXT,
                    action_count INTEGER NOT NULL DEFAULT 0,
                    metadata TEXT NOT NULL DEFAULT '{}'
                );

                CREATE TABLE IF NOT EXISTS action_log (
                    id TEXT PRIMARY KEY,
                    agent_id TEXT NOT NULL,
                    action TEXT NOT NULL,
                    timestamp TEXT NOT NULL,
                    success INTEGER NOT NULL,
                    note TEXT NOT NULL DEFAULT '',
                    FOREIGN KEY(agent_id) REFERENCES agents(id) ON DELETE CASCADE
                );

                CREATE INDEX IF NOT EXISTS idx_agents_created_at ON agents(created_at);
                CREATE INDEX IF NOT EXISTS idx_agents_status ON agents(status);
                CREATE INDEX IF NOT EXISTS idx_action_log_agent ON action_log(agent_id, timestamp);
                "#,
            )?;
            Ok(())
        })
        .await
    }

    async fn with_connection<T, F>(&self, func: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> StoreResult<T> + Send + 'static,
    {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = open_connection(&db_path)?;
            func(&mut connection)
        })
        .await
        .map_err(|error| StoreError::Task(error.to_string()))?
    }
}

#[async_trait]
impl AgentStore for SqliteAgentStore {
    async fn create(&self, record: AgentRecord) -> StoreResult<()> {
        self.with_connection(move |connection| {
            let tx = connection.transaction_with_behavior(TransactionBehavior::Immediate)?;
            if load_agent(&tx, &record.id)?.is_some() {
                return Err(StoreError::DuplicateAgent(record.id));
            }

            tx.execute(
                &format!(
                    "INSERT INTO agents ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    AGENT_COLUMNS
                ),
                params![
                    record.id,
                    record.profile_id.as_str(),
                    record.status.as_str(),
                    record.connection_id,
                    record.prompt,
                    format_timestamp(record.created_at),
                    record.last_action_at.map(format_timestamp),
                    record.action_count as i64,
                    serde_json::to_string(&record.metadata)?,
                ],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<AgentRecord>> {
        let id = id.to_string();
        self.with_connection(move |connection| load_agent(connection, &id))
            .await
    }

    async fn find_all(&self, filter: &AgentFilter) -> StoreResult<Vec<AgentRecord>> {
        let filter = filter.clone();
        self.with_connection(move |connection| {
            let (where_clause, values) = build_agent_where_clause(&filter);
            let mut stmt = connection.prepare(&format!(
                "SELECT {} FROM agents {} ORDER BY created_at DESC, rowid DESC",
                AGENT_COLUMNS, where_clause
            ))?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(values.iter()), read_agent_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows.into_iter().map(AgentRow::into_record).collect()
        })
        .await
    }

    async fn update(&self, id: &str, update: AgentUpdate) -> StoreResult<AgentRecord> {
        let id = id.to_string();
        self.with_connection(move |connection| {
            let tx = connection.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let mut record =
                load_agent(&tx, &id)?.ok_or_else(|| StoreError::AgentNotFound(id.clone()))?;
            record.apply(&update);

            tx.execute(
                r#"
                UPDATE agents SET
                    status = ?1,
                    connection_id = ?2,
                    last_action_at = ?3,
                    action_count = ?4,
                    metadata = ?5
                WHERE id = ?6
                "#,
                params![
                    record.status.as_str(),
                    record.connection_id,
                    record.last_action_at.map(format_timestamp),
                    record.action_count as i64,
                    serde_json::to_string(&record.metadata)?,
                    record.id,
                ],
            )?;
            tx.commit()?;
            Ok(record)
        })
        .await
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        let id = id.to_string();
        self.with_connection(move |connection| {
            let tx = connection.transaction_with_behavior(TransactionBehavior::Immediate)?;
            tx.execute("DELETE FROM action_log WHERE agent_id = ?1", params![id])?;
            let deleted = tx.execute("DELETE FROM agents WHERE id = ?1", params![id])?;
            tx.commit()?;
            Ok(deleted > 0)
        })
        .await
    }

    async fn append_action(&self, entry: ActionLogEntry) -> StoreResult<()> {
        self.with_connection(move |connection| {
            let tx = connection.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let exists: Option<i64> = tx
                .query_row(
                    "SELECT 1 FROM agents WHERE id = ?1",
                    params![entry.agent_id],
                    |row| row.get(0),
                )
                .optional()?;
            if exists.is_none() {
                return Err(StoreError::AgentNotFound(entry.agent_id));
            }

            tx.execute(
                r#"
                INSERT INTO action_log (id, agent_id, action, timestamp, success, note)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    entry.id,
                    entry.agent_id,
                    entry.action,
                    format_timestamp(entry.timestamp),
                    entry.success,
                    entry.note,
                ],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn list_actions(&self, agent_id: &str, limit: usize) -> StoreResult<Vec<ActionLogEntry>> {
        let agent_id = agent_id.to_string();
        self.with_connection(move |connection| {
            let mut stmt = connection.prepare(
                r#"
                SELECT id, agent_id, action, timestamp, success, note
                FROM action_log
                WHERE agent_id = ?1
                ORDER BY timestamp DESC, rowid DESC
                LIMIT ?2
                "#,
            )?;
            let rows = stmt
                .query_map(params![agent_id, limit as i64], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, bool>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                })?
                .collect::<Result<Vec<_>, _>>()?;

            rows.into_iter()
                .map(|(id, agent_id, action, timestamp, success, note)| {
                    Ok(ActionLogEntry {
                        id,
                        agent_id,
                        action,
                        timestamp: parse_timestamp(&timestamp)?,
                        success,
                        note,
                    })
                })
                .collect()
        })
        .await
    }

    async fn count(&self, filter: &AgentFilter) -> StoreResult<usize> {
        let filter = filter.clone();
        self.with_connection(move |connection| {
            let (where_clause, values) = build_agent_where_clause(&filter);
            let count: i64 = connection.query_row(
                &format!("SELECT COUNT(*) FROM agents {}", where_clause),
                rusqlite::params_from_iter(values.iter()),
                |row| row.get(0),
            )?;
            Ok(count as usize)
        })
        .await
    }
}

struct AgentRow {
    id: String,
    profile_id: String,
    status: String,
    connection_id: String,
    prompt: String,
    created_at: String,
    last_action_at: Option<String>,
    action_count: i64,
    metadata: String,
}

impl AgentRow {
    fn into_record(self) -> StoreResult<AgentRecord> {
        let profile_id = self
            .profile_id
            .parse::<ProfileId>()
            .map_err(|e| StoreError::InvalidData(e.to_string()))?;
        let status = self
            .status
            .parse::<AgentStatus>()
            .map_err(StoreError::InvalidData)?;
        let metadata: HashMap<String, String> = serde_json::from_str(&self.metadata)?;

        Ok(AgentRecord {
            id: self.id,
            profile_id,
            status,
            connection_id: self.connection_id,
            prompt: self.prompt,
            created_at: parse_timestamp(&self.created_at)?,
            last_action_at: self
                .last_action_at
                .as_deref()
                .map(parse_timestamp)
                .transpose()?,
            action_count: self.action_count.max(0) as u64,
            metadata,
        })
    }
}

fn read_agent_row(row: &Row<'_>) -> rusqlite::Result<AgentRow> {
    Ok(AgentRow {
        id: row.get(0)?,
        profile_id: row.get(1)?,
        status: row.get(2)?,
        connection_id: row.get(3)?,
        prompt: row.get(4)?,
        created_at: row.get(5)?,
        last_action_at: row.get(6)?,
        action_count: row.get(7)?,
        metadata: row.get(8)?,
    })
}

fn load_agent(connection: &Connection, id: &str) -> StoreResult<Option<AgentRecord>> {
    let row = connection
        .query_row(
            &format!("SELECT {} FROM agents WHERE id = ?1", AGENT_COLUMNS),
            params![id],
            read_agent_row,
        )
        .optional()?;
    row.map(AgentRow::into_record).transpose()
}

fn build_agent_where_clause(filter: &AgentFilter) -> (String, Vec<String>) {
    let mut conditions = Vec::new();
    let mut values = Vec::new();

    if let Some(status) = filter.status {
        conditions.push("status = ?");
        values.push(status.as_str().to_string());
    }

    if let Some(profile_id) = filter.profile_id {
        conditions.push("profile_id = ?");
        values.push(profile_id.as_str().to_string());
    }

    if conditions.is_empty() {
        (String::new(), values)
    } else {
        (format!("WHERE {}", conditions.join(" AND ")), values)
    }
}

fn open_connection(path: &Path) -> StoreResult<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let connection = Connection::open(path)?;
    connection.busy_timeout(Duration::from_secs(5))?;
    connection.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        PRAGMA foreign_keys = ON;
        PRAGMA synchronous = NORMAL;
        "#,
    )?;
    Ok(connection)
}

/// Fixed-width so that text ordering matches chronological ordering.
fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(raw: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|e| StoreError::InvalidData(format!("bad timestamp '{}': {}", raw, e)))
}
