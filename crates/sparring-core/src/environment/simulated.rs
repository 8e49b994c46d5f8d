use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use super::{ConnectionHandle, ConnectionParams, DispatchOutcome, EnvironmentAdapter, EnvironmentError};

/// In-process world. Every dispatch succeeds unless a fault is injected.
#[derive(Default)]
pub struct SimulatedEnvironment {
    connections: DashMap<String, ConnectionHandle>,
    dispatch_counts: DashMap<String, u64>,
    disconnect_calls: AtomicUsize,
    refuse_connect: AtomicBool,
    fail_disconnect: AtomicBool,
    fail_dispatch: AtomicBool,
    dispatch_delay_ms: AtomicU64,
}

impl SimulatedEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_refuse_connect(&self, refuse: bool) {
        self.refuse_connect.store(refuse, Ordering::SeqCst);
    }

    pub fn set_fail_disconnect(&self, fail: bool) {
        self.fail_disconnect.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_dispatch(&self, fail: bool) {
        self.fail_dispatch.store(fail, Ordering::SeqCst);
    }

    pub fn set_dispatch_delay(&self, delay: Duration) {
        self.dispatch_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Simulate the world dropping a connection without a disconnect call.
    pub fn drop_connection(&self, connection_id: &str) -> bool {
        self.connections.remove(connection_id).is_some()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn dispatch_count(&self, connection_id: &str) -> u64 {
        self.dispatch_counts
            .get(connection_id)
            .map(|count| *count)
            .unwrap_or(0)
    }

    pub fn disconnect_calls(&self) -> usize {
        self.disconnect_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EnvironmentAdapter for SimulatedEnvironment {
    async fn connect(
        &self,
        identity: &str,
        params: &ConnectionParams,
    ) -> Result<String, EnvironmentError> {
        if self.refuse_connect.load(Ordering::SeqCst) {
            return Err(EnvironmentError::ConnectFailed {
                reason: format!("{}:{} refused connection", params.host, params.port),
                retryable: true,
            });
        }

        let connection_id = format!("sim-{}", Uuid::new_v4());
        self.connections.insert(
            connection_id.clone(),
            ConnectionHandle {
                connection_id: connection_id.clone(),
                identity: identity.to_string(),
            },
        );
        log::debug!("Simulated connection {} opened for {}", connection_id, identity);
        Ok(connection_id)
    }

    async fn get_connection(&self, connection_id: &str) -> Option<ConnectionHandle> {
        self.connections
            .get(connection_id)
            .map(|entry| entry.value().clone())
    }

    async fn disconnect(&self, connection_id: &str) -> Result<(), EnvironmentError> {
        self.disconnect_calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_disconnect.load(Ordering::SeqCst) {
            return Err(EnvironmentError::DisconnectFailed(format!(
                "{} did not acknowledge disconnect",
                connection_id
            )));
        }

        self.connections
            .remove(connection_id)
            .map(|_| ())
            .ok_or_else(|| EnvironmentError::ConnectionNotFound(connection_id.to_string()))
    }

    async fn dispatch(
        &self,
        handle: &ConnectionHandle,
        action: &str,
    ) -> Result<DispatchOutcome, EnvironmentError> {
        let delay_ms = self.dispatch_delay_ms.load(Ordering::SeqCst);
        if delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }

        if !self.connections.contains_key(&handle.connection_id) {
            return Err(EnvironmentError::ConnectionNotFound(
                handle.connection_id.clone(),
            ));
        }

        *self
            .dispatch_counts
            .entry(handle.connection_id.clone())
            .or_insert(0) += 1;

        if self.fail_dispatch.load(Ordering::SeqCst) {
            return Ok(DispatchOutcome::failed(format!("{} was rejected", action)));
        }

        Ok(DispatchOutcome::ok(format!("{} performed {}", handle.identity, action)))
    }
}
