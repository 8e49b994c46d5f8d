//! Behavior Scheduler: one periodic task per active agent.
//!
//! Each loop has its own fixed period, derived from the profile's average
//! action rate. Stopping a loop only raises its flag; a tick that is already
//! running finishes and its writes are kept.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::FutureExt;
use rand::seq::SliceRandom;
use rand::Rng;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::agent::{ActionLogEntry, AgentStatus, AgentUpdate};
use crate::environment::EnvironmentAdapter;
use crate::error::Result;
use crate::profile::{ProfileDefinition, ProfileId, ProfileRegistry};
use crate::storage::AgentStore;

const LOG_TARGET: &str = "sparring::scheduler";

/// Why a tick did nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    AgentMissing,
    NotActive(AgentStatus),
    ConnectionMissing,
    NoActions,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Performed { action: String, success: bool },
    Skipped(SkipReason),
}

struct BehaviorLoop {
    stopped: Arc<AtomicBool>,
    period: Duration,
    _task: JoinHandle<()>,
}

/// Everything a tick needs, cloned into each spawned loop.
#[derive(Clone)]
struct TickContext {
    store: Arc<dyn AgentStore>,
    environment: Arc<dyn EnvironmentAdapter>,
    profiles: Arc<ProfileRegistry>,
}

impl TickContext {
    async fn run_tick(&self, agent_id: &str) -> Result<TickOutcome> {
        let Some(record) = self.store.find_by_id(agent_id).await? else {
            return Ok(TickOutcome::Skipped(SkipReason::AgentMissing));
        };
        if record.status != AgentStatus::Active {
            return Ok(TickOutcome::Skipped(SkipReason::NotActive(record.status)));
        }

        let profile = self.profiles.get(record.profile_id);
        let action = {
            let mut rng = rand::thread_rng();
            select_action(profile, &mut rng).map(str::to_string)
        };
        let Some(action) = action else {
            return Ok(TickOutcome::Skipped(SkipReason::NoActions));
        };

        let Some(handle) = self.environment.get_connection(&record.connection_id).await else {
            return Ok(TickOutcome::Skipped(SkipReason::ConnectionMissing));
        };

        let outcome = self.environment.dispatch(&handle, &action).await?;

        self.store
            .append_action(ActionLogEntry::new(
                agent_id,
                action.clone(),
                outcome.success,
                outcome.detail,
            ))
            .await?;
        self.store
            .update(agent_id, AgentUpdate::action_recorded(Utc::now()))
            .await?;

        Ok(TickOutcome::Performed {
            action,
            success: outcome.success,
        })
    }
}

/// Uniform choice over the profile's environment actions.
pub fn select_action<'a, R: Rng + ?Sized>(
    profile: &'a ProfileDefinition,
    rng: &mut R,
) -> Option<&'a str> {
    profile.environment_actions.choose(rng).map(String::as_str)
}

pub struct BehaviorScheduler {
    context: TickContext,
    loops: DashMap<String, BehaviorLoop>,
}

impl BehaviorScheduler {
    pub fn new(
        store: Arc<dyn AgentStore>,
        environment: Arc<dyn EnvironmentAdapter>,
        profiles: Arc<ProfileRegistry>,
    ) -> Self {
        Self {
            context: TickContext {
                store,
                environment,
                profiles,
            },
            loops: DashMap::new(),
        }
    }

    /// Start the loop for an agent. Returns false if one is already running.
    pub fn start(&self, agent_id: &str, profile_id: ProfileId) -> bool {
        let entry = match self.loops.entry(agent_id.to_string()) {
            Entry::Occupied(_) => return false,
            Entry::Vacant(entry) => entry,
        };

        let period = self
            .context
            .profiles
            .get(profile_id)
            .action_frequency
            .tick_period();
        let stopped = Arc::new(AtomicBool::new(false));
        let task = tokio::spawn(run_loop(
            self.context.clone(),
            agent_id.to_string(),
            period,
            stopped.clone(),
        ));

        log::info!(
            target: LOG_TARGET,
            "[{}] Behavior loop started ({} profile, every {}ms)",
            agent_id,
            profile_id,
            period.as_millis()
        );
        entry.insert(BehaviorLoop {
            stopped,
            period,
            _task: task,
        });
        true
    }

    /// Stop the loop for an agent. Returns false if none was running.
    pub fn stop(&self, agent_id: &str) -> bool {
        match self.loops.remove(agent_id) {
            Some((_, behavior_loop)) => {
                behavior_loop.stopped.store(true, Ordering::SeqCst);
                log::info!(target: LOG_TARGET, "[{}] Behavior loop stopped", agent_id);
                true
            }
            None => false,
        }
    }

    pub fn stop_all(&self) -> usize {
        let agent_ids = self.running_agents();
        agent_ids.iter().filter(|id| self.stop(id)).count()
    }

    pub fn is_running(&self, agent_id: &str) -> bool {
        self.loops.contains_key(agent_id)
    }

    pub fn period(&self, agent_id: &str) -> Option<Duration> {
        self.loops.get(agent_id).map(|entry| entry.period)
    }

    pub fn running_agents(&self) -> Vec<String> {
        self.loops.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Run one tick for an agent immediately, outside its schedule.
    pub async fn run_tick(&self, agent_id: &str) -> Result<TickOutcome> {
        self.context.run_tick(agent_id).await
    }
}

impl Drop for BehaviorScheduler {
    fn drop(&mut self) {
        for entry in self.loops.iter() {
            entry.stopped.store(true, Ordering::SeqCst);
        }
    }
}

async fn run_loop(
    context: TickContext,
    agent_id: String,
    period: Duration,
    stopped: Arc<AtomicBool>,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if stopped.load(Ordering::SeqCst) {
            break;
        }

        match AssertUnwindSafe(context.run_tick(&agent_id))
            .catch_unwind()
            .await
        {
            Ok(Ok(TickOutcome::Performed { action, success })) => {
                log::debug!(
                    target: LOG_TARGET,
                    "[{}] Performed {} (success: {})",
                    agent_id,
                    action,
                    success
                );
            }
            Ok(Ok(TickOutcome::Skipped(reason))) => {
                log::debug!(target: LOG_TARGET, "[{}] Tick skipped: {:?}", agent_id, reason);
            }
            Ok(Err(e)) => {
                log::error!(target: LOG_TARGET, "[{}] Tick failed: {}", agent_id, e);
            }
            Err(_) => {
                log::error!(target: LOG_TARGET, "[{}] Tick panicked", agent_id);
            }
        }
    }

    log::debug!(target: LOG_TARGET, "[{}] Behavior loop exited", agent_id);
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use async_trait::async_trait;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::agent::AgentRecord;
    use crate::environment::{
        ConnectionHandle, ConnectionParams, DispatchOutcome, EnvironmentError, SimulatedEnvironment,
    };
    use crate::storage::MemoryAgentStore;

    struct Fixture {
        store: Arc<MemoryAgentStore>,
        environment: Arc<SimulatedEnvironment>,
        scheduler: BehaviorScheduler,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryAgentStore::new());
        let environment = Arc::new(SimulatedEnvironment::new());
        let profiles = Arc::new(ProfileRegistry::builtin().unwrap());
        let scheduler = BehaviorScheduler::new(store.clone(), environment.clone(), profiles);
        Fixture {
            store,
            environment,
            scheduler,
        }
    }

    async fn active_agent(fixture: &Fixture, id: &str, profile_id: ProfileId) -> String {
        let connection_id = fixture
            .environment
            .connect(id, &ConnectionParams::default())
            .await
            .unwrap();
        let mut record = AgentRecord::new(id, profile_id, connection_id.clone(), "prompt");
        record.status = AgentStatus::Active;
        fixture.store.create(record).await.unwrap();
        connection_id
    }

    async fn action_count(fixture: &Fixture, id: &str) -> u64 {
        fixture
            .store
            .find_by_id(id)
            .await
            .unwrap()
            .map(|r| r.action_count)
            .unwrap_or(0)
    }

    #[test]
    fn select_action_draws_from_environment_actions() {
        let profiles = ProfileRegistry::builtin().unwrap();
        let profile = profiles.get(ProfileId::Chaotic);
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..100 {
            let action = select_action(profile, &mut rng).unwrap();
            assert!(profile.environment_actions.iter().any(|a| a == action));
            assert!(!profile.chat_actions.iter().any(|a| a == action));
        }
    }

    #[tokio::test]
    async fn start_and_stop_are_idempotent() {
        let fixture = fixture();
        active_agent(&fixture, "a", ProfileId::Cooperative).await;

        assert!(fixture.scheduler.start("a", ProfileId::Cooperative));
        assert!(!fixture.scheduler.start("a", ProfileId::Cooperative));
        assert_eq!(fixture.scheduler.running_agents(), vec!["a".to_string()]);
        assert_eq!(
            fixture.scheduler.period("a"),
            Some(Duration::from_millis(10_000))
        );

        assert!(fixture.scheduler.stop("a"));
        assert!(!fixture.scheduler.stop("a"));
        assert!(!fixture.scheduler.is_running("a"));
    }

    #[tokio::test]
    async fn tick_records_action_and_advances_counter() {
        let fixture = fixture();
        let connection_id = active_agent(&fixture, "a", ProfileId::Dominant).await;

        let outcome = fixture.scheduler.run_tick("a").await.unwrap();
        let TickOutcome::Performed { action, success } = outcome.clone() else {
            panic!("expected a performed tick, got {:?}", outcome);
        };
        assert!(success);

        let log = fixture.store.list_actions("a", 10).await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].action, action);

        let record = fixture.store.find_by_id("a").await.unwrap().unwrap();
        assert_eq!(record.action_count, 1);
        assert!(record.last_action_at.is_some());
        assert_eq!(fixture.environment.dispatch_count(&connection_id), 1);
    }

    #[tokio::test]
    async fn tick_skips_missing_inactive_and_disconnected_agents() {
        let fixture = fixture();
        assert_eq!(
            fixture.scheduler.run_tick("ghost").await.unwrap(),
            TickOutcome::Skipped(SkipReason::AgentMissing)
        );

        let connection_id = active_agent(&fixture, "a", ProfileId::Passive).await;
        fixture
            .store
            .update("a", AgentUpdate::status(AgentStatus::Paused))
            .await
            .unwrap();
        assert_eq!(
            fixture.scheduler.run_tick("a").await.unwrap(),
            TickOutcome::Skipped(SkipReason::NotActive(AgentStatus::Paused))
        );

        fixture
            .store
            .update("a", AgentUpdate::status(AgentStatus::Active))
            .await
            .unwrap();
        fixture.environment.drop_connection(&connection_id);
        assert_eq!(
            fixture.scheduler.run_tick("a").await.unwrap(),
            TickOutcome::Skipped(SkipReason::ConnectionMissing)
        );
        assert_eq!(action_count(&fixture, "a").await, 0);
    }

    #[tokio::test]
    async fn failed_dispatch_is_logged_as_unsuccessful() {
        let fixture = fixture();
        active_agent(&fixture, "a", ProfileId::Adversarial).await;
        fixture.environment.set_fail_dispatch(true);

        let outcome = fixture.scheduler.run_tick("a").await.unwrap();
        assert!(matches!(outcome, TickOutcome::Performed { success: false, .. }));

        let log = fixture.store.list_actions("a", 1).await.unwrap();
        assert!(!log[0].success);
        assert_eq!(action_count(&fixture, "a").await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn loop_ticks_at_fixed_period() {
        let fixture = fixture();
        active_agent(&fixture, "a", ProfileId::Cooperative).await;
        fixture.scheduler.start("a", ProfileId::Cooperative);

        tokio::time::sleep(Duration::from_millis(35_000)).await;
        assert_eq!(action_count(&fixture, "a").await, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn stopping_one_agent_leaves_others_untouched() {
        let fixture = fixture();
        active_agent(&fixture, "a", ProfileId::Cooperative).await;
        active_agent(&fixture, "b", ProfileId::Passive).await;
        fixture.scheduler.start("a", ProfileId::Cooperative);
        fixture.scheduler.start("b", ProfileId::Passive);

        tokio::time::sleep(Duration::from_millis(65_000)).await;
        assert_eq!(action_count(&fixture, "a").await, 6);
        assert_eq!(action_count(&fixture, "b").await, 2);

        fixture.scheduler.stop("a");
        tokio::time::sleep(Duration::from_millis(60_000)).await;
        assert_eq!(action_count(&fixture, "a").await, 6);
        assert_eq!(action_count(&fixture, "b").await, 4);
        assert!(fixture.scheduler.is_running("b"));
    }

    /// Fails every other dispatch and panics on the first one.
    struct FlakyEnvironment {
        inner: SimulatedEnvironment,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EnvironmentAdapter for FlakyEnvironment {
        async fn connect(
            &self,
            identity: &str,
            params: &ConnectionParams,
        ) -> std::result::Result<String, EnvironmentError> {
            self.inner.connect(identity, params).await
        }

        async fn get_connection(&self, connection_id: &str) -> Option<ConnectionHandle> {
            self.inner.get_connection(connection_id).await
        }

        async fn disconnect(&self, connection_id: &str) -> std::result::Result<(), EnvironmentError> {
            self.inner.disconnect(connection_id).await
        }

        async fn dispatch(
            &self,
            handle: &ConnectionHandle,
            action: &str,
        ) -> std::result::Result<DispatchOutcome, EnvironmentError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call == 0 {
                panic!("adapter bug");
            }
            if call % 2 == 1 {
                return Err(EnvironmentError::DispatchFailed("world hiccup".to_string()));
            }
            self.inner.dispatch(handle, action).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn loop_survives_dispatch_errors_and_panics() {
        let store = Arc::new(MemoryAgentStore::new());
        let environment = Arc::new(FlakyEnvironment {
            inner: SimulatedEnvironment::new(),
            calls: AtomicUsize::new(0),
        });
        let scheduler = BehaviorScheduler::new(
            store.clone(),
            environment.clone(),
            Arc::new(ProfileRegistry::builtin().unwrap()),
        );

        let connection_id = environment
            .connect("a", &ConnectionParams::default())
            .await
            .unwrap();
        let mut record = AgentRecord::new("a", ProfileId::Cooperative, connection_id, "prompt");
        record.status = AgentStatus::Active;
        store.create(record).await.unwrap();
        scheduler.start("a", ProfileId::Cooperative);

        // Calls 0 (panic), 1 (error), 2 (ok), 3 (error), 4 (ok)
        tokio::time::sleep(Duration::from_millis(55_000)).await;

        assert!(scheduler.is_running("a"));
        assert_eq!(environment.calls.load(Ordering::SeqCst), 5);
        let record = store.find_by_id("a").await.unwrap().unwrap();
        assert_eq!(record.action_count, 2);
    }
}
