//! In-memory broker client for tests and broker-less deployments.
//!
//! Behaves like a single-member consumer group: `start` assigns every
//! configured partition of the topic to the consumer, `pause` confirms
//! either immediately or when the test says so. A [`MemoryProbe`] lets tests
//! drive rebalances and client halts, and [`FaultConfig`] makes individual
//! operations fail.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use switchyard_core::{ControlOp, GroupId, ListenerId, TopicPartition};

use crate::client::{
    ClientBinding, ClientError, ClientEventSender, ClientFactory, ClientResult, ConsumerClient,
};

/// When the in-memory client confirms a pause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PauseMode {
    /// Confirm as part of the pause call.
    #[default]
    Immediate,
    /// Confirm only when [`MemoryProbe::confirm_pause`] is called.
    Deferred,
}

/// Configuration for in-memory clients.
#[derive(Debug, Clone)]
pub struct MemoryClientConfig {
    /// Partitions per topic, all assigned on start.
    pub partitions: u32,
    /// When pauses are confirmed.
    pub pause_mode: PauseMode,
    /// Simulated group-join latency applied to every start.
    pub start_delay: Duration,
}

impl Default for MemoryClientConfig {
    fn default() -> Self {
        Self {
            partitions: 3,
            pause_mode: PauseMode::Immediate,
            start_delay: Duration::ZERO,
        }
    }
}

impl MemoryClientConfig {
    /// Sets the number of partitions per topic.
    #[must_use]
    pub const fn with_partitions(mut self, partitions: u32) -> Self {
        self.partitions = partitions;
        self
    }

    /// Sets the pause confirmation mode.
    #[must_use]
    pub const fn with_pause_mode(mut self, mode: PauseMode) -> Self {
        self.pause_mode = mode;
        self
    }

    /// Sets the simulated start latency.
    #[must_use]
    pub const fn with_start_delay(mut self, delay: Duration) -> Self {
        self.start_delay = delay;
        self
    }
}

/// One-shot fault injection for in-memory clients.
///
/// Each forced fault applies to the next matching call on any client of the
/// factory and is then cleared.
#[derive(Debug, Clone, Default)]
pub struct FaultConfig {
    /// If true, next client creation fails.
    pub force_create_fail: bool,
    /// If true, next start fails.
    pub force_start_fail: bool,
    /// If true, next pause fails.
    pub force_pause_fail: bool,
    /// If true, next resume fails.
    pub force_resume_fail: bool,
    /// If true, next stop fails.
    pub force_stop_fail: bool,
}

impl FaultConfig {
    /// Creates a fault config with no faults.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Forces the next client creation to fail.
    #[must_use]
    pub const fn with_force_create_fail(mut self) -> Self {
        self.force_create_fail = true;
        self
    }

    /// Forces the next start to fail.
    #[must_use]
    pub const fn with_force_start_fail(mut self) -> Self {
        self.force_start_fail = true;
        self
    }

    /// Forces the next pause to fail.
    #[must_use]
    pub const fn with_force_pause_fail(mut self) -> Self {
        self.force_pause_fail = true;
        self
    }

    /// Forces the next resume to fail.
    #[must_use]
    pub const fn with_force_resume_fail(mut self) -> Self {
        self.force_resume_fail = true;
        self
    }

    /// Forces the next stop to fail.
    #[must_use]
    pub const fn with_force_stop_fail(mut self) -> Self {
        self.force_stop_fail = true;
        self
    }

    /// Clears and returns the forced fault for `op`.
    fn take(&mut self, op: ControlOp) -> bool {
        let flag = match op {
            ControlOp::Start => &mut self.force_start_fail,
            ControlOp::Pause => &mut self.force_pause_fail,
            ControlOp::Resume => &mut self.force_resume_fail,
            ControlOp::Stop => &mut self.force_stop_fail,
        };
        std::mem::take(flag)
    }
}

#[derive(Debug)]
struct ClientRecord {
    instance: u64,
    binding: ClientBinding,
    events: ClientEventSender,
    polling: bool,
    paused: bool,
    calls: Vec<ControlOp>,
}

#[derive(Debug, Default)]
struct SharedState {
    clients: HashMap<ListenerId, ClientRecord>,
    faults: FaultConfig,
    created: u64,
}

/// Factory for in-memory clients.
///
/// Clones share client records and fault configuration.
#[derive(Debug, Clone, Default)]
pub struct MemoryClientFactory {
    config: MemoryClientConfig,
    shared: Arc<Mutex<SharedState>>,
}

impl MemoryClientFactory {
    /// Creates a factory.
    #[must_use]
    pub fn new(config: MemoryClientConfig) -> Self {
        Self {
            config,
            shared: Arc::default(),
        }
    }

    /// Replaces the fault configuration.
    ///
    /// # Panics
    /// Panics if the lock is poisoned.
    pub fn set_faults(&self, faults: FaultConfig) {
        lock(&self.shared).faults = faults;
    }

    /// Returns a probe for the client created for `listener_id`.
    ///
    /// # Panics
    /// Panics if the lock is poisoned.
    #[must_use]
    pub fn probe(&self, listener_id: &ListenerId) -> Option<MemoryProbe> {
        lock(&self.shared)
            .clients
            .contains_key(listener_id)
            .then(|| MemoryProbe {
                listener_id: listener_id.clone(),
                shared: Arc::clone(&self.shared),
            })
    }

    /// Returns how many clients created by this factory are still alive.
    ///
    /// # Panics
    /// Panics if the lock is poisoned.
    #[must_use]
    pub fn live_count(&self) -> usize {
        lock(&self.shared).clients.len()
    }

    /// Returns how many clients this factory has created.
    ///
    /// # Panics
    /// Panics if the lock is poisoned.
    #[must_use]
    pub fn created_count(&self) -> u64 {
        lock(&self.shared).created
    }
}

impl ClientFactory for MemoryClientFactory {
    fn create(
        &self,
        binding: ClientBinding,
        events: ClientEventSender,
    ) -> ClientResult<Box<dyn ConsumerClient>> {
        let mut shared = lock(&self.shared);
        if std::mem::take(&mut shared.faults.force_create_fail) {
            return Err(ClientError::InvalidConfig {
                message: "client creation failed (simulated)".to_string(),
            });
        }

        let listener_id = binding.listener_id.clone();
        shared.created += 1;
        let instance = shared.created;
        shared.clients.insert(
            listener_id.clone(),
            ClientRecord {
                instance,
                binding,
                events,
                polling: false,
                paused: false,
                calls: Vec::new(),
            },
        );

        Ok(Box::new(MemoryClient {
            listener_id,
            instance,
            config: self.config.clone(),
            shared: Arc::clone(&self.shared),
        }))
    }
}

struct MemoryClient {
    listener_id: ListenerId,
    instance: u64,
    config: MemoryClientConfig,
    shared: Arc<Mutex<SharedState>>,
}

impl MemoryClient {
    /// Records the call, applies any forced fault, then runs `f` on the record.
    fn apply(
        &self,
        op: ControlOp,
        f: impl FnOnce(&mut ClientRecord, &MemoryClientConfig),
    ) -> ClientResult<()> {
        let mut shared = lock(&self.shared);
        let fail = shared.faults.take(op);
        let record = shared
            .clients
            .get_mut(&self.listener_id)
            .ok_or(ClientError::Closed)?;

        record.calls.push(op);
        if fail {
            return Err(ClientError::Broker {
                message: format!("{op} failed (simulated)"),
            });
        }
        f(record, &self.config);
        Ok(())
    }
}

impl Drop for MemoryClient {
    fn drop(&mut self) {
        // A poisoned lock means a test already panicked.
        let Ok(mut shared) = self.shared.lock() else {
            return;
        };
        // The listener ID may already belong to a newer client.
        if shared
            .clients
            .get(&self.listener_id)
            .is_some_and(|r| r.instance == self.instance)
        {
            shared.clients.remove(&self.listener_id);
        }
    }
}

#[async_trait]
impl ConsumerClient for MemoryClient {
    async fn start(&mut self) -> ClientResult<()> {
        if !self.config.start_delay.is_zero() {
            tokio::time::sleep(self.config.start_delay).await;
        }
        self.apply(ControlOp::Start, |record, config| {
            record.polling = true;
            record.paused = false;
            let topic = &record.binding.topic;
            let partitions = (0..config.partitions)
                .filter_map(|p| i32::try_from(p).ok())
                .map(|p| TopicPartition::new(topic.clone(), p))
                .collect();
            record.events.assigned(partitions);
        })
    }

    async fn pause(&mut self) -> ClientResult<()> {
        self.apply(ControlOp::Pause, |record, config| {
            record.paused = true;
            if config.pause_mode == PauseMode::Immediate {
                record.events.pause_confirmed();
            }
        })
    }

    async fn resume(&mut self) -> ClientResult<()> {
        self.apply(ControlOp::Resume, |record, _| {
            record.paused = false;
        })
    }

    async fn stop(&mut self) -> ClientResult<()> {
        self.apply(ControlOp::Stop, |record, _| {
            record.polling = false;
            record.paused = false;
        })
    }
}

/// Test-side view of one in-memory client.
///
/// Once the client is dropped its record is gone and every query returns
/// a default.
#[derive(Debug, Clone)]
pub struct MemoryProbe {
    listener_id: ListenerId,
    shared: Arc<Mutex<SharedState>>,
}

impl MemoryProbe {
    fn with_record<R>(&self, f: impl FnOnce(&mut ClientRecord) -> R) -> Option<R> {
        lock(&self.shared).clients.get_mut(&self.listener_id).map(f)
    }

    /// Simulates a rebalance adding `partitions`. Returns false if the
    /// consumer is gone.
    #[must_use = "false means the event was not delivered"]
    pub fn assign(&self, partitions: Vec<TopicPartition>) -> bool {
        self.with_record(|r| r.events.assigned(partitions))
            .unwrap_or(false)
    }

    /// Simulates a rebalance removing `partitions`.
    #[must_use = "false means the event was not delivered"]
    pub fn revoke(&self, partitions: Vec<TopicPartition>) -> bool {
        self.with_record(|r| r.events.revoked(partitions))
            .unwrap_or(false)
    }

    /// Confirms an outstanding pause (for [`PauseMode::Deferred`]).
    #[must_use = "false means the event was not delivered"]
    pub fn confirm_pause(&self) -> bool {
        self.with_record(|r| r.events.pause_confirmed())
            .unwrap_or(false)
    }

    /// Reports that an outstanding pause could not be applied. The client
    /// keeps delivering.
    #[must_use = "false means the event was not delivered"]
    pub fn fail_pause(&self, reason: &str) -> bool {
        self.with_record(|r| {
            r.paused = false;
            r.events.pause_failed(reason)
        })
        .unwrap_or(false)
    }

    /// Simulates the client halting on its own.
    #[must_use = "false means the event was not delivered"]
    pub fn crash(&self, reason: &str) -> bool {
        self.with_record(|r| {
            r.polling = false;
            r.paused = false;
            r.events.stopped(reason)
        })
        .unwrap_or(false)
    }

    /// Returns every control call the client received, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<ControlOp> {
        self.with_record(|r| r.calls.clone()).unwrap_or_default()
    }

    /// Returns true while the client is polling.
    #[must_use]
    pub fn is_polling(&self) -> bool {
        self.with_record(|r| r.polling).unwrap_or(false)
    }

    /// Returns true while the client has paused delivery.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.with_record(|r| r.paused).unwrap_or(false)
    }

    /// Returns the consumer group the client was created for.
    #[must_use]
    pub fn group_id(&self) -> Option<GroupId> {
        self.with_record(|r| r.binding.group_id.clone())
    }
}

fn lock(shared: &Mutex<SharedState>) -> MutexGuard<'_, SharedState> {
    shared.lock().expect("memory client lock poisoned")
}
