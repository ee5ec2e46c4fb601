//! Consumer actor and its handle.
//!
//! Each registered consumer runs as an independent actor that owns its
//! broker client. This serializes every control operation on one consumer
//! (guard check, client call and transition happen as one step) while
//! consumers never contend with each other.
//!
//! # Architecture
//!
//! ```text
//! ConsumerHandle ──Control/Retire──► ConsumerActor ──► ConsumerClient
//!       ▲                               │   ▲
//!       └──────── watch snapshot ───────┘   └── ClientEvent
//! ```
//!
//! Observers read the latest published snapshot and never wait on the actor,
//! so a consumer blocked in a slow group join can still be inspected.

use std::fmt;

use switchyard_core::{
    ConsumerState, ControlOp, Error, GroupId, Limits, ListenerId, Result, TopicPartition,
};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, instrument, warn};

use crate::assignment::Assignment;
use crate::client::{
    ClientBinding, ClientEvent, ClientEventSender, ClientFactory, ConsumerClient,
};

/// Commands sent to a consumer actor.
#[derive(Debug)]
enum ConsumerCommand {
    /// Evaluate a lifecycle operation.
    Control {
        op: ControlOp,
        reply: oneshot::Sender<Result<ConsumerState>>,
    },
    /// Exit the actor if the consumer is not running.
    Retire { reply: oneshot::Sender<Result<()>> },
}

/// Point-in-time view of a consumer, published after every change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsumerSnapshot {
    /// Lifecycle state.
    pub state: ConsumerState,
    /// Owned partitions; `None` unless the consumer is a group member.
    pub assignment: Option<Vec<TopicPartition>>,
    /// True once the consumer has been removed from the registry.
    pub retired: bool,
}

/// Configuration for a consumer actor.
#[derive(Debug, Clone, Copy)]
pub struct ActorConfig {
    /// Command channel buffer size.
    pub channel_buffer_size: usize,
}

impl ActorConfig {
    /// Derives the actor configuration from system limits.
    #[must_use]
    pub const fn from_limits(limits: &Limits) -> Self {
        Self {
            channel_buffer_size: limits.command_channel_capacity as usize,
        }
    }
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self::from_limits(&Limits::new())
    }
}

/// Handle for controlling and observing one consumer.
///
/// Cheap to clone. All clones address the same actor.
#[derive(Clone)]
pub struct ConsumerHandle {
    listener_id: ListenerId,
    group_id: GroupId,
    topic: String,
    tx: mpsc::Sender<ConsumerCommand>,
    snapshot_rx: watch::Receiver<ConsumerSnapshot>,
}

impl ConsumerHandle {
    /// Returns the listener ID.
    #[must_use]
    pub const fn listener_id(&self) -> &ListenerId {
        &self.listener_id
    }

    /// Returns the consumer group ID.
    #[must_use]
    pub const fn group_id(&self) -> &GroupId {
        &self.group_id
    }

    /// Returns the subscribed topic.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Returns the latest published snapshot.
    #[must_use]
    pub fn snapshot(&self) -> ConsumerSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Returns the latest observed state.
    #[must_use]
    pub fn state(&self) -> ConsumerState {
        self.snapshot_rx.borrow().state
    }

    /// Returns true while the consumer is a group member.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state().is_running()
    }

    /// Returns true once the client has confirmed a pause.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.state().is_paused()
    }

    /// Returns true while a pause is in flight.
    #[must_use]
    pub fn is_pause_requested(&self) -> bool {
        self.state().is_pause_requested()
    }

    /// Returns the owned partitions, or `None` if the consumer is not a
    /// group member.
    #[must_use]
    pub fn assigned_partitions(&self) -> Option<Vec<TopicPartition>> {
        self.snapshot_rx.borrow().assignment.clone()
    }

    /// Returns true once the consumer has been removed from its registry.
    #[must_use]
    pub fn is_retired(&self) -> bool {
        self.snapshot_rx.borrow().retired
    }

    /// Returns true if both handles address the same consumer instance.
    #[must_use]
    pub fn same_consumer(&self, other: &Self) -> bool {
        self.tx.same_channel(&other.tx)
    }

    /// Starts the consumer.
    ///
    /// # Errors
    /// `AlreadyRunning` if running, `Client` if the client failed to start.
    pub async fn start(&self) -> Result<ConsumerState> {
        self.control(ControlOp::Start).await
    }

    /// Requests a pause. The state is `PauseRequested` until the client
    /// confirms.
    ///
    /// # Errors
    /// `NotRunning`, `AlreadyPaused` or `PauseAlreadyRequested` per the
    /// guard table.
    pub async fn pause(&self) -> Result<ConsumerState> {
        self.control(ControlOp::Pause).await
    }

    /// Resumes a paused consumer.
    ///
    /// # Errors
    /// `NotRunning` or `NotPaused` per the guard table.
    pub async fn resume(&self) -> Result<ConsumerState> {
        self.control(ControlOp::Resume).await
    }

    /// Stops the consumer.
    ///
    /// # Errors
    /// `AlreadyStopped` if not running.
    pub async fn stop(&self) -> Result<ConsumerState> {
        self.control(ControlOp::Stop).await
    }

    /// Applies a control operation and returns the resulting state.
    ///
    /// # Errors
    /// Returns the guard violation, a translated client failure, or
    /// `NotFound` if the consumer has been retired.
    pub async fn control(&self, op: ControlOp) -> Result<ConsumerState> {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.tx
            .send(ConsumerCommand::Control { op, reply: reply_tx })
            .await
            .map_err(|_| self.gone())?;

        reply_rx.await.map_err(|_| self.gone())?
    }

    /// Retires the consumer if it is not running. The actor exits.
    pub(crate) async fn retire(&self) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.tx
            .send(ConsumerCommand::Retire { reply: reply_tx })
            .await
            .map_err(|_| self.gone())?;

        reply_rx.await.map_err(|_| self.gone())?
    }

    /// Waits until the state satisfies `pred` and returns it.
    ///
    /// # Errors
    /// `NotFound` if the consumer is retired first, `Unavailable` if its
    /// actor exited.
    pub async fn wait_for_state(
        &self,
        mut pred: impl FnMut(ConsumerState) -> bool,
    ) -> Result<ConsumerState> {
        let mut rx = self.snapshot_rx.clone();
        let (state, retired) = {
            let snapshot = rx
                .wait_for(|s| s.retired || pred(s.state))
                .await
                .map_err(|_| Error::Unavailable {
                    listener_id: self.listener_id.clone(),
                })?;
            (snapshot.state, snapshot.retired)
        };

        if retired {
            return Err(Error::NotFound {
                listener_id: self.listener_id.clone(),
            });
        }
        Ok(state)
    }

    fn gone(&self) -> Error {
        if self.is_retired() {
            Error::NotFound {
                listener_id: self.listener_id.clone(),
            }
        } else {
            Error::Unavailable {
                listener_id: self.listener_id.clone(),
            }
        }
    }
}

impl fmt::Debug for ConsumerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsumerHandle")
            .field("listener_id", &self.listener_id)
            .field("group_id", &self.group_id)
            .field("topic", &self.topic)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Creates a consumer actor and returns a handle to it.
///
/// The consumer starts in `Created`. The actor runs in its own tokio task
/// until it is retired or every handle is dropped; dropping the last handle
/// of a running consumer stops its client.
///
/// # Errors
/// Returns `Client` if the factory cannot create a client.
pub fn spawn_consumer(
    binding: ClientBinding,
    factory: &dyn ClientFactory,
    config: ActorConfig,
) -> Result<ConsumerHandle> {
    let (events, event_rx) = ClientEventSender::channel();
    let client = factory
        .create(binding.clone(), events)
        .map_err(|e| Error::Client {
            listener_id: binding.listener_id.clone(),
            operation: "create",
            message: e.to_string(),
        })?;

    let (cmd_tx, cmd_rx) = mpsc::channel(config.channel_buffer_size.max(1));
    let (snapshot_tx, snapshot_rx) = watch::channel(ConsumerSnapshot::default());

    let ClientBinding {
        listener_id,
        group_id,
        topic,
    } = binding;

    let actor = ConsumerActor {
        listener_id: listener_id.clone(),
        client,
        cmd_rx,
        event_rx,
        snapshot_tx,
        state: ConsumerState::Created,
        assignment: Assignment::new(),
        retired: false,
    };

    tokio::spawn(actor.run());

    Ok(ConsumerHandle {
        listener_id,
        group_id,
        topic,
        tx: cmd_tx,
        snapshot_rx,
    })
}

struct ConsumerActor {
    listener_id: ListenerId,
    client: Box<dyn ConsumerClient>,
    cmd_rx: mpsc::Receiver<ConsumerCommand>,
    event_rx: mpsc::UnboundedReceiver<ClientEvent>,
    snapshot_tx: watch::Sender<ConsumerSnapshot>,
    state: ConsumerState,
    assignment: Assignment,
    retired: bool,
}

impl ConsumerActor {
    #[instrument(skip(self), fields(listener_id = %self.listener_id))]
    async fn run(mut self) {
        debug!("Consumer actor started");

        loop {
            tokio::select! {
                // Drain client events first so commands see the latest state.
                biased;

                Some(event) = self.event_rx.recv() => {
                    self.handle_event(event).await;
                }
                cmd = self.cmd_rx.recv() => {
                    let Some(cmd) = cmd else {
                        break;
                    };
                    match cmd {
                        ConsumerCommand::Control { op, reply } => {
                            let result = self.handle_control(op).await;
                            let _ = reply.send(result);
                        }
                        ConsumerCommand::Retire { reply } => {
                            if self.state.is_running() {
                                debug!(state = %self.state, "Rejected retire of running consumer");
                                let _ = reply.send(Err(Error::StillRunning {
                                    listener_id: self.listener_id.clone(),
                                    state: self.state,
                                }));
                                continue;
                            }
                            self.retired = true;
                            self.publish();
                            let _ = reply.send(Ok(()));
                            break;
                        }
                    }
                }
            }
        }

        if self.state.is_running() {
            warn!(state = %self.state, "All handles dropped while running, stopping client");
            if let Err(e) = self.client.stop().await {
                warn!(error = %e, "Failed to stop orphaned client");
            }
            self.state = ConsumerState::Stopped;
            self.assignment.clear();
        }
        self.retired = true;
        self.publish();

        debug!("Consumer actor stopped");
    }

    async fn handle_control(&mut self, op: ControlOp) -> Result<ConsumerState> {
        let from = self.state;
        let next = match from.transition(op) {
            Ok(next) => next,
            Err(guard) => {
                debug!(op = %op, state = %from, ?guard, "Rejected control operation");
                return Err(guard.into_error(self.listener_id.clone(), from));
            }
        };

        let result = match op {
            ControlOp::Start => self.client.start().await,
            ControlOp::Pause => self.client.pause().await,
            ControlOp::Resume => self.client.resume().await,
            ControlOp::Stop => self.client.stop().await,
        };
        if let Err(e) = result {
            warn!(op = %op, state = %from, error = %e, "Broker client operation failed");
            return Err(Error::Client {
                listener_id: self.listener_id.clone(),
                operation: op.as_str(),
                message: e.to_string(),
            });
        }

        if matches!(op, ControlOp::Start | ControlOp::Stop) {
            self.assignment.clear();
        }
        self.state = next;
        self.publish();

        info!(op = %op, from = %from, to = %next, "Consumer state changed");
        Ok(next)
    }

    async fn handle_event(&mut self, event: ClientEvent) {
        match event {
            ClientEvent::Assigned(partitions) => {
                if !self.state.tracks_assignment() {
                    debug!(state = %self.state, count = partitions.len(), "Ignoring assignment outside group membership");
                    return;
                }
                let added = self.assignment.apply_assigned(partitions);
                info!(added, total = self.assignment.len(), "Partitions assigned");
            }
            ClientEvent::Revoked(partitions) => {
                if !self.state.tracks_assignment() {
                    debug!(state = %self.state, count = partitions.len(), "Ignoring revocation outside group membership");
                    return;
                }
                let removed = self.assignment.apply_revoked(partitions);
                info!(removed, total = self.assignment.len(), "Partitions revoked");
                if self.assignment.is_empty() {
                    debug!("No partitions left in assignment");
                }
            }
            ClientEvent::PauseConfirmed => {
                let next = self.state.confirm_pause();
                if next == self.state {
                    debug!(state = %self.state, "Ignoring stale pause confirmation");
                    return;
                }
                info!(from = %self.state, to = %next, "Pause confirmed");
                self.state = next;
            }
            ClientEvent::PauseFailed { reason } => {
                let next = self.state.abandon_pause();
                if next == self.state {
                    debug!(state = %self.state, %reason, "Ignoring stale pause failure");
                    return;
                }
                warn!(%reason, "Pause could not be applied, consumer keeps running");
                self.state = next;
            }
            ClientEvent::Stopped { reason } => {
                if !self.state.is_running() {
                    debug!(state = %self.state, %reason, "Ignoring halt of inactive client");
                    return;
                }
                warn!(state = %self.state, %reason, "Broker client halted, marking consumer stopped");
                if let Err(e) = self.client.stop().await {
                    debug!(error = %e, "Cleanup after client halt failed");
                }
                self.state = ConsumerState::Stopped;
                self.assignment.clear();
            }
        }
        self.publish();
    }

    fn publish(&self) {
        let snapshot = ConsumerSnapshot {
            state: self.state,
            assignment: self.assignment.report(self.state),
            retired: self.retired,
        };
        self.snapshot_tx.send_modify(|current| *current = snapshot);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::memory::{FaultConfig, MemoryClientConfig, MemoryClientFactory, PauseMode};
    use switchyard_core::ErrorKind;

    fn binding(id: &str) -> ClientBinding {
        ClientBinding {
            listener_id: ListenerId::new(id),
            group_id: GroupId::new(id),
            topic: "orders".to_string(),
        }
    }

    fn spawn(factory: &MemoryClientFactory, id: &str) -> ConsumerHandle {
        spawn_consumer(binding(id), factory, ActorConfig::default()).unwrap()
    }

    async fn settle(handle: &ConsumerHandle, state: ConsumerState) {
        tokio::time::timeout(Duration::from_secs(5), handle.wait_for_state(|s| s == state))
            .await
            .expect("timed out waiting for state")
            .unwrap();
    }

    #[tokio::test]
    async fn test_lifecycle_round_trip() {
        let factory = MemoryClientFactory::new(MemoryClientConfig::default().with_partitions(2));
        let handle = spawn(&factory, "l-1");

        assert_eq!(handle.state(), ConsumerState::Created);
        assert_eq!(handle.assigned_partitions(), None);

        assert_eq!(handle.start().await.unwrap(), ConsumerState::Running);
        assert_eq!(handle.pause().await.unwrap(), ConsumerState::PauseRequested);
        settle(&handle, ConsumerState::Paused).await;
        assert!(handle.is_paused());
        assert!(handle.assigned_partitions().is_some());

        assert_eq!(handle.resume().await.unwrap(), ConsumerState::Running);
        assert_eq!(
            handle.assigned_partitions(),
            Some(vec![
                TopicPartition::new("orders", 0),
                TopicPartition::new("orders", 1)
            ])
        );

        assert_eq!(handle.stop().await.unwrap(), ConsumerState::Stopped);
        assert_eq!(handle.assigned_partitions(), None);
    }

    #[tokio::test]
    async fn test_stop_twice() {
        let factory = MemoryClientFactory::default();
        let handle = spawn(&factory, "l-1");
        handle.start().await.unwrap();

        assert!(handle.stop().await.is_ok());
        let err = handle.stop().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyStopped);
        assert_eq!(err.state(), Some(ConsumerState::Stopped));
        assert_eq!(handle.state(), ConsumerState::Stopped);
    }

    #[tokio::test]
    async fn test_deferred_pause_rejects_second_pause_and_resume() {
        let factory = MemoryClientFactory::new(
            MemoryClientConfig::default().with_pause_mode(PauseMode::Deferred),
        );
        let handle = spawn(&factory, "l-1");
        handle.start().await.unwrap();
        handle.pause().await.unwrap();

        assert!(handle.is_pause_requested());
        assert_eq!(
            handle.pause().await.unwrap_err().kind(),
            ErrorKind::PauseAlreadyRequested
        );
        assert_eq!(handle.resume().await.unwrap_err().kind(), ErrorKind::NotPaused);

        let probe = factory.probe(handle.listener_id()).unwrap();
        assert!(probe.confirm_pause());
        settle(&handle, ConsumerState::Paused).await;
        assert_eq!(handle.pause().await.unwrap_err().kind(), ErrorKind::AlreadyPaused);
    }

    #[tokio::test]
    async fn test_failed_pause_returns_to_running() {
        let factory = MemoryClientFactory::new(
            MemoryClientConfig::default().with_pause_mode(PauseMode::Deferred),
        );
        let handle = spawn(&factory, "l-1");
        handle.start().await.unwrap();
        handle.pause().await.unwrap();

        let view = factory.probe(handle.listener_id()).unwrap();
        assert!(view.fail_pause("partition pause rejected"));
        settle(&handle, ConsumerState::Running).await;
        assert!(handle.assigned_partitions().is_some());

        // The pause can be retried.
        assert_eq!(handle.pause().await.unwrap(), ConsumerState::PauseRequested);
        assert!(view.confirm_pause());
        settle(&handle, ConsumerState::Paused).await;

        // A failure report after the pause took effect is stale.
        assert!(view.fail_pause("late"));
        assert_eq!(handle.resume().await.unwrap(), ConsumerState::Running);
    }

    #[tokio::test]
    async fn test_exited_actor_releases_client() {
        let factory = MemoryClientFactory::default();
        let handle = spawn(&factory, "l-1");
        handle.start().await.unwrap();
        handle.stop().await.unwrap();
        assert_eq!(factory.live_count(), 1);

        handle.retire().await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), async {
            while factory.live_count() > 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("client was not released");
    }

    #[tokio::test]
    async fn test_client_failure_leaves_state_unchanged() {
        let factory = MemoryClientFactory::default();
        let handle = spawn(&factory, "l-1");

        factory.set_faults(FaultConfig::none().with_force_start_fail());
        let err = handle.start().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Client);
        assert_eq!(handle.state(), ConsumerState::Created);

        // Forced faults fire once.
        assert_eq!(handle.start().await.unwrap(), ConsumerState::Running);
    }

    #[tokio::test]
    async fn test_client_halt_marks_stopped() {
        let factory = MemoryClientFactory::default();
        let handle = spawn(&factory, "l-1");
        handle.start().await.unwrap();

        let probe = factory.probe(handle.listener_id()).unwrap();
        assert!(probe.crash("broker unreachable"));
        settle(&handle, ConsumerState::Stopped).await;
        assert_eq!(handle.assigned_partitions(), None);

        // Restart after an unexpected halt.
        assert_eq!(handle.start().await.unwrap(), ConsumerState::Running);
    }

    #[tokio::test]
    async fn test_assignment_events() {
        let factory = MemoryClientFactory::new(MemoryClientConfig::default().with_partitions(0));
        let handle = spawn(&factory, "l-1");
        let probe = factory.probe(handle.listener_id()).unwrap();

        // Ignored before start.
        assert!(probe.assign(vec![TopicPartition::new("orders", 7)]));
        handle.start().await.unwrap();
        assert_eq!(handle.assigned_partitions(), Some(Vec::new()));

        assert!(probe.assign(vec![
            TopicPartition::new("orders", 3),
            TopicPartition::new("orders", 4)
        ]));
        assert!(probe.revoke(vec![TopicPartition::new("orders", 3)]));
        let mut rx = handle.snapshot_rx.clone();
        tokio::time::timeout(
            Duration::from_secs(5),
            rx.wait_for(|s| s.assignment == Some(vec![TopicPartition::new("orders", 4)])),
        )
        .await
        .expect("timed out waiting for assignment")
        .unwrap();
    }

    #[tokio::test]
    async fn test_retire() {
        let factory = MemoryClientFactory::default();
        let handle = spawn(&factory, "l-1");
        handle.start().await.unwrap();

        assert_eq!(handle.retire().await.unwrap_err().kind(), ErrorKind::StillRunning);

        handle.stop().await.unwrap();
        handle.retire().await.unwrap();
        assert!(handle.is_retired());
        assert_eq!(handle.start().await.unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(
            handle.wait_for_state(|_| false).await.unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    #[tokio::test]
    async fn test_dropping_last_handle_stops_client() {
        let factory = MemoryClientFactory::default();
        let handle = spawn(&factory, "l-1");
        handle.start().await.unwrap();
        let probe = factory.probe(handle.listener_id()).unwrap();
        assert!(probe.is_polling());

        drop(handle);
        tokio::time::timeout(Duration::from_secs(5), async {
            while probe.is_polling() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("client was not stopped");
    }

    #[tokio::test]
    async fn test_clones_address_same_consumer() {
        let factory = MemoryClientFactory::default();
        let a = spawn(&factory, "l-1");
        let b = spawn(&factory, "l-2");

        assert!(a.same_consumer(&a.clone()));
        assert!(!a.same_consumer(&b));
    }
}
