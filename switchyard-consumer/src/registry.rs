//! Dynamic consumer registry.
//!
//! The registry is the single source of truth for which consumers exist.
//! It maps listener IDs to consumer handles behind an async `RwLock` that is
//! only ever held for in-memory work: handles are cloned out under the lock
//! and driven after it is released, so a consumer stuck in a slow group join
//! never blocks lookups of other consumers.
//!
//! Removal is a two-step protocol. The consumer's own actor first agrees to
//! retire (which it refuses while running), then the entry is removed from
//! the map. A retired entry is invisible to `get` and `list` in between.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use futures::future::join_all;
use switchyard_core::{
    validate_listener_id, ConsumerSpec, Error, GroupId, Limits, ListenerId, Result,
};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::client::{ClientBinding, ClientFactory};
use crate::handle::{spawn_consumer, ActorConfig, ConsumerHandle};

/// How a consumer's group ID is derived from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupIdStrategy {
    /// Every consumer joins the same group.
    Shared(GroupId),
    /// Each consumer gets its own group, named `prefix` + listener ID.
    PerListener {
        /// Prepended to the listener ID.
        prefix: String,
    },
}

impl GroupIdStrategy {
    /// Returns the group ID for `listener_id`.
    #[must_use]
    pub fn group_id_for(&self, listener_id: &ListenerId) -> GroupId {
        match self {
            Self::Shared(group_id) => group_id.clone(),
            Self::PerListener { prefix } => GroupId::new(format!("{prefix}{listener_id}")),
        }
    }
}

impl Default for GroupIdStrategy {
    fn default() -> Self {
        Self::PerListener {
            prefix: String::new(),
        }
    }
}

/// Configuration for the consumer registry.
#[derive(Debug, Clone, Default)]
pub struct RegistryConfig {
    /// Resource limits.
    pub limits: Limits,
    /// Group ID derivation.
    pub group_id_strategy: GroupIdStrategy,
}

impl RegistryConfig {
    /// Sets the resource limits.
    #[must_use]
    pub const fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Sets the group ID strategy.
    #[must_use]
    pub fn with_group_id_strategy(mut self, strategy: GroupIdStrategy) -> Self {
        self.group_id_strategy = strategy;
        self
    }
}

/// Authoritative, concurrency-safe catalog of consumers.
pub struct ConsumerRegistry {
    config: RegistryConfig,
    actor_config: ActorConfig,
    factory: Arc<dyn ClientFactory>,
    consumers: RwLock<HashMap<ListenerId, ConsumerHandle>>,
}

impl ConsumerRegistry {
    /// Creates an empty registry whose consumers use clients from `factory`.
    ///
    /// # Errors
    /// Returns `InvalidSpec` if the configured limits are unusable.
    pub fn new(config: RegistryConfig, factory: Arc<dyn ClientFactory>) -> Result<Self> {
        config.limits.validate()?;
        Ok(Self {
            actor_config: ActorConfig::from_limits(&config.limits),
            config,
            factory,
            consumers: RwLock::new(HashMap::new()),
        })
    }

    /// Returns the registry configuration.
    #[must_use]
    pub const fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Registers a consumer in `Created`, then starts it if `spec` asks for it.
    ///
    /// If the immediate start fails the consumer stays registered in
    /// `Created` and the start error is returned.
    ///
    /// # Errors
    /// `InvalidSpec`, `DuplicateListenerId`, `CapacityExceeded`, or a
    /// client failure from creation or the immediate start.
    #[instrument(skip(self, spec), fields(listener_id = %listener_id, topic = %spec.topic))]
    pub async fn register(
        &self,
        listener_id: ListenerId,
        spec: ConsumerSpec,
    ) -> Result<ConsumerHandle> {
        let limits = &self.config.limits;
        validate_listener_id(&listener_id, limits)?;
        spec.validate(limits)?;

        let group_id = self.config.group_id_strategy.group_id_for(&listener_id);

        let handle = {
            let mut consumers = self.consumers.write().await;

            if let Some(existing) = consumers.get(&listener_id) {
                if !existing.is_retired() {
                    debug!("Rejected duplicate listener id");
                    return Err(Error::DuplicateListenerId { listener_id });
                }
                // Retired, its unregister has not removed it yet.
                consumers.remove(&listener_id);
            }

            let live = consumers.values().filter(|h| !h.is_retired()).count();
            if live >= limits.max_consumers as usize {
                warn!(live, max = limits.max_consumers, "Consumer limit reached");
                return Err(Error::CapacityExceeded {
                    limit: "max_consumers",
                    max: u64::from(limits.max_consumers),
                });
            }

            let binding = ClientBinding {
                listener_id: listener_id.clone(),
                group_id,
                topic: spec.topic.clone(),
            };
            let handle = spawn_consumer(binding, self.factory.as_ref(), self.actor_config)?;
            consumers.insert(listener_id, handle.clone());
            handle
        };

        info!(group_id = %handle.group_id(), "Consumer registered");

        if spec.start_immediately {
            match handle.start().await {
                Ok(_) | Err(Error::AlreadyRunning { .. }) => {}
                Err(e) => {
                    warn!(error = %e, "Immediate start failed, consumer left in created state");
                    return Err(e);
                }
            }
        }

        Ok(handle)
    }

    /// Removes a consumer that is `Created` or `Stopped`.
    ///
    /// Never stops the consumer itself: callers stop first, then unregister.
    ///
    /// # Errors
    /// `NotFound` if unknown, `StillRunning` if the consumer is running.
    #[instrument(skip(self), fields(listener_id = %listener_id))]
    pub async fn unregister(&self, listener_id: &ListenerId) -> Result<()> {
        let handle = self.require(listener_id).await?;
        handle.retire().await?;

        let mut consumers = self.consumers.write().await;
        if consumers
            .get(listener_id)
            .is_some_and(|current| current.same_consumer(&handle))
        {
            consumers.remove(listener_id);
        }
        drop(consumers);

        info!("Consumer unregistered");
        Ok(())
    }

    /// Looks up a consumer.
    pub async fn get(&self, listener_id: &ListenerId) -> Option<ConsumerHandle> {
        self.consumers
            .read()
            .await
            .get(listener_id)
            .filter(|h| !h.is_retired())
            .cloned()
    }

    /// Looks up a consumer that must exist.
    ///
    /// # Errors
    /// `NotFound` if the listener ID is not registered.
    pub async fn require(&self, listener_id: &ListenerId) -> Result<ConsumerHandle> {
        self.get(listener_id).await.ok_or_else(|| Error::NotFound {
            listener_id: listener_id.clone(),
        })
    }

    /// Returns every registered consumer, ordered by listener ID.
    pub async fn list(&self) -> Vec<ConsumerHandle> {
        let mut handles: Vec<ConsumerHandle> = self
            .consumers
            .read()
            .await
            .values()
            .filter(|h| !h.is_retired())
            .cloned()
            .collect();
        handles.sort_by(|a, b| a.listener_id().cmp(b.listener_id()));
        handles
    }

    /// Returns the number of registered consumers.
    pub async fn len(&self) -> usize {
        self.consumers
            .read()
            .await
            .values()
            .filter(|h| !h.is_retired())
            .count()
    }

    /// Returns true if no consumers are registered.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drains the registry: stops every running consumer, retires all of
    /// them and clears the catalog. Returns how many consumers were removed.
    ///
    /// Failures are logged and do not stop the drain. A consumer whose stop
    /// failed is still removed; its actor stops the client once the last
    /// handle is dropped.
    #[instrument(skip(self))]
    pub async fn shutdown(&self) -> usize {
        let handles: Vec<ConsumerHandle> = self.consumers.read().await.values().cloned().collect();

        let stops = handles
            .iter()
            .filter(|h| h.is_running())
            .map(|h| async move { (h.listener_id(), h.stop().await) });
        for (listener_id, result) in join_all(stops).await {
            match result {
                Ok(_) | Err(Error::AlreadyStopped { .. } | Error::NotFound { .. }) => {}
                Err(e) => {
                    warn!(listener_id = %listener_id, error = %e, "Failed to stop consumer during shutdown");
                }
            }
        }

        let retires = handles.iter().map(ConsumerHandle::retire);
        for (handle, result) in handles.iter().zip(join_all(retires).await) {
            match result {
                Ok(()) | Err(Error::NotFound { .. }) => {}
                Err(e) => {
                    warn!(listener_id = %handle.listener_id(), error = %e, "Failed to retire consumer during shutdown");
                }
            }
        }

        let mut consumers = self.consumers.write().await;
        let drained = consumers.len();
        consumers.clear();
        drop(consumers);

        info!(drained, "Consumer registry shut down");
        drained
    }
}

impl fmt::Debug for ConsumerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsumerRegistry")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
