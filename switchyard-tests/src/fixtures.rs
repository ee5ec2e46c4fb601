//! Shared fixtures for Switchyard tests.
//!
//! Every fixture runs on the in-memory client so tests can inject
//! rebalances, defer pause confirmations and fail individual operations.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use switchyard_consumer::{
    ConsumerHandle, ConsumerRegistry, MemoryClientConfig, MemoryClientFactory, RegistryConfig,
};
use switchyard_core::{ConsumerState, Result};
use switchyard_server::ConsumerController;

/// Upper bound on waiting for an asynchronous effect in tests.
pub const SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

/// A registry wired to an in-memory client factory.
#[derive(Debug)]
pub struct TestRegistry {
    /// The registry under test.
    pub registry: Arc<ConsumerRegistry>,
    /// Factory creating the registry's clients; use it to reach probes.
    pub factory: MemoryClientFactory,
}

impl TestRegistry {
    /// Creates a registry with default limits.
    ///
    /// # Panics
    /// Panics if the default configuration is rejected.
    #[must_use]
    pub fn new(client: MemoryClientConfig) -> Self {
        Self::with_config(RegistryConfig::default(), client)
    }

    /// Creates a registry with the given configuration.
    ///
    /// # Panics
    /// Panics if `config` is rejected.
    #[must_use]
    pub fn with_config(config: RegistryConfig, client: MemoryClientConfig) -> Self {
        let factory = MemoryClientFactory::new(client);
        let registry = ConsumerRegistry::new(config, Arc::new(factory.clone()))
            .expect("test registry config is valid");
        Self {
            registry: Arc::new(registry),
            factory,
        }
    }

    /// Returns a control façade over the registry.
    #[must_use]
    pub fn controller(&self) -> ConsumerController {
        ConsumerController::new(Arc::clone(&self.registry))
    }
}

impl Default for TestRegistry {
    fn default() -> Self {
        Self::new(MemoryClientConfig::default())
    }
}

/// Waits, bounded by [`SETTLE_TIMEOUT`], until `handle` reaches `state`.
///
/// # Errors
/// Returns the handle's error if the consumer goes away first.
///
/// # Panics
/// Panics on timeout.
pub async fn settle(handle: &ConsumerHandle, state: ConsumerState) -> Result<ConsumerState> {
    within(handle.wait_for_state(|s| s == state)).await
}

/// Waits, bounded by [`SETTLE_TIMEOUT`], until `handle` reports
/// `count` assigned partitions.
///
/// # Panics
/// Panics on timeout or if the consumer stops reporting an assignment.
pub async fn settle_assignment(handle: &ConsumerHandle, count: usize) {
    within(async {
        loop {
            let assigned = handle
                .assigned_partitions()
                .expect("consumer should report an assignment");
            if assigned.len() == count {
                return;
            }
            tokio::task::yield_now().await;
        }
    })
    .await;
}

/// Runs `fut`, panicking if it does not finish within [`SETTLE_TIMEOUT`].
///
/// # Panics
/// Panics on timeout.
pub async fn within<T>(fut: impl Future<Output = T>) -> T {
    tokio::time::timeout(SETTLE_TIMEOUT, fut)
        .await
        .expect("timed out waiting for consumer")
}
