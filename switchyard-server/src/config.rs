//! Server configuration.

use std::net::SocketAddr;
use std::sync::Arc;

use switchyard_consumer::{
    ClientFactory, ConsumerRegistry, MemoryClientConfig, MemoryClientFactory, RegistryConfig,
};
use switchyard_kafka::{KafkaClientConfig, KafkaClientFactory};

use crate::error::{ServerError, ServerResult};

/// Broker client backing every consumer.
#[derive(Debug, Clone)]
pub enum Backend {
    /// Real Kafka consumers through librdkafka.
    Kafka(KafkaClientConfig),
    /// In-memory clients, for demos and tests.
    Memory(MemoryClientConfig),
}

impl Default for Backend {
    fn default() -> Self {
        Self::Kafka(KafkaClientConfig::default())
    }
}

/// Configuration for the Switchyard server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP listen address.
    pub listen_addr: SocketAddr,
    /// Registry limits and group ID derivation.
    pub registry: RegistryConfig,
    /// Broker client backend.
    pub backend: Backend,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            registry: RegistryConfig::default(),
            backend: Backend::default(),
        }
    }
}

impl ServerConfig {
    /// Creates a configuration listening on `listen_addr`.
    #[must_use]
    pub fn new(listen_addr: SocketAddr) -> Self {
        Self {
            listen_addr,
            ..Self::default()
        }
    }

    /// Sets the registry configuration.
    #[must_use]
    pub fn with_registry(mut self, registry: RegistryConfig) -> Self {
        self.registry = registry;
        self
    }

    /// Sets the broker client backend.
    #[must_use]
    pub fn with_backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }

    /// Builds an empty registry over the configured backend.
    ///
    /// # Errors
    /// Returns `Config` if the backend or registry configuration is invalid.
    pub fn build_registry(&self) -> ServerResult<Arc<ConsumerRegistry>> {
        let factory: Arc<dyn ClientFactory> = match &self.backend {
            Backend::Kafka(config) => Arc::new(
                KafkaClientFactory::new(config.clone()).map_err(|e| ServerError::Config {
                    message: e.to_string(),
                })?,
            ),
            Backend::Memory(config) => Arc::new(MemoryClientFactory::new(config.clone())),
        };
        let registry =
            ConsumerRegistry::new(self.registry.clone(), factory).map_err(|e| ServerError::Config {
                message: e.to_string(),
            })?;
        Ok(Arc::new(registry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchyard_core::Limits;

    #[test]
    fn test_build_registry_memory() {
        let config = ServerConfig::default().with_backend(Backend::Memory(MemoryClientConfig::default()));
        assert!(config.build_registry().is_ok());
    }

    #[test]
    fn test_build_registry_rejects_bad_config() {
        let config = ServerConfig::default().with_backend(Backend::Kafka(KafkaClientConfig::new("")));
        assert!(matches!(config.build_registry(), Err(ServerError::Config { .. })));

        let config = ServerConfig::default()
            .with_backend(Backend::Memory(MemoryClientConfig::default()))
            .with_registry(RegistryConfig::default().with_limits(Limits::new().with_max_consumers(0)));
        assert!(matches!(config.build_registry(), Err(ServerError::Config { .. })));
    }
}
