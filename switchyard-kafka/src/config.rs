//! Kafka client configuration.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use rdkafka::config::ClientConfig;
use switchyard_consumer::{ClientBinding, ClientError, ClientResult};

/// Properties the adapter sets from the consumer binding. They cannot be
/// overridden through extra properties.
const RESERVED_PROPERTIES: [&str; 3] = ["bootstrap.servers", "group.id", "client.id"];

/// Where a new consumer group starts reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OffsetReset {
    /// Start from the oldest retained record.
    Earliest,
    /// Start from the next produced record.
    #[default]
    Latest,
}

impl OffsetReset {
    /// librdkafka property value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Earliest => "earliest",
            Self::Latest => "latest",
        }
    }
}

impl fmt::Display for OffsetReset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error parsing an [`OffsetReset`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown auto.offset.reset value '{0}' (expected earliest or latest)")]
pub struct ParseOffsetResetError(String);

impl FromStr for OffsetReset {
    type Err = ParseOffsetResetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "earliest" | "smallest" | "beginning" => Ok(Self::Earliest),
            "latest" | "largest" | "end" => Ok(Self::Latest),
            _ => Err(ParseOffsetResetError(s.to_string())),
        }
    }
}

/// Configuration shared by every Kafka consumer the factory creates.
#[derive(Debug, Clone)]
pub struct KafkaClientConfig {
    /// Comma-separated broker list.
    pub bootstrap_servers: String,
    /// Starting position for groups without committed offsets.
    pub auto_offset_reset: OffsetReset,
    /// Whether librdkafka commits offsets in the background.
    pub enable_auto_commit: bool,
    /// Extra librdkafka properties.
    pub properties: BTreeMap<String, String>,
    /// How long `stop` waits for the poll task before abandoning it.
    pub shutdown_timeout: Duration,
}

impl Default for KafkaClientConfig {
    fn default() -> Self {
        Self {
            bootstrap_servers: "localhost:9092".to_string(),
            auto_offset_reset: OffsetReset::Latest,
            enable_auto_commit: true,
            properties: BTreeMap::new(),
            shutdown_timeout: Duration::from_secs(10),
        }
    }
}

impl KafkaClientConfig {
    /// Creates a configuration for the given brokers.
    #[must_use]
    pub fn new(bootstrap_servers: impl Into<String>) -> Self {
        Self {
            bootstrap_servers: bootstrap_servers.into(),
            ..Self::default()
        }
    }

    /// Sets the offset reset policy.
    #[must_use]
    pub const fn with_auto_offset_reset(mut self, reset: OffsetReset) -> Self {
        self.auto_offset_reset = reset;
        self
    }

    /// Enables or disables background offset commits.
    #[must_use]
    pub const fn with_auto_commit(mut self, enabled: bool) -> Self {
        self.enable_auto_commit = enabled;
        self
    }

    /// Adds an extra librdkafka property.
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Sets the poll task shutdown timeout.
    #[must_use]
    pub const fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns `InvalidConfig` if no brokers are given or an extra property
    /// overrides one the adapter owns.
    pub fn validate(&self) -> ClientResult<()> {
        if self.bootstrap_servers.trim().is_empty() {
            return Err(ClientError::InvalidConfig {
                message: "bootstrap.servers must not be empty".to_string(),
            });
        }
        if let Some(key) = self
            .properties
            .keys()
            .find(|k| RESERVED_PROPERTIES.contains(&k.as_str()))
        {
            return Err(ClientError::InvalidConfig {
                message: format!("property '{key}' is set per consumer and cannot be overridden"),
            });
        }
        if self.properties.contains_key("enable.auto.commit") {
            return Err(ClientError::InvalidConfig {
                message: "use the auto-commit setting instead of 'enable.auto.commit'".to_string(),
            });
        }
        Ok(())
    }

    /// Builds the librdkafka configuration for one consumer.
    #[must_use]
    pub fn client_config(&self, binding: &ClientBinding) -> ClientConfig {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", &self.bootstrap_servers)
            .set("group.id", binding.group_id.as_str())
            .set("client.id", binding.listener_id.as_str())
            .set("auto.offset.reset", self.auto_offset_reset.as_str())
            .set("enable.auto.commit", self.enable_auto_commit.to_string());

        for (key, value) in &self.properties {
            config.set(key, value);
        }
        config
    }
}
