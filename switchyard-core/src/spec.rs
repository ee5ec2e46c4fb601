//! Declared consumer configuration.

use crate::error::{Error, Result};
use crate::limits::Limits;
use crate::types::ListenerId;

/// What a caller asked for at registration time.
///
/// Immutable once registered: changing the topic means delete + re-register.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerSpec {
    /// Topic to subscribe to.
    pub topic: String,
    /// Start polling as part of registration.
    pub start_immediately: bool,
}

impl ConsumerSpec {
    /// Creates a spec that registers the consumer without starting it.
    #[must_use]
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            start_immediately: false,
        }
    }

    /// Sets whether registration also starts the consumer.
    #[must_use]
    pub const fn with_start_immediately(mut self, start: bool) -> Self {
        self.start_immediately = start;
        self
    }

    /// Validates the spec against Kafka's topic naming rules and `limits`.
    ///
    /// # Errors
    /// Returns `InvalidSpec` if the topic is empty, too long, `.`/`..`, or
    /// contains characters outside `[A-Za-z0-9._-]`.
    pub fn validate(&self, limits: &Limits) -> Result<()> {
        let topic = self.topic.as_str();
        if topic.is_empty() {
            return Err(Error::invalid_spec("topic", "must not be empty"));
        }
        if topic.len() > limits.max_topic_name_bytes as usize {
            return Err(Error::invalid_spec(
                "topic",
                format!(
                    "length {} exceeds max {} bytes",
                    topic.len(),
                    limits.max_topic_name_bytes
                ),
            ));
        }
        if topic == "." || topic == ".." {
            return Err(Error::invalid_spec("topic", "'.' and '..' are reserved"));
        }
        if let Some(c) = topic
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
        {
            return Err(Error::invalid_spec(
                "topic",
                format!("illegal character {c:?}"),
            ));
        }
        Ok(())
    }
}

/// Validates a caller-supplied listener ID.
///
/// # Errors
/// Returns `InvalidSpec` if the ID is empty or longer than the limit.
pub fn validate_listener_id(listener_id: &ListenerId, limits: &Limits) -> Result<()> {
    let len = listener_id.as_str().len();
    if len == 0 {
        return Err(Error::invalid_spec("listener_id", "must not be empty"));
    }
    if len > limits.max_listener_id_bytes as usize {
        return Err(Error::invalid_spec(
            "listener_id",
            format!(
                "length {len} exceeds max {} bytes",
                limits.max_listener_id_bytes
            ),
        ));
    }
    Ok(())
}
