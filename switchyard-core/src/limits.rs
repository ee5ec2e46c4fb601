//! System limits and configuration bounds.
//!
//! Following TigerStyle: put limits on everything.
//! The consumer catalog, every name and every command queue has an explicit
//! maximum size. This prevents unbounded growth and makes the system predictable.

/// System-wide limits for Switchyard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Maximum number of registered consumers.
    pub max_consumers: u32,
    /// Maximum length of a topic name in bytes (Kafka caps this at 249).
    pub max_topic_name_bytes: u32,
    /// Maximum length of a listener ID in bytes.
    pub max_listener_id_bytes: u32,
    /// Capacity of each consumer's control command queue.
    pub command_channel_capacity: u32,
}

impl Limits {
    /// Creates limits with safe defaults.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_consumers: 1024,
            max_topic_name_bytes: 249,
            max_listener_id_bytes: 255,
            command_channel_capacity: 64,
        }
    }

    /// Sets the maximum number of registered consumers.
    #[must_use]
    pub const fn with_max_consumers(mut self, max: u32) -> Self {
        self.max_consumers = max;
        self
    }

    /// Validates that all limits are usable.
    ///
    /// # Errors
    /// Returns an error if any limit is zero.
    pub fn validate(&self) -> crate::Result<()> {
        let checks = [
            ("max_consumers", self.max_consumers),
            ("max_topic_name_bytes", self.max_topic_name_bytes),
            ("max_listener_id_bytes", self.max_listener_id_bytes),
            ("command_channel_capacity", self.command_channel_capacity),
        ];
        for (name, value) in checks {
            if value == 0 {
                return Err(crate::Error::invalid_spec(name, "limit must be positive"));
            }
        }
        Ok(())
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits_are_valid() {
        let limits = Limits::new();
        assert!(limits.validate().is_ok());
        assert_eq!(limits.max_topic_name_bytes, 249);
    }

    #[test]
    fn test_zero_limit_is_invalid() {
        let limits = Limits::new().with_max_consumers(0);
        assert!(limits.validate().is_err());
    }
}
