//! Broker-client capability interface.
//!
//! The consumer actor depends only on this contract. A concrete broker
//! client library is an adapter implementing [`ConsumerClient`] and
//! [`ClientFactory`]; tests substitute the in-memory client.
//!
//! Control methods return once the command has been issued. Effects that
//! land later (partition assignment, pause quiescence, unexpected halts) are
//! reported back through the [`ClientEventSender`] handed to the factory.

use async_trait::async_trait;
use switchyard_core::{GroupId, ListenerId, TopicPartition};
use tokio::sync::mpsc;

/// Result type for broker-client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors reported by a broker client.
///
/// These never reach callers directly: the actor translates them into
/// `switchyard_core::Error::Client`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// The broker or client library rejected the operation.
    #[error("broker error: {message}")]
    Broker {
        /// Error description.
        message: String,
    },
    /// The client has been shut down.
    #[error("client is closed")]
    Closed,
    /// The client configuration is unusable.
    #[error("invalid client configuration: {message}")]
    InvalidConfig {
        /// Configuration error description.
        message: String,
    },
}

/// Identity a client is created for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientBinding {
    /// The listener that owns the client.
    pub listener_id: ListenerId,
    /// Consumer group the client joins.
    pub group_id: GroupId,
    /// Topic the client subscribes to.
    pub topic: String,
}

/// Asynchronous notifications from a client to its consumer actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// Partitions were added to this consumer's assignment.
    Assigned(Vec<TopicPartition>),
    /// Partitions were taken away from this consumer's assignment.
    Revoked(Vec<TopicPartition>),
    /// The client stopped delivering records after a pause request.
    PauseConfirmed,
    /// The client could not apply a pause request and keeps delivering.
    PauseFailed {
        /// Why the pause failed.
        reason: String,
    },
    /// The client halted on its own (fatal broker error, poll task exit).
    Stopped {
        /// Why the client halted.
        reason: String,
    },
}

/// Sending half of a consumer's event channel.
///
/// Sends never block. Once the actor is gone, events are dropped.
#[derive(Debug, Clone)]
pub struct ClientEventSender {
    tx: mpsc::UnboundedSender<ClientEvent>,
}

impl ClientEventSender {
    /// Creates an event channel.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ClientEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Sends an event. Returns false if the consumer actor has exited.
    pub fn send(&self, event: ClientEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    /// Reports newly assigned partitions.
    pub fn assigned(&self, partitions: Vec<TopicPartition>) -> bool {
        self.send(ClientEvent::Assigned(partitions))
    }

    /// Reports revoked partitions.
    pub fn revoked(&self, partitions: Vec<TopicPartition>) -> bool {
        self.send(ClientEvent::Revoked(partitions))
    }

    /// Reports that a pause has taken effect.
    pub fn pause_confirmed(&self) -> bool {
        self.send(ClientEvent::PauseConfirmed)
    }

    /// Reports that a pause could not be applied.
    pub fn pause_failed(&self, reason: impl Into<String>) -> bool {
        self.send(ClientEvent::PauseFailed {
            reason: reason.into(),
        })
    }

    /// Reports that the client halted without being asked to.
    pub fn stopped(&self, reason: impl Into<String>) -> bool {
        self.send(ClientEvent::Stopped {
            reason: reason.into(),
        })
    }

    /// Returns true once the receiving actor has exited.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// One broker-client consumer instance.
///
/// Owned exclusively by a consumer actor, which calls these methods one at
/// a time and only for transitions its state machine has accepted.
#[async_trait]
pub trait ConsumerClient: Send {
    /// Joins the consumer group and begins polling.
    ///
    /// May be called again after `stop` to restart the consumer.
    async fn start(&mut self) -> ClientResult<()>;

    /// Asks the client to stop delivering records without leaving the group.
    ///
    /// The client sends [`ClientEvent::PauseConfirmed`] once quiescent,
    /// which may be before or after this method returns, or
    /// [`ClientEvent::PauseFailed`] if the pause cannot take effect.
    async fn pause(&mut self) -> ClientResult<()>;

    /// Reverses a pause.
    async fn resume(&mut self) -> ClientResult<()>;

    /// Leaves the consumer group and halts polling.
    async fn stop(&mut self) -> ClientResult<()>;
}

/// Creates broker clients for newly registered consumers.
pub trait ClientFactory: Send + Sync {
    /// Creates a client bound to `binding` that reports to `events`.
    ///
    /// Must not perform network I/O: it runs while the registry catalog is
    /// locked. Connecting happens in [`ConsumerClient::start`].
    ///
    /// # Errors
    /// Returns an error if the client cannot be configured.
    fn create(
        &self,
        binding: ClientBinding,
        events: ClientEventSender,
    ) -> ClientResult<Box<dyn ConsumerClient>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_sender_reports_closed_receiver() {
        let (events, rx) = ClientEventSender::channel();
        assert!(events.pause_confirmed());
        drop(rx);
        assert!(events.is_closed());
        assert!(!events.assigned(vec![TopicPartition::new("orders", 0)]));
    }

    #[tokio::test]
    async fn test_event_helpers() {
        let (events, mut rx) = ClientEventSender::channel();
        events.revoked(vec![TopicPartition::new("orders", 1)]);
        events.stopped("broker went away");

        assert_eq!(
            rx.recv().await,
            Some(ClientEvent::Revoked(vec![TopicPartition::new("orders", 1)]))
        );
        assert_eq!(
            rx.recv().await,
            Some(ClientEvent::Stopped {
                reason: "broker went away".to_string()
            })
        );
    }
}
