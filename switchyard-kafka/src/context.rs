//! librdkafka context: rebalance callbacks and assignment reporting.

use std::sync::atomic::{AtomicBool, Ordering};

use rdkafka::consumer::{ConsumerContext, Rebalance};
use rdkafka::{ClientContext, TopicPartitionList};
use switchyard_consumer::ClientEventSender;
use switchyard_core::{ListenerId, TopicPartition};
use tokio::sync::Notify;
use tracing::{debug, warn};

/// Projects a librdkafka partition list to public topic/partition pairs.
#[must_use]
pub fn partitions_from_list(list: &TopicPartitionList) -> Vec<TopicPartition> {
    let mut partitions: Vec<TopicPartition> = list
        .elements()
        .iter()
        .map(|elem| TopicPartition::new(elem.topic(), elem.partition()))
        .collect();
    partitions.sort();
    partitions
}

/// Per-consumer librdkafka context.
///
/// Forwards rebalances to the consumer actor. The rebalance callback has no
/// access to the consumer, so an assignment received while paused is handed
/// to the poll task, which pauses it at its next turn.
pub struct ListenerContext {
    listener_id: ListenerId,
    events: ClientEventSender,
    paused: AtomicBool,
    repause: Notify,
}

impl ListenerContext {
    /// Creates a context reporting to `events`.
    #[must_use]
    pub fn new(listener_id: ListenerId, events: ClientEventSender) -> Self {
        Self {
            listener_id,
            events,
            paused: AtomicBool::new(false),
            repause: Notify::new(),
        }
    }

    /// Records whether delivery is paused.
    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Release);
    }

    /// Returns true while delivery is paused.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Completes once partitions were assigned while delivery was paused.
    ///
    /// A request made while nobody waits is kept until the next call.
    pub async fn repause_requested(&self) {
        self.repause.notified().await;
    }

    /// Returns the event sender of the owning consumer.
    #[must_use]
    pub const fn events(&self) -> &ClientEventSender {
        &self.events
    }
}

impl ClientContext for ListenerContext {}

impl ConsumerContext for ListenerContext {
    fn post_rebalance(&self, rebalance: &Rebalance<'_>) {
        match rebalance {
            Rebalance::Assign(list) => {
                if self.is_paused() {
                    debug!(listener_id = %self.listener_id, "Assigned while paused, requesting re-pause");
                    self.repause.notify_one();
                }
                let partitions = partitions_from_list(list);
                debug!(listener_id = %self.listener_id, count = partitions.len(), "Rebalance assigned partitions");
                self.events.assigned(partitions);
            }
            Rebalance::Revoke(list) => {
                let partitions = partitions_from_list(list);
                debug!(listener_id = %self.listener_id, count = partitions.len(), "Rebalance revoked partitions");
                self.events.revoked(partitions);
            }
            Rebalance::Error(e) => {
                warn!(listener_id = %self.listener_id, error = %e, "Rebalance failed");
            }
        }
    }
}
