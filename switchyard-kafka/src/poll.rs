//! Per-consumer poll task.
//!
//! The task owns the `StreamConsumer` while the consumer is running. Control
//! signals arrive over a `watch` channel and are applied between polls, so a
//! pause takes effect at the next poll boundary and is confirmed from here.
//! Polling continues while paused: librdkafka services rebalance callbacks
//! from the poll call, and partitions assigned during a pause are paused
//! here once the context asks for it.

use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::error::KafkaResult;
use rdkafka::Message;
use switchyard_core::ListenerId;
use tokio::sync::watch;
use tracing::{debug, info, instrument, trace, warn};

use crate::context::ListenerContext;

/// The consumer type owned by a poll task.
pub type ListenerConsumer = StreamConsumer<ListenerContext>;

/// Desired delivery mode, set by the client and observed by the poll task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollControl {
    /// Deliver records.
    Run,
    /// Keep group membership but deliver nothing.
    Pause,
    /// Exit the task.
    Stop,
}

/// Polls until told to stop, the client goes away, or librdkafka reports a
/// fatal error. Returns the consumer so the caller can close it.
#[instrument(skip_all, fields(listener_id = %listener_id))]
pub async fn poll_loop(
    listener_id: ListenerId,
    consumer: ListenerConsumer,
    mut control_rx: watch::Receiver<PollControl>,
) -> ListenerConsumer {
    debug!("Poll task started");

    loop {
        tokio::select! {
            changed = control_rx.changed() => {
                if changed.is_err() {
                    debug!("Client dropped, exiting poll task");
                    break;
                }
                let control = *control_rx.borrow_and_update();
                match control {
                    PollControl::Stop => break,
                    PollControl::Pause => match set_paused(&consumer, true) {
                        Ok(()) => {
                            info!("Delivery paused");
                            consumer.context().events().pause_confirmed();
                        }
                        Err(e) => {
                            warn!(error = %e, "Failed to pause assignment");
                            consumer.context().set_paused(false);
                            consumer.context().events().pause_failed(e.to_string());
                        }
                    },
                    PollControl::Run => match set_paused(&consumer, false) {
                        Ok(()) => info!("Delivery resumed"),
                        Err(e) => warn!(error = %e, "Failed to resume assignment"),
                    },
                }
            }
            () = consumer.context().repause_requested() => {
                if !consumer.context().is_paused() {
                    continue;
                }
                match set_paused(&consumer, true) {
                    Ok(()) => debug!("Paused partitions assigned during pause"),
                    Err(e) => warn!(error = %e, "Failed to pause newly assigned partitions"),
                }
            }
            message = consumer.recv() => match message {
                Ok(message) => {
                    trace!(
                        topic = message.topic(),
                        partition = message.partition(),
                        offset = message.offset(),
                        "Record received"
                    );
                }
                Err(e) => {
                    if let Some((code, reason)) = consumer.client().fatal_error() {
                        warn!(error = %e, ?code, %reason, "Fatal consumer error, exiting poll task");
                        consumer
                            .context()
                            .events()
                            .stopped(format!("fatal consumer error ({code:?}): {reason}"));
                        break;
                    }
                    warn!(error = %e, "Poll failed");
                }
            },
        }
    }

    debug!("Poll task stopped");
    consumer
}

/// Pauses or resumes the whole current assignment.
fn set_paused(consumer: &ListenerConsumer, paused: bool) -> KafkaResult<()> {
    consumer.context().set_paused(paused);
    let assignment = consumer.assignment()?;
    if assignment.count() == 0 {
        return Ok(());
    }
    if paused {
        consumer.pause(&assignment)
    } else {
        consumer.resume(&assignment)
    }
}
