//! Switchyard Kafka - rdkafka adapter for dynamic consumers.
//!
//! Implements the `switchyard-consumer` client interface on top of
//! librdkafka. Each started consumer gets a fresh `StreamConsumer` and a
//! poll task that owns it:
//!
//! ```text
//! KafkaConsumerClient ──PollControl (watch)──► poll task ──► StreamConsumer
//!         │                                       │
//!         └──────────── ClientEvent ◄─────────────┴── ListenerContext (rebalance)
//! ```
//!
//! Pause and resume are signals applied at the next poll boundary. Stop
//! waits for the task (bounded by a timeout), unsubscribes and closes the
//! consumer on a blocking thread.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod client;
mod config;
mod context;
mod poll;

pub use client::{KafkaClientFactory, KafkaConsumerClient};
pub use config::{KafkaClientConfig, OffsetReset, ParseOffsetResetError};
pub use context::{partitions_from_list, ListenerContext};
pub use poll::PollControl;
