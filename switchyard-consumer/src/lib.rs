//! Switchyard Consumer - Dynamic consumer registry and per-consumer actors.
//!
//! This crate owns the set of live consumers. Each consumer runs as an actor
//! that serializes its own control operations against the lifecycle state
//! machine in `switchyard-core` and drives a broker client through the
//! [`ConsumerClient`] capability interface.
//!
//! # Components
//!
//! - [`ConsumerRegistry`]: concurrency-safe catalog of listener ID to handle
//! - [`ConsumerHandle`]: control operations and non-blocking state observers
//! - [`ConsumerClient`] / [`ClientFactory`]: what a broker client must provide
//! - [`MemoryClientFactory`]: in-memory client with fault injection
//!
//! # `TigerStyle` Principles
//!
//! - Bounded command queues and a bounded catalog
//! - No lock held across a broker call
//! - No unsafe code

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod assignment;
mod client;
mod handle;
mod memory;
mod registry;

pub use assignment::Assignment;
pub use client::{
    ClientBinding, ClientError, ClientEvent, ClientEventSender, ClientFactory, ClientResult,
    ConsumerClient,
};
pub use handle::{spawn_consumer, ActorConfig, ConsumerHandle, ConsumerSnapshot};
pub use memory::{FaultConfig, MemoryClientConfig, MemoryClientFactory, MemoryProbe, PauseMode};
pub use registry::{ConsumerRegistry, GroupIdStrategy, RegistryConfig};
