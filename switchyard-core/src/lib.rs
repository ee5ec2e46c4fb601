//! Switchyard Core - Strongly-typed identifiers and the consumer lifecycle.
//!
//! This crate holds everything about a dynamic consumer that can be decided
//! without I/O: the identifiers, the declared `ConsumerSpec`, the explicit
//! resource `Limits`, the lifecycle state machine and the error taxonomy.
//! Broker clients, background tasks and transports live in other crates.
//!
//! # Design Principles (TigerStyle)
//!
//! - **Strongly-typed IDs**: A `ListenerId` can't be passed where a `GroupId` is expected
//! - **Explicit limits**: The catalog and every name have a bounded maximum
//! - **Explicit transitions**: Every lifecycle edge is in one table, illegal edges are errors
//! - **No unsafe code**: Safety > Performance

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod error;
mod limits;
mod spec;
mod state;
mod types;

pub use error::{Error, ErrorKind, Result};
pub use limits::Limits;
pub use spec::{validate_listener_id, ConsumerSpec};
pub use state::{ConsumerState, ControlOp, GuardViolation};
pub use types::{GroupId, ListenerId, TopicPartition};
