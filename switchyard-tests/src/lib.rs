//! Switchyard Tests - Cross-crate tests for the consumer registry.
//!
//! Unit tests live inline in each crate under `#[cfg(test)]`. This crate
//! holds tests that need more than one crate at a time:
//!
//! - `registry_tests`: membership properties of the catalog
//! - `state_machine_tests`: the transition table driven through real actors
//! - `concurrency_tests`: contended control operations on one consumer
//! - `scenario_tests`: end-to-end flows through the control façade
//!
//! **Support Modules**:
//! - `fixtures`: in-memory registries and bounded waits
//!
//! ## Naming Conventions
//!
//! - `test_<component>_<scenario>`

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod fixtures;

#[cfg(test)]
mod scenario_tests;
