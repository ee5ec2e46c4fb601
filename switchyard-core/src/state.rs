//! Consumer lifecycle state machine.
//!
//! This is a pure state machine: it takes the current state and a control
//! operation and produces either the next state or the guard that rejected
//! the operation. It does not perform I/O. The consumer actor evaluates it
//! and drives the broker client only after a transition is accepted.
//!
//! # Transition Table
//!
//! | From | Operation | To |
//! |------|-----------|----|
//! | `Created` / `Stopped` | `Start` | `Running` |
//! | `Running` | `Pause` | `PauseRequested` (then `Paused` once the client confirms) |
//! | `Paused` | `Resume` | `Running` |
//! | `Running` / `Paused` / `PauseRequested` | `Stop` | `Stopped` |
//!
//! Every other (state, operation) pair is rejected with a [`GuardViolation`]
//! and leaves the state unchanged.

use std::fmt;

use crate::error::Error;
use crate::types::ListenerId;

/// Lifecycle state of a consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConsumerState {
    /// Registered but never started.
    #[default]
    Created,
    /// Polling and delivering records.
    Running,
    /// Pause was issued but the client has not yet confirmed quiescence.
    PauseRequested,
    /// Client confirmed it stopped delivering records. Group membership is kept.
    Paused,
    /// Left the consumer group and halted polling.
    Stopped,
}

impl ConsumerState {
    /// All states, in declaration order.
    pub const ALL: [Self; 5] = [
        Self::Created,
        Self::Running,
        Self::PauseRequested,
        Self::Paused,
        Self::Stopped,
    ];

    /// Returns true if the consumer is a member of its group and polling
    /// (`Running`, `PauseRequested` or `Paused`).
    #[must_use]
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Running | Self::PauseRequested | Self::Paused)
    }

    /// Returns true once the client has confirmed the pause.
    #[must_use]
    pub const fn is_paused(self) -> bool {
        matches!(self, Self::Paused)
    }

    /// Returns true while a pause is in flight.
    #[must_use]
    pub const fn is_pause_requested(self) -> bool {
        matches!(self, Self::PauseRequested)
    }

    /// Returns true if partition assignments are meaningful in this state.
    #[must_use]
    pub const fn tracks_assignment(self) -> bool {
        self.is_running()
    }

    /// Stable lowercase name, used in logs and API payloads.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::PauseRequested => "pause-requested",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
        }
    }

    /// Evaluates the guard for `op` and returns the next state.
    ///
    /// # Errors
    /// Returns the [`GuardViolation`] for every pair outside the transition table.
    pub const fn transition(self, op: ControlOp) -> Result<Self, GuardViolation> {
        match (op, self) {
            (ControlOp::Start, Self::Created | Self::Stopped) => Ok(Self::Running),
            (ControlOp::Start, Self::Running | Self::PauseRequested | Self::Paused) => {
                Err(GuardViolation::AlreadyRunning)
            }

            (ControlOp::Pause, Self::Running) => Ok(Self::PauseRequested),
            (ControlOp::Pause, Self::PauseRequested) => Err(GuardViolation::PauseAlreadyRequested),
            (ControlOp::Pause, Self::Paused) => Err(GuardViolation::AlreadyPaused),
            (ControlOp::Pause, Self::Created | Self::Stopped) => Err(GuardViolation::NotRunning),

            (ControlOp::Resume, Self::Paused) => Ok(Self::Running),
            (ControlOp::Resume, Self::Running | Self::PauseRequested) => {
                Err(GuardViolation::NotPaused)
            }
            (ControlOp::Resume, Self::Created | Self::Stopped) => Err(GuardViolation::NotRunning),

            (ControlOp::Stop, Self::Running | Self::PauseRequested | Self::Paused) => {
                Ok(Self::Stopped)
            }
            (ControlOp::Stop, Self::Created | Self::Stopped) => Err(GuardViolation::AlreadyStopped),
        }
    }

    /// Applies the client's pause confirmation.
    ///
    /// Only `PauseRequested` moves (to `Paused`). A confirmation that arrives
    /// after a stop or resume is stale and leaves the state unchanged.
    #[must_use]
    pub const fn confirm_pause(self) -> Self {
        match self {
            Self::PauseRequested => Self::Paused,
            other => other,
        }
    }

    /// Applies the client's report that a requested pause could not be
    /// applied.
    ///
    /// `PauseRequested` falls back to `Running` so the pause can be retried.
    /// Every other state is left unchanged.
    #[must_use]
    pub const fn abandon_pause(self) -> Self {
        match self {
            Self::PauseRequested => Self::Running,
            other => other,
        }
    }
}

impl fmt::Display for ConsumerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Control operations accepted by a consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlOp {
    /// Begin polling (join the group).
    Start,
    /// Stop delivering records without leaving the group.
    Pause,
    /// Reverse a pause.
    Resume,
    /// Leave the group and halt polling.
    Stop,
}

impl ControlOp {
    /// All operations, in declaration order.
    pub const ALL: [Self; 4] = [Self::Start, Self::Pause, Self::Resume, Self::Stop];

    /// Lowercase operation name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Stop => "stop",
        }
    }
}

impl fmt::Display for ControlOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reason a control operation was rejected by the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GuardViolation {
    /// `start` on a running consumer.
    AlreadyRunning,
    /// `stop` on a consumer that is not running.
    AlreadyStopped,
    /// `pause` on a paused consumer.
    AlreadyPaused,
    /// `pause` while a previous pause is still in flight.
    PauseAlreadyRequested,
    /// `pause` or `resume` on a consumer that is not running.
    NotRunning,
    /// `resume` on a consumer that is not paused.
    NotPaused,
}

impl GuardViolation {
    /// Attaches the listener and observed state, producing the public error.
    #[must_use]
    pub fn into_error(self, listener_id: ListenerId, state: ConsumerState) -> Error {
        match self {
            Self::AlreadyRunning => Error::AlreadyRunning { listener_id, state },
            Self::AlreadyStopped => Error::AlreadyStopped { listener_id, state },
            Self::AlreadyPaused => Error::AlreadyPaused { listener_id, state },
            Self::PauseAlreadyRequested => Error::PauseAlreadyRequested { listener_id, state },
            Self::NotRunning => Error::NotRunning { listener_id, state },
            Self::NotPaused => Error::NotPaused { listener_id, state },
        }
    }
}
