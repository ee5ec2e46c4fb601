//! Error types for Switchyard consumer operations.
//!
//! Following `TigerStyle`: all errors must be handled explicitly.
//! Every failure is detected locally and surfaced to the caller as a typed
//! error carrying enough context (listener, observed state) to diagnose it
//! without inspecting server internals. Nothing is retried internally.

use crate::state::ConsumerState;
use crate::types::ListenerId;

/// The result type for Switchyard operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Switchyard operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The listener ID is not registered.
    #[error("no such consumer: {listener_id}")]
    NotFound {
        /// The unknown listener.
        listener_id: ListenerId,
    },

    /// `start` on a consumer that is already running.
    #[error("consumer is already running: {listener_id} (state: {state})")]
    AlreadyRunning {
        /// The listener.
        listener_id: ListenerId,
        /// State observed when the guard was evaluated.
        state: ConsumerState,
    },

    /// `stop` on a consumer that is not running.
    #[error("consumer is already stopped: {listener_id} (state: {state})")]
    AlreadyStopped {
        /// The listener.
        listener_id: ListenerId,
        /// State observed when the guard was evaluated.
        state: ConsumerState,
    },

    /// `pause` on a consumer that is already paused.
    #[error("consumer is already paused: {listener_id} (state: {state})")]
    AlreadyPaused {
        /// The listener.
        listener_id: ListenerId,
        /// State observed when the guard was evaluated.
        state: ConsumerState,
    },

    /// `pause` while an earlier pause has not landed yet.
    #[error("consumer pause is already requested: {listener_id} (state: {state})")]
    PauseAlreadyRequested {
        /// The listener.
        listener_id: ListenerId,
        /// State observed when the guard was evaluated.
        state: ConsumerState,
    },

    /// `pause` or `resume` on a consumer that is not running.
    #[error("consumer is not running: {listener_id} (state: {state})")]
    NotRunning {
        /// The listener.
        listener_id: ListenerId,
        /// State observed when the guard was evaluated.
        state: ConsumerState,
    },

    /// `resume` on a consumer that is not paused.
    #[error("consumer is not paused: {listener_id} (state: {state})")]
    NotPaused {
        /// The listener.
        listener_id: ListenerId,
        /// State observed when the guard was evaluated.
        state: ConsumerState,
    },

    /// A consumer with this listener ID is already registered.
    #[error("listener id already registered: {listener_id}")]
    DuplicateListenerId {
        /// The colliding listener.
        listener_id: ListenerId,
    },

    /// Malformed registration input.
    #[error("invalid consumer spec '{field}': {reason}")]
    InvalidSpec {
        /// The offending field.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },

    /// `unregister` on a consumer that has not been stopped.
    #[error("consumer must be stopped before it is removed: {listener_id} (state: {state})")]
    StillRunning {
        /// The listener.
        listener_id: ListenerId,
        /// State observed when the guard was evaluated.
        state: ConsumerState,
    },

    /// A resource limit was exceeded.
    #[error("limit exceeded: {limit} (max={max})")]
    CapacityExceeded {
        /// Which limit was exceeded.
        limit: &'static str,
        /// The maximum allowed value.
        max: u64,
    },

    /// The broker client failed to carry out an accepted operation.
    ///
    /// The state is left as it was before the operation.
    #[error("broker client failed to {operation} consumer {listener_id}: {message}")]
    Client {
        /// The listener.
        listener_id: ListenerId,
        /// The operation that failed.
        operation: &'static str,
        /// Client-provided description.
        message: String,
    },

    /// The consumer's background task is gone.
    #[error("consumer is unavailable: {listener_id}")]
    Unavailable {
        /// The listener.
        listener_id: ListenerId,
    },
}

/// Coarse error classification, used by transports to choose a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`Error::NotFound`].
    NotFound,
    /// See [`Error::AlreadyRunning`].
    AlreadyRunning,
    /// See [`Error::AlreadyStopped`].
    AlreadyStopped,
    /// See [`Error::AlreadyPaused`].
    AlreadyPaused,
    /// See [`Error::PauseAlreadyRequested`].
    PauseAlreadyRequested,
    /// See [`Error::NotRunning`].
    NotRunning,
    /// See [`Error::NotPaused`].
    NotPaused,
    /// See [`Error::DuplicateListenerId`].
    DuplicateListenerId,
    /// See [`Error::InvalidSpec`].
    InvalidSpec,
    /// See [`Error::StillRunning`].
    StillRunning,
    /// See [`Error::CapacityExceeded`].
    CapacityExceeded,
    /// See [`Error::Client`].
    Client,
    /// See [`Error::Unavailable`].
    Unavailable,
}

impl ErrorKind {
    /// Returns true for state-machine guard violations.
    #[must_use]
    pub const fn is_guard_violation(self) -> bool {
        matches!(
            self,
            Self::AlreadyRunning
                | Self::AlreadyStopped
                | Self::AlreadyPaused
                | Self::PauseAlreadyRequested
                | Self::NotRunning
                | Self::NotPaused
        )
    }

    /// Stable `UPPER_SNAKE` name for API payloads.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "NOT_FOUND",
            Self::AlreadyRunning => "ALREADY_RUNNING",
            Self::AlreadyStopped => "ALREADY_STOPPED",
            Self::AlreadyPaused => "ALREADY_PAUSED",
            Self::PauseAlreadyRequested => "PAUSE_ALREADY_REQUESTED",
            Self::NotRunning => "NOT_RUNNING",
            Self::NotPaused => "NOT_PAUSED",
            Self::DuplicateListenerId => "DUPLICATE_LISTENER_ID",
            Self::InvalidSpec => "INVALID_SPEC",
            Self::StillRunning => "STILL_RUNNING",
            Self::CapacityExceeded => "CAPACITY_EXCEEDED",
            Self::Client => "CLIENT_ERROR",
            Self::Unavailable => "UNAVAILABLE",
        }
    }
}

impl Error {
    /// Returns the error classification.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::AlreadyRunning { .. } => ErrorKind::AlreadyRunning,
            Self::AlreadyStopped { .. } => ErrorKind::AlreadyStopped,
            Self::AlreadyPaused { .. } => ErrorKind::AlreadyPaused,
            Self::PauseAlreadyRequested { .. } => ErrorKind::PauseAlreadyRequested,
            Self::NotRunning { .. } => ErrorKind::NotRunning,
            Self::NotPaused { .. } => ErrorKind::NotPaused,
            Self::DuplicateListenerId { .. } => ErrorKind::DuplicateListenerId,
            Self::InvalidSpec { .. } => ErrorKind::InvalidSpec,
            Self::StillRunning { .. } => ErrorKind::StillRunning,
            Self::CapacityExceeded { .. } => ErrorKind::CapacityExceeded,
            Self::Client { .. } => ErrorKind::Client,
            Self::Unavailable { .. } => ErrorKind::Unavailable,
        }
    }

    /// Returns the listener the error refers to, if any.
    #[must_use]
    pub const fn listener_id(&self) -> Option<&ListenerId> {
        match self {
            Self::NotFound { listener_id }
            | Self::AlreadyRunning { listener_id, .. }
            | Self::AlreadyStopped { listener_id, .. }
            | Self::AlreadyPaused { listener_id, .. }
            | Self::PauseAlreadyRequested { listener_id, .. }
            | Self::NotRunning { listener_id, .. }
            | Self::NotPaused { listener_id, .. }
            | Self::DuplicateListenerId { listener_id }
            | Self::StillRunning { listener_id, .. }
            | Self::Client { listener_id, .. }
            | Self::Unavailable { listener_id } => Some(listener_id),
            Self::InvalidSpec { .. } | Self::CapacityExceeded { .. } => None,
        }
    }

    /// Returns the consumer state observed when the error was raised, if any.
    #[must_use]
    pub const fn state(&self) -> Option<ConsumerState> {
        match self {
            Self::AlreadyRunning { state, .. }
            | Self::AlreadyStopped { state, .. }
            | Self::AlreadyPaused { state, .. }
            | Self::PauseAlreadyRequested { state, .. }
            | Self::NotRunning { state, .. }
            | Self::NotPaused { state, .. }
            | Self::StillRunning { state, .. } => Some(*state),
            _ => None,
        }
    }

    /// Creates an `InvalidSpec` error.
    pub fn invalid_spec(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidSpec {
            field,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::NotRunning {
            listener_id: ListenerId::new("abc"),
            state: ConsumerState::Created,
        };
        assert_eq!(err.to_string(), "consumer is not running: abc (state: created)");

        let err = Error::invalid_spec("topic", "must not be empty");
        assert!(err.to_string().contains("topic"));
    }

    #[test]
    fn test_error_kind_and_context() {
        let err = Error::PauseAlreadyRequested {
            listener_id: ListenerId::new("abc"),
            state: ConsumerState::PauseRequested,
        };
        assert_eq!(err.kind(), ErrorKind::PauseAlreadyRequested);
        assert!(err.kind().is_guard_violation());
        assert_eq!(err.listener_id().map(ListenerId::as_str), Some("abc"));
        assert_eq!(err.state(), Some(ConsumerState::PauseRequested));

        let err = Error::CapacityExceeded {
            limit: "max_consumers",
            max: 4,
        };
        assert!(!err.kind().is_guard_violation());
        assert!(err.listener_id().is_none());
        assert!(err.state().is_none());
    }
}
