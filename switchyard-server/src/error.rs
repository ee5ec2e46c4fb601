//! Server error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use switchyard_core::ErrorKind;
use tracing::{debug, warn};

/// Server error type.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// A registry or consumer operation failed.
    #[error(transparent)]
    Consumer(#[from] switchyard_core::Error),

    /// The server configuration is unusable.
    #[error("invalid configuration: {message}")]
    Config {
        /// Error message.
        message: String,
    },

    /// I/O error.
    #[error("I/O error during {operation}: {source}")]
    Io {
        /// The operation that failed.
        operation: &'static str,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl ServerError {
    /// Maps the error to an HTTP status.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Consumer(e) => match e.kind() {
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::AlreadyRunning
                | ErrorKind::AlreadyStopped
                | ErrorKind::AlreadyPaused
                | ErrorKind::PauseAlreadyRequested
                | ErrorKind::NotRunning
                | ErrorKind::NotPaused
                | ErrorKind::DuplicateListenerId
                | ErrorKind::StillRunning => StatusCode::CONFLICT,
                ErrorKind::InvalidSpec => StatusCode::BAD_REQUEST,
                ErrorKind::CapacityExceeded => StatusCode::TOO_MANY_REQUESTS,
                ErrorKind::Client => StatusCode::BAD_GATEWAY,
                ErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            },
            Self::Config { .. } | Self::Io { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable error code for response bodies.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Consumer(e) => e.kind().as_str(),
            Self::Config { .. } => "CONFIG_ERROR",
            Self::Io { .. } => "IO_ERROR",
        }
    }

    /// Builds the JSON body describing this error.
    #[must_use]
    pub fn body(&self) -> ErrorBody {
        let (listener_id, state) = match self {
            Self::Consumer(e) => (
                e.listener_id().map(ToString::to_string),
                e.state().map(|s| s.as_str().to_string()),
            ),
            Self::Config { .. } | Self::Io { .. } => (None, None),
        };
        ErrorBody {
            error: self.error_code().to_string(),
            message: self.to_string(),
            listener_id,
            state,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            warn!(status = status.as_u16(), error = %self, "Request failed");
        } else {
            debug!(status = status.as_u16(), error = %self, "Request rejected");
        }
        (status, Json(self.body())).into_response()
    }
}

/// JSON error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    /// Error code, e.g. `NOT_PAUSED`.
    pub error: String,
    /// Human-readable description.
    pub message: String,
    /// The listener the error refers to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listener_id: Option<String>,
    /// The consumer state observed when the error was raised.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use switchyard_core::{ConsumerState, Error, ListenerId};

    #[test]
    fn test_status_codes() {
        let cases = [
            (
                Error::NotFound {
                    listener_id: ListenerId::new("a"),
                },
                StatusCode::NOT_FOUND,
            ),
            (
                Error::NotPaused {
                    listener_id: ListenerId::new("a"),
                    state: ConsumerState::Running,
                },
                StatusCode::CONFLICT,
            ),
            (Error::invalid_spec("topic", "empty"), StatusCode::BAD_REQUEST),
            (
                Error::CapacityExceeded {
                    limit: "max_consumers",
                    max: 1,
                },
                StatusCode::TOO_MANY_REQUESTS,
            ),
            (
                Error::Client {
                    listener_id: ListenerId::new("a"),
                    operation: "start",
                    message: "broker down".to_string(),
                },
                StatusCode::BAD_GATEWAY,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ServerError::from(err).status_code(), status);
        }
    }

    #[test]
    fn test_error_body() {
        let err = ServerError::from(Error::AlreadyPaused {
            listener_id: ListenerId::new("l-1"),
            state: ConsumerState::Paused,
        });
        let body = err.body();
        assert_eq!(body.error, "ALREADY_PAUSED");
        assert_eq!(body.listener_id.as_deref(), Some("l-1"));
        assert_eq!(body.state.as_deref(), Some("paused"));

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["listenerId"], "l-1");

        let err = ServerError::Config {
            message: "bad".to_string(),
        };
        let json = serde_json::to_value(err.body()).unwrap();
        assert!(json.get("listenerId").is_none());
    }
}
