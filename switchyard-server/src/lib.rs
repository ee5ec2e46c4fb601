//! Switchyard server.
//!
//! This crate exposes the consumer registry over HTTP/JSON: a control façade
//! that maps requests onto registry and consumer operations, an axum router,
//! and the `serve` loop used by the binary.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod api;
mod config;
mod controller;
mod error;

use std::future::Future;

use tokio::net::TcpListener;
use tracing::info;

pub use api::router;
pub use config::{Backend, ServerConfig};
pub use controller::{
    AssignmentView, BulkFailure, BulkReport, ConsumerController, ConsumerView,
    CreateConsumerRequest,
};
pub use error::{ErrorBody, ServerError, ServerResult};

/// Serves the control API until `shutdown` resolves, then drains the registry.
///
/// # Errors
/// Returns an error if the configuration is invalid or the listener fails.
pub async fn serve(
    config: ServerConfig,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> ServerResult<()> {
    let registry = config.build_registry()?;
    let controller = ConsumerController::new(registry.clone());

    let listener = TcpListener::bind(config.listen_addr)
        .await
        .map_err(|source| ServerError::Io {
            operation: "bind",
            source,
        })?;
    info!(addr = %config.listen_addr, "Switchyard listening");

    let served = axum::serve(listener, router(controller))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|source| ServerError::Io {
            operation: "serve",
            source,
        });

    let drained = registry.shutdown().await;
    info!(drained, "Switchyard stopped");
    served
}
