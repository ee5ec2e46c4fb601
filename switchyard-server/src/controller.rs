//! Control façade over the consumer registry.
//!
//! Every externally reachable operation is a method here; the HTTP layer
//! only decodes requests and renders results. Bulk operations attempt every
//! target concurrently and report per-target outcomes instead of failing
//! fast.

use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use switchyard_consumer::{ConsumerHandle, ConsumerRegistry};
use switchyard_core::{ConsumerSpec, Error, ListenerId, TopicPartition};
use tracing::{info, instrument, warn};

use crate::error::{ServerError, ServerResult};

/// Body of a create request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateConsumerRequest {
    /// Topic to consume.
    #[serde(default)]
    pub topic: String,
    /// Start the consumer as part of registration.
    #[serde(default)]
    pub start_immediately: bool,
}

/// One assigned partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentView {
    /// Topic name.
    pub topic: String,
    /// Partition number.
    pub partition: i32,
}

impl From<TopicPartition> for AssignmentView {
    fn from(tp: TopicPartition) -> Self {
        Self {
            topic: tp.topic,
            partition: tp.partition,
        }
    }
}

/// Public projection of a consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumerView {
    /// Listener ID.
    pub listener_id: String,
    /// Consumer group.
    pub group_id: String,
    /// Subscribed topic.
    pub topic: String,
    /// Lifecycle state.
    pub state: String,
    /// True while the consumer is running (including paused).
    pub active: bool,
    /// Current assignment; `null` unless the consumer is running.
    pub assignments: Option<Vec<AssignmentView>>,
}

impl ConsumerView {
    /// Renders a handle from its latest snapshot.
    #[must_use]
    pub fn from_handle(handle: &ConsumerHandle) -> Self {
        let snapshot = handle.snapshot();
        Self {
            listener_id: handle.listener_id().to_string(),
            group_id: handle.group_id().to_string(),
            topic: handle.topic().to_string(),
            state: snapshot.state.as_str().to_string(),
            active: snapshot.state.is_running(),
            assignments: snapshot
                .assignment
                .map(|partitions| partitions.into_iter().map(AssignmentView::from).collect()),
        }
    }
}

/// One failed target of a bulk operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkFailure {
    /// Listener ID of the target.
    pub listener_id: String,
    /// Error code.
    pub error: String,
    /// Error description.
    pub message: String,
}

/// Outcome of a bulk operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkReport {
    /// Number of targets attempted.
    pub attempted: usize,
    /// Listener IDs that succeeded.
    pub succeeded: Vec<String>,
    /// Targets that failed.
    pub failed: Vec<BulkFailure>,
}

impl BulkReport {
    fn collect(operation: &'static str, outcomes: Vec<(ListenerId, ServerResult<()>)>) -> Self {
        let mut report = Self {
            attempted: outcomes.len(),
            ..Self::default()
        };
        for (listener_id, outcome) in outcomes {
            match outcome {
                Ok(()) => report.succeeded.push(listener_id.into_inner()),
                Err(e) => {
                    warn!(listener_id = %listener_id, operation, error = %e, "Bulk target failed");
                    report.failed.push(BulkFailure {
                        listener_id: listener_id.into_inner(),
                        error: e.error_code().to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }
        report
    }

    /// Returns true if every target succeeded.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Control façade.
#[derive(Debug, Clone)]
pub struct ConsumerController {
    registry: Arc<ConsumerRegistry>,
}

impl ConsumerController {
    /// Creates a controller over `registry`.
    #[must_use]
    pub const fn new(registry: Arc<ConsumerRegistry>) -> Self {
        Self { registry }
    }

    /// Registers a consumer under a freshly generated listener ID.
    ///
    /// # Errors
    /// `InvalidSpec`, `CapacityExceeded`, or the start error when
    /// `startImmediately` is set.
    #[instrument(skip(self, request), fields(topic = %request.topic))]
    pub async fn create(&self, request: CreateConsumerRequest) -> ServerResult<ConsumerView> {
        let spec = ConsumerSpec::new(request.topic).with_start_immediately(request.start_immediately);
        let handle = self.registry.register(ListenerId::generate(), spec).await?;
        Ok(ConsumerView::from_handle(&handle))
    }

    /// Lists every registered consumer.
    pub async fn list(&self) -> Vec<ConsumerView> {
        self.registry
            .list()
            .await
            .iter()
            .map(ConsumerView::from_handle)
            .collect()
    }

    /// Returns one consumer.
    ///
    /// # Errors
    /// `NotFound` if unknown.
    pub async fn get(&self, listener_id: &ListenerId) -> ServerResult<ConsumerView> {
        let handle = self.registry.require(listener_id).await?;
        Ok(ConsumerView::from_handle(&handle))
    }

    /// Starts a consumer.
    ///
    /// # Errors
    /// `NotFound`, `AlreadyRunning` or a client failure.
    pub async fn activate(&self, listener_id: &ListenerId) -> ServerResult<ConsumerView> {
        let handle = self.registry.require(listener_id).await?;
        handle.start().await?;
        Ok(ConsumerView::from_handle(&handle))
    }

    /// Requests a pause.
    ///
    /// # Errors
    /// `NotFound` or a pause guard violation.
    pub async fn pause(&self, listener_id: &ListenerId) -> ServerResult<ConsumerView> {
        let handle = self.registry.require(listener_id).await?;
        handle.pause().await?;
        Ok(ConsumerView::from_handle(&handle))
    }

    /// Resumes a paused consumer.
    ///
    /// # Errors
    /// `NotFound` or a resume guard violation.
    pub async fn resume(&self, listener_id: &ListenerId) -> ServerResult<ConsumerView> {
        let handle = self.registry.require(listener_id).await?;
        handle.resume().await?;
        Ok(ConsumerView::from_handle(&handle))
    }

    /// Stops a consumer.
    ///
    /// # Errors
    /// `NotFound`, `AlreadyStopped` or a client failure.
    pub async fn stop(&self, listener_id: &ListenerId) -> ServerResult<ConsumerView> {
        let handle = self.registry.require(listener_id).await?;
        handle.stop().await?;
        Ok(ConsumerView::from_handle(&handle))
    }

    /// Stops every listed consumer.
    #[instrument(skip(self))]
    pub async fn stop_all(&self) -> BulkReport {
        let handles = self.registry.list().await;
        let stops = handles.into_iter().map(|handle| async move {
            let outcome = handle.stop().await.map(|_| ()).map_err(ServerError::from);
            (handle.listener_id().clone(), outcome)
        });
        let report = BulkReport::collect("stop", join_all(stops).await);
        info!(
            attempted = report.attempted,
            failed = report.failed.len(),
            "Stop-all finished"
        );
        report
    }

    /// Stops (if needed) and unregisters a consumer.
    ///
    /// # Errors
    /// `NotFound`, a stop failure other than `AlreadyStopped`, or
    /// `StillRunning` if another caller restarted it in between.
    #[instrument(skip(self), fields(listener_id = %listener_id))]
    pub async fn delete(&self, listener_id: &ListenerId) -> ServerResult<()> {
        let handle = self.registry.require(listener_id).await?;
        match handle.stop().await {
            Ok(_) | Err(Error::AlreadyStopped { .. }) => {}
            Err(e) => return Err(e.into()),
        }
        self.registry.unregister(listener_id).await?;
        Ok(())
    }

    /// Deletes every listed consumer.
    #[instrument(skip(self))]
    pub async fn delete_all(&self) -> BulkReport {
        let handles = self.registry.list().await;
        let deletes = handles.iter().map(|handle| async move {
            let listener_id = handle.listener_id().clone();
            let outcome = self.delete(&listener_id).await;
            (listener_id, outcome)
        });
        let report = BulkReport::collect("delete", join_all(deletes).await);
        info!(
            attempted = report.attempted,
            failed = report.failed.len(),
            "Delete-all finished"
        );
        report
    }
}
