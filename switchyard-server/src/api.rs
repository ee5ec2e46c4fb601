//! HTTP routes for consumer control.
//!
//! ## Endpoints
//!
//! - `POST   /consumers`              - Register a consumer
//! - `GET    /consumers`              - List consumers
//! - `GET    /consumers/:id`          - Get one consumer
//! - `PUT    /consumers/:id/activate` - Start a consumer
//! - `PUT    /consumers/:id/pause`    - Pause a consumer
//! - `PUT    /consumers/:id/resume`   - Resume a consumer
//! - `PUT    /consumers/:id/stop`     - Stop a consumer
//! - `PUT    /consumers/stop`         - Stop every consumer
//! - `DELETE /consumers/:id`          - Stop and remove a consumer
//! - `DELETE /consumers`              - Stop and remove every consumer

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};
use switchyard_core::ListenerId;

use crate::controller::{BulkReport, ConsumerController, ConsumerView, CreateConsumerRequest};
use crate::error::ServerResult;

/// Builds the consumer control router.
pub fn router(controller: ConsumerController) -> Router {
    Router::new()
        .route(
            "/consumers",
            get(list_consumers)
                .post(create_consumer)
                .delete(delete_all_consumers),
        )
        .route("/consumers/stop", put(stop_all_consumers))
        .route("/consumers/:id", get(get_consumer).delete(delete_consumer))
        .route("/consumers/:id/activate", put(activate_consumer))
        .route("/consumers/:id/pause", put(pause_consumer))
        .route("/consumers/:id/resume", put(resume_consumer))
        .route("/consumers/:id/stop", put(stop_consumer))
        .with_state(controller)
}

async fn create_consumer(
    State(controller): State<ConsumerController>,
    Json(request): Json<CreateConsumerRequest>,
) -> ServerResult<(StatusCode, Json<ConsumerView>)> {
    let view = controller.create(request).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

async fn list_consumers(State(controller): State<ConsumerController>) -> Json<Vec<ConsumerView>> {
    Json(controller.list().await)
}

async fn get_consumer(
    State(controller): State<ConsumerController>,
    Path(id): Path<String>,
) -> ServerResult<Json<ConsumerView>> {
    controller.get(&ListenerId::new(id)).await.map(Json)
}

async fn activate_consumer(
    State(controller): State<ConsumerController>,
    Path(id): Path<String>,
) -> ServerResult<Json<ConsumerView>> {
    controller.activate(&ListenerId::new(id)).await.map(Json)
}

async fn pause_consumer(
    State(controller): State<ConsumerController>,
    Path(id): Path<String>,
) -> ServerResult<Json<ConsumerView>> {
    controller.pause(&ListenerId::new(id)).await.map(Json)
}

async fn resume_consumer(
    State(controller): State<ConsumerController>,
    Path(id): Path<String>,
) -> ServerResult<Json<ConsumerView>> {
    controller.resume(&ListenerId::new(id)).await.map(Json)
}

async fn stop_consumer(
    State(controller): State<ConsumerController>,
    Path(id): Path<String>,
) -> ServerResult<Json<ConsumerView>> {
    controller.stop(&ListenerId::new(id)).await.map(Json)
}

async fn stop_all_consumers(State(controller): State<ConsumerController>) -> Json<BulkReport> {
    Json(controller.stop_all().await)
}

async fn delete_consumer(
    State(controller): State<ConsumerController>,
    Path(id): Path<String>,
) -> ServerResult<StatusCode> {
    controller.delete(&ListenerId::new(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_all_consumers(State(controller): State<ConsumerController>) -> Json<BulkReport> {
    Json(controller.delete_all().await)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use switchyard_consumer::{
        ConsumerRegistry, MemoryClientConfig, MemoryClientFactory, RegistryConfig,
    };
    use tower::ServiceExt;

    fn test_router() -> Router {
        let factory = Arc::new(MemoryClientFactory::new(MemoryClientConfig::default()));
        let registry = ConsumerRegistry::new(RegistryConfig::default(), factory).unwrap();
        router(ConsumerController::new(Arc::new(registry)))
    }

    async fn do_request(
        router: &Router,
        method: Method,
        uri: &str,
        body: Option<String>,
    ) -> (StatusCode, serde_json::Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let b = match body {
            Some(s) => {
                builder = builder.header("content-type", "application/json");
                Body::from(s)
            }
            None => Body::empty(),
        };
        let req = builder.body(b).unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
        };
        (status, json)
    }

    async fn create(router: &Router, topic: &str, start: bool) -> String {
        let body = serde_json::json!({ "topic": topic, "startImmediately": start }).to_string();
        let (status, json) = do_request(router, Method::POST, "/consumers", Some(body)).await;
        assert_eq!(status, StatusCode::CREATED);
        json["listenerId"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_create_and_list() {
        let router = test_router();
        let id = create(&router, "orders", true).await;

        let (status, json) = do_request(&router, Method::GET, "/consumers", None).await;
        assert_eq!(status, StatusCode::OK);
        let consumers = json.as_array().unwrap();
        assert_eq!(consumers.len(), 1);
        assert_eq!(consumers[0]["listenerId"], id.as_str());
        assert_eq!(consumers[0]["active"], true);
        assert_eq!(consumers[0]["topic"], "orders");
    }

    #[tokio::test]
    async fn test_create_with_empty_topic_is_bad_request() {
        let router = test_router();
        let (status, json) = do_request(
            &router,
            Method::POST,
            "/consumers",
            Some(r#"{"topic":""}"#.to_string()),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "INVALID_SPEC");
    }

    #[tokio::test]
    async fn test_lifecycle_routes() {
        let router = test_router();
        let id = create(&router, "orders", false).await;

        let (status, json) =
            do_request(&router, Method::PUT, &format!("/consumers/{id}/activate"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["state"], "running");

        let (status, json) =
            do_request(&router, Method::PUT, &format!("/consumers/{id}/pause"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["active"], true);

        let (status, _) =
            do_request(&router, Method::PUT, &format!("/consumers/{id}/stop"), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, json) =
            do_request(&router, Method::PUT, &format!("/consumers/{id}/stop"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["error"], "ALREADY_STOPPED");
        assert_eq!(json["listenerId"], id.as_str());
        assert_eq!(json["state"], "stopped");

        let (status, json) =
            do_request(&router, Method::GET, &format!("/consumers/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["active"], false);
        assert!(json["assignments"].is_null());
    }

    #[tokio::test]
    async fn test_pause_never_started_is_conflict() {
        let router = test_router();
        let id = create(&router, "orders", false).await;

        let (status, json) =
            do_request(&router, Method::PUT, &format!("/consumers/{id}/pause"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["error"], "NOT_RUNNING");
        assert_eq!(json["state"], "created");
    }

    #[tokio::test]
    async fn test_unknown_consumer_is_not_found() {
        let router = test_router();
        let (status, json) = do_request(&router, Method::GET, "/consumers/missing", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"], "NOT_FOUND");

        let (status, _) =
            do_request(&router, Method::PUT, "/consumers/missing/resume", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_delete_one() {
        let router = test_router();
        let id = create(&router, "orders", true).await;

        let (status, json) =
            do_request(&router, Method::DELETE, &format!("/consumers/{id}"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(json.is_null());

        let (status, _) = do_request(&router, Method::GET, &format!("/consumers/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_stop_all_reports_partial_failure() {
        let router = test_router();
        let running = create(&router, "orders", true).await;
        let stopped = create(&router, "audit", false).await;

        let (status, json) = do_request(&router, Method::PUT, "/consumers/stop", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["attempted"], 2);
        assert_eq!(json["succeeded"], serde_json::json!([running]));
        assert_eq!(json["failed"][0]["listenerId"], stopped.as_str());
        assert_eq!(json["failed"][0]["error"], "ALREADY_STOPPED");
    }

    #[tokio::test]
    async fn test_delete_all() {
        let router = test_router();
        create(&router, "orders", true).await;
        create(&router, "audit", false).await;

        let (status, json) = do_request(&router, Method::DELETE, "/consumers", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["attempted"], 2);
        assert_eq!(json["failed"], serde_json::json!([]));

        let (_, json) = do_request(&router, Method::GET, "/consumers", None).await;
        assert_eq!(json, serde_json::json!([]));
    }
}
