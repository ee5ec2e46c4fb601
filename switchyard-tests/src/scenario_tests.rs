//! End-to-end scenarios through the control façade.

use switchyard_consumer::{FaultConfig, MemoryClientConfig, PauseMode};
use switchyard_core::{ConsumerState, ErrorKind, ListenerId, TopicPartition};
use switchyard_server::{CreateConsumerRequest, ServerError};

use crate::fixtures::{settle, settle_assignment, within, TestRegistry};

fn request(topic: &str, start_immediately: bool) -> CreateConsumerRequest {
    CreateConsumerRequest {
        topic: topic.to_string(),
        start_immediately,
    }
}

fn kind(err: &ServerError) -> ErrorKind {
    match err {
        ServerError::Consumer(e) => e.kind(),
        other => panic!("expected a consumer error, got {other}"),
    }
}

#[tokio::test]
async fn test_scenario_create_started_consumer_is_listed_active() {
    let fixture = TestRegistry::default();
    let controller = fixture.controller();

    let created = controller.create(request("orders", true)).await.unwrap();

    let listed = controller.list().await;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].listener_id, created.listener_id);
    assert!(listed[0].active);
}

#[tokio::test]
async fn test_scenario_full_lifecycle_then_delete() {
    let fixture = TestRegistry::default();
    let controller = fixture.controller();

    let created = controller.create(request("orders", false)).await.unwrap();
    let id = ListenerId::new(created.listener_id.as_str());
    assert_eq!(created.state, "created");

    let view = controller.activate(&id).await.unwrap();
    assert!(view.active);

    controller.pause(&id).await.unwrap();
    let handle = fixture.registry.require(&id).await.unwrap();
    settle(&handle, ConsumerState::Paused).await.unwrap();

    let view = controller.resume(&id).await.unwrap();
    assert_eq!(view.state, "running");

    let view = controller.stop(&id).await.unwrap();
    assert!(!view.active);
    assert_eq!(view.assignments, None);

    controller.delete(&id).await.unwrap();
    assert_eq!(kind(&controller.get(&id).await.unwrap_err()), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_scenario_pause_never_started() {
    let fixture = TestRegistry::default();
    let controller = fixture.controller();

    let created = controller.create(request("orders", false)).await.unwrap();
    let id = ListenerId::new(created.listener_id.as_str());

    let err = controller.pause(&id).await.unwrap_err();
    assert_eq!(kind(&err), ErrorKind::NotRunning);
    assert_eq!(controller.get(&id).await.unwrap().state, "created");
}

#[tokio::test]
async fn test_scenario_stop_all_with_partial_failure() {
    let fixture = TestRegistry::default();
    let controller = fixture.controller();

    let a = controller.create(request("orders", true)).await.unwrap();
    let b = controller.create(request("audit", true)).await.unwrap();
    controller
        .stop(&ListenerId::new(b.listener_id.as_str()))
        .await
        .unwrap();

    let report = controller.stop_all().await;

    assert_eq!(report.attempted, 2);
    assert_eq!(report.succeeded, vec![a.listener_id.clone()]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].listener_id, b.listener_id);
    assert_eq!(report.failed[0].error, "ALREADY_STOPPED");

    for view in controller.list().await {
        assert_eq!(view.state, "stopped");
    }
}

#[tokio::test]
async fn test_scenario_delete_paused_consumer() {
    let fixture = TestRegistry::new(MemoryClientConfig::default().with_pause_mode(PauseMode::Deferred));
    let controller = fixture.controller();

    let created = controller.create(request("orders", true)).await.unwrap();
    let id = ListenerId::new(created.listener_id.as_str());
    controller.pause(&id).await.unwrap();

    let client = fixture.factory.probe(&id).unwrap();
    controller.delete(&id).await.unwrap();

    assert!(controller.list().await.is_empty());
    assert!(!client.is_polling());
    within(async {
        while fixture.factory.live_count() > 0 {
            tokio::task::yield_now().await;
        }
    })
    .await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_scenario_create_delete_churn_releases_clients() {
    let fixture = TestRegistry::default();
    let controller = fixture.controller();

    for _ in 0..50 {
        let created = controller.create(request("orders", true)).await.unwrap();
        controller
            .delete(&ListenerId::new(created.listener_id.as_str()))
            .await
            .unwrap();
    }

    assert!(controller.list().await.is_empty());
    assert_eq!(fixture.factory.created_count(), 50);
    within(async {
        while fixture.factory.live_count() > 0 {
            tokio::task::yield_now().await;
        }
    })
    .await;
}

#[tokio::test]
async fn test_scenario_failed_start_is_reported_and_retryable() {
    let fixture = TestRegistry::default();
    let controller = fixture.controller();
    let created = controller.create(request("orders", false)).await.unwrap();
    let id = ListenerId::new(created.listener_id.as_str());

    fixture
        .factory
        .set_faults(FaultConfig::none().with_force_start_fail());
    let err = controller.activate(&id).await.unwrap_err();
    assert_eq!(kind(&err), ErrorKind::Client);
    assert_eq!(err.status_code().as_u16(), 502);
    assert_eq!(controller.get(&id).await.unwrap().state, "created");

    // Faults are one-shot.
    assert!(controller.activate(&id).await.unwrap().active);
}

#[tokio::test]
async fn test_scenario_rebalance_reflected_in_view() {
    let fixture = TestRegistry::new(MemoryClientConfig::default().with_partitions(2));
    let controller = fixture.controller();
    let created = controller.create(request("orders", true)).await.unwrap();
    let id = ListenerId::new(created.listener_id.as_str());
    let handle = fixture.registry.require(&id).await.unwrap();
    settle_assignment(&handle, 2).await;

    let probe = fixture.factory.probe(&id).unwrap();
    assert!(probe.revoke(vec![TopicPartition::new("orders", 0)]));
    assert!(probe.assign(vec![TopicPartition::new("orders", 5)]));
    let expected = vec![TopicPartition::new("orders", 1), TopicPartition::new("orders", 5)];
    within(async {
        while handle.assigned_partitions().as_ref() != Some(&expected) {
            tokio::task::yield_now().await;
        }
    })
    .await;

    let view = controller.get(&id).await.unwrap();
    let partitions: Vec<i32> = view
        .assignments
        .unwrap()
        .into_iter()
        .map(|a| a.partition)
        .collect();
    assert_eq!(partitions, vec![1, 5]);
}

#[tokio::test]
async fn test_scenario_client_crash_marks_stopped() {
    let fixture = TestRegistry::default();
    let controller = fixture.controller();
    let created = controller.create(request("orders", true)).await.unwrap();
    let id = ListenerId::new(created.listener_id.as_str());
    let handle = fixture.registry.require(&id).await.unwrap();

    let probe = fixture.factory.probe(&id).unwrap();
    assert!(probe.crash("broker connection lost"));
    settle(&handle, ConsumerState::Stopped).await.unwrap();

    let view = controller.get(&id).await.unwrap();
    assert!(!view.active);
    assert!(controller.activate(&id).await.unwrap().active);
}

#[tokio::test]
async fn test_scenario_shutdown_drains_registry() {
    let fixture = TestRegistry::default();
    let controller = fixture.controller();
    controller.create(request("orders", true)).await.unwrap();
    controller.create(request("audit", false)).await.unwrap();

    assert_eq!(fixture.registry.shutdown().await, 2);
    assert!(controller.list().await.is_empty());
}
