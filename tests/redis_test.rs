//! Queue service against a real Redis server.
//!
//! Requires a running Redis; set QIT_REDIS_HOST / QIT_REDIS_PORT /
//! QIT_REDIS_DB to point elsewhere than localhost:6379 db 15.

use qit::config::{Config, Settings};
use qit::error::Error;
use qit::model::JobStatus;
use qit::service::QueueService;
use qit::store::{RedisStore, Store};
use serde_json::json;
use std::sync::Arc;

async fn test_service() -> QueueService {
    let run = uuid::Uuid::new_v4().simple().to_string();
    let mut settings = Settings::default();
    settings.set("RedisServer", "DB", "15");
    settings.set("RedisHashMaps", "AutoCITIQueueHashMap", format!("qit-test-queues-{run}"));
    settings.set(
        "RedisHashMaps",
        "AutoCITIJobTrackerHashMap",
        format!("qit-test-tracker-{run}"),
    );
    settings.apply_overrides(std::env::vars());
    let config = Config::from_settings(settings).unwrap();

    let store = RedisStore::open(&config.redis).await.unwrap();
    let service = QueueService::new(&config, Arc::new(store));
    service.connect().await.unwrap();
    service
}

#[tokio::test]
#[ignore] // Requires running Redis
async fn redis_probe_reports_server_info() {
    let config = Config::load(None).unwrap();
    let store = RedisStore::open(&config.redis).await.unwrap();
    assert!(store.info().await.unwrap().contains("redis_version"));
}

#[tokio::test]
#[ignore] // Requires running Redis
async fn redis_full_lifecycle() {
    let service = test_service().await;
    let entity = format!("plang-{}", uuid::Uuid::new_v4().simple());
    let queue = format!("{entity}Queue");
    service.register_queue(&entity, &queue).await.unwrap();

    let low = service.enqueue_job(&entity, json!({"n": 1}), "Low").await.unwrap();
    let counts = service.count_pending(&entity).await.unwrap();
    assert_eq!(counts.get("High"), Some(0));
    assert_eq!(counts.get("Low"), Some(1));

    let job = service.dequeue_job(&entity, None).await.unwrap().unwrap();
    assert_eq!(job.urn(), low);
    assert_eq!(
        service.get_status(&low).await.unwrap().status,
        JobStatus::Executing
    );

    service.report_result(&job, json!({"ok": true})).await.unwrap();
    let done = service.get_status(&low).await.unwrap();
    assert_eq!(done.result, Some(json!({"ok": true})));
    assert!(matches!(
        service.get_status(&low).await,
        Err(Error::UnknownJob(_))
    ));

    service.purge_entity_queues(&entity).await.unwrap();
    service.delete_queue(&entity).await.unwrap();
    service.clear_pending().await.unwrap();
}

#[tokio::test]
#[ignore] // Requires nothing listening on the port
async fn unreachable_redis_is_unavailable() {
    let mut settings = Settings::default();
    settings.set("RedisServer", "Port", "1");
    settings.set("RedisServer", "TimeoutSecs", "1");
    let config = Config::from_settings(settings).unwrap();
    let err = RedisStore::open(&config.redis).await.err().expect("must fail");
    assert!(err.is_unavailable());
}
