use apiary_devkit::fixtures::colonies;
use apiary_devkit::{ColonyFixture, FakeApi, SnapshotRecorder};
use apiary_sync::config::ApiConf;
use apiary_sync::wire::{decode_colony, ColonyLookup};
use apiary_sync::{
    DataSource, Endpoint, HistoryScope, HttpDataSource, SourceError, SubscriptionKey, SyncConfig, SyncEngine,
    ViewStatus,
};
use serde_json::json;

fn api_conf(api: &FakeApi) -> ApiConf {
    ApiConf { base_url: api.base_url(), request_timeout_ms: 2_000 }
}

#[tokio::test]
async fn test_status_and_body_are_passed_through() {
    let api = FakeApi::start().await.unwrap();
    api.route("/colonies", 200, colonies(&[ColonyFixture::new("1")]));
    api.route("/colonies/2", 204, json!(null));
    api.route("/sensor-history/2?scope=daily", 200, json!([]));

    let source = HttpDataSource::new(&api_conf(&api), || None).unwrap();

    let list = source.fetch(&Endpoint::Colonies).await.unwrap();
    assert_eq!(list.status, 200);
    assert!(list.body.contains("\"colmena_id\":\"1\""));

    let empty = source.fetch(&Endpoint::Colony("2".into())).await.unwrap();
    assert_eq!(empty.status, 204);
    assert!(empty.body.is_empty());

    let history = Endpoint::SensorHistory { colony_id: "2".into(), scope: HistoryScope::Daily };
    assert_eq!(source.fetch(&history).await.unwrap().body, "[]");

    let missing = source.fetch(&Endpoint::Colony("404".into())).await.unwrap();
    assert_eq!(missing.status, 404);
    assert_eq!(
        decode_colony(&Endpoint::Colony("404".into()), &missing, chrono::Utc::now()).unwrap(),
        ColonyLookup::NotFound
    );
}

#[tokio::test]
async fn test_bearer_token_read_per_request() {
    let api = FakeApi::start().await.unwrap();
    api.route("/colonies", 200, json!([]));

    let with_token = HttpDataSource::new(&api_conf(&api), || Some("t0k3n".to_string())).unwrap();
    with_token.fetch(&Endpoint::Colonies).await.unwrap();
    let anonymous = HttpDataSource::new(&api_conf(&api), || None).unwrap();
    anonymous.fetch(&Endpoint::Colonies).await.unwrap();

    let seen = api.requests();
    assert_eq!(seen[0].authorization.as_deref(), Some("Bearer t0k3n"));
    assert_eq!(seen[1].authorization, None);
}

#[tokio::test]
async fn test_server_gone_is_transport_error() {
    let api = FakeApi::start().await.unwrap();
    let conf = api_conf(&api);
    drop(api);
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let source = HttpDataSource::new(&conf, || None).unwrap();
    let err = source.fetch(&Endpoint::Colonies).await.unwrap_err();
    assert!(matches!(err, SourceError::Transport { .. }), "{err}");
}

#[tokio::test]
async fn test_engine_over_http() {
    let api = FakeApi::start().await.unwrap();
    api.route(
        "/colonies",
        200,
        colonies(&[ColonyFixture::new("1"), ColonyFixture::new("2").weight(25.0)]),
    );

    let mut config = SyncConfig::default();
    config.api = api_conf(&api);
    config.polling.interval_ms = 100;
    let source = HttpDataSource::new(&config.api, || None).unwrap();
    let engine = SyncEngine::new(source, config).unwrap();

    let recorder = SnapshotRecorder::new();
    let sub = engine.subscribe(SubscriptionKey::dashboard(), recorder.callback());
    let ready = recorder.wait_for(3000, |s| s.status == ViewStatus::Ready).await.unwrap();
    sub.unsubscribe();

    assert_eq!(ready.colonies.len(), 2);
    assert_eq!(ready.active_alert_count, 1);
    assert_eq!(ready.summary.critical, 1);
    assert!(api.requests().iter().all(|r| r.path == "/colonies"));
}
