//! End-to-end startup: two consecutive runs against the same datastore and
//! an HTTP smoke test.

mod common;

use std::sync::Arc;

use common::{local_config, Faults, RecordingConnector};
use globalstay_service::config::CollectionConfig;
use globalstay_service::lifecycle::{BootstrapError, Service, ServiceError};

fn service(connector: &RecordingConnector) -> Service {
    Service::new(Arc::new(local_config()), Arc::new(connector.clone()))
}

#[tokio::test]
async fn test_second_run_skips_applied_migrations() {
    let connector = RecordingConnector::new();
    let tracking = connector.memory().store(&CollectionConfig::memory("migrations"));

    let first = service(&connector).start().await.unwrap();
    assert_eq!(tracking.len(), 1);
    assert_eq!(connector.writes("hotels"), 1);
    first.stop().await.unwrap();
    assert_eq!(connector.open_connections(), 0);

    let second = service(&connector).start().await.unwrap();
    assert_eq!(tracking.len(), 1);
    assert_eq!(connector.writes("hotels"), 1);
    second.stop().await.unwrap();
    assert_eq!(connector.open_connections(), 0);
}

#[tokio::test]
async fn test_startup_failure_is_reported_and_released() {
    let connector = RecordingConnector::new();
    connector.set_faults(Faults {
        fail_connect: Some("reservations".into()),
        ..Faults::default()
    });

    let err = service(&connector).start().await.err().unwrap();
    assert!(matches!(
        err,
        ServiceError::Bootstrap(BootstrapError::Connection { ref collection, .. })
            if collection == "reservations"
    ));
    assert_eq!(connector.open_connections(), 0);
    assert_eq!(
        connector.disconnected(),
        vec!["services", "locations", "hotels", "migrations"]
    );
}

#[tokio::test]
async fn test_http_smoke() {
    let connector = RecordingConnector::new();
    let running = service(&connector).start().await.unwrap();
    let base = format!("http://{}", running.local_addr());
    let client = reqwest::Client::new();

    let ping = client.get(format!("{}/ping", base)).send().await.unwrap();
    assert_eq!(ping.status(), 200);
    let generated = ping
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap();
    assert!(uuid::Uuid::parse_str(&generated).is_ok());
    assert_eq!(ping.text().await.unwrap(), "pong");

    let echoed = client
        .get(format!("{}/ping", base))
        .header("x-request-id", "smoke-1")
        .send()
        .await
        .unwrap();
    assert_eq!(echoed.headers()["x-request-id"], "smoke-1");

    let status: serde_json::Value = client
        .get(format!("{}/status", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["scope"], "test");
    assert_eq!(status["mode"], "debug");
    assert_eq!(status["datasources"].as_array().unwrap().len(), 4);
    assert_eq!(status["places_enabled"], false);

    let hotels: serde_json::Value = client
        .get(format!("{}/hotels", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(hotels, serde_json::json!([]));

    let places = client
        .get(format!("{}/places?query=Bariloche", base))
        .send()
        .await
        .unwrap();
    assert_eq!(places.status(), 503);

    let preflight = client
        .request(reqwest::Method::OPTIONS, format!("{}/status", base))
        .header("origin", "https://example.com")
        .header("access-control-request-method", "GET")
        .send()
        .await
        .unwrap();
    assert!(preflight
        .headers()
        .contains_key("access-control-allow-origin"));

    running.stop().await.unwrap();
    assert_eq!(connector.open_connections(), 0);
}
