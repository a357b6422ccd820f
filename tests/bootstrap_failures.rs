//! Bootstrap ordering and failure handling against a fault-injecting
//! connector.

mod common;

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use common::{CountingMutation, Faults, PanickingMutation, RecordingConnector};
use globalstay_service::config::{CollectionConfig, NoSqlConfig};
use globalstay_service::lifecycle::{
    BootstrapError, BootstrapPlan, Bootstrapper, CollectionPlan, Shutdown,
};
use globalstay_service::migrations::{MigrationError, MigrationStep};
use globalstay_service::nosql::{ClientRegistry, CollectionStore};

fn bootstrapper(connector: &RecordingConnector) -> Bootstrapper {
    Bootstrapper::new(ClientRegistry::new(Arc::new(connector.clone())))
}

fn default_plan() -> BootstrapPlan {
    BootstrapPlan::from_config(&NoSqlConfig::default())
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_connects_in_order_and_releases_in_reverse() {
    let connector = RecordingConnector::new();
    let bootstrapped = bootstrapper(&connector)
        .bootstrap(default_plan())
        .await
        .unwrap();
    assert_eq!(
        connector.connected(),
        names(&["migrations", "hotels", "locations", "services", "reservations"])
    );

    let report = bootstrapped.teardown.run().await;
    assert!(report.is_clean());
    assert_eq!(
        connector.disconnected(),
        names(&["reservations", "services", "locations", "hotels", "migrations"])
    );
    assert_eq!(connector.open_connections(), 0);
}

#[tokio::test]
async fn test_connect_failure_releases_only_what_was_acquired() {
    let connector = RecordingConnector::new();
    connector.set_faults(Faults {
        fail_connect: Some("locations".into()),
        ..Faults::default()
    });

    let err = bootstrapper(&connector)
        .bootstrap(default_plan())
        .await
        .unwrap_err();

    assert!(
        matches!(err, BootstrapError::Connection { ref collection, .. } if collection == "locations")
    );
    assert_eq!(connector.connected(), names(&["migrations", "hotels"]));
    assert_eq!(connector.disconnected(), names(&["hotels", "migrations"]));
    assert_eq!(connector.open_connections(), 0);

    // Hotels was migrated before locations was attempted.
    let tracking = connector.memory().store(&CollectionConfig::memory("migrations"));
    assert_eq!(tracking.len(), 1);
}

#[tokio::test]
async fn test_tracking_failure_acquires_nothing() {
    let connector = RecordingConnector::new();
    connector.set_faults(Faults {
        fail_connect: Some("migrations".into()),
        ..Faults::default()
    });

    let err = bootstrapper(&connector)
        .bootstrap(default_plan())
        .await
        .unwrap_err();

    assert!(
        matches!(err, BootstrapError::Connection { ref collection, .. } if collection == "migrations")
    );
    assert!(connector.events().is_empty());
}

#[tokio::test]
async fn test_migration_failure_stops_bootstrap() {
    let connector = RecordingConnector::new();
    connector.set_faults(Faults {
        fail_index: Some("hotels".into()),
        ..Faults::default()
    });

    let err = bootstrapper(&connector)
        .bootstrap(default_plan())
        .await
        .unwrap_err();

    match &err {
        BootstrapError::Migration(MigrationError::Step { collection, step, .. }) => {
            assert_eq!(collection, "hotels");
            assert_eq!(*step, 1);
        }
        other => panic!("expected step failure, got {:?}", other),
    }
    assert!(!err.is_partial_migration());
    assert_eq!(connector.connected(), names(&["migrations", "hotels"]));
    assert_eq!(connector.disconnected(), names(&["hotels", "migrations"]));

    let tracking = connector.memory().store(&CollectionConfig::memory("migrations"));
    assert!(tracking.is_empty());
}

#[tokio::test]
async fn test_unrecorded_mutation_is_partial_migration() {
    let connector = RecordingConnector::new();
    connector.set_faults(Faults {
        fail_insert: Some("migrations".into()),
        ..Faults::default()
    });

    let err = bootstrapper(&connector)
        .bootstrap(default_plan())
        .await
        .unwrap_err();

    assert!(err.is_partial_migration());
    // The index landed, its record did not.
    let hotels = connector.memory().store(&CollectionConfig::memory("hotels"));
    let indexes = hotels.list_index_names().await.unwrap();
    assert!(indexes.contains(&"name_1".to_string()));
    let tracking = connector.memory().store(&CollectionConfig::memory("migrations"));
    assert!(tracking.is_empty());
    assert_eq!(connector.open_connections(), 0);
}

#[tokio::test]
async fn test_teardown_failure_keeps_original_error() {
    let connector = RecordingConnector::new();
    connector.set_faults(Faults {
        fail_connect: Some("services".into()),
        fail_disconnect: Some("hotels".into()),
        ..Faults::default()
    });

    let err = bootstrapper(&connector)
        .bootstrap(default_plan())
        .await
        .unwrap_err();

    assert!(
        matches!(err, BootstrapError::Connection { ref collection, .. } if collection == "services")
    );
    // The failing disconnect did not stop the remaining releases.
    assert_eq!(
        connector.disconnected(),
        names(&["locations", "hotels", "migrations"])
    );
}

#[tokio::test]
async fn test_steps_apply_once_across_bootstraps() {
    let connector = RecordingConnector::new();
    let counter = CountingMutation::default();
    let plan = || {
        BootstrapPlan::new(CollectionConfig::memory("migrations")).collection(
            CollectionPlan::new("hotels", CollectionConfig::memory("hotels")).with_steps(vec![
                MigrationStep::new(1, "count-once", "hotels", counter.clone()),
                MigrationStep::new(2, "count-twice", "hotels", counter.clone()),
            ]),
        )
    };

    let first = bootstrapper(&connector).bootstrap(plan()).await.unwrap();
    assert_eq!(first.reports[0].applied, vec![1, 2]);
    first.teardown.run().await;

    let second = bootstrapper(&connector).bootstrap(plan()).await.unwrap();
    assert!(second.reports[0].applied.is_empty());
    assert_eq!(second.reports[0].skipped, vec![1, 2]);
    second.teardown.run().await;

    assert_eq!(counter.applied(), 2);
}

#[tokio::test]
async fn test_shutdown_mid_bootstrap_releases_in_reverse() {
    let connector = RecordingConnector::new();
    let shutdown = Shutdown::new();
    connector.trigger_shutdown_after("hotels", &shutdown);

    let err = bootstrapper(&connector)
        .bootstrap_until(default_plan(), &shutdown)
        .await
        .unwrap_err();

    assert!(
        matches!(err, BootstrapError::Cancelled { ref collection } if collection == "locations")
    );
    assert_eq!(connector.connected(), names(&["migrations", "hotels"]));
    assert_eq!(connector.disconnected(), names(&["hotels", "migrations"]));
    assert_eq!(connector.open_connections(), 0);
}

#[test]
fn test_panicking_step_releases_before_runtime_exits() {
    let connector = RecordingConnector::new();
    let plan = BootstrapPlan::new(CollectionConfig::memory("migrations")).collection(
        CollectionPlan::new("hotels", CollectionConfig::memory("hotels")).with_steps(vec![
            MigrationStep::new(1, "explode", "hotels", PanickingMutation),
        ]),
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap();
    let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| {
        runtime.block_on(bootstrapper(&connector).bootstrap(plan))
    }));
    drop(runtime);

    assert!(outcome.is_err());
    assert_eq!(connector.connected(), names(&["migrations", "hotels"]));
    assert_eq!(connector.disconnected(), names(&["hotels", "migrations"]));
    assert_eq!(connector.open_connections(), 0);
}
