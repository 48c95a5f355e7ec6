//! Network and volume reconciliation tests

use std::sync::Arc;

use indexmap::IndexSet;
use stackctl::compose::augment::Requirements;
use stackctl::deploy::ledger::{ProvisioningLedger, Resource};
use stackctl::deploy::reconcile::Reconciler;
use stackctl::errors::StackError;
use tokio_test::{assert_err, assert_ok};

use crate::common::{engine, FakeRunner};

fn requirements(networks: &[&str], volumes: &[&str]) -> Requirements {
    Requirements {
        networks: networks.iter().map(|n| n.to_string()).collect(),
        volumes: volumes.iter().map(|v| v.to_string()).collect(),
        secrets: IndexSet::new(),
    }
}

#[tokio::test]
async fn test_missing_network_is_created_once() {
    let runner = Arc::new(FakeRunner::new().with_networks(&["bridge", "host"]));
    let engine = engine(&runner);
    let mut ledger = ProvisioningLedger::new();

    assert_ok!(
        Reconciler::new(&engine)
            .reconcile(&requirements(&["app-net"], &[]), &mut ledger)
            .await
    );

    assert_eq!(
        runner.calls_starting_with("network create"),
        vec!["network create --driver bridge app-net"]
    );
    assert_eq!(ledger.entries(), &[Resource::Network("app-net".to_string())]);
}

#[tokio::test]
async fn test_existing_network_is_left_alone() {
    let runner = Arc::new(FakeRunner::new().with_networks(&["bridge", "app-net"]));
    let engine = engine(&runner);
    let mut ledger = ProvisioningLedger::new();

    assert_ok!(
        Reconciler::new(&engine)
            .reconcile(&requirements(&["app-net"], &[]), &mut ledger)
            .await
    );

    assert!(runner.calls_starting_with("network create").is_empty());
    assert!(ledger.is_empty());
}

#[tokio::test]
async fn test_environment_is_listed_once() {
    let runner = Arc::new(FakeRunner::new());
    let engine = engine(&runner);
    let mut ledger = ProvisioningLedger::new();

    assert_ok!(
        Reconciler::new(&engine)
            .reconcile(&requirements(&["a", "b", "c"], &[]), &mut ledger)
            .await
    );

    assert_eq!(runner.calls_starting_with("network ls").len(), 1);
    assert!(runner.calls_starting_with("volume ls").is_empty());
    assert_eq!(ledger.networks(), vec!["a", "b", "c"]);
}

#[tokio::test]
async fn test_creation_failure_rolls_back_earlier_creations() {
    let runner = Arc::new(
        FakeRunner::new()
            .with_networks(&["shared"])
            .failing("network create --driver bridge second", "address pool exhausted"),
    );
    let engine = engine(&runner);
    let mut ledger = ProvisioningLedger::new();

    let err = assert_err!(
        Reconciler::new(&engine)
            .reconcile(&requirements(&["first", "shared", "second"], &[]), &mut ledger)
            .await
    );

    match err {
        StackError::ProvisioningFailure { resource, diagnostics } => {
            assert_eq!(resource, "network second");
            assert_eq!(diagnostics, "address pool exhausted");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(runner.calls_starting_with("network rm"), vec!["network rm -f first"]);
    assert!(ledger.is_empty());
}

#[tokio::test]
async fn test_listing_failure_creates_nothing() {
    let runner = Arc::new(FakeRunner::new().failing("network ls", "Cannot connect to the Docker daemon"));
    let engine = engine(&runner);
    let mut ledger = ProvisioningLedger::new();

    let err = assert_err!(
        Reconciler::new(&engine)
            .reconcile(&requirements(&["front"], &[]), &mut ledger)
            .await
    );

    assert!(matches!(err, StackError::ExternalProcessFailure { .. }));
    assert_eq!(runner.calls(), vec!["network ls --format {{.Name}}"]);
}

#[tokio::test]
async fn test_volumes_follow_networks() {
    let runner = Arc::new(
        FakeRunner::new()
            .with_volumes(&["pgdata"])
            .failing("volume create --driver local cache", "disk full"),
    );
    let engine = engine(&runner);
    let mut ledger = ProvisioningLedger::new();

    assert_err!(
        Reconciler::new(&engine)
            .reconcile(&requirements(&["front"], &["pgdata", "cache"]), &mut ledger)
            .await
    );

    assert_eq!(
        runner.calls(),
        vec![
            "network ls --format {{.Name}}",
            "volume ls --format {{.Name}}",
            "network create --driver bridge front",
            "volume create --driver local cache",
            "network rm -f front",
        ]
    );
}

#[tokio::test]
async fn test_rollback_is_newest_first_and_best_effort() {
    let runner = Arc::new(FakeRunner::new().failing("network rm -f b", "in use"));
    let engine = engine(&runner);
    let mut ledger = ProvisioningLedger::new();
    ledger.record(Resource::Network("a".to_string()));
    ledger.record(Resource::Volume("v".to_string()));
    ledger.record(Resource::Network("b".to_string()));

    let report = ledger.rollback(&engine).await;

    assert_eq!(
        runner.calls(),
        vec!["network rm -f b", "volume rm -f v", "network rm -f a"]
    );
    assert_eq!(report.failed, vec![Resource::Network("b".to_string())]);
    assert_eq!(report.removed.len(), 2);
    assert!(!report.is_clean());

    // Drained: a second rollback does nothing
    let again = ledger.rollback(&engine).await;
    assert!(again.is_clean() && again.removed.is_empty());
    assert_eq!(runner.calls().len(), 3);
}
