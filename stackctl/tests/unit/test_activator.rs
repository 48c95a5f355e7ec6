//! End-to-end activation tests against a scripted engine

use std::sync::Arc;

use serde_yaml::Value;
use stackctl::compose::augment::{Augmenter, RoutingConfig, ServiceDefaults};
use stackctl::compose::labels::LabelPolicy;
use stackctl::deploy::activator::StackActivator;
use stackctl::errors::{Phase, StackError};
use stackctl::filesys::file::File;
use stackctl::secrets::store::SecretStore;
use tokio_test::assert_err;

use crate::common::{activator, activator_with, engine, FakeRunner};

const WEB: &str = r#"
services:
  web:
    image: x
    labels:
      http.port: "80"
    networks: [front]
"#;

fn parse(yaml: &str) -> Value {
    serde_yaml::from_str(yaml).unwrap()
}

#[tokio::test]
async fn test_missing_services_touches_nothing() {
    let runner = Arc::new(FakeRunner::new());

    let err = assert_err!(activator(&runner).activate("networks: {}\n", None).await);

    assert!(matches!(err, StackError::MissingField(ref field) if field == "services"));
    assert!(err.is_validation());
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn test_shape_errors_touch_nothing() {
    for yaml in [
        "services: [web]\n",
        "services:\n  web: nginx\n",
        "services:\n  web:\n    networks: {front: {}}\n",
        "services:\n  web:\n    labels: routed\n",
        "services: {web: {image: x}\nnetworks: [",
    ] {
        let runner = Arc::new(FakeRunner::new());
        let err = assert_err!(activator(&runner).activate(yaml, None).await);
        assert!(err.is_validation(), "{yaml:?} gave {err}");
        assert!(runner.calls().is_empty(), "{yaml:?} reached the engine");
    }
}

#[tokio::test]
async fn test_routed_service_is_augmented_and_submitted() {
    let runner = Arc::new(FakeRunner::new().with_compose_output("Container web  Started\n"));

    let output = activator(&runner).activate(WEB, None).await.unwrap();
    assert_eq!(output, "Container web  Started\n");

    assert_eq!(
        runner.calls(),
        vec![
            "network ls --format {{.Name}}",
            "network create --driver bridge front",
            "compose -f - up -d --wait",
        ]
    );

    let submitted = parse(&runner.submitted_yaml().unwrap());
    let web = &submitted["services"]["web"];
    assert_eq!(web["container_name"], Value::from("web"));
    assert_eq!(web["restart"], Value::from("unless-stopped"));
    assert_eq!(web["image"], Value::from("x"));
    assert_eq!(
        web["labels"]["traefik.http.routers.web.rule"],
        Value::from("Host(`web.localhost`)")
    );
    assert_eq!(web["labels"]["traefik.enable"], Value::from("true"));
    assert!(web["labels"].get("http.port").is_none());
    assert_eq!(submitted["networks"]["front"]["driver"], Value::from("external"));
    assert_eq!(submitted["networks"]["front"]["name"], Value::from("front"));
}

#[tokio::test]
async fn test_submission_failure_removes_created_network() {
    let runner = Arc::new(FakeRunner::new().failing("compose", "web Error: image x not found"));

    let err = activator(&runner).activate(WEB, Some("blog")).await.unwrap_err();

    assert_eq!(runner.calls_starting_with("network rm"), vec!["network rm -f front"]);
    assert_eq!(err.phase(), Some(Phase::Submitting));
    assert!(!err.is_validation());
    assert!(err.to_string().contains("image x not found"));
}

#[tokio::test]
async fn test_submission_error_survives_failed_rollback() {
    let runner = Arc::new(
        FakeRunner::new()
            .with_networks(&["traefik"])
            .failing("network rm -f back", "network back has active endpoints")
            .failing("compose", "dependency failed to start: api is unhealthy"),
    );
    let yaml = "services:\n  api:\n    networks: [front, back, traefik]\n";

    let err = activator(&runner).activate(yaml, None).await.unwrap_err();

    assert_eq!(
        runner.calls_starting_with("network rm"),
        vec!["network rm -f back", "network rm -f front"]
    );
    match err {
        StackError::Activation { phase, source } => {
            assert_eq!(phase, Phase::Submitting);
            assert!(matches!(*source, StackError::ExternalProcessFailure { .. }));
            assert!(source.to_string().contains("api is unhealthy"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_provisioning_failure_is_reported_as_reconciling() {
    let runner = Arc::new(FakeRunner::new().failing("network create --driver bridge back", "pool overlaps"));
    let yaml = "services:\n  api:\n    networks: [front, back]\n";

    let err = activator(&runner).activate(yaml, None).await.unwrap_err();

    assert_eq!(err.phase(), Some(Phase::Reconciling));
    assert!(err.to_string().contains("pool overlaps"));
    assert_eq!(runner.calls_starting_with("network rm"), vec!["network rm -f front"]);
    assert!(runner.compose_call().is_none());
}

#[tokio::test]
async fn test_label_list_form_is_normalized() {
    let runner = Arc::new(FakeRunner::new());
    let yaml = "services:\n  web:\n    labels:\n      - http.port=8080\n      - team=core\n      - flag\n      - 42\n";

    activator(&runner).activate(yaml, None).await.unwrap();

    let submitted = parse(&runner.submitted_yaml().unwrap());
    let labels = submitted["services"]["web"]["labels"].as_mapping().unwrap();
    assert!(labels.get("http.port").is_none());
    assert_eq!(labels.get("team"), Some(&Value::from("core")));
    assert_eq!(labels.get("flag"), Some(&Value::from("")));
    assert_eq!(labels.get("traefik.enable"), Some(&Value::from("true")));
    assert!(labels.get("traefik.http.routers.web.rule").is_some());
    assert_eq!(labels.len(), 4);
}

#[tokio::test]
async fn test_strict_labels_reject_malformed_entries() {
    let runner = Arc::new(FakeRunner::new());
    let strict = StackActivator::new(engine(&runner), Augmenter::default(), LabelPolicy::Strict);

    let err = strict
        .activate("services:\n  web:\n    labels: [ok=1, [nested]]\n", None)
        .await
        .unwrap_err();

    assert!(err.is_validation());
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn test_external_domain_and_load_balancer() {
    let runner = Arc::new(FakeRunner::new().with_networks(&["traefik"]));
    let routing = RoutingConfig::new(
        Some("lan".to_string()),
        Some("example.com".to_string()),
        Some("traefik".to_string()),
    );

    activator_with(&runner, routing)
        .activate("services:\n  web:\n    labels: {http.port: '80'}\n", Some("site"))
        .await
        .unwrap();

    assert!(runner.calls_starting_with("network create").is_empty());
    assert_eq!(
        runner.compose_call().unwrap().args,
        vec!["compose", "-p", "site", "-f", "-", "up", "-d", "--wait"]
    );
    let submitted = parse(&runner.submitted_yaml().unwrap());
    assert_eq!(
        submitted["services"]["web"]["labels"]["traefik.http.routers.web.rule"],
        Value::from("Host(`web.example.com`) || Host(`web.lan`)")
    );
    assert_eq!(submitted["networks"]["traefik"]["driver"], Value::from("external"));
}

#[tokio::test]
async fn test_unknown_keys_survive_in_place() {
    let runner = Arc::new(FakeRunner::new());
    let yaml = "version: '3.8'\nservices:\n  db:\n    image: postgres\n    x-note: keep\nx-extra:\n  a: 1\n";

    activator(&runner).activate(yaml, None).await.unwrap();

    let submitted = runner.submitted_yaml().unwrap();
    let keys: Vec<_> = parse(&submitted)
        .as_mapping()
        .unwrap()
        .keys()
        .map(|k| k.as_str().unwrap().to_string())
        .collect();
    assert_eq!(keys, vec!["version", "services", "x-extra"]);
    assert!(submitted.contains("x-note: keep"));
}

#[tokio::test]
async fn test_invalid_project_name_is_rejected() {
    let runner = Arc::new(FakeRunner::new());

    let err = activator(&runner)
        .activate("services:\n  web:\n    image: x\n", Some("My Stack"))
        .await
        .unwrap_err();

    assert!(err.is_validation());
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn test_secrets_are_generated_and_passed_to_engine() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SecretStore::new(File::new(dir.path().join("secrets.env"))));
    let runner = Arc::new(FakeRunner::new());
    let activator = StackActivator::new(
        engine(&runner),
        Augmenter::new(RoutingConfig::default(), ServiceDefaults::default()),
        LabelPolicy::Lenient,
    )
    .with_secret_store(store.clone());

    let yaml = "services:\n  db:\n    image: postgres\n    environment:\n      - POSTGRES_USER=${DB_USER}\n    secrets: [db_password]\n";
    activator.activate(yaml, None).await.unwrap();

    let user = store.get_or_create("DB_USER").await.unwrap();
    let password = store.get_or_create("db_password").await.unwrap();

    let call = runner.compose_call().unwrap();
    assert_eq!(call.envs, vec![("db_password".to_string(), password)]);

    let submitted = parse(&runner.submitted_yaml().unwrap());
    let env = &submitted["services"]["db"]["environment"];
    assert_eq!(env["POSTGRES_USER"], Value::from(user));
    assert_eq!(env["db_password"], Value::from("/run/secrets/db_password"));
    assert_eq!(
        submitted["secrets"]["db_password"]["environment"],
        Value::from("db_password")
    );
}

#[tokio::test]
async fn test_secrets_without_store_is_config_error() {
    let runner = Arc::new(FakeRunner::new());

    let err = activator(&runner)
        .activate("services:\n  db:\n    secrets: [db_password]\n", None)
        .await
        .unwrap_err();

    assert!(matches!(err, StackError::ConfigError(_)));
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn test_deactivate_runs_compose_down_only() {
    let runner = Arc::new(FakeRunner::new().with_compose_output("Container web  Removed\n"));

    let output = activator(&runner).deactivate(WEB, Some("blog")).await.unwrap();

    assert_eq!(output, "Container web  Removed\n");
    assert_eq!(runner.calls(), vec!["compose -p blog -f - down"]);
}
