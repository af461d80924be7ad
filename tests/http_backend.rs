use std::{sync::Arc, time::Duration};

use gatehouse::application::backend::BackendError;
use gatehouse::application::error::EvaluationError;
use gatehouse::application::evaluation::{RolloutOptions, RolloutService};
use gatehouse::domain::{IdentityAttributes, IdentityInput};
use gatehouse::infra::backends::{API_KEY_HEADER, HttpBackend};
use httpmock::MockServer;
use serde_json::json;
use url::Url;

async fn rollout(server: &MockServer) -> RolloutService {
    let base = Url::parse(&server.base_url()).expect("base url");
    let rollout = RolloutService::new(
        RolloutOptions::new("server-secret").with_environment("staging"),
        Arc::new(HttpBackend::new(base, Duration::from_secs(2))),
    );
    rollout.initialize().await.expect("initialize");
    rollout
}

fn user(id: &str) -> Option<IdentityInput> {
    Some(IdentityInput::from(IdentityAttributes::with_user_id(id)))
}

#[tokio::test]
async fn check_gate_posts_identity_with_credentials() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method("POST")
                .path("/v1/check_gate")
                .header(API_KEY_HEADER, "server-secret")
                .json_body_includes(
                    r#"{"gateName":"new_checkout","user":{"userID":"user-42"},"environment":{"tier":"staging"}}"#,
                );
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"name":"new_checkout","value":true}"#);
        })
        .await;

    let rollout = rollout(&server).await;
    let enabled = rollout
        .check_gate("new_checkout", user("user-42"))
        .await
        .expect("gate result");

    assert!(enabled);
    mock.assert_async().await;
}

#[tokio::test]
async fn get_config_projects_remote_value() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method("POST")
                .path("/v1/get_config")
                .json_body_includes(r#"{"configName":"ui_settings"}"#);
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"name":"ui_settings","value":{"header_color":"blue"},"rule_id":"rule-1"}"#);
        })
        .await;

    let rollout = rollout(&server).await;
    let full = rollout
        .get_config("ui_settings", user("user-42"), None)
        .await
        .expect("config");
    assert_eq!(full, Some(json!({ "header_color": "blue" })));

    let projected = rollout
        .get_config("ui_settings", user("user-42"), Some("header_color"))
        .await
        .expect("config");
    assert_eq!(projected, Some(json!("blue")));

    mock.assert_calls_async(2).await;
}

#[tokio::test]
async fn parameter_store_uses_its_own_endpoint() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method("POST")
                .path("/v1/get_parameter_store")
                .json_body_includes(r#"{"storeName":"checkout"}"#);
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"name":"checkout","value":{"currency":"EUR"}}"#);
        })
        .await;

    let rollout = rollout(&server).await;
    let value = rollout
        .get_parameter_store("checkout", None, Some("currency"))
        .await
        .expect("parameter store");

    assert_eq!(value, Some(json!("EUR")));
    mock.assert_async().await;
}

#[tokio::test]
async fn server_errors_surface_as_unavailable_without_retry() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method("POST").path("/v1/check_gate");
            then.status(500).body("boom");
        })
        .await;

    let rollout = rollout(&server).await;
    let err = rollout
        .check_gate("new_checkout", user("user-42"))
        .await
        .expect_err("server error");

    assert!(matches!(
        err,
        EvaluationError::Backend(BackendError::Unavailable { .. })
    ));
    mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn undecodable_body_is_an_evaluation_failure() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method("POST").path("/v1/get_config");
            then.status(200)
                .header("content-type", "application/json")
                .body("not json");
        })
        .await;

    let rollout = rollout(&server).await;
    let err = rollout
        .get_config("ui_settings", None, None)
        .await
        .expect_err("decode error");

    assert!(matches!(
        err,
        EvaluationError::Backend(BackendError::EvaluationFailed { .. })
    ));
}

#[tokio::test]
async fn shutdown_stops_remote_calls() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method("POST").path("/v1/check_gate");
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"name":"g","value":true}"#);
        })
        .await;

    let rollout = rollout(&server).await;
    rollout.shutdown().await.expect("shutdown");
    let err = rollout
        .check_gate("g", None)
        .await
        .expect_err("shut down");

    assert!(matches!(err, EvaluationError::NotInitialized));
    mock.assert_calls_async(0).await;
}
