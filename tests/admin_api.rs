//! Admin API against real loopback downstreams.

mod common;

use std::sync::Arc;

use serde_json::Value;
use tokio::net::TcpListener;

use resilience_pipeline::admin::{self, AdminState};
use resilience_pipeline::config::parse_config;
use resilience_pipeline::lifecycle::Shutdown;
use resilience_pipeline::resilience::{NoopObserver, PipelineRegistry};

const ADMIN: &str = "http://127.0.0.1:28280";

const CONFIG: &str = r#"
    [admin]
    bind_address = "127.0.0.1:28280"
    api_key = "test-key"

    [pipelines.flaky]
    downstream_url = "http://127.0.0.1:28281/"

    [pipelines.flaky.circuit_breaker]
    sampling_duration_ms = 30000
    failure_ratio = 0.5
    minimum_throughput = 2
    break_duration_ms = 30000

    [pipelines.flaky.retry]
    max_attempts = 0
    base_delay_ms = 100
    backoff = "constant"

    [pipelines.flaky.timeouts]
    attempt_timeout_ms = 1000
    total_timeout_ms = 3000

    [pipelines.healthy]
    downstream_url = "http://127.0.0.1:28282/"

    [pipelines.healthy.circuit_breaker]
    sampling_duration_ms = 30000
    failure_ratio = 0.5
    minimum_throughput = 3
    break_duration_ms = 15000

    [pipelines.healthy.retry]
    max_attempts = 2
    base_delay_ms = 100
    backoff = "exponential"

    [pipelines.healthy.timeouts]
    attempt_timeout_ms = 1000
    total_timeout_ms = 5000
"#;

async fn get_json(client: &reqwest::Client, path: &str) -> Value {
    get_json_from(client, ADMIN, path).await
}

async fn get_json_from(client: &reqwest::Client, base: &str, path: &str) -> Value {
    let res = client.get(format!("{base}{path}")).send().await.unwrap();
    assert!(res.status().is_success(), "{path} returned {}", res.status());
    res.json().await.unwrap()
}

#[tokio::test]
async fn dashboard_tracks_failures_and_open_circuits() {
    let flaky_hits = common::start_mock_backend("127.0.0.1:28281".parse().unwrap(), 500, "boom").await;
    common::start_mock_backend("127.0.0.1:28282".parse().unwrap(), 200, "hello").await;

    let config = Arc::new(parse_config(CONFIG).unwrap());
    let registry = Arc::new(PipelineRegistry::from_config(&config, Arc::new(NoopObserver)));
    let shutdown = Shutdown::new();
    let listener = TcpListener::bind(&config.admin.bind_address).await.unwrap();
    let server = tokio::spawn(admin::serve(listener, AdminState::new(registry, config.clone()), shutdown.subscribe()));

    let client = common::http_client();

    // Bearer guard on /admin/*
    let res = client.get(format!("{ADMIN}/admin/status")).send().await.unwrap();
    assert_eq!(res.status(), 401);
    let res = client
        .get(format!("{ADMIN}/admin/status"))
        .bearer_auth("test-key")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let status: Value = res.json().await.unwrap();
    assert_eq!(status["pipelines"], serde_json::json!(["flaky", "healthy"]));

    let ok = get_json(&client, "/api/call/healthy").await;
    assert_eq!(ok["status"], "SUCCESS");
    assert_eq!(ok["response"], "hello");
    assert!(ok.get("fallback_response").is_none());

    for _ in 0..2 {
        let report = get_json(&client, "/api/call/flaky").await;
        assert_eq!(report["status"], "DOWNSTREAM_ERROR");
        assert_eq!(report["http_code"], 500);
        assert!(report["fallback_response"].is_string());
    }

    let rejected = get_json(&client, "/api/call/flaky").await;
    assert_eq!(rejected["status"], "CIRCUIT_OPEN");
    assert_eq!(rejected["stats"]["total_calls"], 3);
    assert_eq!(flaky_hits.get(), 2);

    let dashboard = get_json(&client, "/api/dashboard").await;
    assert_eq!(dashboard["flaky"]["failed"], 3);
    assert_eq!(dashboard["flaky"]["failure_rate_percent"], 100.0);
    assert_eq!(dashboard["healthy"]["successful"], 1);

    let flaky = get_json(&client, "/api/pipelines/flaky").await;
    assert_eq!(flaky["circuit"]["state"], "open");

    let missing = client.get(format!("{ADMIN}/api/pipelines/nope")).send().await.unwrap();
    assert_eq!(missing.status(), 404);
    let missing = client.get(format!("{ADMIN}/api/call/nope")).send().await.unwrap();
    assert_eq!(missing.status(), 404);

    shutdown.trigger();
    server.await.unwrap().unwrap();
}

const GATEWAY_ADMIN: &str = "http://127.0.0.1:28290";

const GATEWAY_CONFIG: &str = r#"
    [admin]
    bind_address = "127.0.0.1:28290"

    [pipelines.gateway]
    downstream_url = "http://127.0.0.1:28291/"

    [pipelines.gateway.circuit_breaker]
    sampling_duration_ms = 20000
    failure_ratio = 0.4
    minimum_throughput = 2
    break_duration_ms = 30000

    [pipelines.gateway.retry]
    max_attempts = 0
    base_delay_ms = 250
    backoff = "exponential"
    max_delay_ms = 4000

    [pipelines.gateway.timeouts]
    attempt_timeout_ms = 2000
    total_timeout_ms = 5000
"#;

#[tokio::test]
async fn manual_reset_reopens_traffic_and_keeps_stats() {
    let hits = common::start_mock_backend("127.0.0.1:28291".parse().unwrap(), 504, "slow upstream").await;

    let config = Arc::new(parse_config(GATEWAY_CONFIG).unwrap());
    let registry = Arc::new(PipelineRegistry::from_config(&config, Arc::new(NoopObserver)));
    let shutdown = Shutdown::new();
    let listener = TcpListener::bind(&config.admin.bind_address).await.unwrap();
    let server = tokio::spawn(admin::serve(listener, AdminState::new(registry, config.clone()), shutdown.subscribe()));

    let client = common::http_client();

    // Uncommon codes reach the classifier as-is.
    for _ in 0..2 {
        let report = get_json_from(&client, GATEWAY_ADMIN, "/api/call/gateway").await;
        assert_eq!(report["status"], "DOWNSTREAM_ERROR");
        assert_eq!(report["http_code"], 504);
    }
    let rejected = get_json_from(&client, GATEWAY_ADMIN, "/api/call/gateway").await;
    assert_eq!(rejected["status"], "CIRCUIT_OPEN");
    assert_eq!(hits.get(), 2);

    let snapshot = get_json_from(&client, GATEWAY_ADMIN, "/api/pipelines/gateway").await;
    assert_eq!(snapshot["circuit"]["state"], "open");
    assert_eq!(snapshot["policy"]["sampling_duration_ms"], 20000);
    assert_eq!(snapshot["policy"]["failure_ratio"], 0.4);
    assert_eq!(snapshot["policy"]["minimum_throughput"], 2);
    assert_eq!(snapshot["policy"]["break_duration_ms"], 30000);
    assert_eq!(snapshot["policy"]["backoff"], "exponential");
    assert_eq!(snapshot["policy"]["max_delay_ms"], 4000);
    assert_eq!(snapshot["policy"]["total_timeout_ms"], 5000);

    let reset = get_json_from(&client, GATEWAY_ADMIN, "/api/pipelines/gateway/reset").await;
    assert_eq!(reset["action"], "reset");
    assert_eq!(reset["old_state"], "open");
    assert_eq!(reset["new_state"], "closed");

    let stats = get_json_from(&client, GATEWAY_ADMIN, "/api/dashboard").await;
    assert_eq!(stats["gateway"]["total_calls"], 3);
    assert_eq!(stats["gateway"]["failed"], 3);

    // Closed again: the next call reaches the downstream.
    let report = get_json_from(&client, GATEWAY_ADMIN, "/api/call/gateway").await;
    assert_eq!(report["status"], "DOWNSTREAM_ERROR");
    assert_eq!(hits.get(), 3);

    let all = get_json_from(&client, GATEWAY_ADMIN, "/api/reset-all").await;
    assert_eq!(all["gateway"]["old_state"], "closed");
    assert_eq!(all["gateway"]["new_state"], "closed");

    let missing = client.get(format!("{GATEWAY_ADMIN}/api/pipelines/nope/reset")).send().await.unwrap();
    assert_eq!(missing.status(), 404);

    shutdown.trigger();
    server.await.unwrap().unwrap();
}
