//! Integration tests for the HTTP manager surface.
//!
//! Each test serves the router on an ephemeral port and drives it with
//! `reqwest`, the way an external web backend would.

use reqwest::StatusCode;
use serde_json::{json, Value};
use serial_test::serial;

use super::test_helpers::{spawn_http, test_app_state, wait_for_worker, worker_config};

async fn post(client: &reqwest::Client, url: String, body: &Value) -> (StatusCode, Value) {
    let resp = client.post(url).json(body).send().await.expect("request");
    let status = resp.status();
    (status, resp.json().await.expect("json body"))
}

async fn get(client: &reqwest::Client, url: String) -> (StatusCode, Value) {
    let resp = client.get(url).send().await.expect("request");
    let status = resp.status();
    (status, resp.json().await.expect("json body"))
}

#[tokio::test]
async fn health_returns_ok() {
    let state = test_app_state(worker_config(43000, 43002));
    let (base, ct) = spawn_http(state).await;

    let resp = reqwest::get(format!("{base}/health")).await.expect("request");
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.expect("body"), "ok");

    ct.cancel();
}

#[tokio::test]
#[serial]
async fn end_to_end_session_lifecycle() {
    let state = test_app_state(worker_config(43010, 43012));
    let (base, ct) = spawn_http(state.clone()).await;
    let client = reqwest::Client::new();

    // Two sessions fill the pool.
    let (status, a) = post(&client, format!("{base}/start-session"), &json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(a["port"], 43010);
    assert_eq!(a["user_display_name"], "Not logged in");
    let a_id = a["session_id"].as_str().expect("id").to_owned();

    let (_, b) = post(&client, format!("{base}/start-session"), &json!({})).await;
    assert_eq!(b["port"], 43011);
    let b_id = b["session_id"].as_str().expect("id").to_owned();

    let (status, body) = post(&client, format!("{base}/start-session"), &json!({})).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"].is_string());

    let (_, ports) = get(&client, format!("{base}/port-status")).await;
    assert_eq!(ports["reserved"], 2);
    assert_eq!(ports["available"], 0);

    // Commands are routed to each session's own worker.
    wait_for_worker(&state.proxy, 43010).await;
    let (status, reply) = post(&client, format!("{base}/send/{a_id}"), &json!({ "cmd": "status" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["result"]["port"], 43010);

    // Ending A frees its port for the next launch.
    let (_, ended) = post(&client, format!("{base}/end-session/{a_id}"), &json!({})).await;
    assert_eq!(ended["success"], true);
    let (_, again) = post(&client, format!("{base}/end-session/{a_id}"), &json!({})).await;
    assert_eq!(again["success"], false);

    let (_, c) = post(&client, format!("{base}/start-session"), &json!({})).await;
    assert_eq!(c["port"], 43010);

    let (_, sessions) = get(&client, format!("{base}/sessions")).await;
    let listed = sessions.as_object().expect("map");
    assert_eq!(listed.len(), 2);
    assert!(listed.contains_key(&b_id));
    assert!(!listed.contains_key(&a_id));

    ct.cancel();
    state.sessions.shutdown_all().await;
}

#[tokio::test]
#[serial]
async fn user_info_and_session_info() {
    let state = test_app_state(worker_config(43020, 43022));
    let (base, ct) = spawn_http(state.clone()).await;
    let client = reqwest::Client::new();

    let (_, launched) = post(&client, format!("{base}/start-session"), &json!({})).await;
    let id = launched["session_id"].as_str().expect("id").to_owned();

    let (status, body) = post(
        &client,
        format!("{base}/update-user-info/{id}"),
        &json!({ "first_name": "Ada", "last_name": "" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, body) = post(
        &client,
        format!("{base}/update-user-info/{id}"),
        &json!({ "first_name": "Ada", "last_name": "Lovelace" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, info) = post(&client, format!("{base}/session-info/{id}"), &json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(info["user_display_name"], "Ada Lovelace");
    assert_eq!(info["state"], "running");

    ct.cancel();
    state.sessions.shutdown_all().await;
}

#[tokio::test]
#[serial]
async fn memory_is_reported_in_megabytes() {
    let state = test_app_state(worker_config(43030, 43032));
    let (base, ct) = spawn_http(state.clone()).await;
    let client = reqwest::Client::new();

    let (_, launched) = post(&client, format!("{base}/start-session"), &json!({})).await;
    let id = launched["session_id"].as_str().expect("id").to_owned();
    wait_for_worker(&state.proxy, 43030).await;

    let (status, one) = post(&client, format!("{base}/session-memory/{id}"), &json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert!(one["mem_used"].as_f64().expect("mb") > 0.0);

    let (status, all) = get(&client, format!("{base}/session-memory")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(all[&id].as_f64().expect("mb") > 0.0);

    ct.cancel();
    state.sessions.shutdown_all().await;
}

#[tokio::test]
async fn unknown_session_routes_are_not_found() {
    let state = test_app_state(worker_config(43040, 43042));
    let (base, ct) = spawn_http(state).await;
    let client = reqwest::Client::new();

    for path in ["session-info", "session-memory", "send"] {
        let (status, body) =
            post(&client, format!("{base}/{path}/ghost"), &json!({ "cmd": "ping" })).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{path}");
        assert!(body["error"].is_string());
    }

    let (status, _) = post(
        &client,
        format!("{base}/update-user-info/ghost"),
        &json!({ "first_name": "Ada", "last_name": "Lovelace" }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, ended) = post(&client, format!("{base}/end-session/ghost"), &json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ended["success"], false);

    ct.cancel();
}
