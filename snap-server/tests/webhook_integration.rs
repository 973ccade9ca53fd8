//! Integration tests for POST /api/razorpay/webhook.

mod common;

use common::server::WEBHOOK_SECRET;
use common::TestServer;
use snap_renderer::Tier;
use snap_server::subscription::SubscriptionStatus;
use snap_server::webhook::{sign, SIGNATURE_HEADER};
use snap_server::ServerConfig;

fn event(name: &str) -> Vec<u8> {
    serde_json::json!({
        "entity": "event",
        "event": name,
        "payload": {
            "subscription": {
                "entity": {
                    "id": "sub_int",
                    "plan_id": "plan_monthly",
                    "notes": { "user_id": "user_int" }
                }
            },
            "payment": {
                "entity": { "id": "pay_int", "amount": 29900, "currency": "INR" }
            }
        }
    })
    .to_string()
    .into_bytes()
}

async fn post(
    server: &TestServer,
    body: Vec<u8>,
    signature: Option<String>,
) -> (u16, serde_json::Value) {
    let mut request = reqwest::Client::new()
        .post(server.url("/api/razorpay/webhook"))
        .header("content-type", "application/json")
        .body(body);
    if let Some(sig) = signature {
        request = request.header(SIGNATURE_HEADER, sig);
    }
    let resp = request.send().await.expect("request");
    let status = resp.status().as_u16();
    (status, resp.json().await.expect("json body"))
}

#[tokio::test]
async fn test_signed_event_is_received() {
    let dir = tempfile::tempdir().expect("tempdir");
    let server = TestServer::start(dir.path()).await;

    let body = event("subscription.activated");
    let sig = sign(WEBHOOK_SECRET, &body);
    let (status, json) = post(&server, body, Some(sig)).await;

    assert_eq!(status, 200);
    assert_eq!(json["received"], true);
    let record = server.ledger().subscription("sub_int").expect("record");
    assert_eq!(record.status, SubscriptionStatus::Active);
    assert_eq!(server.ledger().tier_for("user_int"), Tier::Pro);

    server.shutdown().await;
}

#[tokio::test]
async fn test_wrong_signature_is_400() {
    let dir = tempfile::tempdir().expect("tempdir");
    let server = TestServer::start(dir.path()).await;

    let body = event("subscription.activated");
    let forged = sign("not-the-secret", &body);
    let (status, json) = post(&server, body.clone(), Some(forged)).await;
    assert_eq!(status, 400);
    assert!(json["error"].is_string());

    let (status, _) = post(&server, body, None).await;
    assert_eq!(status, 400);
    assert!(server.ledger().is_empty());

    server.shutdown().await;
}

#[tokio::test]
async fn test_tampered_body_is_400() {
    let dir = tempfile::tempdir().expect("tempdir");
    let server = TestServer::start(dir.path()).await;

    let sig = sign(WEBHOOK_SECRET, &event("subscription.activated"));
    let (status, _) = post(&server, event("subscription.cancelled"), Some(sig)).await;
    assert_eq!(status, 400);

    server.shutdown().await;
}

#[tokio::test]
async fn test_missing_secret_is_500() {
    let dir = tempfile::tempdir().expect("tempdir");
    let server = TestServer::start_with(ServerConfig::new(dir.path())).await;

    let body = event("subscription.activated");
    let sig = sign(WEBHOOK_SECRET, &body);
    let (status, json) = post(&server, body, Some(sig)).await;
    assert_eq!(status, 500);
    assert!(json["error"].as_str().expect("error").contains("secret"));

    server.shutdown().await;
}

#[tokio::test]
async fn test_empty_secret_is_500() {
    let dir = tempfile::tempdir().expect("tempdir");
    let server =
        TestServer::start_with(ServerConfig::new(dir.path()).with_webhook_secret("")).await;

    let body = event("subscription.activated");
    let sig = sign("", &body);
    let (status, _) = post(&server, body, Some(sig)).await;
    assert_eq!(status, 500);
    assert!(server.ledger().is_empty());

    server.shutdown().await;
}

#[tokio::test]
async fn test_charge_then_halt() {
    let dir = tempfile::tempdir().expect("tempdir");
    let server = TestServer::start(dir.path()).await;

    for name in ["subscription.charged", "payment.failed", "subscription.halted"] {
        let body = event(name);
        let sig = sign(WEBHOOK_SECRET, &body);
        let (status, _) = post(&server, body, Some(sig)).await;
        assert_eq!(status, 200, "{name}");
    }

    let record = server.ledger().subscription("sub_int").expect("record");
    assert_eq!(record.status, SubscriptionStatus::Halted);
    assert_eq!(record.charges, 1);
    assert_eq!(server.ledger().payments().len(), 2);
    assert_eq!(server.ledger().tier_for("user_int"), Tier::Free);

    server.shutdown().await;
}

#[tokio::test]
async fn test_malformed_signed_body_is_500() {
    let dir = tempfile::tempdir().expect("tempdir");
    let server = TestServer::start(dir.path()).await;

    let body = b"not json".to_vec();
    let sig = sign(WEBHOOK_SECRET, &body);
    let (status, json) = post(&server, body, Some(sig)).await;
    assert_eq!(status, 500);
    assert!(json["error"].is_string());

    server.shutdown().await;
}
