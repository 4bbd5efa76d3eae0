//! HTTP surface tests driven through the router with `oneshot`

mod common;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use common::Harness;
use openhouse_rewards::middleware::REQUEST_ID_HEADER;
use openhouse_rewards::provider::ProviderError;
use openhouse_rewards::routes;

fn app(h: &Harness) -> Router {
    routes::router(h.app_state(60))
}

async fn send(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

fn gift_body(amount: i64) -> Value {
    json!({
        "recipient_name": "Dana Visitor",
        "recipient_email": "dana@example.com",
        "brand_code": "amazonUS",
        "amount_in_cents": amount
    })
}

#[tokio::test]
async fn test_health_reports_in_memory_store() {
    let h = Harness::new(0).await;
    let (status, body) = send(app(&h), "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"], "in-memory");
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let h = Harness::new(0).await;
    let response = app(&h)
        .oneshot(
            Request::builder()
                .uri("/health")
                .header(&REQUEST_ID_HEADER, "req-42")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.headers()[&REQUEST_ID_HEADER], "req-42");
}

#[tokio::test]
async fn test_create_gift_and_read_balance() {
    let h = Harness::new(10000).await;
    let uri = format!("/api/agents/{}/gifts", h.agent.id);

    let (status, body) = send(app(&h), "POST", &uri, Some(gift_body(2500))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "created");
    assert_eq!(body["data"]["amount_in_cents"], 2500);
    assert!(body["data"]["claim"]["claim_url"].is_string());

    let (status, body) = send(
        app(&h),
        "GET",
        &format!("/api/agents/{}/balance", h.agent.id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["available_balance_cents"], 7500);
    assert_eq!(body["data"]["low_balance"], false);

    let (_, body) = send(app(&h), "GET", &uri, None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_insufficient_funds_is_payment_required() {
    let h = Harness::new(400).await;
    let (status, body) = send(
        app(&h),
        "POST",
        &format!("/api/agents/{}/gifts", h.agent.id),
        Some(gift_body(500)),
    )
    .await;

    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body["error"]["code"], "INSUFFICIENT_FUNDS");
    assert_eq!(h.balance().await, 400);
}

#[tokio::test]
async fn test_provider_failure_is_bad_gateway() {
    let h = Harness::new(10000).await;
    h.provider
        .fail_links_with(Some(ProviderError::Unavailable("timeout".into())));

    let (status, body) = send(
        app(&h),
        "POST",
        &format!("/api/agents/{}/gifts", h.agent.id),
        Some(gift_body(2500)),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "PROVIDER_ERROR");

    let (status, body) = send(
        app(&h),
        "GET",
        "/api/admin/gifts/unlinked?older_than_minutes=0",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_issuance_is_rate_limited_per_agent() {
    let h = Harness::new(100000).await;
    let app = routes::router(h.app_state(2));
    let uri = format!("/api/agents/{}/gifts", h.agent.id);

    for _ in 0..2 {
        let (status, _) = send(app.clone(), "POST", &uri, Some(gift_body(500))).await;
        assert_eq!(status, StatusCode::CREATED);
    }
    let (status, body) = send(app.clone(), "POST", &uri, Some(gift_body(500))).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"]["code"], "TOO_MANY_REQUESTS");
    assert_eq!(h.balance().await, 99000);

    // Reads are not limited.
    let (status, _) = send(app, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_credit_then_history() {
    let h = Harness::new(0).await;
    let (status, body) = send(
        app(&h),
        "POST",
        &format!("/api/agents/{}/credits", h.agent.id),
        Some(json!({
            "amount_cents": 5000,
            "description": "Card top-up",
            "created_by_id": h.agent.id
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["balance_after"], 5000);

    let (status, _) = send(
        app(&h),
        "POST",
        &format!("/api/agents/{}/credits", h.agent.id),
        Some(json!({
            "amount_cents": 0,
            "description": "nothing",
            "created_by_id": h.agent.id
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = send(
        app(&h),
        "GET",
        &format!("/api/agents/{}/transactions", h.agent.id),
        None,
    )
    .await;
    let entries = body["data"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["type"], "credit");
}

#[tokio::test]
async fn test_lead_capture_then_process() {
    let h = Harness::new(5000).await;
    let house = h.gift_enabled_house("starbucksUS", 1000).await;

    let (status, body) = send(
        app(&h),
        "POST",
        &format!("/api/open-houses/{}/leads", house.id),
        Some(json!({ "name": "Dana Visitor", "email": "dana@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["pending_gift"]["status"], "pending");
    let gift_id = body["data"]["pending_gift"]["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        app(&h),
        "POST",
        &format!("/api/gifts/{}/process", gift_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["outcome"], "sent");
    assert_eq!(body["data"]["balance_after"], 4000);
}

#[tokio::test]
async fn test_cancel_and_unknown_gift() {
    let h = Harness::new(10000).await;
    let (_, created) = send(
        app(&h),
        "POST",
        &format!("/api/agents/{}/gifts", h.agent.id),
        Some(gift_body(2500)),
    )
    .await;
    let gift_id = created["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        app(&h),
        "POST",
        &format!("/api/gifts/{}/cancel", gift_id),
        Some(json!({ "actor_id": h.agent.id })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "cancelled");
    assert_eq!(body["data"]["refunded"], true);
    assert_eq!(h.balance().await, 10000);

    let (status, _) = send(
        app(&h),
        "GET",
        &format!("/api/gifts/{}", uuid::Uuid::new_v4()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_catalog_respects_allow_list() {
    let h = Harness::new(0).await;
    h.store
        .set_enabled_brand_codes("appDefaults", vec!["amazonUS".into()])
        .await;

    let (status, body) = send(app(&h), "GET", "/api/brands", None).await;
    assert_eq!(status, StatusCode::OK);
    let brands = body["data"].as_array().unwrap();
    assert_eq!(brands.len(), 1);
    assert_eq!(brands[0]["brand_code"], "amazonUS");

    let (status, body) = send(app(&h), "GET", "/api/regions", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["code"], "us");
}

#[tokio::test]
async fn test_admin_reconciliation_and_funds() {
    let h = Harness::new(0).await;

    let (status, body) = send(app(&h), "GET", "/api/admin/reconciliation?limit=10", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["rewards_checked"], 0);

    let (status, body) = send(app(&h), "GET", "/api/admin/provider/funds", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["balance_in_cents"], 1_000_000);
}
