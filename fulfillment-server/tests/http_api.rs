//! HTTP surface, driven through the router without a socket

mod common;

use axum::Router;
use axum::body::Body;
use common::{HOUR, T, TestClock, db_path, order_json};
use fulfillment_server::api::build_router;
use fulfillment_server::{Config, OrderStorage, ServerState};
use http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

struct TestApp {
    router: Router,
    clock: TestClock,
    _dir: tempfile::TempDir,
}

impl TestApp {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::with_overrides(dir.path().to_string_lossy(), 0);
        let storage = OrderStorage::open(db_path(dir.path())).unwrap();
        let clock = TestClock::at(T);
        let state = ServerState::new(config, storage, clock.clock());
        Self {
            router: build_router(state),
            clock,
            _dir: dir,
        }
    }

    async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn create(&self, id: i64, payment_method: &str) {
        let (status, _) = self
            .send(Method::POST, "/api/orders", Some(order_json(id, payment_method)))
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }
}

#[tokio::test]
async fn ingest_and_read_back() {
    let app = TestApp::new();

    let (status, order) = app
        .send(Method::POST, "/api/orders", Some(order_json(10, "GCash")))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(order["status"], "Processing");
    assert_eq!(order["in_sales_report"], true);
    assert_eq!(order["revision"], 0);

    let (status, body) = app
        .send(Method::POST, "/api/orders", Some(order_json(10, "GCash")))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], 4005);

    let (status, order) = app.send(Method::GET, "/api/orders/10", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["payment_method"], "GCash");
    assert_eq!(order["city"], "Cebu City");

    let (status, items) = app.send(Method::GET, "/api/orders/10/products", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(items[0]["name"], "Rice Cooker");

    let (status, body) = app.send(Method::GET, "/api/orders/999", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 4001);
}

#[tokio::test]
async fn invalid_payload_is_rejected() {
    let app = TestApp::new();
    let mut payload = order_json(11, "Card");
    payload["full_name"] = json!("  ");

    let (status, body) = app.send(Method::POST, "/api/orders", Some(payload)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 2);
}

#[tokio::test]
async fn status_changes_follow_the_table() {
    let app = TestApp::new();
    app.create(1, "Cash on Delivery").await;

    let (status, change) = app
        .send(
            Method::PUT,
            "/api/orders/1/status",
            Some(json!({ "status": "Shipped" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(change["order"]["status"], "Shipped");
    assert_eq!(change["order"]["revision"], 1);
    assert_eq!(change["scheduled_jobs"], json!([]));

    let (status, body) = app
        .send(
            Method::PUT,
            "/api/orders/1/status",
            Some(json!({ "status": "Processing" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 4002);

    // stale revision
    let (status, body) = app
        .send(
            Method::PUT,
            "/api/orders/1/status",
            Some(json!({ "status": "Delivered", "expected_revision": 0 })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], 4004);

    // cancel carries the same revision check
    let (status, body) = app
        .send(Method::PUT, "/api/orders/1/cancel?expected_revision=0", None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], 4004);

    let (status, change) = app
        .send(Method::PUT, "/api/orders/1/cancel?expected_revision=1", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(change["order"]["status"], "Cancelled");
    assert_eq!(change["scheduled_jobs"].as_array().map(Vec::len), Some(1));

    let (status, body) = app
        .send(
            Method::PUT,
            "/api/orders/1/date",
            Some(json!({ "order_date": T - 24 * HOUR })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 4003);
}

#[tokio::test]
async fn edit_order_date_keeps_status() {
    let app = TestApp::new();
    app.create(2, "Card").await;

    let (status, order) = app
        .send(
            Method::PUT,
            "/api/orders/2/date",
            Some(json!({ "order_date": T - 24 * HOUR })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["order_date"], T - 24 * HOUR);
    assert_eq!(order["status"], "Processing");
    assert_eq!(order["status_changed_at"], T);
}

#[tokio::test]
async fn gcash_refund_needs_a_valid_number() {
    let app = TestApp::new();
    app.create(3, "GCash").await;

    // not returned yet
    let (status, body) = app
        .send(
            Method::POST,
            "/api/orders/3/resolve-return",
            Some(json!({ "outcome": "refund", "phone_number": "09171234567" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 4003);

    let (status, change) = app
        .send(
            Method::POST,
            "/api/orders/3/return",
            Some(json!({ "reason": "Lid is cracked" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(change["order"]["status"], "Returned");
    assert_eq!(change["order"]["return_reason"], "Lid is cracked");

    let (status, body) = app
        .send(
            Method::POST,
            "/api/orders/3/resolve-return",
            Some(json!({ "outcome": "refund", "phone_number": "12345" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 5001);

    let (_, order) = app.send(Method::GET, "/api/orders/3", None).await;
    assert_eq!(order["status"], "Returned");

    // return outcomes are not reachable through a plain status change
    let (status, _) = app
        .send(
            Method::PUT,
            "/api/orders/3/status",
            Some(json!({ "status": "Refunded" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, change) = app
        .send(
            Method::POST,
            "/api/orders/3/resolve-return",
            Some(json!({ "outcome": "refund", "phone_number": "09171234567" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(change["order"]["status"], "Refunded");
}

#[tokio::test]
async fn return_queue_lists_open_returns_first() {
    let app = TestApp::new();
    app.create(4, "Card").await;
    app.create(5, "Card").await;
    app.create(6, "Card").await;

    app.send(
        Method::POST,
        "/api/orders/4/return",
        Some(json!({ "reason": "Wrong color" })),
    )
    .await;
    app.clock.set(T + HOUR);
    app.send(Method::POST, "/api/orders/5/return", Some(json!({})))
        .await;
    let (status, _) = app
        .send(
            Method::POST,
            "/api/orders/4/resolve-return",
            Some(json!({ "outcome": "cancel_return" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, queue) = app.send(Method::GET, "/api/return-requests", None).await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<i64> = queue
        .as_array()
        .unwrap()
        .iter()
        .map(|order| order["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![5, 4]);
    assert_eq!(queue[0]["return_requested_at"], T + HOUR);
    assert_eq!(queue[0]["ordered_products"], "• Rice Cooker (1)");
    assert_eq!(queue[1]["status"], "Return Cancelled");
    assert_eq!(queue[1]["return_reason"], "Wrong color");
}

#[tokio::test]
async fn sales_report_visibility() {
    let app = TestApp::new();
    app.create(7, "Card").await;
    app.create(8, "Card").await;

    let (status, order) = app
        .send(Method::DELETE, "/api/orders/7/salesreport", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["in_sales_report"], false);

    let (_, listed) = app.send(Method::GET, "/api/orders", None).await;
    assert_eq!(listed.as_array().map(Vec::len), Some(1));
    assert_eq!(listed[0]["id"], 8);

    let (_, everything) = app
        .send(Method::GET, "/api/orders?include_hidden=true", None)
        .await;
    assert_eq!(everything.as_array().map(Vec::len), Some(2));

    let (_, delivered) = app
        .send(Method::GET, "/api/orders?status=Delivered", None)
        .await;
    assert_eq!(delivered, json!([]));

    let (status, body) = app
        .send(Method::DELETE, "/api/orders/99/salesreport", None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 4001);
}

#[tokio::test]
async fn job_administration() {
    let app = TestApp::new();
    app.create(20, "Card").await;
    app.create(21, "Card").await;
    app.send(Method::PUT, "/api/orders/20/cancel", None).await;
    app.send(
        Method::PUT,
        "/api/orders/21/status",
        Some(json!({ "status": "Delivered" })),
    )
    .await;

    let (status, jobs) = app.send(Method::GET, "/api/jobs", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(jobs.as_array().map(Vec::len), Some(2));

    let (_, jobs) = app.send(Method::GET, "/api/jobs?order_id=21", None).await;
    assert_eq!(jobs[0]["kind"], "HIDE_FROM_REPORT");

    let (status, body) = app
        .send(Method::DELETE, "/api/orders/20/jobs/bogus", None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 6002);

    let (status, _) = app
        .send(Method::DELETE, "/api/orders/20/jobs/purge", None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .send(Method::DELETE, "/api/orders/20/jobs/PURGE", None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 6001);

    // nothing due yet
    let (status, report) = app.send(Method::POST, "/api/jobs/run", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["executed"], 0);

    app.clock.set(T + 9 * HOUR);
    let (_, report) = app.send(Method::POST, "/api/jobs/run", None).await;
    assert_eq!(report["executed"], 1);

    // purge was withdrawn, so the cancelled order is still there
    let (status, _) = app.send(Method::GET, "/api/orders/20", None).await;
    assert_eq!(status, StatusCode::OK);
    let (_, order) = app.send(Method::GET, "/api/orders/21", None).await;
    assert_eq!(order["in_sales_report"], false);

    let (_, history) = app.send(Method::GET, "/api/jobs?all=true", None).await;
    assert_eq!(history.as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn health_reports_store_stats() {
    let app = TestApp::new();
    app.create(30, "Card").await;

    let (status, body) = app.send(Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = app.send(Method::GET, "/health/detailed", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["database"]["status"], "ok");
    assert_eq!(body["stats"]["order_count"], 1);
    assert_eq!(body["stats"]["line_item_count"], 1);
}
