//! HTTP surface over the in-memory backend.
//!
//! Run with: `cargo test --test api`

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use seat_ledger::config::Config;
use seat_ledger::controllers;
use seat_ledger::store::{InMemoryStore, StoreBackend};
use seat_ledger::AppState;

fn app() -> Router {
    let state = AppState::with_store(StoreBackend::Memory(InMemoryStore::new()), Config::in_memory());
    Router::new().nest("/api", controllers::routes()).with_state(state)
}

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn new_trip(app: &Router) -> String {
    let layout = serde_json::to_value(common::sleeper_layout()).unwrap();
    let (status, trip) = call(
        app,
        Method::POST,
        "/api/trips",
        Some(json!({
            "route": "Hanoi - Sapa",
            "departure_date": "2025-03-14",
            "license_plate": "29B-123.45",
            "layout": layout,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    trip["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn paid_booking_round_trip() {
    let app = app();
    let trip_id = new_trip(&app).await;

    let (status, created) = call(
        &app,
        Method::POST,
        "/api/bookings",
        Some(json!({
            "items": [{
                "trip_id": trip_id,
                "tickets": [
                    { "seat_id": "F1-R1-C1", "price": 100.0 },
                    { "seat_id": "F1-R1-C2", "price": 200.0 }
                ]
            }],
            "passenger": { "name": "Nguyen Van An", "phone": "0912345678" },
            "status": "payment"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["booking"]["total_price"], json!(300.0));
    let booking_id = created["booking"]["id"].as_str().unwrap().to_string();

    let (status, view) = call(&app, Method::GET, &format!("/api/bookings/{booking_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["status"], json!("payment"));
    assert_eq!(view["total_paid"], json!(300.0));

    let (_, trip) = call(&app, Method::GET, &format!("/api/trips/{trip_id}"), None).await;
    let sold = trip["seats"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|s| s["status"] == json!("sold"))
        .count();
    assert_eq!(sold, 2);

    let (status, refunded) = call(
        &app,
        Method::PATCH,
        &format!("/api/bookings/{booking_id}/tickets"),
        Some(json!({ "trip_id": trip_id, "seat_id": "F1-R1-C2", "action": "REFUND" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(refunded["payment"]["cash_amount"], json!(-200.0));
    assert_eq!(refunded["booking"]["total_tickets"], json!(1));

    let (status, audit) = call(&app, Method::GET, &format!("/api/bookings/{booking_id}/audit"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(audit.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn errors_map_to_status_codes() {
    let app = app();
    let trip_id = new_trip(&app).await;

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/bookings",
        Some(json!({
            "items": [{ "trip_id": trip_id, "seat_ids": ["F1-R1-C1"] }],
            "passenger": { "name": "Le Thi Hoa" },
            "status": "payment"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], json!("MISSING_TICKET_DETAIL"));

    let missing = uuid::Uuid::new_v4();
    let (status, body) = call(&app, Method::GET, &format!("/api/bookings/{missing}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], json!("BOOKING_NOT_FOUND"));

    let other_trip = new_trip(&app).await;
    let (status, body) = call(
        &app,
        Method::POST,
        "/api/seats/swap",
        Some(json!({
            "from": { "trip_id": trip_id, "seat_id": "F1-R1-C1" },
            "to": { "trip_id": other_trip, "seat_id": "F1-R1-C1" }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], json!("CROSS_TRIP_SWAP"));

    let (status, _) = call(
        &app,
        Method::PATCH,
        &format!("/api/trips/{trip_id}/seats/not-a-seat/label"),
        Some(json!({ "label": "VIP" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn maintenance_endpoints_return_reports() {
    let app = app();
    new_trip(&app).await;

    let (status, seats) = call(&app, Method::POST, "/api/maintenance/seat-sync", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(seats["conflict_count"], json!(0));

    let (status, payments) = call(&app, Method::POST, "/api/maintenance/payment-cleanup", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payments["deleted_count"], json!(0));

    let (status, audit) = call(&app, Method::GET, "/api/audit", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(audit.as_array().unwrap().len(), 1);
}
