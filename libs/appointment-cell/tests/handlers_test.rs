mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use appointment_cell::router::appointment_routes;
use common::{harness, Harness};
use shared_utils::test_utils::TestConfig;

fn app(h: &Harness) -> Router {
    appointment_routes(h.engine.clone())
}

async fn send(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    let request = match body {
        Some(body) => request.body(Body::from(body.to_string())).unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

#[tokio::test]
async fn test_list_slots() {
    let h = harness(TestConfig::with_capacity(2));

    let (status, json) = send(app(&h), "GET", "/slots?from=2024-03-01", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"], 4);
    assert_eq!(json["slots"][0]["id"], "2024-03-01T09:00");
    assert_eq!(json["slots"][0]["remaining"], 2);
}

#[tokio::test]
async fn test_list_slots_rejects_reversed_range() {
    let h = harness(TestConfig::default());

    let (status, _) = send(app(&h), "GET", "/slots?from=2024-03-02&to=2024-03-01", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_book_then_full_slot_offers_waitlist() {
    let h = harness(TestConfig::default());
    let body = |patient: &str| json!({ "patient_id": patient, "slot_id": "2024-03-01T09:00" });

    let (status, json) = send(app(&h), "POST", "/appointments", Some(body("+52 1 55 0000 0001"))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["success"], true);
    assert_eq!(json["appointment"]["status"], "confirmed");
    assert_eq!(json["appointment"]["patient_id"], "+5215500000001");

    let (status, json) = send(app(&h), "POST", "/appointments", Some(body("+5215500000002"))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["waitlist_offer"]["slot_id"], "2024-03-01T09:00");
    assert_eq!(json["waitlist_offer"]["date"], "2024-03-01");
}

#[tokio::test]
async fn test_book_rejects_bad_input() {
    let h = harness(TestConfig::default());

    let (status, _) = send(
        app(&h),
        "POST",
        "/appointments",
        Some(json!({ "patient_id": "   ", "slot_id": "2024-03-01T09:00" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        app(&h),
        "POST",
        "/appointments",
        Some(json!({ "patient_id": "+5215500000001", "slot_id": "tomorrow" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        app(&h),
        "POST",
        "/appointments",
        Some(json!({ "patient_id": "+5215500000001", "slot_id": "2024-03-01T09:10" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_appointment_lifecycle_endpoints() {
    let h = harness(TestConfig::default());

    let (_, json) = send(
        app(&h),
        "POST",
        "/appointments",
        Some(json!({ "patient_id": "+5215500000001", "slot_id": "2024-03-01T09:00" })),
    )
    .await;
    let id = json["appointment"]["id"].as_str().unwrap().to_string();

    let (status, json) = send(app(&h), "GET", &format!("/appointments/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["slot_id"], "2024-03-01T09:00");

    let (status, json) = send(
        app(&h),
        "POST",
        &format!("/appointments/{}/reschedule", id),
        Some(json!({ "new_slot_id": "2024-03-01T10:00" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["appointment"]["slot_id"], "2024-03-01T10:00");
    assert_eq!(json["previous"]["status"], "cancelled");
    let new_id = json["appointment"]["id"].as_str().unwrap().to_string();

    let (status, _) = send(app(&h), "POST", &format!("/appointments/{}/cancel", new_id), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(app(&h), "POST", &format!("/appointments/{}/cancel", new_id), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, json) = send(app(&h), "GET", "/patients/+5215500000001/appointments", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"], 2);
}

#[tokio::test]
async fn test_unknown_appointment_is_not_found() {
    let h = harness(TestConfig::default());

    let uri = format!("/appointments/{}", uuid::Uuid::new_v4());
    let (status, _) = send(app(&h), "GET", &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_waitlist_endpoints() {
    let h = harness(TestConfig::default());

    let (status, _) = send(
        app(&h),
        "POST",
        "/waitlist",
        Some(json!({ "patient_id": "+5215500000002" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        app(&h),
        "POST",
        "/appointments",
        Some(json!({ "patient_id": "+5215500000001", "slot_id": "2024-03-01T09:00" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let join = json!({ "patient_id": "+5215500000002", "slot_id": "2024-03-01T09:00" });
    let (status, json) = send(app(&h), "POST", "/waitlist", Some(join.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["entry"]["status"], "waiting");
    assert_eq!(json["entry"]["target"]["kind"], "slot");
    let entry_id = json["entry"]["id"].as_str().unwrap().to_string();

    let (status, _) = send(app(&h), "POST", "/waitlist", Some(join)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, json) = send(app(&h), "GET", "/patients/+5215500000002/waitlist", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"], 1);

    let (status, json) = send(app(&h), "DELETE", &format!("/waitlist/{}", entry_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["entry"]["status"], "expired");
}

#[tokio::test]
async fn test_waitlist_for_day_with_free_slots_is_refused() {
    let h = harness(TestConfig::default());

    let (status, _) = send(
        app(&h),
        "POST",
        "/waitlist",
        Some(json!({ "patient_id": "+5215500000002", "date": "2024-03-01" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, json) = send(app(&h), "GET", "/patients/+5215500000002/waitlist", None).await;
    assert_eq!(json["total"], 0);

    // Nothing was enrolled, so the slot is still bookable by anyone.
    let (status, _) = send(
        app(&h),
        "POST",
        "/appointments",
        Some(json!({ "patient_id": "+5215500000003", "slot_id": "2024-03-01T09:00" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_patient_messages_endpoint() {
    let h = harness(TestConfig::default());

    send(
        app(&h),
        "POST",
        "/appointments",
        Some(json!({ "patient_id": "+5215500000001", "slot_id": "2024-03-01T09:00" })),
    )
    .await;

    let (status, json) = send(app(&h), "GET", "/patients/+5215500000001/messages", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"], 1);
    assert_eq!(json["messages"][0]["kind"], "confirmation");
    assert_eq!(json["messages"][0]["outcome"]["status"], "delivered");
    assert_eq!(json["messages"][0]["outcome"]["receipt"]["mode"], "mock");
}
