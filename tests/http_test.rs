mod common;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::Harness;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use shortlet::interfaces::http::{AppState, router};
use tower::ServiceExt;
use uuid::Uuid;

const TOKEN: &str = "internal-secret";

fn app(h: &Harness) -> Router {
    router(AppState::new(h.ctx.clone(), Some(TOKEN.to_string())))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn create_request(user: Option<Uuid>, listing: Uuid) -> Request<Body> {
    let mut builder = Request::post("/bookings").header("content-type", "application/json");
    if let Some(user) = user {
        builder = builder.header("x-user-id", user.to_string());
    }
    let body = json!({
        "listingId": listing,
        "checkIn": "2024-04-10",
        "checkOut": "2024-04-13",
        "serviceFee": 20
    });
    builder.body(Body::from(body.to_string())).unwrap()
}

#[tokio::test]
async fn test_booking_endpoints() {
    let h = Harness::new().await;
    let app = app(&h);
    let guest = h.add_guest().await;
    let rival = h.add_guest().await;

    let (status, body) = send(&app, create_request(None, h.listing_id)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");

    let (status, created) = send(&app, create_request(Some(guest), h.listing_id)).await;
    assert_eq!(status, StatusCode::CREATED);
    let reference = created["reference"].as_str().unwrap().to_string();
    assert!(reference.starts_with("BOOK-"));
    assert!(created["authorizationUrl"].as_str().is_some());

    let (status, body) = send(&app, create_request(Some(rival), h.listing_id)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT");
    assert!(body["message"].as_str().unwrap().contains("minute"));

    let list = Request::get("/bookings")
        .header("x-user-id", guest.to_string())
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, list).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let booking_id = created["booking"]["id"].as_str().unwrap();
    let verify = Request::get(format!("/bookings/{booking_id}/verify?reference={reference}"))
        .header("x-user-id", guest.to_string())
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, verify).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "CONFIRMED");

    let steal = Request::delete(format!("/bookings/{booking_id}"))
        .header("x-user-id", rival.to_string())
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, steal).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_status_and_payout_require_privileges() {
    let h = Harness::new().await;
    let app = app(&h);
    let guest = h.add_guest().await;
    let (_, created) = send(&app, create_request(Some(guest), h.listing_id)).await;
    let booking_id = created["booking"]["id"].as_str().unwrap();

    let patch = |token: &str| {
        Request::patch(format!("/bookings/{booking_id}/status"))
            .header("content-type", "application/json")
            .header("x-internal-token", token)
            .body(Body::from(json!({ "status": "CANCELLED" }).to_string()))
            .unwrap()
    };
    let (status, _) = send(&app, patch("wrong")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, body) = send(&app, patch(TOKEN)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "CANCELLED");

    let payout = |headers: (&str, String)| {
        Request::post("/payouts")
            .header("content-type", "application/json")
            .header(headers.0, headers.1)
            .body(Body::from(
                json!({
                    "vendorId": h.host_id,
                    "amount": 5000,
                    "accountNumber": "0123456789",
                    "bankCode": "058"
                })
                .to_string(),
            ))
            .unwrap()
    };
    let (status, _) = send(&app, payout(("x-user-id", guest.to_string()))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, body) = send(&app, payout(("x-internal-token", TOKEN.to_string()))).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], "PENDING");
}

#[tokio::test]
async fn test_webhook_endpoint() {
    let h = Harness::new().await;
    let app = app(&h);
    let guest = h.add_guest().await;
    let (_, created) = send(&app, create_request(Some(guest), h.listing_id)).await;
    let reference = created["reference"].as_str().unwrap();
    let (body, signature) = h.charge_webhook("charge.success", "evt-http-1", reference);

    let hook = |provider: &str, signature: &str| {
        Request::post(format!("/webhook/{provider}"))
            .header("content-type", "application/json")
            .header("x-mock-signature", signature)
            .body(Body::from(body.clone()))
            .unwrap()
    };

    let (status, ack) = send(&app, hook("mock", &signature)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack, json!({ "result": "processed", "outcome": "applied" }));

    let (status, ack) = send(&app, hook("mock", &signature)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack, json!({ "result": "duplicate" }));

    let (status, _) = send(&app, hook("mock", "00ff")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, hook("stripe", &signature)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_points_endpoints() {
    let h = Harness::new().await;
    let app = app(&h);
    let guest = h.add_guest().await;

    let purchase = Request::post("/points/purchase")
        .header("content-type", "application/json")
        .header("x-user-id", guest.to_string())
        .body(Body::from(json!({ "amount": 500 }).to_string()))
        .unwrap();
    let (status, body) = send(&app, purchase).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["points"], 5);

    let balance = Request::get("/points")
        .header("x-user-id", guest.to_string())
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, balance).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["points"], 0);

    let credit = |headers: (&str, String)| {
        Request::post("/points/add")
            .header("content-type", "application/json")
            .header(headers.0, headers.1)
            .body(Body::from(
                json!({ "userId": guest, "points": 25, "reason": "support" }).to_string(),
            ))
            .unwrap()
    };
    let (status, _) = send(&app, credit(("x-user-id", guest.to_string()))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, body) = send(&app, credit(("x-internal-token", TOKEN.to_string()))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["points"], 25);
}
