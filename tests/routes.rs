// tests/routes.rs

mod support;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::Value;
use society_backend::build_router;
use tower::ServiceExt;

fn app() -> Router {
    build_router(support::lazy_state())
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn form_post(uri: &str, body: &'static str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn health_is_public() {
    let response = app()
        .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn protected_route_without_token_is_unauthorized() {
    let response = app()
        .oneshot(
            Request::builder()
                .uri("/api/bills/society/7")
                .header("x-society-id", "7")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["error"], "Invalid token");
}

#[tokio::test]
async fn forged_token_is_unauthorized() {
    let response = app()
        .oneshot(
            Request::builder()
                .uri("/api/payments/3")
                .header(header::AUTHORIZATION, "Bearer not.a.jwt")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn society_scoped_route_requires_society_header() {
    let response = app()
        .oneshot(
            Request::builder()
                .uri("/api/bills/society/7")
                .header(header::AUTHORIZATION, format!("Bearer {}", support::token(1, Some(7))))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

fn authed_get(uri: &str, society_id: Option<i64>) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", support::token(1, society_id)))
        .header("x-society-id", "8")
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn society_header_must_match_the_token_society() {
    let response = app()
        .oneshot(authed_get("/api/bills/society/8", Some(7)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app()
        .oneshot(authed_get("/api/flats/3/payer", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn other_society_history_is_forbidden() {
    for uri in [
        "/api/payments/society/8",
        "/api/subscriptions/society/8",
        "/api/registration-payments/history?societyId=8",
    ] {
        let response = app().oneshot(authed_get(uri, Some(7))).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{uri}");
    }
}

#[tokio::test]
async fn subscription_for_another_society_is_forbidden() {
    let payload = serde_json::json!({
        "societyId": 8,
        "email": "admin@lakeview.test",
        "amount": "575.00"
    });

    let response = app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/subscriptions/initiate")
                .header(header::AUTHORIZATION, format!("Bearer {}", support::token(1, Some(7))))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn callback_without_tran_id_redirects_to_fail_page() {
    let response = app()
        .oneshot(form_post("/api/payments/success", "status=VALID&val_id=V1"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    let location = response.headers()[header::LOCATION].to_str().unwrap();
    assert!(location.starts_with("https://app.test/payment/fail?error="));
    assert!(location.contains("tran_id"));
}

#[tokio::test]
async fn validated_callback_without_val_id_redirects_to_fail_page() {
    let response = app()
        .oneshot(form_post("/api/payments/cancelled", "tran_id=TXN-1&status=VALID"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    let location = response.headers()[header::LOCATION].to_str().unwrap();
    assert!(location.starts_with("https://app.test/payment/fail?error="));
}

#[tokio::test]
async fn callback_for_unconfigured_flow_answers_with_json() {
    let response = app()
        .oneshot(form_post("/api/subscriptions/success", "status=FAILED"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert!(body["error"].as_str().unwrap().contains("configuration missing"));
}

#[tokio::test]
async fn registration_quote_is_public() {
    let response = app()
        .oneshot(
            Request::builder()
                .uri("/api/registration-payments/quote")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["basePrice"], "500");
    assert_eq!(body["tax"], "75.00");
    assert_eq!(body["totalPrice"], "575.00");
}

#[tokio::test]
async fn registration_with_zero_amount_is_rejected_before_any_write() {
    let payload = serde_json::json!({
        "email": "admin@lakeview.test",
        "amount": "0",
        "buildingInfo": {
            "name": "Lake View",
            "address": "Road 4",
            "city": "Dhaka",
            "state": "Dhaka",
            "country": "BD",
            "postalCode": "1207",
            "flats": [{ "number": "A-101", "flatType": "TWO_BHK" }],
            "userEmails": ["a@lakeview.test"]
        }
    });

    let response = app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/registration-payments/initiate")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await["error"],
        "Payment amount must be greater than zero"
    );
}

#[tokio::test]
async fn registration_history_needs_a_filter() {
    let response = app()
        .oneshot(
            Request::builder()
                .uri("/api/registration-payments/history")
                .header(header::AUTHORIZATION, format!("Bearer {}", support::token(1, None)))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn openapi_document_is_served() {
    let response = app()
        .oneshot(Request::builder().uri("/api-docs/openapi.json").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let doc = json_body(response).await;
    assert!(doc["paths"]["/api/bills/generate"].is_object());
}
