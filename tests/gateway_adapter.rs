// tests/gateway_adapter.rs

use std::time::Duration;

use reqwest::Url;
use rust_decimal::Decimal;
use serde_json::json;
use society_backend::{
    config::GatewayConfig,
    services::gateway::{
        CallbackUrls, GatewayError, InitiationRequest, PaymentGateway, SslCommerzGateway,
    },
};
use wiremock::{
    matchers::{body_string_contains, method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

fn gateway(server: &MockServer) -> SslCommerzGateway {
    let base = Url::parse(&server.uri()).unwrap();
    let config = GatewayConfig {
        store_id: "teststore".into(),
        store_password: "teststore@ssl".into(),
        initiation_url: base.join("/gwprocess/v4/api.php").unwrap(),
        validation_url: base.join("/validator/api/validationserverAPI.php").unwrap(),
        timeout_secs: 1,
        currency: "BDT".into(),
    };
    SslCommerzGateway::new(&config).unwrap()
}

fn request() -> InitiationRequest {
    let u = |s: &str| Url::parse(s).unwrap();
    InitiationRequest {
        tran_id: "TXN-0001".into(),
        amount: Decimal::new(50000, 2),
        currency: "BDT".into(),
        customer_name: "Rahim Uddin".into(),
        customer_email: "rahim@example.com".into(),
        product_name: "Maintenance bill #1".into(),
        callbacks: CallbackUrls {
            success: u("https://api.test/api/payments/success"),
            fail: u("https://api.test/api/payments/fail"),
            cancel: u("https://api.test/api/payments/cancel"),
        },
    }
}

#[tokio::test]
async fn initiation_returns_gateway_page() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/gwprocess/v4/api.php"))
        .and(body_string_contains("tran_id=TXN-0001"))
        .and(body_string_contains("store_id=teststore"))
        .and(body_string_contains("total_amount=500.00"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "SUCCESS",
            "GatewayPageURL": "https://sandbox.test/EasyCheckOut/abc",
            "sessionkey": "abc"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let session = gateway(&server).initiate(&request()).await.unwrap();
    assert_eq!(session.gateway_url, "https://sandbox.test/EasyCheckOut/abc");
    assert_eq!(session.session_key.as_deref(), Some("abc"));
}

#[tokio::test]
async fn initiation_rejection_carries_reason() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "FAILED",
            "failedreason": "Store Credential Error Or Store is De-active"
        })))
        .mount(&server)
        .await;

    let err = gateway(&server).initiate(&request()).await.unwrap_err();
    match err {
        GatewayError::Rejected(reason) => assert!(reason.contains("Store Credential Error")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn non_json_answer_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let err = gateway(&server).initiate(&request()).await.unwrap_err();
    assert!(matches!(err, GatewayError::MalformedResponse(_)));
    assert!(!err.to_string().contains("maintenance"));
}

#[tokio::test]
async fn success_without_page_url_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "SUCCESS" })))
        .mount(&server)
        .await;

    let err = gateway(&server).initiate(&request()).await.unwrap_err();
    assert!(matches!(err, GatewayError::MalformedResponse(_)));
}

#[tokio::test]
async fn http_error_status_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("busy: upstream pool db-7 exhausted"))
        .mount(&server)
        .await;

    let err = gateway(&server).initiate(&request()).await.unwrap_err();
    assert!(matches!(err, GatewayError::HttpStatus { status: 503 }));
    assert_eq!(err.to_string(), "gateway answered HTTP 503");
}

#[tokio::test]
async fn slow_gateway_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "status": "SUCCESS", "GatewayPageURL": "https://x" }))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let err = gateway(&server).initiate(&request()).await.unwrap_err();
    assert!(matches!(err, GatewayError::Timeout));
}

#[tokio::test]
async fn verification_reports_valid_payment() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/validator/api/validationserverAPI.php"))
        .and(query_param("val_id", "V1"))
        .and(query_param("store_id", "teststore"))
        .and(query_param("format", "json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "VALID",
            "tran_id": "TXN-0001",
            "amount": "500.00",
            "bank_tran_id": "BANK-77",
            "card_type": "VISA-Dutch Bangla"
        })))
        .mount(&server)
        .await;

    let result = gateway(&server).verify("V1").await.unwrap();
    assert!(result.is_valid());
    assert_eq!(result.tran_id.as_deref(), Some("TXN-0001"));
    assert_eq!(result.amount, Some(Decimal::new(50000, 2)));
    assert_eq!(result.bank_tran_id.as_deref(), Some("BANK-77"));
}

#[tokio::test]
async fn verification_reports_invalid_payment() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "INVALID_TRANSACTION" })))
        .mount(&server)
        .await;

    let result = gateway(&server).verify("V2").await.unwrap();
    assert!(!result.is_valid());
    assert_eq!(result.status, "INVALID_TRANSACTION");
}

#[tokio::test]
async fn verification_without_status_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "tran_id": "TXN-0001" })))
        .mount(&server)
        .await;

    let err = gateway(&server).verify("V3").await.unwrap_err();
    assert!(matches!(err, GatewayError::MalformedResponse(_)));
}
