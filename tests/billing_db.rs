// tests/billing_db.rs
//
// Store-backed scenarios. Run with a disposable database:
//   TEST_DATABASE_URL=postgres://... cargo test -- --ignored

mod support;

use rust_decimal::Decimal;
use serde_json::json;
use society_backend::{
    common::error::AppError,
    services::gateway::GatewayError,
    config::AppState,
    models::{
        bill::BillStatus,
        callback::GatewayCallback,
        payment::PaymentStatus,
        society::SocietyStatus,
        subscription::{InitiateRegistrationPayload, InitiateSubscriptionPayload},
    },
};
use support::{seed_society, StubGateway};

async fn state(verify_status: &'static str, verified_amount: Option<Decimal>) -> (AppState, sqlx::PgPool) {
    state_over(StubGateway {
        verify_status,
        verified_amount,
        initiation_times_out: false,
    })
    .await
}

async fn state_over(gateway: StubGateway) -> (AppState, sqlx::PgPool) {
    let (pool, url) = support::test_pool().await;
    let state = support::state_with(pool.clone(), &url, gateway);
    (state, pool)
}

fn callback(tran_id: &str, status: &str) -> GatewayCallback {
    GatewayCallback::try_from(json!({
        "tran_id": tran_id,
        "status": status,
        "val_id": "V1",
        "amount": "1.00",
        "currency": "BDT",
        "card_type": "VISA"
    }))
    .unwrap()
}

async fn bill_status(pool: &sqlx::PgPool, bill_id: i64) -> BillStatus {
    sqlx::query_scalar("SELECT status FROM bills WHERE id = $1")
        .bind(bill_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

#[tokio::test]
#[ignore]
async fn generation_snapshots_charges_once_per_month() {
    let (state, pool) = state("VALID", None).await;
    let seed = seed_society(&pool, Decimal::from(500)).await;

    let bills = state.bill_service.generate_bills(seed.society_id, "2024-03").await.unwrap();
    assert_eq!(bills.len(), 1);
    let bill = &bills[0];
    assert_eq!(bill.total_amount, Decimal::from(500));
    assert_eq!(bill.common_charges.len(), 1);
    assert_eq!(bill.common_charges[0].name, "Guard");
    assert!(bill.flat_charges.is_empty());
    assert_eq!(bill.status, BillStatus::Pending);
    assert_eq!(bill.user_id, seed.owner_id);

    // Second run for the same month fails and writes nothing.
    let again = state.bill_service.generate_bills(seed.society_id, "2024-03-15").await;
    assert!(matches!(again, Err(AppError::BillsAlreadyGenerated)));
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bills WHERE society_id = $1")
        .bind(seed.society_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);

    // Later charge edits leave the snapshot alone.
    sqlx::query("UPDATE service_charges SET amount = 700 WHERE id = $1")
        .bind(seed.charge_id)
        .execute(&pool)
        .await
        .unwrap();
    let listed = state.bill_service.society_bills(seed.society_id).await.unwrap();
    assert_eq!(listed[0].total_amount, Decimal::from(500));
}

#[tokio::test]
#[ignore]
async fn resident_pays_and_flat_charges_are_snapshotted() {
    let (state, pool) = state("VALID", None).await;
    let seed = seed_society(&pool, Decimal::from(500)).await;
    let resident = support::insert_user(&pool, "Rhea").await;

    sqlx::query(
        "INSERT INTO flat_residents (flat_id, resident_id, start_date) \
         VALUES ($1, $2, '2024-01-01T00:00:00Z')",
    )
    .bind(seed.flat_id)
    .bind(resident)
    .execute(&pool)
    .await
    .unwrap();

    let parking: i64 = sqlx::query_scalar(
        "INSERT INTO predefined_service_charges (name) VALUES ('Parking') \
         ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name RETURNING id",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    sqlx::query(
        "INSERT INTO user_service_charges (flat_id, predefined_service_charge_id, amount) \
         VALUES ($1, $2, 120.25)",
    )
    .bind(seed.flat_id)
    .bind(parking)
    .execute(&pool)
    .await
    .unwrap();

    let bill = state.bill_service.generate_bills(seed.society_id, "2024-07").await.unwrap().remove(0);
    assert_eq!(bill.user_id, resident);
    assert_eq!(bill.common_charges.len(), 1);
    assert_eq!(bill.flat_charges.len(), 1);
    assert_eq!(bill.flat_charges[0].name, "Parking");
    assert_eq!(bill.flat_charges[0].amount, Decimal::new(12025, 2));
    assert_eq!(bill.total_amount, Decimal::new(62025, 2));
}

#[tokio::test]
#[ignore]
async fn reassignment_back_and_forth_keeps_one_open_residency() {
    let (state, pool) = state("VALID", None).await;
    let seed = seed_society(&pool, Decimal::from(500)).await;
    let a = support::insert_user(&pool, "Alice").await;
    let b = support::insert_user(&pool, "Bob").await;

    let first = state.residency_service.reassign_resident(seed.flat_id, seed.society_id, a).await.unwrap();
    let same = state.residency_service.reassign_resident(seed.flat_id, seed.society_id, a).await.unwrap();
    assert_eq!(first.id, same.id);

    state.residency_service.reassign_resident(seed.flat_id, seed.society_id, b).await.unwrap();
    let back = state.residency_service.reassign_resident(seed.flat_id, seed.society_id, a).await.unwrap();
    assert_eq!(back.resident_id, a);
    assert!(back.end_date.is_none());

    let open: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM flat_residents WHERE flat_id = $1 AND end_date IS NULL",
    )
    .bind(seed.flat_id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(open, 1);

    let payer = state
        .residency_service
        .resolve_payer(seed.flat_id, seed.society_id, chrono::Utc::now())
        .await
        .unwrap();
    assert_eq!(payer.payer_id, a);
    assert!(payer.is_resident);
}

#[tokio::test]
#[ignore]
async fn duplicate_success_callback_is_applied_once() {
    let (state, pool) = state("VALID", None).await;
    let seed = seed_society(&pool, Decimal::from(500)).await;
    let bill = state.bill_service.generate_bills(seed.society_id, "2024-04").await.unwrap().remove(0);

    let initiated = state
        .payment_service
        .initiate(bill.id, Decimal::from(500), seed.society_id)
        .await
        .unwrap();
    assert!(initiated.tran_id.starts_with("TXN-"));

    let cb = callback(&initiated.tran_id, "VALID");
    let first = state.payment_service.handle_callback(&cb).await.unwrap();
    assert_eq!(first.status, PaymentStatus::Success);
    assert_eq!(first.amount, Decimal::from(500));
    assert_eq!(bill_status(&pool, bill.id).await, BillStatus::Paid);

    let second = state.payment_service.handle_callback(&cb).await.unwrap();
    assert_eq!(second.status, PaymentStatus::Success);
    assert_eq!(second.updated_at, first.updated_at);
    assert_eq!(bill_status(&pool, bill.id).await, BillStatus::Paid);
}

#[tokio::test]
#[ignore]
async fn partial_payment_leaves_bill_pending() {
    let (state, pool) = state("VALID", Some(Decimal::new(49999, 2))).await;
    let seed = seed_society(&pool, Decimal::from(500)).await;
    let bill = state.bill_service.generate_bills(seed.society_id, "2024-05").await.unwrap().remove(0);

    let initiated = state
        .payment_service
        .initiate(bill.id, Decimal::from(500), seed.society_id)
        .await
        .unwrap();

    let payment = state
        .payment_service
        .handle_callback(&callback(&initiated.tran_id, "VALID"))
        .await
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Success);
    assert_eq!(payment.amount, Decimal::new(49999, 2));
    assert_eq!(bill_status(&pool, bill.id).await, BillStatus::Pending);
}

#[tokio::test]
#[ignore]
async fn failed_callback_and_unknown_transaction() {
    let (state, pool) = state("VALID", None).await;
    let seed = seed_society(&pool, Decimal::from(500)).await;
    let bill = state.bill_service.generate_bills(seed.society_id, "2024-06").await.unwrap().remove(0);

    let initiated = state
        .payment_service
        .initiate(bill.id, Decimal::from(500), seed.society_id)
        .await
        .unwrap();

    let payment = state
        .payment_service
        .handle_callback(&callback(&initiated.tran_id, "FAILED"))
        .await
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Failed);
    assert_eq!(bill_status(&pool, bill.id).await, BillStatus::Pending);

    let unknown = state.payment_service.handle_callback(&callback("TXN-missing", "VALID")).await;
    assert!(matches!(unknown, Err(AppError::UnknownTransaction(_))));
}

#[tokio::test]
#[ignore]
async fn subscription_success_activates_society_once() {
    let (state, pool) = state("VALID", None).await;
    let seed = seed_society(&pool, Decimal::from(500)).await;
    sqlx::query("UPDATE societies SET status = 'PAYMENT_DUE' WHERE id = $1")
        .bind(seed.society_id)
        .execute(&pool)
        .await
        .unwrap();

    // Subscription URLs are not configured in the shared test config.
    let initiated = state
        .subscription_service
        .initiate(
            Some(seed.owner_id),
            InitiateSubscriptionPayload {
                society_id: seed.society_id,
                email: "owner@society.test".into(),
                amount: Decimal::new(57500, 2),
                promo_code: None,
            },
        )
        .await;
    assert!(matches!(initiated, Err(AppError::ConfigurationError(_))));

    let tran_id = format!("SUB-{}", uuid::Uuid::new_v4().simple());
    sqlx::query(
        "INSERT INTO subscriptions (society_id, email, amount, currency, status, tran_id) \
         VALUES ($1, 'owner@society.test', 575.00, 'BDT', 'PENDING', $2)",
    )
    .bind(seed.society_id)
    .bind(&tran_id)
    .execute(&pool)
    .await
    .unwrap();

    let cb = callback(&tran_id, "VALIDATED");
    let first = state.subscription_service.handle_callback(&cb).await.unwrap();
    assert_eq!(first.status, PaymentStatus::Success);
    let (start, end) = (first.start_date.unwrap(), first.end_date.unwrap());
    assert_eq!((end - start).num_days(), 30);

    let status: SocietyStatus = sqlx::query_scalar("SELECT status FROM societies WHERE id = $1")
        .bind(seed.society_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(status, SocietyStatus::Active);

    let second = state.subscription_service.handle_callback(&cb).await.unwrap();
    assert_eq!(second.end_date, first.end_date);
}

#[tokio::test]
#[ignore]
async fn gateway_timeout_marks_payment_failed() {
    let (state, pool) = state_over(StubGateway {
        verify_status: "VALID",
        verified_amount: None,
        initiation_times_out: true,
    })
    .await;
    let seed = seed_society(&pool, Decimal::from(500)).await;
    let bill = state.bill_service.generate_bills(seed.society_id, "2024-08").await.unwrap().remove(0);

    let initiated = state
        .payment_service
        .initiate(bill.id, Decimal::from(500), seed.society_id)
        .await;
    assert!(matches!(initiated, Err(AppError::UpstreamGateway(GatewayError::Timeout))));

    let statuses: Vec<PaymentStatus> = sqlx::query_scalar("SELECT status FROM payments WHERE bill_id = $1")
        .bind(bill.id)
        .fetch_all(&pool)
        .await
        .unwrap();
    assert_eq!(statuses, vec![PaymentStatus::Failed]);
    assert_eq!(bill_status(&pool, bill.id).await, BillStatus::Pending);
}

#[tokio::test]
#[ignore]
async fn registration_charges_the_discounted_amount() {
    let (state, pool) = state("VALID", None).await;
    let code = format!("WELCOME{}", uuid::Uuid::new_v4().simple());
    sqlx::query(
        "INSERT INTO promos (code, discount_kind, discount, max_discount) \
         VALUES ($1, 'PERCENT', 10, 50)",
    )
    .bind(&code)
    .execute(&pool)
    .await
    .unwrap();

    let payload: InitiateRegistrationPayload = serde_json::from_value(json!({
        "email": "admin@lakeview.test",
        "amount": "575.00",
        "promoCode": code,
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
    }))
    .unwrap();

    let initiated = state.registration_service.initiate(payload).await.unwrap();
    let charged: Decimal = sqlx::query_scalar("SELECT amount FROM registration_payments WHERE id = $1")
        .bind(initiated.payment_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(charged, Decimal::new(51750, 2));
}
