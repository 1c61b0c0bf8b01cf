// src/lib.rs

use axum::{
    middleware as axum_middleware,
    routing::{get, patch, post},
    Router,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod common;
pub mod config;
pub mod db;
pub mod docs;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

use crate::{
    config::AppState,
    docs::ApiDoc,
    middleware::{auth::auth_guard, society::society_guard},
};

/// Full HTTP surface. Gateway callbacks, the registration flow and the quote are public;
/// everything else needs a bearer token, and society-scoped routes an active society.
pub fn build_router(app_state: AppState) -> Router {
    let auth = || axum_middleware::from_fn_with_state(app_state.clone(), auth_guard);
    let active_society = || axum_middleware::from_fn_with_state(app_state.clone(), society_guard);

    // --- Bills ---
    let bill_routes = Router::new()
        .route("/generate", post(handlers::bills::generate_bills))
        .route("/society/{society_id}", get(handlers::bills::list_society_bills))
        .route(
            "/society/{society_id}/user/{user_id}",
            get(handlers::bills::list_user_bills),
        )
        .route_layer(active_society())
        .merge(Router::new().route("/{bill_id}/assign", post(handlers::bills::assign_bill)))
        .route_layer(auth());

    // --- Flats ---
    let flat_routes = Router::new()
        .route("/{flat_id}/resident", patch(handlers::flats::update_resident))
        .route("/{flat_id}/payer", get(handlers::flats::get_payer))
        .route_layer(active_society())
        .route_layer(auth());

    // --- Payments ---
    let payment_protected = Router::new()
        .route("/initiate", post(handlers::payments::initiate_payment))
        .route_layer(active_society())
        .merge(
            Router::new()
                .route("/{payment_id}", get(handlers::payments::get_payment))
                .route("/society/{society_id}", get(handlers::payments::list_society_payments)),
        )
        .route_layer(auth());

    let payment_routes = Router::new()
        .route("/success", post(handlers::payments::payment_callback))
        .route("/fail", post(handlers::payments::payment_callback))
        .route("/failed", post(handlers::payments::payment_callback))
        .route("/cancel", post(handlers::payments::payment_callback))
        .route("/cancelled", post(handlers::payments::payment_callback))
        .merge(payment_protected);

    // --- Subscriptions ---
    let subscription_routes = Router::new()
        .route("/initiate", post(handlers::subscriptions::initiate_subscription))
        .route(
            "/society/{society_id}",
            get(handlers::subscriptions::subscription_history),
        )
        .route_layer(auth())
        .route("/success", post(handlers::subscriptions::subscription_callback))
        .route("/failed", post(handlers::subscriptions::subscription_callback))
        .route("/cancelled", post(handlers::subscriptions::subscription_callback));

    // --- Registration ---
    let registration_routes = Router::new()
        .route("/history", get(handlers::registration::registration_history))
        .route_layer(auth())
        .route("/initiate", post(handlers::registration::initiate_registration))
        .route("/quote", get(handlers::registration::registration_quote))
        .route("/success", post(handlers::registration::registration_callback))
        .route("/failed", post(handlers::registration::registration_callback))
        .route("/cancelled", post(handlers::registration::registration_callback))
        .route("/callback", post(handlers::registration::registration_callback));

    Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .nest("/api/bills", bill_routes)
        .nest("/api/flats", flat_routes)
        .nest("/api/payments", payment_routes)
        .nest("/api/subscriptions", subscription_routes)
        .nest("/api/registration-payments", registration_routes)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(app_state)
}
