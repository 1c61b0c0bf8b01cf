// src/docs.rs

use utoipa::OpenApi;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use crate::handlers;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Bills ---
        handlers::bills::generate_bills,
        handlers::bills::list_society_bills,
        handlers::bills::list_user_bills,
        handlers::bills::assign_bill,

        // --- Flats ---
        handlers::flats::update_resident,
        handlers::flats::get_payer,

        // --- Payments ---
        handlers::payments::initiate_payment,
        handlers::payments::payment_callback,
        handlers::payments::get_payment,
        handlers::payments::list_society_payments,

        // --- Subscriptions ---
        handlers::subscriptions::initiate_subscription,
        handlers::subscriptions::subscription_callback,
        handlers::subscriptions::subscription_history,

        // --- Registration ---
        handlers::registration::initiate_registration,
        handlers::registration::registration_callback,
        handlers::registration::registration_history,
        handlers::registration::registration_quote,
    ),
    components(
        schemas(
            // --- Society ---
            models::society::SocietyStatus,
            models::society::FlatType,
            models::society::FlatResidency,
            models::society::PayerResponse,
            handlers::flats::UpdateResidentPayload,

            // --- Bills ---
            models::charges::ChargeLine,
            models::bill::BillStatus,
            models::bill::BillView,
            models::bill::BillFlatInfo,
            models::bill::BillSocietyInfo,
            models::bill::BillPaymentInfo,
            models::bill::GenerateBillsPayload,
            models::bill::AssignBillPayload,

            // --- Payments ---
            models::payment::PaymentStatus,
            models::payment::Payment,
            models::payment::InitiatePaymentPayload,
            models::payment::InitiatedPayment,

            // --- Subscriptions & registration ---
            models::subscription::Subscription,
            models::subscription::InitiateSubscriptionPayload,
            models::subscription::InitiatedSubscription,
            models::subscription::RegistrationPayment,
            models::subscription::FlatInfo,
            models::subscription::BuildingInfo,
            models::subscription::InitiateRegistrationPayload,
            models::subscription::InitiatedRegistration,
            models::subscription::RegistrationQuote,
        )
    ),
    tags(
        (name = "Bills", description = "Monthly bill generation and listing"),
        (name = "Flats", description = "Residency and payer resolution"),
        (name = "Payments", description = "Bill payments through the gateway"),
        (name = "Subscriptions", description = "Society subscription payments"),
        (name = "Registration", description = "Pre-account registration fee")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_jwt",
            SecurityScheme::Http(
                Http::new(HttpAuthScheme::Bearer)
            ),
        );
    }
}
