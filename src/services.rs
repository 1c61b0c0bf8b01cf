pub mod bill_service;
pub mod charge_service;
pub mod gateway;
pub mod notification;
pub mod payment_service;
pub mod pricing;
pub mod reconciliation;
pub mod registration_service;
pub mod residency_service;
pub mod subscription_service;
