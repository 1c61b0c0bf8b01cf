pub mod bill_repo;
pub use bill_repo::BillRepository;
pub mod charge_repo;
pub use charge_repo::ChargeRepository;
pub mod flat_repo;
pub use flat_repo::FlatRepository;
pub mod payment_repo;
pub use payment_repo::PaymentRepository;
pub mod promo_repo;
pub use promo_repo::PromoRepository;
pub mod registration_repo;
pub use registration_repo::RegistrationRepository;
pub mod society_repo;
pub use society_repo::SocietyRepository;
pub mod subscription_repo;
pub use subscription_repo::SubscriptionRepository;
pub mod user_repo;
pub use user_repo::UserRepository;
