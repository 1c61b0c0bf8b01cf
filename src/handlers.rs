pub mod bills;
pub mod callback;
pub mod flats;
pub mod payments;
pub mod registration;
pub mod subscriptions;
