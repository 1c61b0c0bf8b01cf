pub mod bill;
pub mod callback;
pub mod charges;
pub mod payment;
pub mod society;
pub mod subscription;
