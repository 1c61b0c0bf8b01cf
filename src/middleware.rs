pub mod auth;
pub mod society;
