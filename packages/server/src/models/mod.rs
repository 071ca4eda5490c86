pub mod asset;
pub mod auth;
