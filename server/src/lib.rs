pub mod serve;
pub mod auth;
pub mod api;
