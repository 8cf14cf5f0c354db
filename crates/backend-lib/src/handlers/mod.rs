// ============================
// crates/backend-lib/src/handlers/mod.rs
// ============================
//! HTTP handlers.
pub mod auth;
pub mod pages;

pub use auth::{login, logout};
pub use pages::{index, my_home, not_found};
