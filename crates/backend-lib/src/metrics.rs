// ==============
// crates/backend-lib/src/metrics.rs

//! Central place for metric keys
pub const LOGIN_SUCCEEDED: &str = "auth.login.succeeded";
pub const LOGIN_FAILED: &str = "auth.login.failed";
pub const LOGIN_THROTTLED: &str = "auth.login.throttled";
pub const LOGIN_LOCKOUTS: &str = "auth.login.lockouts";
pub const LOGOUT: &str = "auth.logout";
pub const SESSION_ACTIVE: &str = "session.active";
pub const SESSION_EXPIRED: &str = "session.expired";
