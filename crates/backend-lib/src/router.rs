// ============================
// authgate-backend/src/router.rs
// ============================
//! HTTP routes.
use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::handlers::{index, login, logout, my_home, not_found};
use crate::middleware::require_session;
use crate::AppState;

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/myHome", get(my_home))
        .route_layer(from_fn_with_state(Arc::clone(&state), require_session));

    Router::new()
        .route("/", get(index))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .merge(protected)
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
