// ============================
// crates/backend-lib/src/handlers/pages.rs
// ============================
//! Public and protected pages.
use authgate_common::SessionView;
use axum::{http::Uri, Extension, Json};
use serde_json::{json, Value};

use crate::auth::require_authenticated;
use crate::error::AppError;
use crate::pipeline::RequestContext;

/// `GET /`
pub async fn index() -> Json<Value> {
    Json(json!({ "message": "This is a public page" }))
}

/// `GET /myHome`, mounted behind the session guard.
pub async fn my_home(Extension(ctx): Extension<RequestContext>) -> Result<Json<SessionView>, AppError> {
    let user = require_authenticated(&ctx.session)?.clone();
    Ok(Json(SessionView {
        user,
        created_at: ctx.session.created_at(),
    }))
}

pub async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(uri.path().to_string())
}
