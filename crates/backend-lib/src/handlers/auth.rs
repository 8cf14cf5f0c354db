// ============================
// crates/backend-lib/src/handlers/auth.rs
// ============================
//! `POST /auth/login` and `POST /auth/logout`.
use authgate_common::{LoginForm, LoginResponse, StatusResponse};
use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    Form, Json,
};
use std::sync::Arc;

use crate::error::{AppError, AuthError};
use crate::metrics;
use crate::middleware::{clear_session_cookie, session_cookie};
use crate::pipeline::RequestContext;
use crate::session::SessionStore;
use crate::AppState;

/// Verify the submitted credentials and issue a session cookie.
///
/// Both credential failures produce the same 401 body. Throttled clients
/// get 429 before any credential work happens.
pub async fn login(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Form(form): Form<LoginForm>,
) -> Result<impl IntoResponse, AppError> {
    state.login_gate.run(&ctx).await?;

    let session = match state
        .lifecycle
        .login(&ctx.session, &form.username, &form.password)
        .await
    {
        Ok(session) => session,
        Err(AuthError::InvalidCredentials) => {
            ::metrics::counter!(metrics::LOGIN_FAILED).increment(1);
            if let Some(ip) = ctx.client_ip {
                state.auth_rate_limiter.record_failed_attempt(ip);
            }
            return Err(AppError::InvalidCredentials);
        },
        Err(err) => return Err(err.into()),
    };

    if let Some(ip) = ctx.client_ip {
        state.auth_rate_limiter.record_success(ip);
    }
    ::metrics::counter!(metrics::LOGIN_SUCCEEDED).increment(1);
    ::metrics::gauge!(metrics::SESSION_ACTIVE).set(state.sessions.active_count().await as f64);

    let cookie = session_cookie(&state.settings.session, session.id())?;
    let user = session
        .user()
        .cloned()
        .ok_or_else(|| AppError::Internal("login returned an anonymous session".to_string()))?;

    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(LoginResponse {
            status: "ok".to_string(),
            user,
        }),
    ))
}

/// Destroy the caller's session and expire the cookie.
///
/// Logging out without a session succeeds.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
) -> Result<impl IntoResponse, AppError> {
    let was_authenticated = ctx.session.is_authenticated();
    state.lifecycle.logout(&ctx.session).await?;

    if was_authenticated {
        ::metrics::counter!(metrics::LOGOUT).increment(1);
        ::metrics::gauge!(metrics::SESSION_ACTIVE).set(state.sessions.active_count().await as f64);
    }

    let cookie = clear_session_cookie(&state.settings.session)?;
    Ok(([(header::SET_COOKIE, cookie)], Json(StatusResponse::ok())))
}
