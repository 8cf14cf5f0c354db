// crates/backend-lib/src/middleware/mod.rs

//! Session cookie handling, request context extraction and the guard.
use axum::{
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use crate::config::SessionSettings;
use crate::error::AppError;
use crate::pipeline::RequestContext;
use crate::session::{Session, SessionId, SessionStore};
use crate::AppState;


/// Value of cookie `name`, if the request carries one.
pub fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .find_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            (key == name).then(|| value.to_string())
        })
}

/// `Set-Cookie` value carrying a freshly issued session id.
pub fn session_cookie(settings: &SessionSettings, id: &SessionId) -> Result<HeaderValue, AppError> {
    let mut cookie = format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}",
        settings.cookie_name,
        id.as_str(),
        settings.absolute_ttl_secs
    );
    if settings.secure_cookie {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie).map_err(|e| AppError::Internal(format!("bad cookie: {e}")))
}

/// `Set-Cookie` value that makes the browser drop the session cookie.
pub fn clear_session_cookie(settings: &SessionSettings) -> Result<HeaderValue, AppError> {
    let mut cookie = format!(
        "{}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0",
        settings.cookie_name
    );
    if settings.secure_cookie {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie).map_err(|e| AppError::Internal(format!("bad cookie: {e}")))
}

/// Client address.
///
/// The peer address of the connection, unless `trust_proxy_headers` is set,
/// in which case `x-real-ip` and then the first `x-forwarded-for` hop win.
pub fn client_ip(parts: &Parts, trust_proxy_headers: bool) -> Option<IpAddr> {
    let header_ip = |name: &str| {
        parts
            .headers
            .get(name)
            .and_then(|h| h.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|v| v.trim().parse::<IpAddr>().ok())
    };
    let peer_ip = || {
        parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip())
    };

    if !trust_proxy_headers {
        return peer_ip();
    }
    header_ip("x-real-ip")
        .or_else(|| header_ip("x-forwarded-for"))
        .or_else(peer_ip)
}

/// The session named by the request cookie, or a new anonymous one.
///
/// Malformed, unknown and expired ids all read as anonymous.
pub async fn load_session(state: &AppState, headers: &HeaderMap) -> Result<Session, AppError> {
    let Some(id) = parse_cookie(headers, &state.settings.session.cookie_name)
        .as_deref()
        .and_then(SessionId::parse)
    else {
        return Ok(Session::anonymous());
    };

    Ok(state
        .sessions
        .get(&id)
        .await?
        .unwrap_or_else(Session::anonymous))
}

impl FromRequestParts<Arc<AppState>> for RequestContext {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        // the guard already resolved it
        if let Some(ctx) = parts.extensions.get::<RequestContext>() {
            return Ok(ctx.clone());
        }

        let session = load_session(state, &parts.headers).await?;
        Ok(RequestContext::new(
            session,
            client_ip(parts, state.settings.server.trust_proxy_headers),
        ))
    }
}

/// Guard for protected routes.
///
/// Runs the protected pipeline and, if it continues, hands the resolved
/// context to the handler through the request extensions.
pub async fn require_session(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (mut parts, body) = request.into_parts();
    let ctx = RequestContext::from_request_parts(&mut parts, &state).await?;

    state.protected.run(&ctx).await?;

    parts.extensions.insert(ctx);
    Ok(next.run(Request::from_parts(parts, body)).await)
}
