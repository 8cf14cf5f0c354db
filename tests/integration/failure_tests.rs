//! Session store failures surface as server errors, never as 401s.
use crate::test_utils::*;
use async_trait::async_trait;
use authgate_backend::error::SessionError;
use authgate_backend::session::{MemorySessionStore, Session, SessionId, SessionStore};
use axum::http::StatusCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Memory store whose `destroy` or `get` can be switched off.
#[derive(Default)]
struct FlakyStore {
    inner: MemorySessionStore,
    fail_destroy: AtomicBool,
    fail_get: AtomicBool,
}

#[async_trait]
impl SessionStore for FlakyStore {
    async fn get(&self, id: &SessionId) -> Result<Option<Session>, SessionError> {
        if self.fail_get.load(Ordering::SeqCst) {
            return Err(SessionError::Unavailable("store offline".to_string()));
        }
        self.inner.get(id).await
    }

    async fn set(&self, session: &Session) -> Result<(), SessionError> {
        self.inner.set(session).await
    }

    async fn destroy(&self, id: &SessionId) -> Result<(), SessionError> {
        if self.fail_destroy.load(Ordering::SeqCst) {
            return Err(SessionError::DestroyFailed("store offline".to_string()));
        }
        self.inner.destroy(id).await
    }

    async fn cleanup_expired(&self) -> Result<usize, SessionError> {
        self.inner.cleanup_expired().await
    }

    async fn active_count(&self) -> usize {
        self.inner.active_count().await
    }
}

#[tokio::test]
async fn test_destroy_failure_is_reported() {
    let store = Arc::new(FlakyStore::default());
    let app = setup_test_app_with_store(store.clone());
    register(&app.state, "alice", "s3cret").await;
    let cookie = login(&app.router, "alice", "s3cret").await.unwrap();

    store.fail_destroy.store(true, Ordering::SeqCst);
    let response = send(&app.router, request("POST", "/auth/logout", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(set_cookie_header(&response).is_none());
    assert_eq!(body_json(response).await["error"]["code"], "SESS_001");

    // once the store recovers the same session logs out normally
    store.fail_destroy.store(false, Ordering::SeqCst);
    let response = send(&app.router, request("POST", "/auth/logout", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_store_outage_is_not_an_auth_failure() {
    let store = Arc::new(FlakyStore::default());
    let app = setup_test_app_with_store(store.clone());
    register(&app.state, "alice", "s3cret").await;
    let cookie = login(&app.router, "alice", "s3cret").await.unwrap();

    store.fail_get.store(true, Ordering::SeqCst);
    let response = send(&app.router, request("GET", "/myHome", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_json(response).await["error"]["code"], "SESS_002");

    let response = send(
        &app.router,
        login_request_from("alice", "s3cret", None, Some(&cookie)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}
