use crate::test_utils::*;
use authgate_backend::{create_router, AppState};
use axum::http::StatusCode;
use std::sync::Arc;
use tempfile::TempDir;

async fn persistent_app(dir: &TempDir) -> (axum::Router, Arc<AppState>) {
    let mut settings = test_settings(dir);
    settings.session.persist = true;
    let state = Arc::new(AppState::from_settings(settings).await.expect("state"));
    (create_router(Arc::clone(&state)), state)
}

#[tokio::test]
async fn test_sessions_survive_restart() {
    let dir = TempDir::new().unwrap();

    let cookie = {
        let (router, state) = persistent_app(&dir).await;
        register(&state, "alice", "s3cret").await;
        login(&router, "alice", "s3cret").await.expect("cookie issued")
    };

    let (router, _state) = persistent_app(&dir).await;
    let response = send(&router, request("GET", "/myHome", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["user"]["username"], "alice");
}

#[tokio::test]
async fn test_logout_survives_restart() {
    let dir = TempDir::new().unwrap();

    let cookie = {
        let (router, state) = persistent_app(&dir).await;
        register(&state, "alice", "s3cret").await;
        let cookie = login(&router, "alice", "s3cret").await.unwrap();
        let response = send(&router, request("POST", "/auth/logout", Some(&cookie))).await;
        assert_eq!(response.status(), StatusCode::OK);
        cookie
    };

    let (router, _state) = persistent_app(&dir).await;
    let response = send(&router, request("GET", "/myHome", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_users_live_on_disk() {
    let dir = TempDir::new().unwrap();
    {
        let (_router, state) = persistent_app(&dir).await;
        register(&state, "alice", "s3cret").await;
    }
    assert!(dir.path().join("users").join("alice.json").exists());

    let (router, _state) = persistent_app(&dir).await;
    assert!(login(&router, "alice", "s3cret").await.is_some());
}

#[tokio::test]
async fn test_unwritable_snapshot_fails_login_with_503() {
    let dir = TempDir::new().unwrap();
    let (router, state) = persistent_app(&dir).await;
    register(&state, "alice", "s3cret").await;

    std::fs::create_dir(dir.path().join("sessions").join("sessions.dat.tmp")).unwrap();

    let response = send(&router, login_request("alice", "s3cret")).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(set_cookie_header(&response).is_none());
    assert_eq!(body_json(response).await["error"]["code"], "SESS_002");
}
