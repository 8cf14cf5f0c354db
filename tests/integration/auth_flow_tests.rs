use crate::test_utils::*;
use authgate_backend::session::SessionStore;
use authgate_common::{LoginResponse, PublicIdentity, SessionView};
use axum::http::{header, StatusCode};
use futures_util::future::join_all;
use serde_json::json;

#[tokio::test]
async fn test_public_page() {
    let app = setup_test_app();

    let response = send(&app.router, request("GET", "/", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({ "message": "This is a public page" })
    );
}

#[tokio::test]
async fn test_unknown_route_is_json_404() {
    let app = setup_test_app();

    let response = send(&app.router, request("GET", "/nope", None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"]["code"], "NF_001");
}

#[tokio::test]
async fn test_login_success_issues_cookie() {
    let app = setup_test_app();
    register(&app.state, "alice", "s3cret").await;

    let response = send(&app.router, login_request("alice", "s3cret")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let set_cookie = set_cookie_header(&response).expect("cookie issued");
    assert!(set_cookie.starts_with("authgate.sid="));
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("SameSite=Strict"));
    assert!(set_cookie.contains("Path=/"));

    let body: LoginResponse = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(body.status, "ok");
    assert_eq!(body.user, PublicIdentity::new("alice"));
    assert_eq!(app.state.sessions.active_count().await, 1);
}

#[tokio::test]
async fn test_wrong_password_and_unknown_user_are_indistinguishable() {
    let app = setup_test_app();
    register(&app.state, "alice", "s3cret").await;

    let wrong = send(&app.router, login_request("alice", "wrong")).await;
    let unknown = send(&app.router, login_request("bob", "whatever")).await;

    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);
    assert!(set_cookie_header(&wrong).is_none());
    assert!(set_cookie_header(&unknown).is_none());

    let wrong = body_bytes(wrong).await;
    let unknown = body_bytes(unknown).await;
    assert_eq!(wrong, unknown);

    let body: serde_json::Value = serde_json::from_slice(&wrong).unwrap();
    assert_eq!(body["error"]["code"], "AUTH_001");
    assert_eq!(body["error"]["message"], "Incorrect username or password");

    assert_eq!(app.state.sessions.active_count().await, 0);
}

#[tokio::test]
async fn test_empty_fields_are_rejected_generically() {
    let app = setup_test_app();
    register(&app.state, "alice", "s3cret").await;

    let response = send(&app.router, login_request("alice", "")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"]["code"], "AUTH_001");

    let response = send(&app.router, login_request("", "s3cret")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_protected_route_requires_login() {
    let app = setup_test_app();

    let response = send(&app.router, request("GET", "/myHome", None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"]["code"], "AUTH_002");

    let response = send(
        &app.router,
        request("GET", "/myHome", Some("authgate.sid=not-a-session")),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_guard_logout_round_trip() {
    let app = setup_test_app();
    register(&app.state, "alice", "correct-pw").await;

    let cookie = login(&app.router, "alice", "correct-pw")
        .await
        .expect("cookie issued");

    let response = send(&app.router, request("GET", "/myHome", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let view: SessionView = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(view.user.username, "alice");

    let response = send(&app.router, request("POST", "/auth/logout", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(set_cookie_header(&response)
        .expect("cookie cleared")
        .contains("Max-Age=0"));
    assert_eq!(body_json(response).await, json!({ "status": "ok" }));

    let response = send(&app.router, request("GET", "/myHome", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(app.state.sessions.active_count().await, 0);
}

#[tokio::test]
async fn test_logout_twice_never_errors() {
    let app = setup_test_app();
    register(&app.state, "alice", "s3cret").await;
    let cookie = login(&app.router, "alice", "s3cret").await.unwrap();

    for _ in 0..2 {
        let response = send(&app.router, request("POST", "/auth/logout", Some(&cookie))).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    // never logged in at all
    let response = send(&app.router, request("POST", "/auth/logout", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_failed_login_keeps_existing_session() {
    let app = setup_test_app();
    register(&app.state, "alice", "s3cret").await;
    let cookie = login(&app.router, "alice", "s3cret").await.unwrap();

    let response = send(
        &app.router,
        login_request_from("alice", "wrong", None, Some(&cookie)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = send(&app.router, request("GET", "/myHome", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_relogin_rotates_session_id() {
    let app = setup_test_app();
    register(&app.state, "alice", "s3cret").await;
    let first = login(&app.router, "alice", "s3cret").await.unwrap();

    let response = send(
        &app.router,
        login_request_from("alice", "s3cret", None, Some(&first)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let second = session_cookie(&response).unwrap();
    assert_ne!(first, second);

    let response = send(&app.router, request("GET", "/myHome", Some(&first))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let response = send(&app.router, request("GET", "/myHome", Some(&second))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.state.sessions.active_count().await, 1);
}

#[tokio::test]
async fn test_concurrent_logins_are_independent() {
    let app = setup_test_app();
    let names: Vec<String> = (0..8).map(|i| format!("user{i}")).collect();
    for name in &names {
        register(&app.state, name, "pw").await;
    }

    let cookies = join_all(names.iter().map(|name| login(&app.router, name, "pw"))).await;

    for (name, cookie) in names.iter().zip(&cookies) {
        let cookie = cookie.as_deref().expect("cookie issued");
        let response = send(&app.router, request("GET", "/myHome", Some(cookie))).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["user"]["username"], name.as_str());
    }
    assert_eq!(app.state.sessions.active_count().await, names.len());
}

#[tokio::test]
async fn test_login_requires_form_body() {
    let app = setup_test_app();

    let response = send(
        &app.router,
        axum::http::Request::builder()
            .method("POST")
            .uri("/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(axum::body::Body::from(r#"{"username":"a","password":"b"}"#))
            .unwrap(),
    )
    .await;
    assert!(response.status().is_client_error());
    assert!(set_cookie_header(&response).is_none());
}
