use crate::test_utils::*;
use axum::http::StatusCode;

#[tokio::test]
async fn test_repeated_failures_lock_out_the_client() {
    let app = setup_proxied_test_app();
    register(&app.state, "alice", "s3cret").await;
    let max = app.state.settings.auth_rate_limit.max_attempts;

    for _ in 0..max {
        let response = send(
            &app.router,
            login_request_from("alice", "wrong", Some("10.1.1.1"), None),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    // locked out even with the right password
    let response = send(
        &app.router,
        login_request_from("alice", "s3cret", Some("10.1.1.1"), None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body_json(response).await["error"]["code"], "AUTH_003");

    // other clients are unaffected
    let response = send(
        &app.router,
        login_request_from("alice", "s3cret", Some("10.1.1.2"), None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_success_resets_failure_count() {
    let app = setup_proxied_test_app();
    register(&app.state, "alice", "s3cret").await;
    let max = app.state.settings.auth_rate_limit.max_attempts;

    for _ in 0..2 {
        for _ in 0..max - 1 {
            let response = send(
                &app.router,
                login_request_from("alice", "wrong", Some("10.2.2.2"), None),
            )
            .await;
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }
        let response = send(
            &app.router,
            login_request_from("alice", "s3cret", Some("10.2.2.2"), None),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}

#[tokio::test]
async fn test_forged_forwarding_headers_do_not_evade_lockout() {
    let app = setup_test_app();
    register(&app.state, "alice", "s3cret").await;
    let max = app.state.settings.auth_rate_limit.max_attempts;

    // a fresh x-real-ip on every attempt, all from one connection
    for i in 0..max * 4 {
        let forged = format!("198.51.100.{i}");
        let response = send(
            &app.router,
            from_peer(
                login_request_from("alice", "wrong", Some(&forged), None),
                "203.0.113.5",
            ),
        )
        .await;
        if i < max {
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        } else {
            assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        }
    }
    assert_eq!(app.state.auth_rate_limiter.tracked_clients(), 1);
}

#[tokio::test]
async fn test_forged_forwarding_headers_cannot_lock_out_another_client() {
    let app = setup_test_app();
    register(&app.state, "alice", "s3cret").await;
    let max = app.state.settings.auth_rate_limit.max_attempts;

    for _ in 0..max {
        let response = send(
            &app.router,
            from_peer(
                login_request_from("alice", "wrong", Some("192.0.2.7"), None),
                "203.0.113.5",
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    let response = send(
        &app.router,
        from_peer(login_request("alice", "s3cret"), "192.0.2.7"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}
