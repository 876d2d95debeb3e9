use actix_web::{
    body::MessageBody,
    dev::{Service, ServiceResponse},
    http::StatusCode,
    test, App,
};
use jwt_security::SystemClock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use streaming_service::config::Config;
use streaming_service::db::InMemoryUserStore;
use streaming_service::{routes, AppState};

const SECRET: &str = "J8Kq2mPvRx4TnZs9YwLcGf7DhBe3Xa6W-flow-tests";

fn state_with(overrides: &[(&str, &str)]) -> AppState {
    let mut vars: HashMap<String, String> = HashMap::from([
        ("JWT_SECRET".to_string(), SECRET.to_string()),
        ("HLS_BASE_URL".to_string(), "http://cdn.test".to_string()),
    ]);
    for (key, value) in overrides {
        vars.insert(key.to_string(), value.to_string());
    }
    let config = Config::from_lookup(|key| vars.get(key).cloned()).unwrap();
    AppState::build(config, Arc::new(InMemoryUserStore::new()), Arc::new(SystemClock)).unwrap()
}

/// Run a request, rendering middleware errors the way the server would.
async fn send<S, R, B>(app: &S, req: R) -> (StatusCode, Value)
where
    S: Service<R, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let (status, body) = match test::try_call_service(app, req).await {
        Ok(resp) => (resp.status(), test::read_body(resp).await),
        Err(err) => {
            let resp = err.error_response();
            let status = resp.status();
            (status, actix_web::body::to_bytes(resp.into_body()).await.unwrap())
        }
    };
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {token}"))
}

#[actix_web::test]
async fn test_register_login_publish_and_end() {
    let app = test::init_service(App::new().configure(routes::configure(state_with(&[])))).await;

    // Register
    let req = test::TestRequest::post()
        .uri("/auth/register")
        .set_json(serde_json::json!({ "username": "alice", "password": "secret1" }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"]["username"], "alice");
    let registered_key = body["streamKey"].as_str().unwrap().to_string();
    assert!(registered_key.starts_with("alice_"));

    let req = test::TestRequest::post()
        .uri("/auth/register")
        .set_json(serde_json::json!({ "username": "Alice", "password": "secret1" }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "USER_EXISTS");

    // Login
    let req = test::TestRequest::post()
        .uri("/auth/login")
        .set_json(serde_json::json!({ "username": "alice", "password": "secret1" }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["streamKey"], registered_key.as_str());
    assert!(body["expiresAt"].is_string());
    let token = body["token"].as_str().unwrap().to_string();

    // Ingester starts publishing
    let req = test::TestRequest::post()
        .uri("/stream/verify")
        .set_form(vec![("app", "live"), ("name", registered_key.as_str())])
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);

    let req = test::TestRequest::get()
        .uri("/stream/status")
        .insert_header(bearer(&token))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isLive"], true);
    assert_eq!(body["streamCount"], 1);
    assert_eq!(body["streamKey"], registered_key.as_str());
    assert_eq!(body["watchUrl"], "http://cdn.test/hls/alice/index.m3u8");

    let req = test::TestRequest::get().uri("/stream/public/alice").to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isLive"], true);
    assert!(body.get("streamKey").is_none());

    let req = test::TestRequest::get().uri("/stream/online").to_request();
    let (_, body) = send(&app, req).await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["streams"][0]["username"], "alice");

    // No key rotation while live
    let req = test::TestRequest::post()
        .uri("/stream/regenerate-key")
        .insert_header(bearer(&token))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "STREAMING_IN_PROGRESS");

    // End is idempotent and never fails
    for _ in 0..2 {
        let req = test::TestRequest::post()
            .uri("/stream/end")
            .set_form(vec![("name", registered_key.as_str())])
            .to_request();
        let (status, _) = send(&app, req).await;
        assert_eq!(status, StatusCode::OK);
    }
    let req = test::TestRequest::post()
        .uri("/stream/end?name=nobody_0000_0123456789abcdef")
        .to_request();
    assert_eq!(send(&app, req).await.0, StatusCode::OK);

    let req = test::TestRequest::get()
        .uri("/stream/status")
        .insert_header(bearer(&token))
        .to_request();
    let (_, body) = send(&app, req).await;
    assert_eq!(body["isLive"], false);
    assert!(body["lastStreamEndTime"].is_string());
}

#[actix_web::test]
async fn test_publish_denials() {
    let app = test::init_service(App::new().configure(routes::configure(state_with(&[])))).await;

    for uri in [
        "/stream/verify",
        "/stream/verify?name=bad%3Ckey%3E",
        "/stream/verify?key=unknown_0000_0123456789abcdef",
    ] {
        let req = test::TestRequest::post().uri(uri).to_request();
        let (status, _) = send(&app, req).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{uri}");
    }
}

#[actix_web::test]
async fn test_key_rotation_invalidates_old_key() {
    let state = state_with(&[]);
    let app = test::init_service(App::new().configure(routes::configure(state.clone()))).await;

    let req = test::TestRequest::post()
        .uri("/auth/register")
        .set_json(serde_json::json!({ "username": "bob", "password": "hunter22" }))
        .to_request();
    let (_, body) = send(&app, req).await;
    let old_key = body["streamKey"].as_str().unwrap().to_string();

    let req = test::TestRequest::post()
        .uri("/auth/login")
        .set_json(serde_json::json!({ "username": "bob", "password": "hunter22" }))
        .to_request();
    let (_, body) = send(&app, req).await;
    let token = body["token"].as_str().unwrap().to_string();

    let req = test::TestRequest::post()
        .uri("/stream/regenerate-key")
        .insert_header(bearer(&token))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    let new_key = body["streamKey"].as_str().unwrap().to_string();
    assert_ne!(new_key, old_key);

    let req = test::TestRequest::post()
        .uri(&format!("/stream/verify?name={old_key}"))
        .to_request();
    assert_eq!(send(&app, req).await.0, StatusCode::FORBIDDEN);

    let req = test::TestRequest::post()
        .uri(&format!("/stream/verify?name={new_key}"))
        .to_request();
    assert_eq!(send(&app, req).await.0, StatusCode::OK);
    assert!(state.presence.is_live("bob"));
}

#[actix_web::test]
async fn test_session_lifecycle() {
    let app = test::init_service(App::new().configure(routes::configure(state_with(&[])))).await;

    let req = test::TestRequest::post()
        .uri("/auth/register")
        .set_json(serde_json::json!({ "username": "carol", "password": "secret1" }))
        .to_request();
    send(&app, req).await;

    let req = test::TestRequest::post()
        .uri("/auth/login")
        .set_json(serde_json::json!({ "username": "carol", "password": "nope-nope" }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "INVALID_CREDENTIALS");

    let req = test::TestRequest::post()
        .uri("/auth/login")
        .set_json(serde_json::json!({ "username": "carol", "password": "secret1" }))
        .to_request();
    let (_, body) = send(&app, req).await;
    let first = body["token"].as_str().unwrap().to_string();

    let req = test::TestRequest::get().uri("/auth/profile").to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "NO_TOKEN");

    let req = test::TestRequest::get()
        .uri("/auth/profile")
        .insert_header(bearer(&first))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "carol");
    assert!(body.get("passwordHash").is_none());

    let req = test::TestRequest::post()
        .uri("/auth/refresh")
        .insert_header(bearer(&first))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    let second = body["token"].as_str().unwrap().to_string();

    let req = test::TestRequest::get()
        .uri("/auth/profile")
        .insert_header(bearer(&first))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "TOKEN_REVOKED");

    let req = test::TestRequest::post()
        .uri("/auth/logout")
        .insert_header(bearer(&second))
        .to_request();
    assert_eq!(send(&app, req).await.0, StatusCode::OK);

    let req = test::TestRequest::get()
        .uri(&format!("/auth/profile?token={second}"))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "TOKEN_REVOKED");
}

#[actix_web::test]
async fn test_validation_and_not_found() {
    let app = test::init_service(App::new().configure(routes::configure(state_with(&[])))).await;

    let req = test::TestRequest::post()
        .uri("/auth/register")
        .set_json(serde_json::json!({ "username": "x", "password": "secret1" }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "VALIDATION_ERROR");

    let req = test::TestRequest::post()
        .uri("/auth/register")
        .insert_header(("content-type", "application/json"))
        .set_payload("{not json")
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "VALIDATION_ERROR");

    let req = test::TestRequest::get().uri("/stream/public/ghost").to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "USER_NOT_FOUND");

    let req = test::TestRequest::get()
        .uri("/stream/online?limit=lots")
        .to_request();
    assert_eq!(send(&app, req).await.0, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn test_rate_limit_spares_health_and_metrics() {
    let app = test::init_service(App::new().configure(routes::configure(state_with(&[(
        "RATE_LIMIT_MAX_REQUESTS",
        "2",
    )]))))
    .await;

    for _ in 0..2 {
        let req = test::TestRequest::get().uri("/stream/online").to_request();
        assert_eq!(send(&app, req).await.0, StatusCode::OK);
    }

    let req = test::TestRequest::get().uri("/stream/online").to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"], "RATE_LIMITED");

    let req = test::TestRequest::get().uri("/health").to_request();
    assert_eq!(send(&app, req).await.0, StatusCode::OK);

    let req = test::TestRequest::get().uri("/metrics").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
}
