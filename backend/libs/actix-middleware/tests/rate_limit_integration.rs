use actix_middleware::{RateLimitMiddleware, SlidingWindowLimiter};
use actix_web::{test, web, App, HttpResponse};
use std::sync::Arc;
use std::time::Duration;

/// Simple test handler
async fn test_handler() -> HttpResponse {
    HttpResponse::Ok().body("success")
}

fn header<B>(resp: &actix_web::dev::ServiceResponse<B>, name: &str) -> String {
    resp.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

#[actix_web::test]
async fn test_rate_limit_exceeded() {
    // 2 requests per 10 seconds
    let limiter = Arc::new(SlidingWindowLimiter::new(Duration::from_secs(10), 2));

    let app = test::init_service(
        App::new()
            .wrap(RateLimitMiddleware::new(limiter))
            .route("/test", web::get().to(test_handler)),
    )
    .await;

    let req = test::TestRequest::get().uri("/test").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    assert_eq!(header(&resp, "x-ratelimit-limit"), "2");
    assert_eq!(header(&resp, "x-ratelimit-remaining"), "1");

    let req = test::TestRequest::get().uri("/test").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    assert_eq!(header(&resp, "x-ratelimit-remaining"), "0");

    let req = test::TestRequest::get().uri("/test").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 429);
    assert!(!header(&resp, "retry-after").is_empty());

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "RATE_LIMITED");
    assert!(body["retryAfter"].as_u64().unwrap() >= 1);
}

#[actix_web::test]
async fn test_rate_limit_is_per_client_address() {
    let limiter = Arc::new(SlidingWindowLimiter::new(Duration::from_secs(60), 1));

    let app = test::init_service(
        App::new()
            .wrap(RateLimitMiddleware::new(limiter))
            .route("/test", web::get().to(test_handler)),
    )
    .await;

    let first = test::TestRequest::get()
        .uri("/test")
        .peer_addr("10.0.0.1:5000".parse().unwrap())
        .to_request();
    assert!(test::call_service(&app, first).await.status().is_success());

    let other = test::TestRequest::get()
        .uri("/test")
        .peer_addr("10.0.0.2:5000".parse().unwrap())
        .to_request();
    assert!(test::call_service(&app, other).await.status().is_success());

    let repeat = test::TestRequest::get()
        .uri("/test")
        .peer_addr("10.0.0.1:6000".parse().unwrap())
        .to_request();
    assert_eq!(test::call_service(&app, repeat).await.status(), 429);
}

#[actix_web::test]
async fn test_spoofed_forwarded_for_shares_peer_bucket() {
    let limiter = Arc::new(SlidingWindowLimiter::new(Duration::from_secs(60), 1));

    let app = test::init_service(
        App::new()
            .wrap(RateLimitMiddleware::new(limiter))
            .route("/test", web::get().to(test_handler)),
    )
    .await;

    let mut allowed = 0;
    for i in 0..10 {
        let req = test::TestRequest::get()
            .uri("/test")
            .peer_addr("10.0.0.1:5000".parse().unwrap())
            .insert_header(("x-forwarded-for", format!("203.0.113.{i}")))
            .to_request();
        if test::call_service(&app, req).await.status().is_success() {
            allowed += 1;
        }
    }
    assert_eq!(allowed, 1);
}

#[actix_web::test]
async fn test_trusted_proxy_keys_on_forwarded_for() {
    let limiter = Arc::new(SlidingWindowLimiter::new(Duration::from_secs(60), 1));

    let app = test::init_service(
        App::new()
            .wrap(RateLimitMiddleware::new(limiter).trust_forwarded_headers(true))
            .route("/test", web::get().to(test_handler)),
    )
    .await;

    let from = |client: &str| {
        test::TestRequest::get()
            .uri("/test")
            .peer_addr("10.0.0.1:5000".parse().unwrap())
            .insert_header(("x-forwarded-for", client.to_string()))
            .to_request()
    };

    assert!(test::call_service(&app, from("203.0.113.7")).await.status().is_success());
    assert!(test::call_service(&app, from("203.0.113.8")).await.status().is_success());
    assert_eq!(test::call_service(&app, from("203.0.113.7")).await.status(), 429);
}
