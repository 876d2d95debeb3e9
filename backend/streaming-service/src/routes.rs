//! Route table
//!
//! `/health` and `/metrics` sit outside the rate limiter; everything else is
//! limited per client address. Bearer-protected resources are wrapped
//! individually so the public stream routes stay open.

use crate::error::AppError;
use crate::handlers::{self, auth, streams};
use crate::metrics;
use crate::AppState;
use actix_middleware::{JwtAuthMiddleware, RateLimitMiddleware};
use actix_web::web;

pub fn configure(state: AppState) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg| {
        let bearer = || JwtAuthMiddleware::new(state.tokens.clone());

        cfg.app_data(web::Data::new(state.clone()))
            .app_data(web::JsonConfig::default().error_handler(|err, _req| {
                AppError::Validation(err.to_string()).into()
            }))
            .app_data(web::QueryConfig::default().error_handler(|err, _req| {
                AppError::Validation(err.to_string()).into()
            }))
            .route("/health", web::get().to(handlers::health))
            .route("/metrics", web::get().to(metrics::serve_metrics))
            .service(
                web::scope("")
                    .wrap(
                        RateLimitMiddleware::new(state.rate_limiter.clone())
                            .trust_forwarded_headers(state.config.rate_limit.trust_forwarded_headers),
                    )
                    .service(
                        web::scope("/auth")
                            .route("/register", web::post().to(auth::register))
                            .route("/login", web::post().to(auth::login))
                            .service(
                                web::resource("/refresh")
                                    .wrap(bearer())
                                    .route(web::post().to(auth::refresh)),
                            )
                            .service(
                                web::resource("/profile")
                                    .wrap(bearer())
                                    .route(web::get().to(auth::profile)),
                            )
                            .service(
                                web::resource("/logout")
                                    .wrap(bearer())
                                    .route(web::post().to(auth::logout)),
                            ),
                    )
                    .service(
                        web::scope("/stream")
                            .route("/verify", web::post().to(streams::verify_publish))
                            .route("/end", web::post().to(streams::end_publish))
                            .route("/public/{username}", web::get().to(streams::public_status))
                            .route("/online", web::get().to(streams::online))
                            .service(
                                web::resource("/status")
                                    .wrap(bearer())
                                    .route(web::get().to(streams::status)),
                            )
                            .service(
                                web::resource("/regenerate-key")
                                    .wrap(bearer())
                                    .route(web::post().to(streams::regenerate_key)),
                            ),
                    ),
            );
    }
}
