//! HTTP handlers for the streaming gatekeeper
//!
//! - Account endpoints under `/auth`
//! - Ingester callbacks and stream status under `/stream`

pub mod auth;
pub mod streams;

use actix_web::HttpResponse;

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}
