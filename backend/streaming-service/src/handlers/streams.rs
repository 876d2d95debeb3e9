use crate::error::Result;
use crate::models::PublishDecision;
use crate::AppState;
use actix_middleware::AuthenticatedUser;
use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Publish callback parameters sent by the media ingester.
/// The stream key arrives as `name` (nginx-rtmp) or `key`.
#[derive(Debug, Default, Deserialize)]
pub struct PublishCallback {
    pub name: Option<String>,
    pub key: Option<String>,
    pub addr: Option<String>,
}

impl PublishCallback {
    fn stream_key(&self) -> Option<&str> {
        [&self.name, &self.key]
            .into_iter()
            .flatten()
            .map(|value| value.trim())
            .find(|value| !value.is_empty())
    }
}

/// Form body first, query string second
fn claimed_key<'a>(
    form: &'a Option<web::Form<PublishCallback>>,
    query: &'a PublishCallback,
) -> (&'a str, &'a str) {
    let key = form
        .as_ref()
        .and_then(|f| f.0.stream_key())
        .or_else(|| query.stream_key())
        .unwrap_or_default();
    let addr = form
        .as_ref()
        .and_then(|f| f.0.addr.as_deref())
        .or(query.addr.as_deref())
        .unwrap_or_default();
    (key, addr)
}

#[derive(Debug, Deserialize)]
pub struct OnlineQuery {
    pub limit: Option<usize>,
}

/// POST /stream/verify
pub async fn verify_publish(
    state: web::Data<AppState>,
    query: web::Query<PublishCallback>,
    form: Option<web::Form<PublishCallback>>,
) -> Result<HttpResponse> {
    let (key, addr) = claimed_key(&form, &query);

    match state.gatekeeper.verify_publish(key).await? {
        PublishDecision::Allow { username } => {
            info!(%username, remote = %addr, "Ingester publish accepted");
            Ok(HttpResponse::Ok().finish())
        }
        PublishDecision::Deny(reason) => {
            info!(reason = reason.as_str(), remote = %addr, "Ingester publish rejected");
            Ok(HttpResponse::Forbidden().finish())
        }
    }
}

/// POST /stream/end
pub async fn end_publish(
    state: web::Data<AppState>,
    query: web::Query<PublishCallback>,
    form: Option<web::Form<PublishCallback>>,
) -> HttpResponse {
    let (key, _) = claimed_key(&form, &query);
    state.gatekeeper.end_publish(key).await;
    HttpResponse::Ok().finish()
}

/// GET /stream/status
pub async fn status(state: web::Data<AppState>, user: AuthenticatedUser) -> Result<HttpResponse> {
    let record = state.accounts.profile(user.user_id).await?;
    Ok(HttpResponse::Ok().json(state.gatekeeper.status(&record)))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegenerateKeyResponse {
    pub message: &'static str,
    pub stream_key: String,
    pub stream_key_updated_at: chrono::DateTime<chrono::Utc>,
}

/// POST /stream/regenerate-key
pub async fn regenerate_key(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
) -> Result<HttpResponse> {
    let updated = state.accounts.regenerate_stream_key(user.user_id).await?;

    Ok(HttpResponse::Ok().json(RegenerateKeyResponse {
        message: "Stream key regenerated",
        stream_key: updated.stream_key,
        stream_key_updated_at: updated.stream_key_updated_at,
    }))
}

/// GET /stream/public/{username}
pub async fn public_status(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    match state.gatekeeper.public_status(&path.into_inner()).await? {
        Some(status) => Ok(HttpResponse::Ok().json(status)),
        None => Err(crate::error::AppError::UserNotFound),
    }
}

/// GET /stream/online
pub async fn online(state: web::Data<AppState>, query: web::Query<OnlineQuery>) -> HttpResponse {
    let streams = state.gatekeeper.list_online(query.limit);
    HttpResponse::Ok().json(serde_json::json!({
        "count": streams.len(),
        "streams": streams,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_preferred_over_key() {
        let callback = PublishCallback {
            name: Some("from_name_0123456789".into()),
            key: Some("from_key_0123456789".into()),
            addr: None,
        };
        assert_eq!(callback.stream_key(), Some("from_name_0123456789"));
    }

    #[test]
    fn test_form_preferred_over_query() {
        let form = Some(web::Form(PublishCallback {
            key: Some("form_key_0123456789".into()),
            addr: Some("10.0.0.2".into()),
            ..PublishCallback::default()
        }));
        let query = PublishCallback {
            name: Some("query_key_0123456789".into()),
            addr: Some("10.0.0.3".into()),
            ..PublishCallback::default()
        };
        assert_eq!(
            claimed_key(&form, &query),
            ("form_key_0123456789", "10.0.0.2")
        );
        assert_eq!(claimed_key(&None, &query), ("query_key_0123456789", "10.0.0.3"));
    }

    #[test]
    fn test_blank_values_ignored() {
        let query = PublishCallback {
            name: Some("  ".into()),
            ..PublishCallback::default()
        };
        assert_eq!(claimed_key(&None, &query), ("", ""));
    }
}
