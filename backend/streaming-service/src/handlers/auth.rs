use crate::error::Result;
use crate::models::UserProfile;
use crate::AppState;
use actix_middleware::AuthenticatedUser;
use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub message: &'static str,
    pub user: UserProfile,
    pub stream_key: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub stream_key: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserProfile,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// POST /auth/register
pub async fn register(
    state: web::Data<AppState>,
    body: web::Json<CredentialsRequest>,
) -> Result<HttpResponse> {
    let user = state
        .accounts
        .register(&body.username, &body.password)
        .await?;

    Ok(HttpResponse::Created().json(RegisterResponse {
        message: "Registered",
        user: UserProfile::from(&user),
        stream_key: user.stream_key,
    }))
}

/// POST /auth/login
pub async fn login(
    state: web::Data<AppState>,
    body: web::Json<CredentialsRequest>,
) -> Result<HttpResponse> {
    let outcome = state.accounts.login(&body.username, &body.password).await?;

    Ok(HttpResponse::Ok().json(LoginResponse {
        token: outcome.token.token,
        stream_key: outcome.user.stream_key.clone(),
        expires_at: outcome.token.expires_at,
        user: UserProfile::from(&outcome.user),
    }))
}

/// POST /auth/refresh
pub async fn refresh(state: web::Data<AppState>, user: AuthenticatedUser) -> Result<HttpResponse> {
    let issued = state.accounts.refresh(user.user_id, &user.token).await?;

    Ok(HttpResponse::Ok().json(RefreshResponse {
        token: issued.token,
        expires_at: issued.expires_at,
    }))
}

/// GET /auth/profile
pub async fn profile(state: web::Data<AppState>, user: AuthenticatedUser) -> Result<HttpResponse> {
    let record = state.accounts.profile(user.user_id).await?;
    Ok(HttpResponse::Ok().json(UserProfile::from(&record)))
}

/// POST /auth/logout
pub async fn logout(state: web::Data<AppState>, user: AuthenticatedUser) -> HttpResponse {
    state.accounts.logout(user.user_id, &user.token);
    HttpResponse::Ok().json(serde_json::json!({ "message": "Logged out" }))
}
