use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::{
        header::{HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
        StatusCode,
    },
    web, Error, HttpMessage, HttpResponse, ResponseError,
};
use chrono::{DateTime, Utc};
use futures::future::{ready, Ready};
use jwt_security::{TokenError, TokenService};
use serde::Deserialize;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;
use uuid::Uuid;

/// Name of the query parameter, form field and cookie that may carry a token
pub const TOKEN_PARAM: &str = "token";

const X_TOKEN_EXPIRES_SOON: HeaderName = HeaderName::from_static("x-token-expires-soon");

/// Caller identity established by [`JwtAuthMiddleware`]
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub username: String,
    pub stream_key: String,
    /// Raw token, kept so logout and refresh can revoke it
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub expires_soon: bool,
}

/// Token candidates found on a request, in priority order
#[derive(Debug, Default, Clone)]
pub struct TokenCarriers {
    pub bearer: Option<String>,
    pub query: Option<String>,
    pub form: Option<String>,
    pub cookie: Option<String>,
}

impl TokenCarriers {
    /// First non-empty carrier wins: bearer header, query, form field, cookie.
    pub fn select(&self) -> Option<&str> {
        [&self.bearer, &self.query, &self.form, &self.cookie]
            .into_iter()
            .flatten()
            .map(|value| value.trim())
            .find(|value| !value.is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct TokenParam {
    token: Option<String>,
}

fn bearer_token(req: &ServiceRequest) -> Option<String> {
    let header = req.headers().get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = header.split_once(' ')?;
    scheme
        .eq_ignore_ascii_case("bearer")
        .then(|| token.trim().to_string())
}

fn urlencoded_token(encoded: &str) -> Option<String> {
    web::Query::<TokenParam>::from_query(encoded)
        .ok()
        .and_then(|param| param.into_inner().token)
}

fn is_form_request(req: &ServiceRequest) -> bool {
    req.headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.starts_with("application/x-www-form-urlencoded"))
        .unwrap_or(false)
}

/// Read the form body for a `token` field, then put the bytes back so the
/// handler can still extract the body. A body that cannot be buffered is
/// rejected rather than forwarded empty.
async fn form_token(req: &mut ServiceRequest) -> Result<Option<String>, Error> {
    if !is_form_request(req) {
        return Ok(None);
    }

    let body = req.extract::<web::Bytes>().await.map_err(|e| {
        tracing::warn!(path = %req.path(), error = %e, "Failed to buffer form body");
        e
    })?;
    let token = std::str::from_utf8(&body).ok().and_then(urlencoded_token);

    let (_, mut payload) = actix_http::h1::Payload::create(true);
    payload.unread_data(body);
    req.set_payload(payload.into());

    Ok(token)
}

/// Collect carriers lazily: lower-priority sources are only read when every
/// higher one is empty.
pub async fn extract_token(req: &mut ServiceRequest) -> Result<Option<String>, Error> {
    let mut carriers = TokenCarriers {
        bearer: bearer_token(req),
        query: urlencoded_token(req.query_string()),
        ..TokenCarriers::default()
    };
    if carriers.select().is_none() {
        carriers.form = form_token(req).await?;
    }
    if carriers.select().is_none() {
        carriers.cookie = req.cookie(TOKEN_PARAM).map(|c| c.value().to_string());
    }

    Ok(carriers.select().map(str::to_string))
}

/// A rejected session token rendered as a 401 (or 500 for server conditions)
#[derive(Debug)]
pub struct TokenRejection(pub TokenError);

impl fmt::Display for TokenRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl ResponseError for TokenRejection {
    fn status_code(&self) -> StatusCode {
        if self.0.is_server_condition() {
            StatusCode::INTERNAL_SERVER_ERROR
        } else {
            StatusCode::UNAUTHORIZED
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let message = if self.0.is_server_condition() {
            "Internal server error".to_string()
        } else {
            self.0.to_string()
        };

        HttpResponse::build(status).json(serde_json::json!({
            "error": self.0.code(),
            "message": message,
            "status": status.as_u16(),
        }))
    }
}

/// JWT Authentication Middleware
pub struct JwtAuthMiddleware {
    tokens: Arc<TokenService>,
}

impl JwtAuthMiddleware {
    pub fn new(tokens: Arc<TokenService>) -> Self {
        Self { tokens }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtAuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = JwtAuthMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(JwtAuthMiddlewareService {
            service: Rc::new(service),
            tokens: self.tokens.clone(),
        }))
    }
}

pub struct JwtAuthMiddlewareService<S> {
    service: Rc<S>,
    tokens: Arc<TokenService>,
}

impl<S, B> Service<ServiceRequest> for JwtAuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let tokens = self.tokens.clone();

        Box::pin(async move {
            let token = extract_token(&mut req)
                .await?
                .ok_or(TokenRejection(TokenError::NoToken))?;

            let verified = tokens.verify(&token).map_err(|e| {
                tracing::warn!(path = %req.path(), error = %e, "JWT validation failed");
                TokenRejection(e)
            })?;

            let expires_soon = verified.expires_soon;
            req.extensions_mut().insert(AuthenticatedUser {
                user_id: verified.claims.subject_id,
                username: verified.claims.username,
                stream_key: verified.claims.stream_key,
                token,
                expires_at: verified.expires_at,
                expires_soon,
            });

            let mut res = service.call(req).await?;
            if expires_soon {
                res.headers_mut()
                    .insert(X_TOKEN_EXPIRES_SOON, HeaderValue::from_static("true"));
            }
            Ok(res)
        })
    }
}

impl actix_web::FromRequest for AuthenticatedUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(
        req: &actix_web::HttpRequest,
        _payload: &mut actix_web::dev::Payload,
    ) -> Self::Future {
        match req.extensions().get::<AuthenticatedUser>() {
            Some(user) => ready(Ok(user.clone())),
            None => ready(Err(TokenRejection(TokenError::NoToken).into())),
        }
    }
}
