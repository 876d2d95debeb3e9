//! # Actix Middleware Library
//!
//! Request guards shared by the gatekeeper's HTTP surface
//!
//! ## Modules
//! - `jwt_auth`: session token extraction (header, query, form, cookie) and verification
//! - `rate_limit`: in-process sliding-window rate limiting with `X-RateLimit-*` headers

pub mod jwt_auth;
pub mod rate_limit;

pub use jwt_auth::{extract_token, AuthenticatedUser, JwtAuthMiddleware, TokenCarriers};
pub use rate_limit::{
    RateLimitConfig, RateLimitExceeded, RateLimitMiddleware, RateLimitStatus,
    SlidingWindowLimiter,
};
