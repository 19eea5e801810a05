//! Middleware for the Taskboard API
//!
//! - `auth`: JWT authentication middleware and extractors
//! - `rate_limit`: per-client rate limiting
//!
//! # Middleware Order
//!
//! ```ignore
//! Router::new()
//!     .route("/users/profile", get(profile))
//!     // Innermost: only on protected routes
//!     .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
//!     // Rate limiting runs before anything else touches the request
//!     .layer(middleware::from_fn_with_state(rate_limit_state, rate_limit_middleware))
//!     // Outermost
//! ```

mod auth;
mod rate_limit;

pub use auth::{auth_middleware, AuthExtractor, OptionalAuth};
pub use rate_limit::{rate_limit_middleware, RateLimitError, RateLimitState};
