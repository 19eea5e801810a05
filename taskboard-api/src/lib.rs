//! Taskboard API - REST and GraphQL over a shared store
//!
//! Axum serves the REST endpoints, async-graphql the GraphQL schema and its
//! websocket subscriptions. GraphQL relation fields resolve through
//! request-scoped batch loaders from `taskboard-loader`, so nested queries
//! cost one store round trip per relation and level.

pub mod auth;
pub mod config;
pub mod error;
pub mod events;
pub mod extractors;
pub mod loaders;
#[macro_use]
mod macros;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod state;
pub mod telemetry;
pub mod types;

// Re-export commonly used types
pub use auth::{
    authenticate, hash_password, issue_token_pair, validate_access_token,
    validate_refresh_token, verify_password, AuthConfig, AuthContext, Claims, TokenPair,
};
pub use config::ApiConfig;
pub use error::{ApiError, ApiResult, ErrorCode};
pub use events::{EventBus, TaskboardEvent};
pub use loaders::RequestLoaders;
pub use middleware::{auth_middleware, AuthExtractor, OptionalAuth, RateLimitState};
pub use openapi::ApiDoc;
pub use routes::create_router;
pub use routes::graphql::{build_schema, TaskboardSchema};
pub use state::AppState;
pub use types::*;
