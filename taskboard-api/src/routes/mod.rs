//! HTTP Routes
//!
//! Includes:
//! - Users: registration, login, token refresh and profile
//! - Projects and tasks: CRUD with owner/assignee authorization
//! - Uploads: multipart image upload, stored files served under `/uploads`
//! - GraphQL endpoint, GraphiQL and websocket subscriptions
//! - Health checks
//! - CORS support for browser-based clients

pub mod graphql;
pub mod health;
pub mod projects;
pub mod tasks;
pub mod upload;
pub mod users;

use std::time::Duration;

use axum::{
    http::{header, header::HeaderName, HeaderValue, Method},
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use utoipa::OpenApi;

use crate::config::ApiConfig;
use crate::middleware::rate_limit_middleware;
use crate::openapi::ApiDoc;
use crate::state::AppState;

pub use graphql::create_router as graphql_router;
pub use health::create_router as health_router;
pub use projects::create_router as projects_router;
pub use tasks::create_router as tasks_router;
pub use upload::create_router as upload_router;
pub use users::create_router as users_router;

// ============================================================================
// OPENAPI ENDPOINTS
// ============================================================================

/// Handler for /openapi.json endpoint.
async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

// ============================================================================
// CORS LAYER
// ============================================================================

/// Build the CORS layer from ApiConfig.
///
/// With no configured origins every origin is allowed; otherwise only the
/// listed ones.
fn build_cors_layer(config: &ApiConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([
            HeaderName::from_static("x-ratelimit-limit"),
            HeaderName::from_static("retry-after"),
        ])
        .max_age(Duration::from_secs(config.cors_max_age_secs));

    if config.cors_origins.is_empty() {
        tracing::info!("CORS: allowing all origins");
        cors.allow_origin(Any)
    } else {
        tracing::info!(origins = ?config.cors_origins, "CORS: restricted origins");
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        cors.allow_origin(origins)
    }
}

// ============================================================================
// ROUTER
// ============================================================================

/// Create the complete application router.
///
/// - `/users/*`, `/projects/*`, `/tasks/*`, `/upload`
/// - `/graphql` (POST queries, GET GraphiQL) and `/graphql/ws`
/// - `/uploads/*` static files
/// - `/health/*`
/// - `/openapi.json`, plus Swagger UI when the `swagger-ui` feature is on
///
/// Layers, outermost first: CORS, request tracing, rate limiting.
pub fn create_router(state: AppState) -> Router {
    let config = state.config.clone();

    let mut router = Router::new()
        .nest("/users", users::create_router(state.auth.clone()))
        .nest("/projects", projects::create_router())
        .nest("/tasks", tasks::create_router())
        .nest("/upload", upload::create_router(&config))
        .nest("/graphql", graphql::create_router(state.graphql_schema.clone()))
        .nest("/health", health::create_router())
        .nest_service(upload::UPLOADS_PATH, ServeDir::new(&config.upload_dir))
        .route("/openapi.json", get(openapi_json));

    #[cfg(feature = "swagger-ui")]
    {
        use utoipa_swagger_ui::SwaggerUi;
        // `/openapi.json` is already routed above.
        router = router.merge(
            SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()),
        );
    }

    let cors = build_cors_layer(&config);

    router
        .layer(from_fn_with_state(state.rate_limit.clone(), rate_limit_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
