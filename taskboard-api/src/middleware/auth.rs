//! Axum middleware and extractors for authentication.
//!
//! - `auth_middleware` rejects requests without a valid access token and
//!   injects [`AuthContext`] into request extensions.
//! - [`AuthExtractor`] requires an authenticated caller in a handler
//!   signature. It reuses the context injected by the middleware and
//!   otherwise authenticates the `Authorization` header itself, so public and
//!   protected handlers can share one path.
//! - [`OptionalAuth`] yields `None` for anonymous requests but still rejects
//!   a malformed or expired token.

use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::auth::{authenticate, AuthConfig, AuthContext};
use crate::error::ApiError;

fn authorization_header(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
}

/// Require a valid access token for every request passing through.
///
/// ```ignore
/// let protected = Router::new()
///     .route("/users/profile", get(profile))
///     .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));
/// ```
pub async fn auth_middleware(
    State(auth_config): State<Arc<AuthConfig>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let auth_context = authenticate(&auth_config, header)?;
    debug!(user_id = %auth_context.user_id, "Authenticated request");

    request.extensions_mut().insert(auth_context);
    Ok(next.run(request).await)
}

// ============================================================================
// TYPED EXTRACTORS
// ============================================================================

/// Authenticated caller.
///
/// ```ignore
/// async fn create_project(
///     State(store): State<Arc<dyn Store>>,
///     AuthExtractor(auth): AuthExtractor,
///     Json(req): Json<CreateProjectRequest>,
/// ) -> ApiResult<impl IntoResponse> { ... }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct AuthExtractor(pub AuthContext);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthExtractor
where
    Arc<AuthConfig>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(auth) = parts.extensions.get::<AuthContext>() {
            return Ok(AuthExtractor(*auth));
        }

        let auth_config = Arc::<AuthConfig>::from_ref(state);
        let auth = authenticate(&auth_config, authorization_header(parts))?;
        parts.extensions.insert(auth);
        Ok(AuthExtractor(auth))
    }
}

impl std::ops::Deref for AuthExtractor {
    type Target = AuthContext;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Caller identity when a token is present.
#[derive(Debug, Clone, Copy)]
pub struct OptionalAuth(pub Option<AuthContext>);

#[axum::async_trait]
impl<S> FromRequestParts<S> for OptionalAuth
where
    Arc<AuthConfig>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if authorization_header(parts).is_none() && parts.extensions.get::<AuthContext>().is_none()
        {
            return Ok(OptionalAuth(None));
        }
        let AuthExtractor(auth) = AuthExtractor::from_request_parts(parts, state).await?;
        Ok(OptionalAuth(Some(auth)))
    }
}
