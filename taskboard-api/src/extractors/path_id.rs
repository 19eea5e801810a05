//! Typed entity ids from path parameters.

use axum::{
    async_trait,
    extract::{FromRequestParts, Path},
    http::request::Parts,
};
use taskboard_core::EntityIdType;
use uuid::Uuid;

use crate::error::ApiError;

/// Extract a path parameter straight into an id newtype.
///
/// A malformed UUID is rejected as `INVALID_FORMAT` with the entity name in
/// the error details instead of axum's plain-text path rejection.
///
/// ```rust,ignore
/// async fn get_project(PathId(id): PathId<ProjectId>) -> ApiResult<Json<ProjectResponse>> {
///     ...
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct PathId<T: EntityIdType>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for PathId<T>
where
    S: Send + Sync,
    T: EntityIdType,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(uuid): Path<Uuid> = Path::from_request_parts(parts, state)
            .await
            .map_err(|e| {
                ApiError::invalid_format("id", "UUID").with_details(serde_json::json!({
                    "entity_type": T::ENTITY_NAME,
                    "path": parts.uri.path(),
                    "reason": e.body_text(),
                }))
            })?;

        Ok(PathId(T::new(uuid)))
    }
}
