//! User REST Routes
//!
//! Registration, login, token refresh and the caller's profile.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use taskboard_core::{EntityType, StorageError, User};
use taskboard_storage::Store;
use tracing::{info, warn};

use crate::{
    auth::{
        hash_password, issue_token_pair, validate_refresh_token, verify_password, AuthConfig,
        TokenPair,
    },
    error::{ApiError, ApiResult},
    middleware::{auth_middleware, AuthExtractor},
    state::AppState,
    types::{LoginRequest, RefreshRequest, RegisterRequest, UserResponse},
};

/// Argon2 blocks for tens of milliseconds; run it on the blocking pool.
pub(crate) async fn hash_off_thread(password: String) -> ApiResult<String> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| ApiError::internal_error(format!("Password hashing task failed: {}", e)))?
}

async fn verify_off_thread(password: String, hash: String) -> ApiResult<bool> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| ApiError::internal_error(format!("Password verification task failed: {}", e)))
}

/// POST /users/register
#[utoipa::path(
    post,
    path = "/users/register",
    tag = "Users",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered", body = UserResponse),
        (status = 400, description = "Invalid input", body = ApiError),
        (status = 409, description = "Username or email already in use", body = ApiError),
    ),
)]
pub async fn register(
    State(store): State<Arc<dyn Store>>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    req.validate()?;

    let password_hash = hash_off_thread(req.password).await?;
    let user = User::new(req.username, req.email, password_hash);
    store.user_insert(&user).await?;

    info!(user_id = %user.id, username = %user.username, "User registered");
    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

/// POST /users/login
#[utoipa::path(
    post,
    path = "/users/login",
    tag = "Users",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Tokens issued", body = TokenPair),
        (status = 401, description = "Invalid credentials", body = ApiError),
    ),
)]
pub async fn login(
    State(store): State<Arc<dyn Store>>,
    State(auth_config): State<Arc<AuthConfig>>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<TokenPair>> {
    let user = login_user(store.as_ref(), &req.email, req.password).await?;
    Ok(Json(issue_token_pair(&auth_config, user.id, user.role)?))
}

/// Check credentials; unknown email and wrong password are indistinguishable.
pub(crate) async fn login_user(store: &dyn Store, email: &str, password: String) -> ApiResult<User> {
    let Some(user) = store.user_find_by_email(email).await? else {
        warn!("Login attempt for unknown email");
        return Err(ApiError::unauthorized("Invalid credentials"));
    };

    if !verify_off_thread(password, user.password_hash.clone()).await? {
        warn!(user_id = %user.id, "Login attempt with wrong password");
        return Err(ApiError::unauthorized("Invalid credentials"));
    }

    info!(user_id = %user.id, "User logged in");
    Ok(user)
}

/// POST /users/refresh
#[utoipa::path(
    post,
    path = "/users/refresh",
    tag = "Users",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Tokens reissued", body = TokenPair),
        (status = 401, description = "Invalid or expired refresh token", body = ApiError),
    ),
)]
pub async fn refresh(
    State(store): State<Arc<dyn Store>>,
    State(auth_config): State<Arc<AuthConfig>>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<Json<TokenPair>> {
    let claims = validate_refresh_token(&auth_config, &req.refresh_token)?;

    // Deleted accounts and role changes apply on refresh.
    let user = store
        .user_get(claims.sub)
        .await?
        .ok_or_else(|| ApiError::unauthorized("User no longer exists"))?;

    Ok(Json(issue_token_pair(&auth_config, user.id, user.role)?))
}

/// GET /users/profile
#[utoipa::path(
    get,
    path = "/users/profile",
    tag = "Users",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 404, description = "User not found", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn profile(
    State(store): State<Arc<dyn Store>>,
    AuthExtractor(auth): AuthExtractor,
) -> ApiResult<Json<UserResponse>> {
    let user = store
        .user_get(auth.user_id)
        .await?
        .ok_or(StorageError::not_found(EntityType::User, auth.user_id))?;
    Ok(Json(user.into()))
}

/// Routes under `/users`. Only `/profile` sits behind the auth middleware.
pub fn create_router(auth_config: Arc<AuthConfig>) -> Router<AppState> {
    let protected = Router::new()
        .route("/profile", get(profile))
        .layer(from_fn_with_state(auth_config, auth_middleware));

    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .merge(protected)
}
