//! Authentication Module
//!
//! Stateless JWT authentication for the Taskboard API:
//! 1. Short-lived access tokens (via Authorization: Bearer header)
//! 2. Long-lived refresh tokens, signed with a separate secret, exchanged
//!    for a new pair at `/users/refresh`
//!
//! Passwords are stored as Argon2id PHC strings.

use crate::error::{ApiError, ApiResult};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use taskboard_core::{ConfigError, Project, Role, Task, UserId};

const INSECURE_DEFAULT_SECRET: &str = "INSECURE_DEFAULT_SECRET_CHANGE_IN_PRODUCTION";
const INSECURE_DEFAULT_REFRESH_SECRET: &str = "INSECURE_DEFAULT_REFRESH_SECRET_CHANGE_IN_PRODUCTION";

// ============================================================================
// CLOCK ABSTRACTION (FOR DETERMINISTIC TESTS)
// ============================================================================

/// Clock abstraction for JWT time validation.
///
/// Token issuance and expiry checks both go through this, so tests can pin
/// time instead of racing the wall clock.
pub trait JwtClock: Send + Sync {
    /// Get current time as Unix epoch seconds.
    fn now_epoch_secs(&self) -> i64;
}

/// Production clock using system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl JwtClock for SystemClock {
    fn now_epoch_secs(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Fixed clock for deterministic tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i64);

impl JwtClock for FixedClock {
    fn now_epoch_secs(&self) -> i64 {
        self.0
    }
}


// ============================================================================
// SECRETS
// ============================================================================

/// HMAC signing secret. Never printed.
#[derive(Clone)]
pub struct JwtSecret(SecretString);

impl JwtSecret {
    pub fn new(secret: String) -> Result<Self, ConfigError> {
        if secret.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "jwt_secret".to_string(),
                value: "<empty>".to_string(),
                reason: "secret must not be empty".to_string(),
            });
        }
        Ok(Self(SecretString::from(secret)))
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    pub fn len(&self) -> usize {
        self.expose().len()
    }

    pub fn is_empty(&self) -> bool {
        self.expose().is_empty()
    }

    /// True when the secret is one of the built-in development placeholders.
    pub fn is_insecure_default(&self) -> bool {
        matches!(
            self.expose(),
            INSECURE_DEFAULT_SECRET | INSECURE_DEFAULT_REFRESH_SECRET
        )
    }
}

impl std::fmt::Debug for JwtSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("JwtSecret([REDACTED])")
    }
}

fn build_jwt_secret(secret_str: Option<String>, fallback: &str) -> JwtSecret {
    secret_str
        .and_then(|s| JwtSecret::new(s).ok())
        .unwrap_or_else(|| JwtSecret(SecretString::from(fallback.to_string())))
}

// ============================================================================
// AUTH CONFIGURATION
// ============================================================================

/// Authentication configuration.
#[derive(Clone)]
pub struct AuthConfig {
    /// Secret for access tokens
    pub access_secret: JwtSecret,

    /// Secret for refresh tokens
    pub refresh_secret: JwtSecret,

    /// Access token lifetime in seconds (default 15 minutes)
    pub access_ttl_secs: i64,

    /// Refresh token lifetime in seconds (default 7 days)
    pub refresh_ttl_secs: i64,

    /// Clock skew tolerance applied to `exp`
    pub leeway_secs: i64,

    /// Clock for JWT time validation (injected for testing)
    pub clock: Arc<dyn JwtClock>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("access_secret", &self.access_secret)
            .field("refresh_secret", &self.refresh_secret)
            .field("access_ttl_secs", &self.access_ttl_secs)
            .field("refresh_ttl_secs", &self.refresh_ttl_secs)
            .field("leeway_secs", &self.leeway_secs)
            .field("clock", &"<JwtClock>")
            .finish()
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            access_secret: build_jwt_secret(None, INSECURE_DEFAULT_SECRET),
            refresh_secret: build_jwt_secret(None, INSECURE_DEFAULT_REFRESH_SECRET),
            access_ttl_secs: 15 * 60,
            refresh_ttl_secs: 7 * 24 * 60 * 60,
            leeway_secs: 30,
            clock: Arc::new(SystemClock),
        }
    }
}

impl AuthConfig {
    /// Create authentication configuration from environment variables.
    ///
    /// # Environment Variables
    /// - `TASKBOARD_JWT_SECRET`: access token signing secret
    /// - `TASKBOARD_JWT_REFRESH_SECRET`: refresh token signing secret
    /// - `TASKBOARD_ACCESS_TOKEN_TTL_SECS`: access token lifetime (default: 900)
    /// - `TASKBOARD_REFRESH_TOKEN_TTL_SECS`: refresh token lifetime (default: 604800)
    /// - `TASKBOARD_JWT_LEEWAY_SECS`: clock skew tolerance (default: 30)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            access_secret: build_jwt_secret(
                std::env::var("TASKBOARD_JWT_SECRET").ok(),
                INSECURE_DEFAULT_SECRET,
            ),
            refresh_secret: build_jwt_secret(
                std::env::var("TASKBOARD_JWT_REFRESH_SECRET").ok(),
                INSECURE_DEFAULT_REFRESH_SECRET,
            ),
            access_ttl_secs: env_parse("TASKBOARD_ACCESS_TOKEN_TTL_SECS")
                .unwrap_or(defaults.access_ttl_secs),
            refresh_ttl_secs: env_parse("TASKBOARD_REFRESH_TOKEN_TTL_SECS")
                .unwrap_or(defaults.refresh_ttl_secs),
            leeway_secs: env_parse("TASKBOARD_JWT_LEEWAY_SECS").unwrap_or(defaults.leeway_secs),
            clock: Arc::new(SystemClock),
        }
    }

    /// Refuse to run production with placeholder or weak secrets.
    ///
    /// Outside production only a warning is logged.
    pub fn validate_for_production(&self, is_production: bool) -> ApiResult<()> {
        for (name, secret) in [
            ("TASKBOARD_JWT_SECRET", &self.access_secret),
            ("TASKBOARD_JWT_REFRESH_SECRET", &self.refresh_secret),
        ] {
            if secret.is_insecure_default() {
                if is_production {
                    return Err(ApiError::invalid_input(format!(
                        "Cannot start in production with the default {}",
                        name
                    )));
                }
                tracing::warn!(
                    variable = name,
                    "Using insecure default JWT secret; set it before deploying"
                );
            } else if secret.len() < 32 {
                if is_production {
                    return Err(ApiError::invalid_input(format!(
                        "{} is too short for production use ({} chars, need 32)",
                        name,
                        secret.len()
                    )));
                }
                tracing::warn!(variable = name, len = secret.len(), "JWT secret is short");
            }
        }

        if self.access_secret.expose() == self.refresh_secret.expose() {
            tracing::warn!("Access and refresh tokens share a signing secret");
        }

        Ok(())
    }

    fn secret_for(&self, kind: TokenKind) -> &JwtSecret {
        match kind {
            TokenKind::Access => &self.access_secret,
            TokenKind::Refresh => &self.refresh_secret,
        }
    }

    fn ttl_for(&self, kind: TokenKind) -> i64 {
        match kind {
            TokenKind::Access => self.access_ttl_secs,
            TokenKind::Refresh => self.refresh_ttl_secs,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

// ============================================================================
// JWT CLAIMS
// ============================================================================

/// Which secret signed a token and what it may be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT claims structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: UserId,

    /// Role at issuance time
    #[serde(default)]
    pub role: Role,

    pub kind: TokenKind,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    /// Create new claims using a clock.
    pub fn new(user_id: UserId, role: Role, kind: TokenKind, ttl_secs: i64, clock: &dyn JwtClock) -> Self {
        let now = clock.now_epoch_secs();
        Self {
            sub: user_id,
            role,
            kind,
            iat: now,
            exp: now + ttl_secs,
        }
    }

    /// Check if the token has expired according to a clock.
    pub fn is_expired(&self, clock: &dyn JwtClock) -> bool {
        self.exp < clock.now_epoch_secs()
    }
}

/// Access and refresh token issued together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Always `Bearer`
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
}

// ============================================================================
// AUTHENTICATION CONTEXT
// ============================================================================

/// Authenticated caller, injected into request extensions and GraphQL data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: UserId,
    pub role: Role,
}

impl AuthContext {
    pub fn new(user_id: UserId, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Owner or admin.
    pub fn can_manage_project(&self, project: &Project) -> bool {
        self.is_admin() || project.is_owned_by(self.user_id)
    }

    /// Assignee, owner of the task's project, or admin.
    pub fn can_manage_task(&self, task: &Task, project: Option<&Project>) -> bool {
        self.is_admin()
            || task.assignee_id == self.user_id
            || project.is_some_and(|p| p.is_owned_by(self.user_id))
    }
}

impl From<&Claims> for AuthContext {
    fn from(claims: &Claims) -> Self {
        Self::new(claims.sub, claims.role)
    }
}

// ============================================================================
// TOKEN FUNCTIONS
// ============================================================================

fn validate_claim_times(now: i64, exp: i64, leeway_secs: i64) -> ApiResult<()> {
    if exp < now - leeway_secs {
        return Err(ApiError::token_expired());
    }
    Ok(())
}

/// Sign a single token.
pub fn generate_token(config: &AuthConfig, claims: &Claims) -> ApiResult<String> {
    let secret = config.secret_for(claims.kind);
    let encoding_key = EncodingKey::from_secret(secret.expose().as_bytes());
    encode(&Header::new(Algorithm::HS256), claims, &encoding_key)
        .map_err(|e| ApiError::internal_error(format!("Failed to generate token: {}", e)))
}

/// Issue a fresh access/refresh pair for a user.
pub fn issue_token_pair(config: &AuthConfig, user_id: UserId, role: Role) -> ApiResult<TokenPair> {
    let clock = &*config.clock;
    let access = Claims::new(user_id, role, TokenKind::Access, config.ttl_for(TokenKind::Access), clock);
    let refresh = Claims::new(user_id, role, TokenKind::Refresh, config.ttl_for(TokenKind::Refresh), clock);

    Ok(TokenPair {
        access_token: generate_token(config, &access)?,
        refresh_token: generate_token(config, &refresh)?,
        token_type: "Bearer".to_string(),
        expires_in: config.access_ttl_secs,
    })
}

/// Validate a token of the expected kind and extract its claims.
///
/// Signature checking is left to `jsonwebtoken`; expiry is checked against
/// the configured clock.
pub fn validate_token(config: &AuthConfig, token: &str, kind: TokenKind) -> ApiResult<Claims> {
    let secret = config.secret_for(kind);
    let decoding_key = DecodingKey::from_secret(secret.expose().as_bytes());

    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.required_spec_claims = HashSet::from(["exp".to_string(), "sub".to_string()]);

    let token_data =
        decode::<Claims>(token, &decoding_key, &validation).map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                ApiError::invalid_token("Token signature is invalid")
            }
            jsonwebtoken::errors::ErrorKind::InvalidToken => {
                ApiError::invalid_token("Token is invalid")
            }
            _ => ApiError::invalid_token(format!("Token validation failed: {}", e)),
        })?;

    let claims = token_data.claims;
    if claims.kind != kind {
        return Err(ApiError::invalid_token("Wrong token type"));
    }

    let now = config.clock.now_epoch_secs();
    if now < 0 {
        tracing::error!(timestamp = now, "System clock returned pre-epoch time");
        return Err(ApiError::internal_error("Server time configuration error"));
    }
    validate_claim_times(now, claims.exp, config.leeway_secs)?;

    Ok(claims)
}

pub fn validate_access_token(config: &AuthConfig, token: &str) -> ApiResult<Claims> {
    validate_token(config, token, TokenKind::Access)
}

pub fn validate_refresh_token(config: &AuthConfig, token: &str) -> ApiResult<Claims> {
    validate_token(config, token, TokenKind::Refresh)
}

/// Authenticate a request from its Authorization header value.
pub fn authenticate(config: &AuthConfig, auth_header: Option<&str>) -> ApiResult<AuthContext> {
    let auth_value =
        auth_header.ok_or_else(|| ApiError::unauthorized("Authorization header missing"))?;

    let token = auth_value
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::invalid_token("Authorization header must use Bearer scheme"))?
        .trim();
    if token.is_empty() {
        return Err(ApiError::unauthorized("Token missing"));
    }

    let claims = validate_access_token(config, token)?;
    Ok(AuthContext::from(&claims))
}

// ============================================================================
// PASSWORDS
// ============================================================================

/// Hash a password into an Argon2id PHC string.
pub fn hash_password(password: &str) -> ApiResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::internal_error(format!("Failed to hash password: {}", e)))
}

/// Check a password against a stored PHC string. Malformed hashes never match.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!(error = %e, "Stored password hash is malformed");
            false
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use taskboard_core::{EntityIdType, ProjectId};

    fn test_config() -> AuthConfig {
        AuthConfig {
            access_secret: JwtSecret::new("test_access_secret".to_string())
                .expect("test secret should be valid"),
            refresh_secret: JwtSecret::new("test_refresh_secret".to_string())
                .expect("test secret should be valid"),
            clock: Arc::new(test_clocks::valid()),
            ..Default::default()
        }
    }

    #[test]
    fn test_token_pair_roundtrip() -> ApiResult<()> {
        let config = test_config();
        let user_id = UserId::now_v7();

        let pair = issue_token_pair(&config, user_id, Role::Admin)?;
        assert_eq!(pair.token_type, "Bearer");
        assert_eq!(pair.expires_in, 900);

        let claims = validate_access_token(&config, &pair.access_token)?;
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(claims.exp - claims.iat, 900);

        let refresh = validate_refresh_token(&config, &pair.refresh_token)?;
        assert_eq!(refresh.kind, TokenKind::Refresh);
        assert_eq!(refresh.exp - refresh.iat, 7 * 24 * 60 * 60);
        Ok(())
    }

    #[test]
    fn test_refresh_token_rejected_as_access() -> ApiResult<()> {
        let config = test_config();
        let pair = issue_token_pair(&config, UserId::now_v7(), Role::User)?;

        let err = validate_access_token(&config, &pair.refresh_token)
            .expect_err("refresh token must not authenticate requests");
        assert_eq!(err.code, ErrorCode::InvalidToken);

        let err = validate_refresh_token(&config, &pair.access_token)
            .expect_err("access token must not refresh");
        assert_eq!(err.code, ErrorCode::InvalidToken);
        Ok(())
    }

    #[test]
    fn test_expired_token() -> ApiResult<()> {
        let mut config = test_config();
        let pair = issue_token_pair(&config, UserId::now_v7(), Role::User)?;

        config.clock = Arc::new(test_clocks::future());
        let err = validate_access_token(&config, &pair.access_token)
            .expect_err("token should be expired");
        assert_eq!(err.code, ErrorCode::TokenExpired);
        Ok(())
    }

    #[test]
    fn test_leeway() -> ApiResult<()> {
        let mut config = test_config();
        config.leeway_secs = 60;
        let pair = issue_token_pair(&config, UserId::now_v7(), Role::User)?;

        let issued = test_clocks::valid().0;
        config.clock = Arc::new(FixedClock(issued + config.access_ttl_secs + 30));
        assert!(validate_access_token(&config, &pair.access_token).is_ok());

        config.clock = Arc::new(FixedClock(issued + config.access_ttl_secs + 120));
        assert!(validate_access_token(&config, &pair.access_token).is_err());
        Ok(())
    }

    #[test]
    fn test_wrong_secret_rejected() -> ApiResult<()> {
        let config = test_config();
        let pair = issue_token_pair(&config, UserId::now_v7(), Role::User)?;

        let other = AuthConfig {
            access_secret: JwtSecret::new("another_secret".to_string())
                .expect("test secret should be valid"),
            ..test_config()
        };
        let err = validate_access_token(&other, &pair.access_token)
            .expect_err("signature should not verify");
        assert_eq!(err.code, ErrorCode::InvalidToken);
        Ok(())
    }

    #[test]
    fn test_authenticate_header_parsing() -> ApiResult<()> {
        let config = test_config();
        let user_id = UserId::now_v7();
        let pair = issue_token_pair(&config, user_id, Role::User)?;

        let ctx = authenticate(&config, Some(&format!("Bearer {}", pair.access_token)))?;
        assert_eq!(ctx.user_id, user_id);
        assert!(!ctx.is_admin());

        let err = authenticate(&config, None).expect_err("missing header");
        assert_eq!(err.code, ErrorCode::Unauthorized);

        let err = authenticate(&config, Some("Bearer ")).expect_err("empty token");
        assert_eq!(err.code, ErrorCode::Unauthorized);

        let err = authenticate(&config, Some(&format!("Basic {}", pair.access_token)))
            .expect_err("wrong scheme");
        assert_eq!(err.code, ErrorCode::InvalidToken);
        Ok(())
    }

    #[test]
    fn test_authorization_rules() {
        let owner = AuthContext::new(UserId::now_v7(), Role::User);
        let assignee = AuthContext::new(UserId::now_v7(), Role::User);
        let stranger = AuthContext::new(UserId::now_v7(), Role::User);
        let admin = AuthContext::new(UserId::now_v7(), Role::Admin);

        let project = Project::new("apollo", None, owner.user_id);
        let task = Task::new("launch", None, project.id, assignee.user_id);

        assert!(owner.can_manage_project(&project));
        assert!(admin.can_manage_project(&project));
        assert!(!stranger.can_manage_project(&project));

        assert!(owner.can_manage_task(&task, Some(&project)));
        assert!(assignee.can_manage_task(&task, Some(&project)));
        assert!(admin.can_manage_task(&task, None));
        assert!(!stranger.can_manage_task(&task, Some(&project)));

        let orphan = Task::new("orphan", None, ProjectId::now_v7(), assignee.user_id);
        assert!(!owner.can_manage_task(&orphan, None));
    }

    #[test]
    fn test_password_hash_and_verify() -> ApiResult<()> {
        let hash = hash_password("correct horse")?;
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
        assert!(!verify_password("correct horse", "not-a-phc-string"));
        Ok(())
    }

    #[test]
    fn test_secret_debug_redacted() {
        let secret = JwtSecret::new("super-secret-value".to_string()).expect("valid secret");
        assert!(!format!("{:?}", secret).contains("super-secret-value"));
        assert!(JwtSecret::new("   ".to_string()).is_err());
    }

    #[test]
    fn test_production_validation() {
        assert!(AuthConfig::default().validate_for_production(true).is_err());
        assert!(AuthConfig::default().validate_for_production(false).is_ok());

        let strong = AuthConfig {
            access_secret: JwtSecret::new("a".repeat(48)).expect("valid secret"),
            refresh_secret: JwtSecret::new("b".repeat(48)).expect("valid secret"),
            ..Default::default()
        };
        assert!(strong.validate_for_production(true).is_ok());

        let short = AuthConfig {
            access_secret: JwtSecret::new("short".to_string()).expect("valid secret"),
            refresh_secret: JwtSecret::new("b".repeat(48)).expect("valid secret"),
            ..Default::default()
        };
        assert!(short.validate_for_production(true).is_err());
    }
}
