pub mod schema;
pub mod grants;
pub mod provider;
pub mod session;

use std::sync::Arc;

use thiserror::Error;

use tricore_sql::{SQLError, SQLStore};

use crate::model::{Group, GroupLevel, Permission, User};
use crate::store::Repository;

pub use grants::Grant;
pub use provider::{IdentityProvider, OidcProvider, OidcProviderConfig};

/// Auth service error type.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("concurrent modification: {0}")]
    ConcurrencyConflict(String),

    #[error("validation: {0}")]
    Validation(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("storage: {0}")]
    Storage(String),

    #[error("internal: {0}")]
    Internal(String),
}

impl From<SQLError> for AuthError {
    fn from(e: SQLError) -> Self {
        match e {
            SQLError::Constraint(m) => AuthError::ConstraintViolation(m),
            other => AuthError::Storage(other.to_string()),
        }
    }
}

impl From<AuthError> for tricore_core::ServiceError {
    fn from(e: AuthError) -> Self {
        use tricore_core::ServiceError;
        match e {
            AuthError::NotFound(m) => ServiceError::NotFound(m),
            AuthError::ConstraintViolation(m) => ServiceError::ConstraintViolation(m),
            AuthError::ConcurrencyConflict(m) => ServiceError::ConcurrencyConflict(m),
            AuthError::Validation(m) => ServiceError::Validation(m),
            AuthError::Unauthorized(m) => ServiceError::Unauthorized(m),
            AuthError::PermissionDenied(m) => ServiceError::PermissionDenied(m),
            AuthError::Storage(m) => ServiceError::Storage(m),
            AuthError::Internal(m) => ServiceError::Internal(m),
        }
    }
}

/// Longest accepted session lifetime (one year).
pub const MAX_SESSION_TTL_SECS: i64 = 365 * 24 * 60 * 60;

/// Configuration for the auth service.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// HS256 secret for session tokens.
    pub session_secret: String,
    /// Session lifetime in seconds (default: 24h).
    pub session_ttl: i64,
    /// Name of the session cookie.
    pub session_cookie: String,
    /// Add `Secure` to issued cookies.
    pub cookie_secure: bool,
    /// Where `/login/success` sends the browser.
    pub login_success_url: String,
    /// Where `/login/fail` sends the browser.
    pub login_failure_url: String,
    /// The single origin allowed by CORS. `None` disables the CORS layer.
    pub allowed_origin: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_secret: "tricore-dev-secret-change-me".to_string(),
            session_ttl: 86400, // 24h
            session_cookie: "TRICORE_SESSION".to_string(),
            cookie_secure: false,
            login_success_url: "http://localhost:3000".to_string(),
            login_failure_url: "http://localhost:3000/login".to_string(),
            allowed_origin: Some("http://localhost:3000".to_string()),
        }
    }
}

/// The Auth service. Holds storage, the identity provider and configuration.
pub struct AuthService {
    pub(crate) sql: Arc<dyn SQLStore>,
    pub(crate) provider: Arc<dyn IdentityProvider>,
    pub(crate) config: AuthConfig,
    users: Repository<User>,
    groups: Repository<Group>,
    group_levels: Repository<GroupLevel>,
    permissions: Repository<Permission>,
}

impl AuthService {
    /// Create a new AuthService, initializing the DB schema.
    pub fn new(
        sql: Arc<dyn SQLStore>,
        provider: Arc<dyn IdentityProvider>,
        config: AuthConfig,
    ) -> Result<Arc<Self>, AuthError> {
        schema::init_schema(sql.as_ref())?;
        Ok(Arc::new(Self {
            users: Repository::new(sql.clone()),
            groups: Repository::new(sql.clone()),
            group_levels: Repository::new(sql.clone()),
            permissions: Repository::new(sql.clone()),
            sql,
            provider,
            config,
        }))
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn provider(&self) -> &Arc<dyn IdentityProvider> {
        &self.provider
    }

    pub fn users(&self) -> &Repository<User> {
        &self.users
    }

    pub fn groups(&self) -> &Repository<Group> {
        &self.groups
    }

    pub fn group_levels(&self) -> &Repository<GroupLevel> {
        &self.group_levels
    }

    pub fn permissions(&self) -> &Repository<Permission> {
        &self.permissions
    }
}
