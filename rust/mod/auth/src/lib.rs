//! Auth module: OIDC login, sessions and group-level permissions.
//!
//! # Resources
//!
//! - **User**: identity mirrored from the identity provider, keyed by subject
//! - **Group**: permission group; owns its levels
//! - **GroupLevel**: (group, level) pair; owns the permissions granted on it
//! - **Permission**: grant of a group level to a user
//! - **Session**: login record behind the session cookie
//!
//! # Usage
//!
//! ```ignore
//! use tricore_auth::{AuthModule, service::{AuthConfig, OidcProvider, OidcProviderConfig}};
//!
//! let provider = OidcProvider::new(OidcProviderConfig::google(id, secret, redirect));
//! let module = AuthModule::new(sql, Arc::new(provider), AuthConfig::default())?;
//! let router = module.routes();
//! ```

pub mod api;
pub mod model;
pub mod service;
pub mod store;

use std::sync::Arc;

use axum::Router;

use tricore_core::Module;
use tricore_sql::SQLStore;

use crate::service::{AuthConfig, AuthService, IdentityProvider};

/// Auth module implementing the Module trait.
///
/// Holds the AuthService and provides HTTP routes for all auth endpoints.
pub struct AuthModule {
    service: Arc<AuthService>,
}

impl AuthModule {
    /// Create a new AuthModule.
    pub fn new(
        sql: Arc<dyn SQLStore>,
        provider: Arc<dyn IdentityProvider>,
        config: AuthConfig,
    ) -> Result<Self, tricore_core::ServiceError> {
        let service = AuthService::new(sql, provider, config)
            .map_err(tricore_core::ServiceError::from)?;
        Ok(Self { service })
    }

    /// Get a reference to the underlying AuthService.
    pub fn service(&self) -> &Arc<AuthService> {
        &self.service
    }
}

impl Module for AuthModule {
    fn name(&self) -> &str {
        "auth"
    }

    fn routes(&self) -> Router {
        api::build_router(self.service.clone())
    }
}
