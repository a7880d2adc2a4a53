//! Server configuration file (`/etc/tricore/<name>.toml`).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use tricore_auth::service::{AuthConfig, OidcProviderConfig};

/// Directory searched for bare context names.
const CONFIG_DIR: &str = "/etc/tricore";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub storage: StorageConfig,
    pub session: SessionConfig,
    pub oidc: OidcConfig,
    #[serde(default)]
    pub redirect: RedirectConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub bootstrap: BootstrapConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// HS256 secret for session tokens.
    pub secret: String,
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: i64,
    #[serde(default)]
    pub cookie_secure: bool,
}

/// Identity provider registration. Only `client_id`, `client_secret` and
/// `redirect_url` are needed for Google; other providers set the endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OidcConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub userinfo_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedirectConfig {
    #[serde(default = "default_login_success")]
    pub login_success: String,
    #[serde(default = "default_login_failure")]
    pub login_failure: String,
}

impl Default for RedirectConfig {
    fn default() -> Self {
        Self {
            login_success: default_login_success(),
            login_failure: default_login_failure(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// The single front-end origin allowed to call with credentials.
    #[serde(default = "default_allowed_origin")]
    pub allowed_origin: Option<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origin: default_allowed_origin(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BootstrapConfig {
    /// Groups (and their levels) that must exist after startup.
    #[serde(default)]
    pub groups: Vec<GroupSeed>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupSeed {
    pub name: String,
    #[serde(default)]
    pub levels: Vec<String>,
}

fn default_ttl_secs() -> i64 {
    86400
}

fn default_provider() -> String {
    "google".to_string()
}

fn default_login_success() -> String {
    "http://localhost:3000".to_string()
}

fn default_login_failure() -> String {
    "http://localhost:3000/login".to_string()
}

fn default_allowed_origin() -> Option<String> {
    Some("http://localhost:3000".to_string())
}

impl ServerConfig {
    /// A bare name maps to `/etc/tricore/<name>.toml`; anything that looks
    /// like a path is used as given.
    pub fn resolve_path(name_or_path: &str) -> PathBuf {
        if name_or_path.contains('/') || name_or_path.contains('.') {
            PathBuf::from(name_or_path)
        } else {
            Path::new(CONFIG_DIR).join(format!("{}.toml", name_or_path))
        }
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("cannot read {}: {}", path.display(), e))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn auth_config(&self) -> AuthConfig {
        AuthConfig {
            session_secret: self.session.secret.clone(),
            session_ttl: self.session.ttl_secs,
            cookie_secure: self.session.cookie_secure,
            login_success_url: self.redirect.login_success.clone(),
            login_failure_url: self.redirect.login_failure.clone(),
            allowed_origin: self.cors.allowed_origin.clone().filter(|o| !o.is_empty()),
            ..AuthConfig::default()
        }
    }

    /// Provider registration: Google defaults, overridden field by field.
    pub fn provider_config(&self) -> OidcProviderConfig {
        let o = &self.oidc;
        let redirect_url = o.redirect_url.clone().unwrap_or_else(|| {
            format!("http://localhost:8080/login/oauth2/code/{}", o.provider)
        });

        let mut p = OidcProviderConfig::google(&o.client_id, &o.client_secret, redirect_url);
        p.id = o.provider.clone();
        if o.provider != "google" {
            // Non-Google providers get no Google endpoints or prompt.
            p.userinfo_url = None;
            p.issuers.clear();
            p.prompt = None;
        }
        if let Some(ref url) = o.auth_url {
            p.auth_url = url.clone();
        }
        if let Some(ref url) = o.token_url {
            p.token_url = url.clone();
        }
        if o.userinfo_url.is_some() {
            p.userinfo_url = o.userinfo_url.clone();
        }
        if let Some(ref iss) = o.issuer {
            p.issuers = vec![iss.clone()];
        }
        if let Some(ref scopes) = o.scopes {
            p.scopes = scopes.clone();
        }
        p
    }
}
