use serde::{Deserialize, Serialize};

/// Identity captured at login, stored in the session row's `data` column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OidcIdentity {
    /// Provider `sub` claim, verbatim.
    pub subject: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,

    /// Full claim mapping (id_token payload merged with userinfo).
    #[serde(default)]
    pub claims: serde_json::Map<String, serde_json::Value>,
}

/// A login session, used for cookie validation and logout.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    /// Session id (UUIDv4, no dashes).
    pub id: String,

    /// Provider subject that owns this session.
    pub subject: String,

    /// Whether this session has been revoked (logout).
    pub revoked: bool,

    /// Identity captured at login.
    pub identity: OidcIdentity,

    /// RFC 3339 timestamp when the session was issued.
    pub issued_at: String,

    /// RFC 3339 timestamp when the session expires.
    pub expires_at: String,
}

/// Session token payload (HS256 JWT).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject: provider user id.
    pub sub: String,

    /// Session id (for revocation).
    pub sid: String,

    /// Issued at (unix timestamp).
    pub iat: i64,

    /// Expiration (unix timestamp).
    pub exp: i64,
}

/// The authenticated caller, attached to the request by the gate.
#[derive(Debug, Clone, PartialEq)]
pub struct Principal {
    pub session_id: String,
    pub identity: OidcIdentity,
}

impl Principal {
    pub fn subject(&self) -> &str {
        &self.identity.subject
    }
}

/// Response body of `GET /user-info`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub picture_url: Option<String>,
}

impl From<&OidcIdentity> for UserInfo {
    fn from(id: &OidcIdentity) -> Self {
        Self {
            full_name: id.full_name.clone(),
            email: id.email.clone(),
            picture_url: id.picture.clone(),
        }
    }
}
