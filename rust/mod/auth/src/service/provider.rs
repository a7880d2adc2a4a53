use std::sync::Arc;

use async_trait::async_trait;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde_json::{Map, Value as Json};
use tracing::{debug, info, warn};

use crate::model::{OidcIdentity, Session, Subject, User};
use crate::service::{AuthError, AuthService};

/// An external OpenID-Connect identity provider.
///
/// The gate only needs two things from it: where to send the browser,
/// and how to turn the returned authorization code into a verified identity.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Registration id used in URLs (e.g. "google").
    fn id(&self) -> &str;

    /// Authorization endpoint URL for a login attempt carrying `state`.
    fn authorize_url(&self, state: &str) -> String;

    /// Exchange an authorization code for the caller's identity.
    async fn exchange(&self, code: &str) -> Result<OidcIdentity, AuthError>;
}

/// Static configuration of an OIDC authorization-code client.
#[derive(Debug, Clone)]
pub struct OidcProviderConfig {
    pub id: String,
    pub client_id: String,
    pub client_secret: String,
    pub auth_url: String,
    pub token_url: String,
    pub userinfo_url: Option<String>,
    /// Accepted `iss` values of the id_token. Empty skips the check.
    pub issuers: Vec<String>,
    pub redirect_url: String,
    pub scopes: Vec<String>,
    /// Extra `prompt` parameter on the authorization request.
    pub prompt: Option<String>,
}

impl OidcProviderConfig {
    /// Google endpoints, `openid profile email`, account chooser forced.
    pub fn google(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_url: impl Into<String>,
    ) -> Self {
        Self {
            id: "google".to_string(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            auth_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            userinfo_url: Some("https://openidconnect.googleapis.com/v1/userinfo".to_string()),
            // Google issues both forms.
            issuers: vec![
                "https://accounts.google.com".to_string(),
                "accounts.google.com".to_string(),
            ],
            redirect_url: redirect_url.into(),
            scopes: vec!["openid".into(), "profile".into(), "email".into()],
            prompt: Some("select_account".to_string()),
        }
    }
}

/// Authorization-code OIDC client over reqwest.
pub struct OidcProvider {
    config: OidcProviderConfig,
    client: reqwest::Client,
}

impl OidcProvider {
    pub fn new(config: OidcProviderConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    pub fn config(&self) -> &OidcProviderConfig {
        &self.config
    }

    /// Decode the id_token payload and check `aud`, `exp` and `iss`.
    ///
    /// The token arrives directly from the token endpoint over TLS, so its
    /// signature is not re-verified here.
    fn decode_id_token(&self, id_token: &str) -> Result<Map<String, Json>, AuthError> {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.insecure_disable_signature_validation();
        validation.set_audience(&[self.config.client_id.as_str()]);
        if !self.config.issuers.is_empty() {
            validation.set_issuer(&self.config.issuers);
        }

        decode::<Map<String, Json>>(id_token, &DecodingKey::from_secret(&[]), &validation)
            .map(|data| data.claims)
            .map_err(|e| AuthError::Unauthorized(format!("invalid id_token: {}", e)))
    }

    async fn fetch_userinfo(&self, url: &str, access_token: &str) -> Result<Map<String, Json>, AuthError> {
        let resp = self
            .client
            .get(url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AuthError::Internal(format!("userinfo fetch failed: {}", e)))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(AuthError::Unauthorized(format!(
                "userinfo returned {}: {}",
                status, body
            )));
        }

        resp.json()
            .await
            .map_err(|e| AuthError::Internal(format!("userinfo parse failed: {}", e)))
    }
}

#[async_trait]
impl IdentityProvider for OidcProvider {
    fn id(&self) -> &str {
        &self.config.id
    }

    fn authorize_url(&self, state: &str) -> String {
        let scopes = self.config.scopes.join(" ");
        let mut url = format!(
            "{}?response_type=code&client_id={}&redirect_uri={}&scope={}&state={}",
            self.config.auth_url,
            urlencoded(&self.config.client_id),
            urlencoded(&self.config.redirect_url),
            urlencoded(&scopes),
            urlencoded(state),
        );
        if let Some(ref prompt) = self.config.prompt {
            url.push_str("&prompt=");
            url.push_str(&urlencoded(prompt));
        }
        url
    }

    async fn exchange(&self, code: &str) -> Result<OidcIdentity, AuthError> {
        // Step 1: exchange code for tokens
        let token_resp = self
            .client
            .post(&self.config.token_url)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("redirect_uri", self.config.redirect_url.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AuthError::Internal(format!("token exchange failed: {}", e)))?;

        if !token_resp.status().is_success() {
            let status = token_resp.status();
            let body = token_resp.text().await.unwrap_or_default();
            return Err(AuthError::Unauthorized(format!(
                "token exchange returned {}: {}",
                status, body
            )));
        }

        let token_json: Json = token_resp
            .json()
            .await
            .map_err(|e| AuthError::Internal(format!("token response parse failed: {}", e)))?;

        let id_token = token_json["id_token"]
            .as_str()
            .ok_or_else(|| AuthError::Unauthorized("missing id_token in response".into()))?;
        let mut claims = self.decode_id_token(id_token)?;

        // Step 2: enrich with userinfo
        if let (Some(url), Some(access_token)) = (
            self.config.userinfo_url.as_deref(),
            token_json["access_token"].as_str(),
        ) {
            let userinfo = self.fetch_userinfo(url, access_token).await?;
            if let Some(sub) = userinfo.get("sub") {
                if Some(sub) != claims.get("sub") {
                    return Err(AuthError::Unauthorized(
                        "userinfo subject does not match id_token".into(),
                    ));
                }
            }
            for (k, v) in userinfo {
                claims.entry(k).or_insert(v);
            }
        }

        let identity = identity_from_claims(claims)?;
        debug!(provider = %self.config.id, subject = %identity.subject, "code exchanged");
        Ok(identity)
    }
}

/// Build an identity from a merged claim set. `sub` is mandatory.
pub fn identity_from_claims(claims: Map<String, Json>) -> Result<OidcIdentity, AuthError> {
    let str_claim = |name: &str| claims.get(name).and_then(Json::as_str).map(str::to_string);

    let subject = str_claim("sub")
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AuthError::Unauthorized("identity has no subject".into()))?;

    Ok(OidcIdentity {
        subject,
        full_name: str_claim("name"),
        email: str_claim("email"),
        picture: str_claim("picture"),
        claims,
    })
}

impl AuthService {
    /// The configured provider, if `id` names it.
    pub fn provider_for(&self, id: &str) -> Result<&Arc<dyn IdentityProvider>, AuthError> {
        if self.provider.id() != id {
            return Err(AuthError::NotFound(format!("unknown provider '{}'", id)));
        }
        Ok(&self.provider)
    }

    /// Finish a login: exchange the code, mirror the user, open a session.
    pub async fn complete_login(&self, code: &str) -> Result<(String, Session), AuthError> {
        let identity = self.provider.exchange(code).await?;

        if let Err(e) = self.mirror_user(&identity) {
            warn!(subject = %identity.subject, error = %e, "user mirror failed");
        }

        let issued = self.issue_session(identity)?;
        info!(provider = %self.provider.id(), subject = %issued.1.subject, "login succeeded");
        Ok(issued)
    }

    /// Insert or refresh the `users` row for a logged-in identity.
    ///
    /// Returns `Ok(None)` when the identity cannot be stored (non-numeric
    /// subject, missing or invalid profile fields).
    pub fn mirror_user(&self, identity: &OidcIdentity) -> Result<Option<User>, AuthError> {
        let subject: Subject = match identity.subject.parse() {
            Ok(s) => s,
            Err(e) => {
                warn!(subject = %identity.subject, error = %e, "subject is not numeric; user not stored");
                return Ok(None);
            }
        };
        let (Some(fullname), Some(email)) = (identity.full_name.as_ref(), identity.email.as_ref())
        else {
            warn!(subject = %subject, "profile lacks name or email; user not stored");
            return Ok(None);
        };

        // A concurrent login for the same subject can win the insert or the
        // version check; re-read and apply on top of it.
        let mut attempts = 0;
        loop {
            attempts += 1;
            let result = match self.users().find_by_id(&subject)? {
                Some(existing) => {
                    if existing.fullname == *fullname
                        && existing.email == *email
                        && existing.picture == identity.picture
                    {
                        return Ok(Some(existing));
                    }
                    let mut next = existing;
                    next.fullname = fullname.clone();
                    next.email = email.clone();
                    next.picture = identity.picture.clone();
                    self.users().save(&next)
                }
                None => {
                    let mut user = User::new(subject, fullname.clone(), email.clone());
                    user.picture = identity.picture.clone();
                    self.users().save(&user)
                }
            };

            match result {
                Ok(user) => return Ok(Some(user)),
                Err(AuthError::Validation(m)) => {
                    warn!(subject = %subject, reason = %m, "profile rejected; user not stored");
                    return Ok(None);
                }
                Err(AuthError::ConcurrencyConflict(_) | AuthError::ConstraintViolation(_))
                    if attempts < 3 =>
                {
                    continue
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Simple URL encoding for query parameters.
fn urlencoded(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            'A'..='Z' | 'a'..='z' | '0'..='9' | '-' | '_' | '.' | '~' => result.push(ch),
            ' ' => result.push('+'),
            _ => {
                let mut buf = [0u8; 4];
                let encoded = ch.encode_utf8(&mut buf);
                for byte in encoded.bytes() {
                    result.push('%');
                    result.push_str(&format!("{:02X}", byte));
                }
            }
        }
    }
    result
}
