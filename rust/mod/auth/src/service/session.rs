use chrono::Duration;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use tracing::{debug, info};

use tricore_core::{new_id, now_utc, parse_rfc3339, to_rfc3339};
use tricore_sql::{Row, Value};

use crate::model::{OidcIdentity, Principal, Session, SessionClaims};
use crate::service::{AuthError, AuthService, MAX_SESSION_TTL_SECS};

impl AuthService {
    /// Open a session for a freshly authenticated identity.
    ///
    /// Stores the session row and returns the signed token the browser
    /// keeps in its session cookie.
    pub fn issue_session(&self, identity: OidcIdentity) -> Result<(String, Session), AuthError> {
        let now = now_utc();
        let exp = Duration::try_seconds(self.config.session_ttl)
            .filter(|ttl| ttl.num_seconds() > 0 && ttl.num_seconds() <= MAX_SESSION_TTL_SECS)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| {
                AuthError::Validation(format!(
                    "session ttl {}s is outside 1..={}",
                    self.config.session_ttl, MAX_SESSION_TTL_SECS
                ))
            })?;

        let session = Session {
            id: new_id(),
            subject: identity.subject.clone(),
            revoked: false,
            identity,
            issued_at: to_rfc3339(&now),
            expires_at: to_rfc3339(&exp),
        };

        let claims = SessionClaims {
            sub: session.subject.clone(),
            sid: session.id.clone(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
        };

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.session_secret.as_bytes()),
        )
        .map_err(|e| AuthError::Internal(format!("JWT encode failed: {}", e)))?;

        let data = serde_json::to_string(&session.identity)
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        self.sql.exec(
            "INSERT INTO sessions (id, subject, revoked, data, issued_at, expires_at)
             VALUES (?1, ?2, 0, ?3, ?4, ?5)",
            &[
                Value::Text(session.id.clone()),
                Value::Text(session.subject.clone()),
                Value::Text(data),
                Value::Text(session.issued_at.clone()),
                Value::Text(session.expires_at.clone()),
            ],
        )?;

        info!(subject = %session.subject, sid = %session.id, "session issued");
        Ok((token, session))
    }

    /// Verify a session token and resolve the caller.
    ///
    /// The signature and `exp` must check out, and the session row must
    /// still exist, be unrevoked and unexpired.
    pub fn authenticate(&self, token: &str) -> Result<Principal, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;

        let claims = decode::<SessionClaims>(
            token,
            &DecodingKey::from_secret(self.config.session_secret.as_bytes()),
            &validation,
        )
        .map_err(|e| AuthError::Unauthorized(format!("invalid token: {}", e)))?
        .claims;

        let session = self
            .get_session(&claims.sid)?
            .ok_or_else(|| AuthError::Unauthorized("unknown session".into()))?;

        if session.revoked {
            return Err(AuthError::Unauthorized("session has been revoked".into()));
        }
        if session.subject != claims.sub {
            return Err(AuthError::Unauthorized("session subject mismatch".into()));
        }
        let expired = parse_rfc3339(&session.expires_at)
            .map(|exp| exp <= now_utc())
            .unwrap_or(true);
        if expired {
            return Err(AuthError::Unauthorized("session has expired".into()));
        }

        Ok(Principal {
            session_id: session.id,
            identity: session.identity,
        })
    }

    /// Revoke a session (logout). Returns whether a live session was revoked.
    pub fn revoke_session(&self, session_id: &str) -> Result<bool, AuthError> {
        let affected = self.sql.exec(
            "UPDATE sessions SET revoked = 1 WHERE id = ?1 AND revoked = 0",
            &[Value::Text(session_id.to_string())],
        )?;
        if affected > 0 {
            info!(sid = %session_id, "session revoked");
        }
        Ok(affected > 0)
    }

    /// Get a session by id.
    pub fn get_session(&self, id: &str) -> Result<Option<Session>, AuthError> {
        let rows = self.sql.query(
            "SELECT id, subject, revoked, data, issued_at, expires_at FROM sessions WHERE id = ?1",
            &[Value::Text(id.to_string())],
        )?;
        rows.first().map(session_from_row).transpose()
    }

    /// Drop expired and revoked sessions. Run at startup.
    pub fn purge_expired_sessions(&self) -> Result<u64, AuthError> {
        let affected = self.sql.exec(
            "DELETE FROM sessions WHERE revoked = 1 OR expires_at <= ?1",
            &[Value::Text(to_rfc3339(&now_utc()))],
        )?;
        debug!(purged = affected, "expired sessions purged");
        Ok(affected)
    }
}

fn session_from_row(row: &Row) -> Result<Session, AuthError> {
    let field = |name: &str| {
        row.get_str(name)
            .map(str::to_string)
            .ok_or_else(|| AuthError::Internal(format!("sessions: missing column '{}'", name)))
    };
    let identity: OidcIdentity = serde_json::from_str(&field("data")?)
        .map_err(|e| AuthError::Internal(format!("sessions: bad data: {}", e)))?;

    Ok(Session {
        id: field("id")?,
        subject: field("subject")?,
        revoked: row.get_i64("revoked").unwrap_or(0) != 0,
        identity,
        issued_at: field("issued_at")?,
        expires_at: field("expires_at")?,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tricore_sql::SqliteStore;

    use crate::model::OidcIdentity;
    use crate::service::testing::{test_service, StubProvider};
    use crate::service::{AuthConfig, AuthError, AuthService};
    use tricore_sql::Value;

    fn identity(sub: &str) -> OidcIdentity {
        let mut claims = serde_json::Map::new();
        claims.insert("sub".into(), sub.into());
        OidcIdentity {
            subject: sub.to_string(),
            full_name: Some("Ada".into()),
            email: Some("ada@example.com".into()),
            picture: None,
            claims,
        }
    }

    #[test]
    fn issue_and_authenticate() {
        let svc = test_service();
        let (token, session) = svc.issue_session(identity("123")).unwrap();
        assert!(!token.is_empty());

        let principal = svc.authenticate(&token).unwrap();
        assert_eq!(principal.session_id, session.id);
        assert_eq!(principal.subject(), "123");
        assert_eq!(principal.identity.claims["sub"], "123");
    }

    #[test]
    fn revoked_session_is_rejected() {
        let svc = test_service();
        let (token, session) = svc.issue_session(identity("123")).unwrap();

        assert!(svc.revoke_session(&session.id).unwrap());
        assert!(!svc.revoke_session(&session.id).unwrap());
        assert!(svc.authenticate(&token).is_err());
    }

    #[test]
    fn invalid_token_is_rejected() {
        let svc = test_service();
        assert!(svc.authenticate("this.is.not.a.valid.jwt").is_err());
    }

    #[test]
    fn token_from_other_secret_is_rejected() {
        let sql = Arc::new(SqliteStore::open_in_memory().unwrap());
        let other = AuthService::new(
            sql,
            Arc::new(StubProvider),
            AuthConfig {
                session_secret: "another-secret".into(),
                ..AuthConfig::default()
            },
        )
        .unwrap();
        let (token, _) = other.issue_session(identity("123")).unwrap();

        let svc = test_service();
        assert!(svc.authenticate(&token).is_err());
    }

    #[test]
    fn expired_session_row_is_rejected_and_purged() {
        let svc = test_service();
        let (token, session) = svc.issue_session(identity("123")).unwrap();
        let (live_token, _) = svc.issue_session(identity("456")).unwrap();

        svc.sql
            .exec(
                "UPDATE sessions SET expires_at = ?1 WHERE id = ?2",
                &[
                    Value::Text("2000-01-01T00:00:00.000000Z".into()),
                    Value::Text(session.id.clone()),
                ],
            )
            .unwrap();

        assert!(svc.authenticate(&token).is_err());
        assert_eq!(svc.purge_expired_sessions().unwrap(), 1);
        assert!(svc.get_session(&session.id).unwrap().is_none());
        assert!(svc.authenticate(&live_token).is_ok());
    }

    #[test]
    fn out_of_range_ttl_is_rejected() {
        for ttl in [0, -5, i64::MAX] {
            let sql = Arc::new(SqliteStore::open_in_memory().unwrap());
            let svc = AuthService::new(
                sql,
                Arc::new(StubProvider),
                AuthConfig {
                    session_ttl: ttl,
                    ..AuthConfig::default()
                },
            )
            .unwrap();
            let err = svc.issue_session(identity("123")).unwrap_err();
            assert!(matches!(err, AuthError::Validation(_)), "ttl {ttl}: {err:?}");
        }
    }
}
