//! HTTP tests for the auth router: session gate, login flow, user endpoints, CORS.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderMap, Request, StatusCode};
use tower::ServiceExt;

use tricore_auth::api::build_router;
use tricore_auth::model::{OidcIdentity, Subject};
use tricore_auth::service::{AuthConfig, AuthError, AuthService, IdentityProvider};
use tricore_sql::SqliteStore;

// =====================================================================
// Helpers
// =====================================================================

/// Accepts the code "good" for subject 123456.
struct StubProvider;

#[async_trait]
impl IdentityProvider for StubProvider {
    fn id(&self) -> &str {
        "stub"
    }

    fn authorize_url(&self, state: &str) -> String {
        format!("https://idp.test/authorize?state={}", state)
    }

    async fn exchange(&self, code: &str) -> Result<OidcIdentity, AuthError> {
        if code != "good" {
            return Err(AuthError::Unauthorized("bad code".into()));
        }
        let claims = serde_json::json!({
            "sub": "123456",
            "name": "Ada Lovelace",
            "email": "ada@example.com",
            "picture": "https://example.com/ada.png",
            "email_verified": true,
        });
        let serde_json::Value::Object(claims) = claims else {
            unreachable!()
        };
        Ok(OidcIdentity {
            subject: "123456".into(),
            full_name: Some("Ada Lovelace".into()),
            email: Some("ada@example.com".into()),
            picture: Some("https://example.com/ada.png".into()),
            claims,
        })
    }
}

fn setup() -> (Arc<AuthService>, axum::Router, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let sql = Arc::new(SqliteStore::open(&dir.path().join("auth.sqlite")).unwrap());
    let config = AuthConfig {
        login_success_url: "http://localhost:3000/home".into(),
        ..AuthConfig::default()
    };
    let svc = AuthService::new(sql, Arc::new(StubProvider), config).unwrap();
    let router = build_router(svc.clone());
    (svc, router, dir)
}

async fn send(
    router: &axum::Router,
    method: &str,
    uri: &str,
    headers: &[(&str, &str)],
) -> (StatusCode, HeaderMap, Vec<u8>) {
    let mut builder = Request::builder().method(method).uri(uri);
    for (k, v) in headers {
        builder = builder.header(*k, *v);
    }
    let req = builder.body(Body::empty()).unwrap();
    let resp = router.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
        .await
        .unwrap();
    (status, headers, bytes.to_vec())
}

fn location(headers: &HeaderMap) -> &str {
    headers
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

/// `name=value` pair of the Set-Cookie header for `name`.
fn set_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|c| c.starts_with(&format!("{}=", name)))
        .and_then(|c| c.split(';').next())
        .map(str::to_string)
}

/// Run authorize + callback and return the session cookie pair.
async fn login(router: &axum::Router) -> String {
    let (s, h, _) = send(router, "GET", "/oauth2/authorization/stub", &[]).await;
    assert_eq!(s, StatusCode::FOUND);
    let state_cookie = set_cookie(&h, "TRICORE_OAUTH_STATE").unwrap();
    let state = state_cookie.split_once('=').unwrap().1.to_string();
    assert!(location(&h).ends_with(&format!("state={}", state)));

    let uri = format!("/login/oauth2/code/stub?code=good&state={}", state);
    let (s, h, _) = send(router, "GET", &uri, &[("cookie", &state_cookie)]).await;
    assert_eq!(s, StatusCode::FOUND);
    assert_eq!(location(&h), "/login/success");
    set_cookie(&h, "TRICORE_SESSION").unwrap()
}

// =====================================================================
// Gate
// =====================================================================

#[tokio::test]
async fn user_info_without_session_is_empty_401() {
    let (_svc, r, _dir) = setup();
    let (s, _, body) = send(&r, "GET", "/user-info", &[]).await;
    assert_eq!(s, StatusCode::UNAUTHORIZED);
    assert!(body.is_empty());
}

#[tokio::test]
async fn claims_without_session_is_401() {
    let (_svc, r, _dir) = setup();
    let (s, _, body) = send(&r, "GET", "/user/claims", &[("accept", "application/json")]).await;
    assert_eq!(s, StatusCode::UNAUTHORIZED);
    assert!(body.is_empty());
}

#[tokio::test]
async fn browser_without_session_is_sent_to_login() {
    let (_svc, r, _dir) = setup();
    let (s, h, _) = send(&r, "GET", "/user-info", &[("accept", "text/html")]).await;
    assert_eq!(s, StatusCode::FOUND);
    assert_eq!(location(&h), "/login");
}

#[tokio::test]
async fn garbage_cookie_is_unauthenticated() {
    let (_svc, r, _dir) = setup();
    let (s, _, _) = send(&r, "GET", "/user-info", &[("cookie", "TRICORE_SESSION=nope")]).await;
    assert_eq!(s, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn public_paths_bypass_the_gate() {
    let (_svc, r, _dir) = setup();
    // Not routed here, but must not be stopped by the gate.
    let (s, _, _) = send(&r, "GET", "/api/public/anything", &[]).await;
    assert_eq!(s, StatusCode::NOT_FOUND);
    let (s, _, _) = send(&r, "GET", "/login/fail", &[]).await;
    assert_eq!(s, StatusCode::FOUND);
}

// =====================================================================
// Login flow
// =====================================================================

#[tokio::test]
async fn login_redirects_to_provider_registration() {
    let (_svc, r, _dir) = setup();
    let (s, h, _) = send(&r, "GET", "/login", &[]).await;
    assert_eq!(s, StatusCode::FOUND);
    assert_eq!(location(&h), "/oauth2/authorization/stub");
}

#[tokio::test]
async fn authorize_sets_state_and_redirects() {
    let (_svc, r, _dir) = setup();
    let (s, h, _) = send(&r, "GET", "/oauth2/authorization/stub", &[]).await;
    assert_eq!(s, StatusCode::FOUND);
    assert!(location(&h).starts_with("https://idp.test/authorize?state="));
    assert!(set_cookie(&h, "TRICORE_OAUTH_STATE").is_some());
}

#[tokio::test]
async fn unknown_provider_is_404_problem() {
    let (_svc, r, _dir) = setup();
    let (s, h, body) = send(&r, "GET", "/oauth2/authorization/github", &[]).await;
    assert_eq!(s, StatusCode::NOT_FOUND);
    assert_eq!(
        h.get(header::CONTENT_TYPE).unwrap(),
        "application/problem+json"
    );
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["code"], "NOT_FOUND");
    assert_eq!(json["status"], 404);
}

#[tokio::test]
async fn full_login_flow() {
    let (svc, r, _dir) = setup();
    let session = login(&r).await;

    // The user was mirrored into storage.
    let user = svc.users().find_by_id(&Subject(123456)).unwrap().unwrap();
    assert_eq!(user.fullname, "Ada Lovelace");
    assert_eq!(user.email, "ada@example.com");

    let (s, _, body) = send(&r, "GET", "/user-info", &[("cookie", &session)]).await;
    assert_eq!(s, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "fullName": "Ada Lovelace",
            "email": "ada@example.com",
            "pictureUrl": "https://example.com/ada.png",
        })
    );

    let (s, _, body) = send(&r, "GET", "/user/claims", &[("cookie", &session)]).await;
    assert_eq!(s, StatusCode::OK);
    let claims: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(claims["sub"], "123456");
    assert_eq!(claims["email_verified"], true);

    let (s, h, _) = send(&r, "GET", "/login/success", &[("cookie", &session)]).await;
    assert_eq!(s, StatusCode::FOUND);
    assert_eq!(location(&h), "http://localhost:3000/home");
}

#[tokio::test]
async fn bearer_token_is_accepted() {
    let (_svc, r, _dir) = setup();
    let session = login(&r).await;
    let token = session.split_once('=').unwrap().1;
    let auth = format!("Bearer {}", token);

    let (s, _, _) = send(&r, "GET", "/user-info", &[("authorization", &auth)]).await;
    assert_eq!(s, StatusCode::OK);
}

#[tokio::test]
async fn stale_cookie_does_not_mask_bearer_token() {
    let (_svc, r, _dir) = setup();
    let stale = login(&r).await;
    let (s, _, _) = send(&r, "GET", "/logout", &[("cookie", &stale)]).await;
    assert_eq!(s, StatusCode::OK);

    let live = login(&r).await;
    let auth = format!("Bearer {}", live.split_once('=').unwrap().1);

    let (s, _, body) = send(
        &r,
        "GET",
        "/user-info",
        &[("cookie", &stale), ("authorization", &auth)],
    )
    .await;
    assert_eq!(s, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["fullName"], "Ada Lovelace");
}

#[tokio::test]
async fn logout_revokes_and_clears_cookie() {
    let (_svc, r, _dir) = setup();
    let session = login(&r).await;

    let (s, h, body) = send(&r, "GET", "/logout", &[("cookie", &session)]).await;
    assert_eq!(s, StatusCode::OK);
    assert!(body.is_empty());
    assert_eq!(
        set_cookie(&h, "TRICORE_SESSION").as_deref(),
        Some("TRICORE_SESSION=deleted")
    );

    let (s, _, _) = send(&r, "GET", "/user-info", &[("cookie", &session)]).await;
    assert_eq!(s, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_without_session_is_ok() {
    let (_svc, r, _dir) = setup();
    let (s, _, _) = send(&r, "GET", "/logout", &[]).await;
    assert_eq!(s, StatusCode::OK);
}

#[tokio::test]
async fn callback_with_wrong_state_fails() {
    let (svc, r, _dir) = setup();
    let (_, h, _) = send(&r, "GET", "/oauth2/authorization/stub", &[]).await;
    let state_cookie = set_cookie(&h, "TRICORE_OAUTH_STATE").unwrap();

    let (s, h, _) = send(
        &r,
        "GET",
        "/login/oauth2/code/stub?code=good&state=forged",
        &[("cookie", &state_cookie)],
    )
    .await;
    assert_eq!(s, StatusCode::FOUND);
    assert_eq!(location(&h), "/login/fail");
    assert!(set_cookie(&h, "TRICORE_SESSION").is_none());
    assert_eq!(svc.users().count().unwrap(), 0);
}

#[tokio::test]
async fn callback_with_rejected_code_fails() {
    let (_svc, r, _dir) = setup();
    let (_, h, _) = send(&r, "GET", "/oauth2/authorization/stub", &[]).await;
    let state_cookie = set_cookie(&h, "TRICORE_OAUTH_STATE").unwrap();
    let state = state_cookie.split_once('=').unwrap().1.to_string();

    let uri = format!("/login/oauth2/code/stub?code=bad&state={}", state);
    let (s, h, _) = send(&r, "GET", &uri, &[("cookie", &state_cookie)]).await;
    assert_eq!(s, StatusCode::FOUND);
    assert_eq!(location(&h), "/login/fail");
}

#[tokio::test]
async fn provider_error_fails() {
    let (_svc, r, _dir) = setup();
    let (s, h, _) = send(
        &r,
        "GET",
        "/login/oauth2/code/stub?error=access_denied",
        &[],
    )
    .await;
    assert_eq!(s, StatusCode::FOUND);
    assert_eq!(location(&h), "/login/fail");
}

#[tokio::test]
async fn login_fail_redirects_to_front_end() {
    let (_svc, r, _dir) = setup();
    let (s, h, _) = send(&r, "GET", "/login/fail", &[]).await;
    assert_eq!(s, StatusCode::FOUND);
    assert_eq!(location(&h), "http://localhost:3000/login");
}

// =====================================================================
// CORS
// =====================================================================

#[tokio::test]
async fn preflight_from_allowed_origin() {
    let (_svc, r, _dir) = setup();
    let (s, h, _) = send(
        &r,
        "OPTIONS",
        "/user-info",
        &[
            ("origin", "http://localhost:3000"),
            ("access-control-request-method", "GET"),
            ("access-control-request-headers", "x-custom"),
        ],
    )
    .await;
    assert_eq!(s, StatusCode::OK);
    assert_eq!(
        h.get("access-control-allow-origin").unwrap(),
        "http://localhost:3000"
    );
    assert_eq!(h.get("access-control-allow-credentials").unwrap(), "true");
    assert_eq!(h.get("access-control-allow-headers").unwrap(), "x-custom");
    let methods = h
        .get("access-control-allow-methods")
        .unwrap()
        .to_str()
        .unwrap();
    for m in ["GET", "POST", "PUT", "DELETE", "OPTIONS"] {
        assert!(methods.contains(m), "missing {m} in {methods}");
    }
}

#[tokio::test]
async fn other_origins_get_no_cors_headers() {
    let (_svc, r, _dir) = setup();
    let (_, h, _) = send(
        &r,
        "GET",
        "/login",
        &[("origin", "https://evil.example")],
    )
    .await;
    assert!(h.get("access-control-allow-origin").is_none());
}

#[tokio::test]
async fn simple_request_from_allowed_origin_is_echoed() {
    let (_svc, r, _dir) = setup();
    let (_, h, _) = send(
        &r,
        "GET",
        "/login",
        &[("origin", "http://localhost:3000")],
    )
    .await;
    assert_eq!(
        h.get("access-control-allow-origin").unwrap(),
        "http://localhost:3000"
    );
    assert_eq!(h.get("access-control-allow-credentials").unwrap(), "true");
}
