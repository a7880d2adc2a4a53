use axum::extract::State;
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::debug;

use crate::api::cookies::parse_cookie;
use crate::api::AppState;

/// Paths reachable without a session.
const PUBLIC_PATHS: &[&str] = &[
    "/",
    "/error",
    "/health",
    "/version",
    "/login",
    "/login/fail",
    "/logout",
];

/// Path prefixes reachable without a session.
const PUBLIC_PREFIXES: &[&str] = &["/oauth2/", "/login/oauth2/", "/api/public/"];

/// Session gate middleware.
///
/// A valid session (cookie or Bearer token) attaches a `Principal` to the
/// request on every path. Without one, public paths pass through; browsers
/// asking for HTML are sent to `/login`, everyone else gets an empty 401.
pub async fn session_gate(
    State(svc): State<AppState>,
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Response {
    for token in session_tokens(req.headers(), &svc.config().session_cookie) {
        match svc.authenticate(&token) {
            Ok(principal) => {
                req.extensions_mut().insert(principal);
                return next.run(req).await;
            }
            Err(e) => debug!(path = %req.uri().path(), error = %e, "session rejected"),
        }
    }

    if is_public_path(req.uri().path()) {
        return next.run(req).await;
    }

    if wants_html(req.headers()) {
        debug!(path = %req.uri().path(), "unauthenticated browser, redirecting to login");
        return (StatusCode::FOUND, [(header::LOCATION, "/login")]).into_response();
    }

    debug!(path = %req.uri().path(), "unauthenticated request");
    StatusCode::UNAUTHORIZED.into_response()
}

/// Candidate session tokens: the session cookie first, then a Bearer header.
/// The first one that authenticates wins.
fn session_tokens(headers: &HeaderMap, cookie_name: &str) -> Vec<String> {
    parse_cookie(headers, cookie_name)
        .into_iter()
        .chain(extract_bearer(headers).map(str::to_string))
        .collect()
}

/// Extract the Bearer token from Authorization header.
fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

fn wants_html(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains("text/html"))
        .unwrap_or(false)
}

/// Check if a path is public (no session required).
fn is_public_path(path: &str) -> bool {
    PUBLIC_PATHS.contains(&path) || PUBLIC_PREFIXES.iter().any(|p| path.starts_with(p))
}
