use axum::extract::{Extension, Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{AppendHeaders, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use tracing::{info, warn};

use tricore_core::{new_id, ServiceError};

use crate::api::cookies::{clear_cookie, parse_cookie, session_cookie, state_cookie, STATE_COOKIE};
use crate::api::AppState;
use crate::model::Principal;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/login", get(login))
        .route("/oauth2/authorization/{provider}", get(authorize))
        .route("/login/oauth2/code/{provider}", get(callback))
        .route("/login/success", get(login_success))
        .route("/login/fail", get(login_fail))
        .route("/logout", get(logout))
}

/// 302 with a Location header.
fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

/// GET /login: start the login with the configured provider.
async fn login(State(svc): State<AppState>) -> Response {
    found(&format!("/oauth2/authorization/{}", svc.provider().id()))
}

/// GET /oauth2/authorization/{provider}: redirect to the provider.
async fn authorize(
    State(svc): State<AppState>,
    Path(provider): Path<String>,
) -> Result<Response, ServiceError> {
    let idp = svc.provider_for(&provider)?;

    let state = new_id();
    let url = idp.authorize_url(&state);
    Ok((
        StatusCode::FOUND,
        AppendHeaders([(header::SET_COOKIE, state_cookie(svc.config(), &state))]),
        [(header::LOCATION, url)],
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// GET /login/oauth2/code/{provider}?code=...&state=...
///
/// Success sets the session cookie and continues at `/login/success`;
/// any failure lands on `/login/fail`.
async fn callback(
    State(svc): State<AppState>,
    Path(provider): Path<String>,
    Query(params): Query<CallbackParams>,
    headers: HeaderMap,
) -> Response {
    let clear_state = clear_cookie(svc.config(), STATE_COOKIE);
    let fail = |reason: &str| {
        warn!(provider = %provider, reason = %reason, "login failed");
        (
            StatusCode::FOUND,
            AppendHeaders([(header::SET_COOKIE, clear_state.clone())]),
            [(header::LOCATION, "/login/fail")],
        )
            .into_response()
    };

    if let Err(e) = svc.provider_for(&provider) {
        return fail(e.to_string().as_str());
    }
    if let Some(ref err) = params.error {
        return fail(err.as_str());
    }
    let expected_state = parse_cookie(&headers, STATE_COOKIE);
    if expected_state.is_none() || expected_state != params.state {
        return fail("state mismatch");
    }
    let Some(code) = params.code.as_deref() else {
        return fail("missing code");
    };

    match svc.complete_login(code).await {
        Ok((token, _session)) => (
            StatusCode::FOUND,
            AppendHeaders([
                (header::SET_COOKIE, session_cookie(svc.config(), &token)),
                (header::SET_COOKIE, clear_state.clone()),
            ]),
            [(header::LOCATION, "/login/success")],
        )
            .into_response(),
        Err(e) => fail(e.to_string().as_str()),
    }
}

/// GET /login/success: authenticated; hand the browser to the front end.
async fn login_success(State(svc): State<AppState>) -> Response {
    found(&svc.config().login_success_url)
}

/// GET /login/fail
async fn login_fail(State(svc): State<AppState>) -> Response {
    found(&svc.config().login_failure_url)
}

/// GET /logout: revoke the session and clear the cookie.
async fn logout(
    State(svc): State<AppState>,
    principal: Option<Extension<Principal>>,
) -> Result<Response, ServiceError> {
    if let Some(Extension(principal)) = principal {
        svc.revoke_session(&principal.session_id)?;
        info!(subject = %principal.subject(), "logged out");
    }

    let cookie = clear_cookie(svc.config(), &svc.config().session_cookie);
    Ok((StatusCode::OK, AppendHeaders([(header::SET_COOKIE, cookie)])).into_response())
}
