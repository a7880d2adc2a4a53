use axum::extract::Extension;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};

use crate::api::AppState;
use crate::model::{Principal, UserInfo};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/user-info", get(user_info))
        .route("/user/claims", get(user_claims))
}

/// GET /user-info: name, email and picture of the caller.
async fn user_info(principal: Option<Extension<Principal>>) -> Response {
    match principal {
        Some(Extension(p)) => Json(UserInfo::from(&p.identity)).into_response(),
        None => StatusCode::UNAUTHORIZED.into_response(),
    }
}

/// GET /user/claims: the provider's claim mapping for the caller.
async fn user_claims(principal: Option<Extension<Principal>>) -> Response {
    match principal {
        Some(Extension(p)) => Json(p.identity.claims).into_response(),
        None => StatusCode::UNAUTHORIZED.into_response(),
    }
}
