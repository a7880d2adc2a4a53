use axum::http::{HeaderValue, Method};
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};

use crate::service::AuthError;

/// CORS for the single configured front-end origin.
///
/// Only a request from that origin gets it echoed back; other origins get
/// no CORS headers at all. Credentials are allowed, so request headers are
/// mirrored back instead of answering with a `*` wildcard.
pub fn cors_layer(origin: &str) -> Result<CorsLayer, AuthError> {
    let origin = HeaderValue::from_str(origin)
        .map_err(|e| AuthError::Validation(format!("invalid CORS origin '{}': {}", origin, e)))?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list([origin]))
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(AllowHeaders::mirror_request()))
}
