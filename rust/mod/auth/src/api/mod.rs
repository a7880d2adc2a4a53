mod cookies;
mod cors;
mod login;
mod me;
mod middleware;

use std::sync::Arc;

use axum::Router;
use tracing::warn;

use crate::service::AuthService;

pub use cookies::parse_cookie;
pub use cors::cors_layer;

/// Shared application state.
pub type AppState = Arc<AuthService>;

/// Build the complete auth router: login flow, user endpoints, the
/// session gate and, when an origin is configured, CORS.
pub fn build_router(svc: Arc<AuthService>) -> Router {
    let mut router = Router::new()
        .merge(login::routes())
        .merge(me::routes())
        .layer(axum::middleware::from_fn_with_state(
            svc.clone(),
            middleware::session_gate,
        ))
        .with_state(svc.clone());

    // Outermost, so preflight requests never reach the gate.
    if let Some(ref origin) = svc.config().allowed_origin {
        match cors::cors_layer(origin) {
            Ok(layer) => router = router.layer(layer),
            Err(e) => warn!(error = %e, "CORS disabled"),
        }
    }

    router
}
