//! Route registration: module routes + system endpoints.

use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;

use tricore_core::Module;

/// Build the complete router: system endpoints plus every module's routes.
///
/// Modules arrive already bound to their state and carry their own
/// session gate and CORS layers.
pub fn build_router(modules: &[&dyn Module]) -> Router {
    let mut app = Router::new()
        .route("/health", get(health))
        .route("/version", get(version));

    for module in modules {
        tracing::info!(module = module.name(), "mounting module routes");
        app = app.merge(module.routes());
    }

    app
}

async fn health() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "status": "ok",
    }))
}

async fn version() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "name": "tricored",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use tricore_auth::service::{AuthConfig, OidcProvider, OidcProviderConfig};
    use tricore_auth::AuthModule;
    use tricore_sql::SqliteStore;

    use super::*;

    fn app() -> Router {
        let sql = Arc::new(SqliteStore::open_in_memory().unwrap());
        let provider = Arc::new(OidcProvider::new(OidcProviderConfig::google(
            "cid",
            "cs",
            "http://localhost:8080/login/oauth2/code/google",
        )));
        let auth = AuthModule::new(sql, provider, AuthConfig::default()).unwrap();
        build_router(&[&auth])
    }

    async fn get_json(router: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::json!(null));
        (status, json)
    }

    #[tokio::test]
    async fn test_health() {
        let (s, json) = get_json(&app(), "/health").await;
        assert_eq!(s, StatusCode::OK);
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn test_version() {
        let (s, json) = get_json(&app(), "/version").await;
        assert_eq!(s, StatusCode::OK);
        assert_eq!(json["name"], "tricored");
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_module_routes_are_mounted() {
        let app = app();
        let (s, json) = get_json(&app, "/user-info").await;
        assert_eq!(s, StatusCode::UNAUTHORIZED);
        assert_eq!(json, serde_json::json!(null));

        let req = Request::builder().uri("/oauth2/authorization/google").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::FOUND);
        let location = resp.headers()["location"].to_str().unwrap();
        assert!(location.starts_with("https://accounts.google.com/o/oauth2/v2/auth?"));
        assert!(location.contains("prompt=select_account"));
    }
}
