//! HTTP layer: system endpoints and application router composition.

pub mod handlers;

use axum::Router;
use axum::routing::get;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::app_state::AppState;
use crate::ws::handler::ws_handler;

/// Builds the router with every non-static endpoint.
pub fn build_router() -> Router<AppState> {
    Router::new()
        .merge(handlers::system::routes())
        .route("/ws", get(ws_handler))
}

/// Builds the complete application: endpoints, static assets from the
/// configured directory as fallback, request tracing and permissive CORS.
pub fn build_app(state: AppState) -> Router {
    let assets = ServeDir::new(&state.config.assets_dir);
    build_router()
        .fallback_service(assets)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use super::*;
    use crate::config::RelayConfig;
    use crate::domain::Registry;

    fn app() -> Router {
        let config = RelayConfig {
            assets_dir: "does-not-exist".into(),
            ..RelayConfig::default()
        };
        build_app(AppState {
            registry: Registry::spawn(config.registry()),
            config: Arc::new(config),
        })
    }

    fn get(uri: &str) -> Request<Body> {
        let Ok(request) = Request::builder().uri(uri).body(Body::empty()) else {
            panic!("valid request");
        };
        request
    }

    #[tokio::test]
    async fn health_is_ok_while_registry_runs() {
        let Ok(response) = app().oneshot(get("/health")).await else {
            panic!("router failed");
        };
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_path_falls_through_to_assets() {
        let Ok(response) = app().oneshot(get("/index.html")).await else {
            panic!("router failed");
        };
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn plain_get_on_ws_is_not_an_upgrade() {
        let Ok(response) = app().oneshot(get("/ws")).await else {
            panic!("router failed");
        };
        assert!(response.status().is_client_error());
    }
}
