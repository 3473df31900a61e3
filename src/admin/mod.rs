//! Administrative API.
//!
//! Served on its own listener; every route requires
//! `Authorization: Bearer <admin.api_key>`.

pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::http::server::AppState;

pub fn setup_admin_router(state: AppState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/stats", get(get_stats))
        .route("/admin/events", get(get_events))
        .route("/admin/blocked", get(get_blocked))
        .route("/admin/clear", post(clear_state))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}

/// Serve the admin API until the shutdown signal fires.
pub async fn serve_admin(
    listener: TcpListener,
    state: AppState,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, "Admin API starting");

    let app = setup_admin_router(state).into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await?;

    tracing::info!("Admin API stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ShieldConfig;
    use crate::security::{RequestView, SecurityMiddleware};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    const KEY: &str = "test-admin-key";

    fn state() -> AppState {
        let mut config = ShieldConfig::default();
        config.admin.api_key = KEY.to_string();
        let shield = Arc::new(SecurityMiddleware::new(&config).unwrap());
        AppState::new(config, shield)
    }

    fn authed(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("authorization", format!("Bearer {}", KEY))
            .body(Body::empty())
            .unwrap()
    }

    async fn json(router: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null))
    }

    #[tokio::test]
    async fn test_requires_bearer_token() {
        let router = setup_admin_router(state());
        let response = router
            .clone()
            .oneshot(Request::builder().uri("/admin/stats").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = router
            .oneshot(
                Request::builder()
                    .uri("/admin/stats")
                    .header("authorization", "Bearer wrong")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_events_blocked_and_clear() {
        let state = state();
        state.shield.evaluate(&RequestView::new("6.6.6.6", "GET", "/").with_query("q=<script>alert(1)</script>"));
        let router = setup_admin_router(state.clone());

        let (status, events) = json(router.clone(), authed("GET", "/admin/events?limit=5")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(events.as_array().unwrap().len(), 1);
        assert_eq!(events[0]["kind"], "threat");

        let (_, blocked) = json(router.clone(), authed("GET", "/admin/blocked")).await;
        assert_eq!(blocked[0]["source"], "6.6.6.6");
        assert_eq!(blocked[0]["offenseCount"], 1);

        let (_, stats) = json(router.clone(), authed("GET", "/admin/stats")).await;
        assert_eq!(stats["status"], "secure");
        assert_eq!(stats["threatsByCategory"]["xss"], 1);

        let (status, cleared) = json(router.clone(), authed("POST", "/admin/clear")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(cleared, serde_json::json!({ "success": true }));

        let (_, blocked) = json(router, authed("GET", "/admin/blocked")).await;
        assert!(blocked.as_array().unwrap().is_empty());
        assert!(state.shield.event_log().is_empty());
    }

    #[tokio::test]
    async fn test_status() {
        let (status, body) = json(setup_admin_router(state()), authed("GET", "/admin/status")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "operational");
        assert_eq!(body["blockedSources"], 0);
    }
}
