//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the shield middleware in front of every route
//! - Wire up middleware (tracing, timeout, request ID)
//! - Bind server to listener
//! - Forward admitted requests to the upstream, or answer them directly
//! - Apply hot-reloaded configuration

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::State,
    http::{
        uri::{Authority, PathAndQuery, Scheme},
        Request, Uri,
    },
    middleware,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use hyper::body::Incoming;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ShieldConfig;
use crate::http::middleware::shield_middleware;
use crate::http::request::X_REQUEST_ID;
use crate::http::response::{bad_gateway, protected};
use crate::security::SecurityMiddleware;

/// Application state injected into handlers and middleware.
#[derive(Clone)]
pub struct AppState {
    pub shield: Arc<SecurityMiddleware>,
    pub config: Arc<ArcSwap<ShieldConfig>>,
    pub client: Client<HttpConnector, Body>,
}

impl AppState {
    pub fn new(config: ShieldConfig, shield: Arc<SecurityMiddleware>) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self {
            shield,
            config: Arc::new(ArcSwap::from_pointee(config)),
            client,
        }
    }

    /// Apply a reloaded configuration to the gate and the edge.
    ///
    /// Rejected configurations leave everything as it was.
    pub fn apply_config(&self, new_config: ShieldConfig) {
        if let Err(e) = self.shield.apply_config(&new_config) {
            tracing::error!("Rejected reloaded config: {}. Keeping current configuration.", e);
            return;
        }

        let current = self.config.load();
        if current.listener.bind_address != new_config.listener.bind_address
            || current.admin.bind_address != new_config.admin.bind_address
        {
            tracing::warn!("Listener address changes take effect on restart");
        }

        self.config.store(Arc::new(new_config));
        tracing::info!("Configuration reloaded");
    }
}

/// HTTP server for the protected listener.
pub struct ShieldServer {
    router: Router,
    state: AppState,
}

impl ShieldServer {
    pub fn new(config: ShieldConfig, shield: Arc<SecurityMiddleware>) -> Self {
        let timeout = Duration::from_secs(config.upstream.request_timeout_secs);
        let state = AppState::new(config, shield);
        let router = Self::build_router(state.clone(), timeout);
        Self { router, state }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(state: AppState, timeout: Duration) -> Router {
        Router::new()
            .route("/", any(forward_handler))
            .route("/{*path}", any(forward_handler))
            .layer(middleware::from_fn_with_state(state.clone(), shield_middleware))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id())
                    .layer(TimeoutLayer::new(timeout)),
            )
    }

    /// Shared state, for the admin API.
    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// The router, for driving the server without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until the shutdown signal fires.
    ///
    /// Validated configurations arriving on `config_updates` are applied live.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<ShieldConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Shield listener starting");

        let state = self.state.clone();
        tokio::spawn(async move {
            while let Some(new_config) = config_updates.recv().await {
                state.apply_config(new_config);
            }
        });

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shield listener received shutdown signal");
            })
            .await?;

        tracing::info!("Shield listener stopped");
        Ok(())
    }
}

/// Handler for admitted requests.
async fn forward_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let config = state.config.load();
    let Some(upstream) = config.upstream.address.as_deref() else {
        return protected();
    };

    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let (mut parts, body) = request.into_parts();

    let mut uri_parts = parts.uri.clone().into_parts();
    uri_parts.scheme = Some(Scheme::HTTP);
    uri_parts.authority = match Authority::from_str(upstream) {
        Ok(authority) => Some(authority),
        Err(e) => {
            tracing::error!(request_id = %request_id, upstream = %upstream, error = %e, "Invalid upstream authority");
            return bad_gateway();
        }
    };
    if uri_parts.path_and_query.is_none() {
        uri_parts.path_and_query = Some(PathAndQuery::from_static("/"));
    }
    parts.uri = match Uri::from_parts(uri_parts) {
        Ok(uri) => uri,
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Failed to build upstream URI");
            return bad_gateway();
        }
    };

    tracing::debug!(request_id = %request_id, uri = %parts.uri, "Forwarding admitted request");

    match state.client.request(Request::from_parts(parts, body)).await {
        Ok(response) => {
            let response: Response<Incoming> = response;
            let (parts, body) = response.into_parts();
            Response::from_parts(parts, Body::new(body)).into_response()
        }
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Upstream error");
            bad_gateway()
        }
    }
}
