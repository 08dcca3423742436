//! HTTP server setup and request dispatch.
//!
//! # Responsibilities
//! - Create Axum Router with the catch-all dispatcher
//! - Wire up middleware (timeout, concurrency limit, request ID, tracing)
//! - Bind server to a plain or TLS listener
//! - Classify, select a backend and forward, or answer 503

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ProxyConfig;
use crate::http::forward::{self, UpstreamClient};
use crate::http::request::{request_id_of, X_REQUEST_ID};
use crate::http::websocket;
use crate::lifecycle::ShutdownSignal;
use crate::observability::metrics;
use crate::registry::RegistryHandle;
use crate::routing::classifier::is_websocket_upgrade;
use crate::routing::{route, Classifier};

/// How long in-flight requests get to finish after shutdown is triggered.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: RegistryHandle,
    pub classifier: Arc<Classifier>,
    pub client: UpstreamClient,
}

/// HTTP server for the router.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
}

impl HttpServer {
    /// Create a server that routes against `registry`.
    pub fn new(config: ProxyConfig, registry: RegistryHandle) -> Self {
        let classifier = Classifier::from_config(
            &config.classifier,
            Duration::from_millis(config.timeouts.body_read_ms),
        );
        let state = AppState {
            registry,
            classifier: Arc::new(classifier),
            client: forward::build_client(Duration::from_secs(config.timeouts.connect_secs)),
        };

        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(GlobalConcurrencyLimitLayer::new(config.listener.max_concurrent_requests))
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID.clone()))
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::new(X_REQUEST_ID.clone(), MakeRequestUuid))
    }

    /// Serve plain HTTP on `listener` until `shutdown` fires.
    pub async fn run(self, listener: TcpListener, mut shutdown: ShutdownSignal) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.recv().await })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Serve HTTPS on `addr` until `shutdown` fires.
    pub async fn run_tls(
        self,
        addr: SocketAddr,
        tls: RustlsConfig,
        mut shutdown: ShutdownSignal,
    ) -> Result<(), std::io::Error> {
        tracing::info!(address = %addr, "HTTPS server starting");

        let handle = axum_server::Handle::new();
        let drain = handle.clone();
        tokio::spawn(async move {
            shutdown.recv().await;
            drain.graceful_shutdown(Some(DRAIN_TIMEOUT));
        });

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum_server::bind_rustls(addr, tls).handle(handle).serve(app).await?;

        tracing::info!("HTTPS server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }
}

/// Dispatcher: classify, select against the current snapshot, forward.
async fn proxy_handler(
    State(state): State<AppState>,
    ConnectInfo(client_addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let start_time = Instant::now();
    let request_id = request_id_of(request.headers()).to_string();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let (classification, request) = state.classifier.classify_request(request).await;

    // One snapshot per request; a concurrent swap is seen by the next one.
    let snapshot = state.registry.load();
    let decision = route(classification.use_leader, &snapshot);
    let reason = decision.reason.as_str();

    let Some(backend) = decision.backend else {
        tracing::error!(
            request_id = %request_id,
            method = %method,
            path = %path,
            use_leader = classification.use_leader,
            generation = snapshot.generation(),
            "No backend available"
        );
        metrics::record_request(method.as_str(), 503, reason, start_time);
        return (StatusCode::SERVICE_UNAVAILABLE, "No backend available").into_response();
    };

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        path = %path,
        rule = ?classification.rule,
        backend = %backend,
        "Proxying request"
    );

    if is_websocket_upgrade(request.headers()) {
        let response = websocket::bridge(request, &backend).await;
        metrics::record_request(method.as_str(), response.status().as_u16(), reason, start_time);
        return response;
    }

    match forward::forward(&state.client, &backend, request, client_addr.ip()).await {
        Ok(response) => {
            metrics::record_request(method.as_str(), response.status().as_u16(), reason, start_time);
            response
        }
        Err(e) => {
            tracing::error!(request_id = %request_id, backend = %backend, error = %e, "Upstream error");
            metrics::record_request(method.as_str(), 502, reason, start_time);
            (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
        }
    }
}
