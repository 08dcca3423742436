//! Operator API on a separate listener.

pub mod auth;
pub mod handlers;

use axum::{middleware, routing::get, Router};
use std::sync::Arc;
use tokio::net::TcpListener;

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::lifecycle::ShutdownSignal;
use crate::registry::RegistryHandle;
use crate::routing::Classifier;

/// State shared by admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub registry: RegistryHandle,
    pub classifier: Arc<Classifier>,
    pub api_key: Arc<str>,
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/registry", get(get_registry))
        .route("/admin/route", get(get_route))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}

/// Serve the admin API until shutdown.
pub async fn serve_admin(
    listener: TcpListener,
    state: AdminState,
    mut shutdown: ShutdownSignal,
) -> Result<(), std::io::Error> {
    tracing::info!(address = %listener.local_addr()?, "Admin API listening");
    axum::serve(listener, setup_admin_router(state))
        .with_graceful_shutdown(async move { shutdown.recv().await })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClassifierConfig;
    use crate::registry::{Registry, RegistryEntry};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use std::time::Duration;
    use tower::ServiceExt;

    fn state() -> AdminState {
        let registry = Registry::from_entries(
            vec![
                RegistryEntry::leader("10.0.1.10:12346"),
                RegistryEntry::follower(1, "10.0.1.11:12346"),
            ],
            7,
        )
        .unwrap();
        AdminState {
            registry: RegistryHandle::with_registry(registry),
            classifier: Arc::new(Classifier::from_config(&ClassifierConfig::default(), Duration::from_secs(1))),
            api_key: Arc::from("s3cret"),
        }
    }

    async fn get_json(uri: &str, key: Option<&str>) -> (StatusCode, serde_json::Value) {
        let mut request = Request::builder().uri(uri);
        if let Some(key) = key {
            request = request.header("authorization", format!("Bearer {}", key));
        }
        let response = setup_admin_router(state())
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn rejects_missing_or_wrong_key() {
        assert_eq!(get_json("/admin/status", None).await.0, StatusCode::UNAUTHORIZED);
        assert_eq!(get_json("/admin/status", Some("nope")).await.0, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn shows_registry() {
        let (status, body) = get_json("/admin/registry", Some("s3cret")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["generation"], 7);
        assert_eq!(body["backends"]["leader"], "10.0.1.10:12346");
        assert_eq!(body["backends"]["follower_1"], "10.0.1.11:12346");
    }

    #[tokio::test]
    async fn explains_route_decisions() {
        let (_, body) = get_json("/admin/route?method=post&path=/sequencer/txs", Some("s3cret")).await;
        assert_eq!(body["use_leader"], true);
        assert_eq!(body["rule"], "submit_txs");
        assert_eq!(body["backend"], "10.0.1.10:12346");

        let (_, body) = get_json("/admin/route?path=/health", Some("s3cret")).await;
        assert_eq!(body["use_leader"], false);
        assert_eq!(body["backend"], "10.0.1.11:12346");

        let (status, _) = get_json("/admin/route?method=b%20d&path=/", Some("s3cret")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
