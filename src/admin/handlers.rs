use axum::{
    extract::{Query, State},
    http::{HeaderMap, Method, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::admin::AdminState;
use crate::routing::{route, ClassificationRule};

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
}

#[derive(Serialize)]
pub struct RegistryView {
    pub generation: u64,
    pub backends: BTreeMap<String, String>,
}

#[derive(Deserialize)]
pub struct RouteQuery {
    #[serde(default = "default_method")]
    pub method: String,
    pub path: String,
}

fn default_method() -> String {
    "GET".to_string()
}

#[derive(Serialize)]
pub struct RouteView {
    pub use_leader: bool,
    pub rule: ClassificationRule,
    pub backend: Option<String>,
    pub reason: &'static str,
    pub generation: u64,
}

/// `degraded` while no leader is registered: writes would get 503.
pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let status = if state.registry.load().leader().is_some() {
        "operational"
    } else {
        "degraded"
    };
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status,
    })
}

pub async fn get_registry(State(state): State<AdminState>) -> Json<RegistryView> {
    let snapshot = state.registry.load();
    Json(RegistryView {
        generation: snapshot.generation(),
        backends: snapshot.backends().clone(),
    })
}

/// Route decision for a bodiless request under the live snapshot.
pub async fn get_route(
    State(state): State<AdminState>,
    Query(query): Query<RouteQuery>,
) -> Result<Json<RouteView>, (StatusCode, String)> {
    let method = Method::from_bytes(query.method.to_ascii_uppercase().as_bytes())
        .map_err(|_| (StatusCode::BAD_REQUEST, format!("invalid method '{}'", query.method)))?;

    let classification = state.classifier.classify(&method, &query.path, &HeaderMap::new(), None);
    let snapshot = state.registry.load();
    let decision = route(classification.use_leader, &snapshot);

    Ok(Json(RouteView {
        use_leader: classification.use_leader,
        rule: classification.rule,
        reason: decision.reason.as_str(),
        backend: decision.backend,
        generation: snapshot.generation(),
    }))
}
