//! Common routes: whole document, active rewrite rules, health, version.

use crate::state::AppState;
use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use serde_json::Value;

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
}

#[derive(Serialize)]
struct RuleBody {
    from: String,
    to: String,
}

async fn health() -> Json<HealthBody> {
    Json(HealthBody { status: "ok" })
}

async fn version() -> Json<Value> {
    Json(serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// The entire current document.
async fn db(State(state): State<AppState>) -> Json<Value> {
    Json((*state.store.snapshot()).clone().into_value())
}

async fn rules(State(state): State<AppState>) -> Json<Vec<RuleBody>> {
    let rules = state
        .rewriter
        .current()
        .rules()
        .into_iter()
        .map(|(from, to)| RuleBody { from, to })
        .collect();
    Json(rules)
}

/// GET /db, GET /__rules, GET /health, GET /version.
pub fn common_routes(state: AppState) -> Router {
    Router::new()
        .route("/db", get(db))
        .route("/__rules", get(rules))
        .route("/health", get(health))
        .route("/version", get(version))
        .with_state(state)
}
