use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};
use tracing::instrument;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/services", get(services_health))
}

async fn health() -> Json<Value> {
    Json(json!({"status": "healthy", "service": "closetmate"}))
}

/// Aggregate view over this service's dependencies. Uses the short health
/// timeout on the collaborator call so a hung image service cannot stall
/// the probe.
#[instrument(skip(state))]
async fn services_health(State(state): State<AppState>) -> Json<Value> {
    let database = match sqlx::query("SELECT 1").execute(&state.db).await {
        Ok(_) => json!({"status": "healthy"}),
        Err(e) => json!({"status": "unhealthy", "error": e.to_string()}),
    };

    let image_processing = match state.imaging.health().await {
        Ok(v) => v,
        Err(e) => json!({"status": "unhealthy", "error": e.to_string()}),
    };

    let all_healthy = [&database, &image_processing]
        .iter()
        .all(|s| s.get("status").and_then(Value::as_str) == Some("healthy"));

    Json(json!({
        "success": true,
        "all_healthy": all_healthy,
        "services": {
            "closetmate": {"status": "healthy"},
            "database": database,
            "image_processing": image_processing,
        }
    }))
}
