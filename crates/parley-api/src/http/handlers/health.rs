//! GET /health - liveness plus database reachability.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde_json::{Value, json};

use crate::state::AppState;

/// Reports `ok` when the database answers a trivial query, `degraded`
/// (503) otherwise. No authentication, no envelope.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let reachable = match state.database.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Health check could not reach the database");
            false
        }
    };

    let status = if reachable {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": if reachable { "ok" } else { "degraded" },
            "version": env!("CARGO_PKG_VERSION"),
            "database": {
                "backend": state.database.backend_name(),
                "reachable": reachable,
            },
        })),
    )
}
