// [apps/aggregation-server/src/handlers/stats.rs]
// =================================================================
// APARATO: GLOBAL STATS GATEWAY (V4.0)
// RESPONSABILIDAD: EXPOSICIÓN DE AGREGADOS OPERATIVOS
// =================================================================

use crate::handlers::{failure_response, store_error_status};
use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::{instrument, warn};

/// Endpoint: GET /api/ai/stats
#[instrument(skip(application_state))]
pub async fn handle_stats(State(application_state): State<AppState>) -> Response {
    match application_state.stats().get_stats().await {
        Ok(global_stats) => (
            StatusCode::OK,
            axum::Json(json!({ "success": true, "stats": global_stats })),
        )
            .into_response(),
        Err(store_fault) => {
            warn!("❌ [STATS]: Aggregation degraded: {}", store_fault);
            failure_response(store_error_status(&store_fault), store_fault.to_string())
        }
    }
}
