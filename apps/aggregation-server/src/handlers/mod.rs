// [apps/aggregation-server/src/handlers/mod.rs]
/*!
 * =================================================================
 * APARATO: GATEWAY HANDLER REGISTRY (V5.0)
 * CLASIFICACIÓN: API ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: REGISTRO DE HANDLERS Y TRIAGE DE ERRORES HTTP
 * =================================================================
 */

pub mod health;
pub mod learn;
pub mod models;
pub mod stats;
pub mod upload;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use synapse_infra_db::StoreError;

/// Mapeo de la taxonomía del ledger a estatus HTTP.
/// Invariant -> 400, NotFound -> 404, el resto -> 500.
pub(crate) fn store_error_status(store_fault: &StoreError) -> StatusCode {
    match store_fault {
        StoreError::Invariant(_) => StatusCode::BAD_REQUEST,
        StoreError::NotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Respuesta de fallo de una línea, contrato uniforme del gateway.
pub(crate) fn failure_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(json!({ "success": false, "message": message.into() })),
    )
        .into_response()
}
