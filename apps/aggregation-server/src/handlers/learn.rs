// [apps/aggregation-server/src/handlers/learn.rs]
/*!
 * =================================================================
 * APARATO: LEARNING INGEST GATEWAY (V6.0)
 * CLASIFICACIÓN: API ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: INGESTA ATÓMICA DE LOTES DE INTERACCIONES
 *
 * VISION:
 * 1. ALL-OR-NOTHING: El lote entero se compromete o se rechaza; una
 *    fila inválida anula la ingesta completa con 400.
 * 2. MIRROR SIDE-CHANNEL: El lote aceptado se espeja best-effort en
 *    'user_data/<deviceId>/' sin bloquear la respuesta.
 * =================================================================
 */

use crate::handlers::{failure_response, store_error_status};
use crate::state::AppState;
use axum::extract::{Json, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde_json::json;
use synapse_domain_models::{DeviceInteraction, LearnEnvelope};
use synapse_infra_blobstore::user_data;
use tracing::{info, instrument, warn};

/// Endpoint: POST /api/ai/learn
#[instrument(skip(application_state, ingest_envelope), fields(device = %ingest_envelope.device_id, batch = ingest_envelope.interactions.len()))]
pub async fn handle_learn(
    State(application_state): State<AppState>,
    Json(ingest_envelope): Json<LearnEnvelope>,
) -> Response {
    if ingest_envelope.device_id.trim().is_empty() {
        return failure_response(StatusCode::BAD_REQUEST, "deviceId must not be empty");
    }

    let interaction_rows: Vec<DeviceInteraction> = ingest_envelope
        .interactions
        .iter()
        .cloned()
        .map(|report| DeviceInteraction::from_report(report, &ingest_envelope))
        .collect();

    // Validación previa: una fila inválida rechaza el lote completo.
    for interaction_row in &interaction_rows {
        if let Err(invariant_message) = interaction_row.validate() {
            return failure_response(StatusCode::BAD_REQUEST, invariant_message);
        }
    }

    match application_state
        .interactions()
        .upsert_interactions(&interaction_rows)
        .await
    {
        Ok(persisted_count) => {
            info!("📚 [LEARN]: Batch of {} interactions committed.", persisted_count);

            // Espejo best-effort hacia la bóveda; jamás bloquea el ACK.
            if persisted_count > 0 {
                let vault = application_state.vault.clone();
                let device_id = ingest_envelope.device_id.clone();
                let mirrored_rows = interaction_rows.clone();
                tokio::spawn(async move {
                    if let Err(mirror_fault) = user_data::mirror_interactions(
                        &vault,
                        &device_id,
                        &mirrored_rows,
                        Utc::now().timestamp(),
                    )
                    .await
                    {
                        warn!("⚠️ [LEARN]: User-data mirror declined: {}", mirror_fault);
                    }
                });
            }

            let latest_version = application_state.registry.latest_version().await;
            let download_url = application_state.download_url_for(&latest_version);

            (
                StatusCode::OK,
                axum::Json(json!({
                    "success": true,
                    "message": format!("Processed {} interactions", persisted_count),
                    "latestModelVersion": latest_version,
                    "modelDownloadURL": download_url
                })),
            )
                .into_response()
        }
        Err(store_fault) => {
            warn!("❌ [LEARN]: Batch rejected: {}", store_fault);
            failure_response(store_error_status(&store_fault), store_fault.to_string())
        }
    }
}
