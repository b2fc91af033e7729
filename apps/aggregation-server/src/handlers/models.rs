// [apps/aggregation-server/src/handlers/models.rs]
/*!
 * =================================================================
 * APARATO: ARTIFACT STREAMING GATEWAY (V5.1)
 * CLASIFICACIÓN: API ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: ENTREGA DE ARTEFACTOS VERSIONADOS A CLIENTES
 *
 * VISION:
 * 1. REDIRECT FIRST: Con URL directa disponible el gateway responde
 *    302 y jamás retiene el artefacto en memoria del proceso.
 * 2. BYTES FALLBACK: Sin URL directa (modo local o acuñado rechazado)
 *    el payload viaja como adjunto octet-stream.
 * =================================================================
 */

use crate::handlers::failure_response;
use crate::registry::DownloadResolution;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::{info, instrument};

/// Endpoint: GET /api/ai/models/:version
#[instrument(skip(application_state))]
pub async fn handle_model_download(
    State(application_state): State<AppState>,
    Path(requested_version): Path<String>,
) -> Response {
    match application_state
        .registry
        .resolve_for_download(&requested_version)
        .await
    {
        DownloadResolution::Stream { direct_url, size } => {
            info!(
                "🚀 [STREAMER]: Redirecting '{}' to direct URL ({} bytes).",
                requested_version, size
            );
            // 302 Found: el cliente sigue la URL efímera de la bóveda.
            (StatusCode::FOUND, [(header::LOCATION, direct_url)]).into_response()
        }
        DownloadResolution::Bytes { buffer } => {
            let attachment_name = format!(
                "model_{}.{}",
                requested_version,
                application_state.config.artifact_extension()
            );
            info!(
                "📦 [STREAMER]: Serving '{}' as attachment ({} bytes).",
                requested_version,
                buffer.len()
            );

            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, "application/octet-stream".to_string()),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename=\"{}\"", attachment_name),
                    ),
                ],
                buffer,
            )
                .into_response()
        }
        DownloadResolution::NotFound => failure_response(
            StatusCode::NOT_FOUND,
            format!("model version '{}' not found", requested_version),
        ),
    }
}

/// Endpoint: GET /api/ai/latest-model
#[instrument(skip(application_state))]
pub async fn handle_latest_model(State(application_state): State<AppState>) -> Response {
    let latest_version = application_state.registry.latest_version().await;
    let download_url = application_state.download_url_for(&latest_version);

    (
        StatusCode::OK,
        axum::Json(json!({
            "success": true,
            "latestModelVersion": latest_version,
            "modelDownloadURL": download_url
        })),
    )
        .into_response()
}
