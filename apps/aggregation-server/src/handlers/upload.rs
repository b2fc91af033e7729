// [apps/aggregation-server/src/handlers/upload.rs]
/*!
 * =================================================================
 * APARATO: MODEL UPLOAD GATEWAY (V6.2)
 * CLASIFICACIÓN: API ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: ADMISIÓN DE ARTEFACTOS ENTRENADOS EN DISPOSITIVO
 *
 * VISION:
 * 1. ACK BEFORE TRAINING: El 200 de la subida jamás depende de un ciclo
 *    de reentrenamiento; la evaluación de la política de disparo corre
 *    desacoplada tras el registro.
 * 2. EXTENSION & SIZE SHIELD: Extensión binaria esperada y techo de
 *    tamaño configurable; rechazo 400 ante violación.
 * =================================================================
 */

use crate::handlers::failure_response;
use crate::services::orchestrator;
use crate::state::AppState;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde_json::json;
use sha2::{Digest, Sha256};
use synapse_domain_models::{IncorporationStatus, UploadedModel};
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Endpoint: POST /api/ai/upload-model (multipart)
#[instrument(skip(application_state, multipart_stream))]
pub async fn handle_upload_model(
    State(application_state): State<AppState>,
    mut multipart_stream: Multipart,
) -> Response {
    let mut artifact_payload: Option<Vec<u8>> = None;
    let mut original_filename = String::new();
    let mut device_id = String::new();
    let mut app_version = String::new();
    let mut description = String::new();

    // Desembalaje del sobre multipart.
    loop {
        let next_field = match multipart_stream.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(multipart_fault) => {
                return failure_response(
                    StatusCode::BAD_REQUEST,
                    format!("malformed multipart payload: {}", multipart_fault),
                )
            }
        };

        let field_name = next_field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "model" => {
                original_filename = next_field.file_name().unwrap_or_default().to_string();
                match next_field.bytes().await {
                    Ok(payload_bytes) => artifact_payload = Some(payload_bytes.to_vec()),
                    Err(read_fault) => {
                        return failure_response(
                            StatusCode::BAD_REQUEST,
                            format!("model payload unreadable: {}", read_fault),
                        )
                    }
                }
            }
            "deviceId" => device_id = read_text_field(next_field).await,
            "appVersion" => app_version = read_text_field(next_field).await,
            "description" => description = read_text_field(next_field).await,
            unknown_field => {
                warn!("⚠️ [UPLOAD]: Ignoring unknown multipart field '{}'.", unknown_field);
            }
        }
    }

    let Some(artifact_payload) = artifact_payload else {
        return failure_response(StatusCode::BAD_REQUEST, "multipart field 'model' is required");
    };
    if device_id.trim().is_empty() {
        return failure_response(StatusCode::BAD_REQUEST, "deviceId must not be empty");
    }

    let expected_extension = application_state.config.artifact_extension();
    if !original_filename
        .to_lowercase()
        .ends_with(&format!(".{}", expected_extension))
    {
        return failure_response(
            StatusCode::BAD_REQUEST,
            format!("model file must carry the '.{}' extension", expected_extension),
        );
    }

    if artifact_payload.len() > application_state.config.max_upload_bytes() {
        return failure_response(
            StatusCode::BAD_REQUEST,
            format!(
                "model exceeds the {} MB upload ceiling",
                application_state.config.max_upload_size_mb
            ),
        );
    }

    // Huella de contenido registrada en la subida.
    let content_fingerprint = format!("{:x}", Sha256::digest(&artifact_payload));
    let artifact_size = artifact_payload.len() as u64;
    let upload_epoch = Utc::now().timestamp();

    let object_name = application_state.vault.namespace().uploaded_model_name(
        &device_id,
        upload_epoch,
        &expected_extension,
    );
    let uploaded_folder = application_state.vault.namespace().uploaded_folder();

    // Blob primero, fila después: una fila sin blob es imposible.
    if let Err(vault_fault) = application_state
        .vault
        .put_model(artifact_payload, &object_name, &uploaded_folder)
        .await
    {
        warn!("❌ [UPLOAD]: Vault rejected artifact: {}", vault_fault);
        return failure_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "artifact could not be stored",
        );
    }

    let uploaded_model = UploadedModel {
        id: Uuid::new_v4().to_string(),
        device_id: device_id.clone(),
        app_version,
        description,
        blob_ref: application_state
            .vault
            .blob_ref_for(&object_name, &uploaded_folder),
        file_size: artifact_size,
        original_filename,
        sha256: content_fingerprint,
        upload_date: Utc::now().to_rfc3339(),
        status: IncorporationStatus::Pending,
        incorporated_in_version: None,
    };

    if let Err(store_fault) = application_state
        .uploads()
        .insert_uploaded_model(&uploaded_model)
        .await
    {
        warn!("❌ [UPLOAD]: Ledger rejected upload row: {}", store_fault);
        return failure_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "artifact metadata could not be recorded",
        );
    }

    info!(
        "📥 [UPLOAD]: Artifact '{}' admitted from device '{}' ({} bytes).",
        uploaded_model.id, device_id, artifact_size
    );

    // Evaluación de la política de disparo, desacoplada del ACK.
    let dispatch_state = application_state.clone();
    tokio::spawn(async move {
        orchestrator::evaluate_and_dispatch(&dispatch_state, "upload").await;
    });

    let latest_version = application_state.registry.latest_version().await;
    let download_url = application_state.download_url_for(&latest_version);

    (
        StatusCode::OK,
        axum::Json(json!({
            "success": true,
            "message": "Model uploaded successfully and queued for incorporation",
            "modelId": uploaded_model.id,
            "latestModelVersion": latest_version,
            "modelDownloadURL": download_url
        })),
    )
        .into_response()
}

async fn read_text_field(field: axum::extract::multipart::Field<'_>) -> String {
    field.text().await.unwrap_or_default()
}
