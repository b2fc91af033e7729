// [apps/aggregation-server/src/handlers/health.rs]
/*!
 * =================================================================
 * APARATO: SYSTEM HEALTH GATEWAY (V4.1)
 * CLASIFICACIÓN: API ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: AGREGACIÓN DE SALUD DE COMPONENTES
 *
 * El endpoint agrega estado por componente y solo degrada el estatus
 * global; jamás responde error mientras el proceso viva.
 * =================================================================
 */

use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde_json::json;
use std::sync::atomic::Ordering;
use synapse_infra_blobstore::TokenPhase;
use tracing::instrument;

/// Endpoint: GET /health
#[instrument(skip(application_state))]
pub async fn handle_health(State(application_state): State<AppState>) -> Response {
    // 1. LEDGER: Sondeo mínimo de lectura.
    let database_status = match probe_database(&application_state).await {
        true => "healthy",
        false => "degraded",
    };

    // 2. BÓVEDA: Backend activo + fase de credenciales.
    let vault_backend = application_state.vault.backend_descriptor();
    let blob_store_status = match &application_state.token_manager {
        Some(token_manager) => match token_manager.phase().await {
            TokenPhase::Valid => "healthy".to_string(),
            TokenPhase::NeedsRefresh | TokenPhase::HaveRefreshOnly => "refreshing".to_string(),
            TokenPhase::Failed => "auth_degraded".to_string(),
            TokenPhase::Uninitialized => "unconfigured".to_string(),
        },
        None => format!("{}_mode", vault_backend),
    };

    // 3. SCHEDULER: Latido del bucle de pared.
    let scheduler_status = if application_state.scheduler_alive.load(Ordering::SeqCst) {
        "running"
    } else {
        "starting"
    };

    let model_count = application_state
        .versions()
        .count_versions()
        .await
        .unwrap_or(0);

    let overall_status = if database_status == "healthy" {
        "healthy"
    } else {
        "degraded"
    };

    (
        StatusCode::OK,
        axum::Json(json!({
            "status": overall_status,
            "database": database_status,
            "blob_store": blob_store_status,
            "scheduler": scheduler_status,
            "model_count": model_count,
            "memory": {
                "base_model_cache_bytes":
                    application_state.registry.base_cache_resident_bytes().await,
                "snapshot_dirty": application_state.database_client.beacon().is_dirty(),
                "training_cycle_active":
                    application_state.cycle_in_progress.load(Ordering::SeqCst)
            },
            "timestamp": Utc::now().to_rfc3339()
        })),
    )
        .into_response()
}

async fn probe_database(application_state: &AppState) -> bool {
    let Ok(connection) = application_state.database_client.get_connection() else {
        return false;
    };
    match connection.query("SELECT 1", ()).await {
        Ok(mut rows) => rows.next().await.is_ok(),
        Err(_) => false,
    }
}
