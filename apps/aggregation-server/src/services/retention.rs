// [apps/aggregation-server/src/services/retention.rs]
/*!
 * =================================================================
 * APARATO: VERSION RETENTION SWEEPER (V5.0)
 * CLASIFICACIÓN: BACKGROUND SERVICE (ESTRATO L4)
 * RESPONSABILIDAD: PODA DE VERSIONES MÁS ALLÁ DEL PRESUPUESTO
 *
 * Contrato de borrado: blob primero, fila después. La semilla '1.0.0'
 * y los punteros 'base_model/ *' jamás se tocan. Un blob ya ausente
 * (NotFound) no bloquea la poda de su fila: es la auto-sanación de un
 * publish parcial anterior.
 * =================================================================
 */

use crate::state::AppState;
use synapse_domain_models::BlobRef;
use tracing::{info, instrument, warn};

/// Ejecuta una pasada de retención. Devuelve la cantidad de versiones
/// efectivamente podadas.
#[instrument(skip(application_state))]
pub async fn run_retention_sweep(application_state: &AppState) -> anyhow::Result<usize> {
    let keep_newest = application_state.config.max_models_to_keep;
    let expired_versions = application_state
        .versions()
        .list_retention_candidates(keep_newest)
        .await?;

    if expired_versions.is_empty() {
        return Ok(0);
    }

    info!(
        "🗑️  [RETENTION]: {} versions beyond the keep-{} budget.",
        expired_versions.len(),
        keep_newest
    );

    let mut purged_count = 0usize;

    for expired_record in &expired_versions {
        // 1. BLOB PRIMERO.
        let blob_deletion = match &expired_record.blob_ref {
            BlobRef::Blob(vault_path) | BlobRef::File(vault_path) => {
                let trimmed = vault_path.trim_start_matches('/');
                let (virtual_folder, object_name) = match trimmed.rsplit_once('/') {
                    Some((folder, name)) => (folder.to_string(), name.to_string()),
                    None => (String::new(), trimmed.to_string()),
                };
                application_state
                    .vault
                    .delete_model(&object_name, &virtual_folder)
                    .await
            }
            // Handles efímeros o de diagnóstico: nada físico que borrar.
            BlobRef::Stream(_) | BlobRef::Mem(_) => Ok(()),
        };

        match blob_deletion {
            Ok(()) => {}
            Err(deletion_fault) if deletion_fault.is_not_found() => {
                // Fila sin blob: imposible por orden de escritura salvo
                // auto-sanación de una pasada anterior. La poda continúa.
                warn!(
                    "🩹 [RETENTION]: Blob already absent for '{}'; healing the row.",
                    expired_record.version
                );
            }
            Err(deletion_fault) => {
                warn!(
                    "⚠️ [RETENTION]: Blob deletion degraded for '{}' ({}); row preserved.",
                    expired_record.version, deletion_fault
                );
                continue;
            }
        }

        // 2. FILA DESPUÉS.
        match application_state
            .versions()
            .delete_model_version(&expired_record.version)
            .await
        {
            Ok(()) => purged_count += 1,
            Err(row_fault) => {
                warn!(
                    "⚠️ [RETENTION]: Row deletion degraded for '{}': {}",
                    expired_record.version, row_fault
                );
            }
        }
    }

    Ok(purged_count)
}
