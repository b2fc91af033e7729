// [libs/infra/blobstore/src/user_data.rs]
/*!
 * =================================================================
 * APARATO: USER DATA MIRROR (V3.1)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: ESPEJO DE INGESTA Y RECARGA PARA ENTRENAMIENTO
 *
 * VISION:
 * 1. MIRROR ON INGEST: Cada lote aceptado se espeja como dump JSON bajo
 *    'user_data/<deviceId>/interactions_<ts>.json'.
 * 2. STRICT RELOAD: En el ciclo de entrenamiento los dumps se recargan
 *    con esquema estricto; un registro que no deserializa a la forma
 *    canónica se descarta con advertencia nombrando el archivo.
 * =================================================================
 */

use crate::errors::BlobError;
use crate::paths::USER_DATA_FOLDER;
use crate::vault::ObjectVault;
use synapse_domain_models::DeviceInteraction;
use tracing::{debug, info, instrument, warn};

/// Espeja un lote aceptado de interacciones bajo la carpeta del dispositivo.
#[instrument(skip(vault, interactions), fields(device = %device_id, count = interactions.len()))]
pub async fn mirror_interactions(
    vault: &ObjectVault,
    device_id: &str,
    interactions: &[DeviceInteraction],
    epoch_seconds: i64,
) -> Result<(), BlobError> {
    if interactions.is_empty() {
        return Ok(());
    }

    let dump_payload = serde_json::to_vec_pretty(interactions)
        .map_err(|e| BlobError::Fatal(format!("MIRROR_SERIALIZE_FAULT: {}", e)))?;

    let dump_name = format!("interactions_{}.json", epoch_seconds);
    let device_folder = vault.namespace().user_data_folder(device_id);

    vault.put_model(dump_payload, &dump_name, &device_folder).await?;
    debug!("🪞 [USER_DATA]: Batch mirrored at '{}/{}'.", device_folder, dump_name);
    Ok(())
}

/// Recarga todos los dumps de interacciones para el dataset de entrenamiento.
/// Los archivos con esquema no conforme se descartan con advertencia; la
/// deduplicación por id ocurre aguas arriba, en el ensamblado del dataset.
#[instrument(skip(vault))]
pub async fn load_user_interactions(
    vault: &ObjectVault,
) -> Result<Vec<DeviceInteraction>, BlobError> {
    let dump_inventory = match vault.list_models(USER_DATA_FOLDER).await {
        Ok(inventory) => inventory,
        Err(listing_fault) if listing_fault.is_not_found() => return Ok(Vec::new()),
        Err(listing_fault) => return Err(listing_fault),
    };

    let mut recovered_interactions = Vec::new();

    for dump_object in &dump_inventory {
        if !dump_object.name.ends_with(".json") {
            continue;
        }

        let Some((virtual_folder, object_name)) = split_vault_path(&dump_object.path) else {
            continue;
        };

        let dump_bytes = match vault.get_model_bytes(&object_name, &virtual_folder).await {
            Ok(bytes) => bytes,
            Err(fetch_fault) => {
                warn!(
                    "⚠️ [USER_DATA]: Dump '{}' unreachable, skipped: {}",
                    dump_object.path, fetch_fault
                );
                continue;
            }
        };

        match serde_json::from_slice::<Vec<DeviceInteraction>>(&dump_bytes) {
            Ok(dump_interactions) => recovered_interactions.extend(dump_interactions),
            Err(schema_fault) => {
                warn!(
                    "⚠️ [USER_DATA]: Dump '{}' dropped on schema mismatch: {}",
                    dump_object.path, schema_fault
                );
            }
        }
    }

    info!(
        "🪞 [USER_DATA]: Recovered {} mirrored interactions from {} dumps.",
        recovered_interactions.len(),
        dump_inventory.len()
    );
    Ok(recovered_interactions)
}

/// Separa una ruta de bóveda en (carpeta virtual, nombre de objeto).
fn split_vault_path(vault_path: &str) -> Option<(String, String)> {
    let trimmed_path = vault_path.trim_start_matches('/');
    let (folder, name) = trimmed_path.rsplit_once('/')?;
    Some((folder.to_string(), name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::VaultSettings;
    use std::time::Duration;
    use synapse_domain_models::InteractionFeedback;

    fn local_vault(scratch: &tempfile::TempDir) -> ObjectVault {
        ObjectVault::local(
            scratch.path().to_path_buf(),
            &VaultSettings {
                models_root: "synapse_models".into(),
                db_snapshot_filename: "synapse_ledger.db".into(),
                snapshot_push_interval: Duration::from_secs(60),
                max_transient_retries: 3,
                retry_base_delay: Duration::from_millis(100),
            },
        )
    }

    fn sample_interaction(id: &str) -> DeviceInteraction {
        DeviceInteraction {
            id: id.into(),
            device_id: "device-9".into(),
            timestamp: "2026-07-30T10:15:00Z".into(),
            user_message: "open the garage".into(),
            ai_response: "opening".into(),
            detected_intent: "home_control".into(),
            confidence_score: 0.8,
            app_version: None,
            model_version: None,
            os_version: None,
            feedback: Some(InteractionFeedback { rating: 4, comment: None }),
        }
    }

    #[tokio::test]
    async fn mirror_then_reload_roundtrip() {
        let scratch = tempfile::tempdir().expect("scratch");
        let vault = local_vault(&scratch);

        let batch = vec![sample_interaction("m-1"), sample_interaction("m-2")];
        mirror_interactions(&vault, "device-9", &batch, 1_712_052_481)
            .await
            .expect("mirror");

        let recovered = load_user_interactions(&vault).await.expect("reload");
        assert_eq!(recovered.len(), 2);
        assert!(recovered.iter().any(|row| row.id == "m-1"));
        assert!(recovered[0].has_positive_feedback());
    }

    #[tokio::test]
    async fn malformed_dump_is_dropped_not_fatal() {
        let scratch = tempfile::tempdir().expect("scratch");
        let vault = local_vault(&scratch);

        mirror_interactions(&vault, "device-9", &[sample_interaction("ok-1")], 100)
            .await
            .expect("mirror");

        // Dump con esquema no conforme: debe descartarse con advertencia.
        vault
            .put_model(
                br#"[{"idx": "campo-desconocido"}]"#.to_vec(),
                "interactions_200.json",
                "user_data/device-9",
            )
            .await
            .expect("plant malformed dump");

        let recovered = load_user_interactions(&vault).await.expect("reload");
        assert_eq!(recovered.len(), 1);
        assert_eq!(recovered[0].id, "ok-1");
    }

    #[tokio::test]
    async fn empty_vault_yields_empty_dataset() {
        let scratch = tempfile::tempdir().expect("scratch");
        let vault = local_vault(&scratch);

        let recovered = load_user_interactions(&vault).await.expect("reload");
        assert!(recovered.is_empty());
    }
}
