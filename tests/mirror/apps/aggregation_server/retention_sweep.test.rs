// [tests/mirror/apps/aggregation_server/retention_sweep.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DEL BARRIDO DE RETENCIÓN (V4.0)
 * CLASIFICACIÓN: EVIDENCIA DE ORQUESTACIÓN (ESTRATO L2-MIRROR)
 * RESPONSABILIDAD: AUDITORÍA DE LA PODA BLOB-PRIMERO/FILA-DESPUÉS
 *
 * Escenario certificado: con presupuesto keep-5 y 7 versiones no-base,
 * el barrido deja exactamente las 5 más nuevas; las podadas devuelven
 * NotFound en resolución y sus blobs desaparecen; la semilla '1.0.0' y
 * los punteros 'base_model/ *' quedan intactos.
 * =================================================================
 */

use chrono::{Duration as ChronoDuration, Utc};
use synapse_aggregation_server::prelude::*;
use synapse_aggregation_server::services::retention;
use synapse_domain_models::ModelVersionRecord;
use synapse_infra_blobstore::paths::BASE_MODEL_FOLDER;

async fn laboratory_state() -> (AppState, tempfile::TempDir) {
    let scratch = tempfile::tempdir().expect("scratch");
    let kernel = AggregationKernel::ignite(ServerConfig::for_local_testing(scratch.path()))
        .await
        .expect("kernel ignition");
    let (application_state, _trigger_receiver) = kernel.into_laboratory_parts();
    (application_state, scratch)
}

/// Publica una versión sintética: blob en 'trained/' + fila en el ledger.
async fn plant_version(state: &AppState, ordinal: i64) -> String {
    let version = format!("1.0.{}", 1_700_000_000 + ordinal);
    let namespace = state.vault.namespace();
    let object_name = namespace.versioned_model_name(&version, "mlmodel");
    let trained_folder = namespace.trained_folder();

    state
        .vault
        .put_model(
            format!("artifact-bytes-{}", ordinal).into_bytes(),
            &object_name,
            &trained_folder,
        )
        .await
        .expect("blob write");

    state
        .versions()
        .insert_model_version(&ModelVersionRecord {
            version: version.clone(),
            blob_ref: state.vault.blob_ref_for(&object_name, &trained_folder),
            accuracy: 0.8,
            training_data_size: 100,
            training_date: (Utc::now() + ChronoDuration::seconds(ordinal)).to_rfc3339(),
            created_at: None,
            export_marker: None,
        })
        .await
        .expect("row insert");

    version
}

#[tokio::test]
async fn certify_keep_newest_budget_and_base_immunity() {
    let (state, _scratch) = laboratory_state().await;

    // Puntero base plantado: debe sobrevivir intacto al barrido.
    state
        .vault
        .put_model(b"base-pointer-bytes".to_vec(), "model_latest.mlmodel", BASE_MODEL_FOLDER)
        .await
        .expect("base pointer");

    // 7 versiones no-base con fechas de entrenamiento escalonadas.
    let mut planted_versions = Vec::new();
    for ordinal in 0..7 {
        planted_versions.push(plant_version(&state, ordinal).await);
    }

    let purged_count = retention::run_retention_sweep(&state).await.expect("sweep");
    assert_eq!(purged_count, 2, "7 versions with keep-5 must purge exactly 2");

    // Las 2 más antiguas: fila podada, blob ausente, resolución 404.
    for purged_version in &planted_versions[0..2] {
        assert!(state
            .versions()
            .get_model_version(purged_version)
            .await
            .expect("lookup")
            .is_none());

        let namespace = state.vault.namespace();
        let object_name = namespace.versioned_model_name(purged_version, "mlmodel");
        assert!(state
            .vault
            .get_model_bytes(&object_name, &namespace.trained_folder())
            .await
            .is_err());

        assert!(matches!(
            state.registry.resolve_for_download(purged_version).await,
            DownloadResolution::NotFound
        ));
    }

    // Las 5 más nuevas sobreviven y resuelven.
    for kept_version in &planted_versions[2..] {
        assert!(state
            .versions()
            .get_model_version(kept_version)
            .await
            .expect("lookup")
            .is_some());
        assert!(matches!(
            state.registry.resolve_for_download(kept_version).await,
            DownloadResolution::Bytes { .. }
        ));
    }

    // Semilla reservada y puntero base: inmunes.
    assert!(state
        .versions()
        .get_model_version("1.0.0")
        .await
        .expect("lookup")
        .is_some());
    assert!(state
        .vault
        .get_model_bytes("model_latest.mlmodel", BASE_MODEL_FOLDER)
        .await
        .is_ok());

    // 5 no-base + semilla = 6 filas.
    assert_eq!(state.versions().count_versions().await.expect("count"), 6);

    // Un segundo barrido es idempotente: nada más que podar.
    assert_eq!(retention::run_retention_sweep(&state).await.expect("sweep"), 0);
}

#[tokio::test]
async fn certify_row_without_blob_is_healed_not_fatal() {
    let (state, _scratch) = laboratory_state().await;

    // 6 versiones; a la más antigua se le amputa el blob manualmente
    // (simulación de un publish parcial de un ciclo anterior).
    let mut planted_versions = Vec::new();
    for ordinal in 0..6 {
        planted_versions.push(plant_version(&state, ordinal).await);
    }

    let namespace = state.vault.namespace();
    let amputated_name = namespace.versioned_model_name(&planted_versions[0], "mlmodel");
    state
        .vault
        .delete_model(&amputated_name, &namespace.trained_folder())
        .await
        .expect("amputate blob");

    // El barrido debe sanar la fila huérfana sin colapsar.
    let purged_count = retention::run_retention_sweep(&state).await.expect("sweep");
    assert_eq!(purged_count, 1);
    assert!(state
        .versions()
        .get_model_version(&planted_versions[0])
        .await
        .expect("lookup")
        .is_none());
}
