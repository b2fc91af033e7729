// [tests/mirror/libs/infra/db/upload_lifecycle.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DE CICLO DE VIDA DE SUBIDAS (V3.1)
 * CLASIFICACIÓN: EVIDENCIA DE PERSISTENCIA (ESTRATO L3-MIRROR)
 * RESPONSABILIDAD: AUDITORÍA DE LA MÁQUINA DE ESTADOS FORWARD-ONLY
 *
 * Invariantes certificados:
 *   1. pending -> processing -> {incorporated|failed}; retrocesos
 *      ilegales rechazados como violación de invariante.
 *   2. 'incorporated' exige y sella 'incorporated_in_version'.
 *   3. 'list_pending_uploaded' devuelve orden de llegada estable.
 * =================================================================
 */

use synapse_domain_models::{BlobRef, IncorporationStatus, UploadedModel};
use synapse_infra_db::{SqlClient, StoreError, UploadRepository, VersionRepository};

fn uploaded_model(id: &str, upload_date: &str) -> UploadedModel {
    UploadedModel {
        id: id.into(),
        device_id: format!("device-{}", id),
        app_version: "2.1.0".into(),
        description: "artefacto entrenado en dispositivo".into(),
        blob_ref: BlobRef::Blob(format!("synapse_models/uploaded/model_{}.mlmodel", id)),
        file_size: 4096,
        original_filename: "classifier.mlmodel".into(),
        sha256: format!("huella-{}", id),
        upload_date: upload_date.into(),
        status: IncorporationStatus::Pending,
        incorporated_in_version: None,
    }
}

async fn memory_client(label: &str) -> SqlClient {
    SqlClient::connect(&format!("file:{}?mode=memory&cache=shared", label))
        .await
        .expect("CRITICAL_FAULT: Failed to anchor in-memory ledger.")
}

#[tokio::test]
async fn certify_forward_only_lifecycle_with_version_binding() {
    let client = memory_client("mem_upload_lifecycle").await;
    let uploads = UploadRepository::new(client.clone());
    let versions = VersionRepository::new(client.clone());

    uploads
        .insert_uploaded_model(&uploaded_model("u1", "2026-07-30T09:00:00Z"))
        .await
        .expect("insert");

    // Salto ilegal: pending -> incorporated.
    assert!(matches!(
        uploads
            .set_uploaded_status("u1", IncorporationStatus::Incorporated, Some("1.0.99"))
            .await,
        Err(StoreError::Invariant(_))
    ));

    uploads
        .set_uploaded_status("u1", IncorporationStatus::Processing, None)
        .await
        .expect("processing");

    // 'incorporated' sin versión destino: invariante.
    assert!(matches!(
        uploads
            .set_uploaded_status("u1", IncorporationStatus::Incorporated, None)
            .await,
        Err(StoreError::Invariant(_))
    ));

    // La versión destino existe en el ledger antes del sellado.
    versions
        .seed_base_version(&BlobRef::Blob("base_model/model_latest.mlmodel".into()))
        .await
        .expect("seed");

    uploads
        .set_uploaded_status("u1", IncorporationStatus::Incorporated, Some("1.0.0"))
        .await
        .expect("incorporated");

    let sealed = uploads.get_uploaded_model("u1").await.expect("get").expect("row");
    assert_eq!(sealed.status, IncorporationStatus::Incorporated);
    assert_eq!(sealed.incorporated_in_version.as_deref(), Some("1.0.0"));

    // Estado terminal: cualquier transición posterior es ilegal.
    assert!(matches!(
        uploads
            .set_uploaded_status("u1", IncorporationStatus::Pending, None)
            .await,
        Err(StoreError::Invariant(_))
    ));
}

#[tokio::test]
async fn certify_processing_rollback_and_failure_sink() {
    let client = memory_client("mem_upload_rollback").await;
    let uploads = UploadRepository::new(client.clone());

    uploads
        .insert_uploaded_model(&uploaded_model("u2", "2026-07-30T09:05:00Z"))
        .await
        .expect("insert");

    uploads
        .set_uploaded_status("u2", IncorporationStatus::Processing, None)
        .await
        .expect("processing");

    // Rollback de ciclo colapsado pre-publicación: processing -> pending.
    uploads
        .set_uploaded_status("u2", IncorporationStatus::Pending, None)
        .await
        .expect("rollback");
    assert_eq!(uploads.count_pending().await.expect("count"), 1);

    // Segundo ciclo: processing -> failed (sin versión).
    uploads
        .set_uploaded_status("u2", IncorporationStatus::Processing, None)
        .await
        .expect("processing again");
    uploads
        .set_uploaded_status("u2", IncorporationStatus::Failed, None)
        .await
        .expect("failed");

    let failed = uploads.get_uploaded_model("u2").await.expect("get").expect("row");
    assert_eq!(failed.status, IncorporationStatus::Failed);
    assert_eq!(failed.incorporated_in_version, None);
    assert_eq!(uploads.count_pending().await.expect("count"), 0);
}

#[tokio::test]
async fn certify_pending_inventory_preserves_arrival_order() {
    let client = memory_client("mem_upload_order").await;
    let uploads = UploadRepository::new(client.clone());

    // Inserción deliberadamente fuera de orden de llegada.
    uploads
        .insert_uploaded_model(&uploaded_model("late", "2026-07-30T12:00:00Z"))
        .await
        .expect("insert late");
    uploads
        .insert_uploaded_model(&uploaded_model("early", "2026-07-30T08:00:00Z"))
        .await
        .expect("insert early");
    uploads
        .insert_uploaded_model(&uploaded_model("middle", "2026-07-30T10:00:00Z"))
        .await
        .expect("insert middle");

    let pending_inventory = uploads.list_pending_uploaded().await.expect("list");
    let arrival_order: Vec<&str> =
        pending_inventory.iter().map(|row| row.id.as_str()).collect();
    assert_eq!(arrival_order, vec!["early", "middle", "late"]);

    // El id es llave primaria: duplicarlo viola el invariante.
    assert!(matches!(
        uploads
            .insert_uploaded_model(&uploaded_model("early", "2026-07-30T13:00:00Z"))
            .await,
        Err(StoreError::Invariant(_))
    ));
}
