// [tests/mirror/apps/aggregation_server/training_cycle.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DEL CICLO DE ENTRENAMIENTO (V5.0)
 * CLASIFICACIÓN: EVIDENCIA EXTREMO-A-EXTREMO (ESTRATO L1-MIRROR)
 * RESPONSABILIDAD: AUDITORÍA DEL PIPELINE COMPLETO DE AGREGACIÓN
 *
 * Escenarios certificados:
 *   1. 60 interacciones + 3 subidas -> un ciclo publica una versión
 *      '1.0.<ts>' ensamblada; las tres subidas quedan 'incorporated'
 *      y la composición del ensamble registra 3 componentes.
 *   2. Dataset insuficiente -> cero publicaciones, subidas intactas.
 * =================================================================
 */

use chrono::Utc;
use synapse_aggregation_server::prelude::*;
use synapse_aggregation_server::services::pipeline;
use synapse_core_trainer::ModelArtifact;
use synapse_domain_models::{
    DeviceInteraction, IncorporationStatus, InteractionFeedback, TrainingSummary, UploadedModel,
};
use synapse_infra_blobstore::paths::BASE_MODEL_FOLDER;

async fn laboratory_state() -> (AppState, tempfile::TempDir) {
    let scratch = tempfile::tempdir().expect("scratch");
    let kernel = AggregationKernel::ignite(ServerConfig::for_local_testing(scratch.path()))
        .await
        .expect("kernel ignition");
    let (application_state, _trigger_receiver) = kernel.into_laboratory_parts();
    (application_state, scratch)
}

fn seeded_interaction(index: usize) -> DeviceInteraction {
    let (intent, phrase) = match index % 3 {
        0 => ("home_control", "turn on the kitchen lights"),
        1 => ("music", "play some jazz music"),
        _ => ("weather", "what is the forecast for tomorrow"),
    };

    DeviceInteraction {
        id: format!("seed-{}", index),
        device_id: format!("device-{}", index % 5),
        timestamp: "2026-07-30T10:00:00Z".into(),
        user_message: format!("{} variant {}", phrase, index),
        ai_response: "done".into(),
        detected_intent: intent.into(),
        confidence_score: 0.8,
        app_version: Some("2.1.0".into()),
        model_version: Some("1.0.0".into()),
        os_version: Some("17.4".into()),
        feedback: if index % 4 == 0 {
            Some(InteractionFeedback { rating: 5, comment: None })
        } else {
            None
        },
    }
}

async fn plant_upload(state: &AppState, tag: &str) -> String {
    let namespace = state.vault.namespace();
    let object_name = format!("model_{}_{}.mlmodel", tag, Utc::now().timestamp());
    let uploaded_folder = namespace.uploaded_folder();

    state
        .vault
        .put_model(
            format!("opaque-device-artifact-{}", tag).into_bytes(),
            &object_name,
            &uploaded_folder,
        )
        .await
        .expect("vault admit");

    let uploaded_model = UploadedModel {
        id: format!("upload-{}", tag),
        device_id: tag.to_string(),
        app_version: "2.1.0".into(),
        description: "device artifact".into(),
        blob_ref: state.vault.blob_ref_for(&object_name, &uploaded_folder),
        file_size: 64,
        original_filename: "classifier.mlmodel".into(),
        sha256: format!("fingerprint-{}", tag),
        upload_date: Utc::now().to_rfc3339(),
        status: IncorporationStatus::Pending,
        incorporated_in_version: None,
    };

    state
        .uploads()
        .insert_uploaded_model(&uploaded_model)
        .await
        .expect("upload row");
    uploaded_model.id
}

#[tokio::test]
async fn certify_full_cycle_publishes_an_ensemble() {
    let (state, _scratch) = laboratory_state().await;

    // 1. PROVISIÓN: 60 interacciones en 3 intenciones + 3 subidas.
    let corpus: Vec<DeviceInteraction> = (0..60).map(seeded_interaction).collect();
    state.interactions().upsert_interactions(&corpus).await.expect("corpus");

    let upload_identifiers = vec![
        plant_upload(&state, "d1").await,
        plant_upload(&state, "d2").await,
        plant_upload(&state, "d3").await,
    ];

    // 2. CICLO COMPLETO.
    let published = pipeline::execute_training_cycle(&state)
        .await
        .expect("cycle")
        .expect("a version must be published");
    assert!(published.starts_with("1.0."), "version was {}", published);

    // 3. SUBIDAS SELLADAS COMO INCORPORADAS EN LA NUEVA VERSIÓN.
    for upload_id in &upload_identifiers {
        let sealed = state
            .uploads()
            .get_uploaded_model(upload_id)
            .await
            .expect("get")
            .expect("row");
        assert_eq!(sealed.status, IncorporationStatus::Incorporated);
        assert_eq!(sealed.incorporated_in_version.as_deref(), Some(published.as_str()));
    }

    // 4. COMPOSICIÓN DEL ENSAMBLE: 3 componentes con peso de usuario.
    let ensemble = state
        .versions()
        .get_ensemble_record(&published)
        .await
        .expect("ensemble lookup")
        .expect("ensemble row");
    assert_eq!(ensemble.components.len(), 3);
    for component in &ensemble.components {
        assert_eq!(component.weight, 1.0);
    }

    // 5. TODA VERSIÓN VISIBLE RESUELVE PARA DESCARGA (bytes en modo local).
    match state.registry.resolve_for_download(&published).await {
        DownloadResolution::Bytes { buffer } => {
            let artifact = ModelArtifact::decode(&buffer).expect("artifact decode");
            assert_eq!(artifact.metadata.version, published);
            // Base + 3 miembros fusionados.
            assert_eq!(artifact.ensemble.expect("ensemble").member_count(), 4);
        }
        _ => panic!("published version must resolve to bytes in local mode"),
    }

    // 6. EL PUNTERO BASE SIGUE AL PUBLISH: '1.0.0' resuelve a la última.
    match state.registry.resolve_for_download("1.0.0").await {
        DownloadResolution::Bytes { buffer } => {
            let base_artifact = ModelArtifact::decode(&buffer).expect("base decode");
            assert_eq!(base_artifact.metadata.version, published);
        }
        _ => panic!("reserved base version must resolve through the pointer"),
    }

    assert_eq!(state.registry.latest_version().await, published);

    // 7. ACTA DE ENTRENAMIENTO: JSON programático + roundtrip íntegro.
    let summary_bytes = state
        .vault
        .get_model_bytes("latest_model_info.json", BASE_MODEL_FOLDER)
        .await
        .expect("summary bytes");
    let summary: TrainingSummary =
        serde_json::from_slice(&summary_bytes).expect("summary decode");
    assert_eq!(summary.version, published);
    assert_eq!(summary.incorporated_models.len(), 3);
    assert_eq!(summary.training_data.total, 60);
    assert!(summary.training_data.feedback_samples > 0);

    let markdown_bytes = state
        .vault
        .get_model_bytes(&format!("model_{}_update.md", published), "model_info")
        .await
        .expect("markdown bytes");
    assert!(String::from_utf8(markdown_bytes)
        .expect("utf8")
        .contains(&published));
}

#[tokio::test]
async fn certify_insufficient_dataset_leaves_uploads_pending() {
    let (state, _scratch) = laboratory_state().await;

    // Solo 10 interacciones: por debajo del umbral mínimo (50).
    let thin_corpus: Vec<DeviceInteraction> = (0..10).map(seeded_interaction).collect();
    state.interactions().upsert_interactions(&thin_corpus).await.expect("corpus");

    plant_upload(&state, "d1").await;
    plant_upload(&state, "d2").await;
    plant_upload(&state, "d3").await;

    let outcome = pipeline::execute_training_cycle(&state).await.expect("cycle");
    assert!(outcome.is_none(), "no version may be published below the threshold");

    // Las subidas permanecen intactas en 'pending'.
    assert_eq!(state.uploads().count_pending().await.expect("count"), 3);
    assert_eq!(state.registry.latest_version().await, "1.0.0");
}
