// [tests/mirror/apps/aggregation_server/trigger_policy.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DE POLÍTICA DE DISPARO (V4.0)
 * CLASIFICACIÓN: EVIDENCIA DE ORQUESTACIÓN (ESTRATO L2-MIRROR)
 * RESPONSABILIDAD: AUDITORÍA DE UMBRALES Y COALESCENCIA DE DISPAROS
 *
 * Frontera certificada: con 2 subidas pendientes y umbral 3 la política
 * retiene; la tercera subida enciende exactamente UN disparo, y los
 * disparos excedentes coalescen en el canal de capacidad 1.
 * =================================================================
 */

use chrono::Utc;
use synapse_aggregation_server::prelude::*;
use synapse_aggregation_server::services::{orchestrator, trigger};
use synapse_domain_models::{BlobRef, IncorporationStatus, UploadedModel};
use tokio::sync::mpsc::error::TryRecvError;

async fn laboratory_state() -> (
    AppState,
    tokio::sync::mpsc::Receiver<TrainingTrigger>,
    tempfile::TempDir,
) {
    let scratch = tempfile::tempdir().expect("scratch");
    let kernel = AggregationKernel::ignite(ServerConfig::for_local_testing(scratch.path()))
        .await
        .expect("kernel ignition");
    let (application_state, trigger_receiver) = kernel.into_laboratory_parts();
    (application_state, trigger_receiver, scratch)
}

async fn plant_pending_upload(state: &AppState, tag: &str) {
    state
        .uploads()
        .insert_uploaded_model(&UploadedModel {
            id: format!("upload-{}", tag),
            device_id: tag.to_string(),
            app_version: "2.1.0".into(),
            description: "pending artifact".into(),
            blob_ref: BlobRef::File(format!(
                "synapse_models/uploaded/model_{}.mlmodel",
                tag
            )),
            file_size: 128,
            original_filename: "classifier.mlmodel".into(),
            sha256: format!("fingerprint-{}", tag),
            upload_date: Utc::now().to_rfc3339(),
            status: IncorporationStatus::Pending,
            incorporated_in_version: None,
        })
        .await
        .expect("upload row");
}

#[tokio::test]
async fn certify_pending_threshold_boundary() {
    let (state, _receiver, _scratch) = laboratory_state().await;

    // 0 pendientes: retención absoluta.
    let verdict = trigger::evaluate_trigger_policy(&state).await.expect("policy");
    assert!(!verdict.fire, "no uploads must never fire");

    // 2 pendientes con umbral 3: retención.
    plant_pending_upload(&state, "p1").await;
    plant_pending_upload(&state, "p2").await;
    let verdict = trigger::evaluate_trigger_policy(&state).await.expect("policy");
    assert!(!verdict.fire, "2 pending below threshold must hold: {}", verdict.reason);

    // Tercera subida: el predicado enciende.
    plant_pending_upload(&state, "p3").await;
    let verdict = trigger::evaluate_trigger_policy(&state).await.expect("policy");
    assert!(verdict.fire, "3 pending must ignite the policy");
    assert!(verdict.reason.contains("3 pending"));
}

#[tokio::test]
async fn certify_dispatch_coalesces_into_single_queued_trigger() {
    let (state, mut trigger_receiver, _scratch) = laboratory_state().await;

    plant_pending_upload(&state, "q1").await;
    plant_pending_upload(&state, "q2").await;
    plant_pending_upload(&state, "q3").await;

    // Ráfaga de despachos concurrentes con el canal de capacidad 1.
    orchestrator::evaluate_and_dispatch(&state, "upload").await;
    orchestrator::evaluate_and_dispatch(&state, "upload").await;
    orchestrator::evaluate_and_dispatch(&state, "scheduler_daily").await;

    // Exactamente UN disparo encolado; el exceso coalesció.
    let queued_trigger = trigger_receiver.try_recv().expect("one queued trigger");
    assert_eq!(queued_trigger.origin, "upload");
    assert!(matches!(trigger_receiver.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn certify_fresh_interactions_rule_requires_pending_uploads() {
    let (state, _receiver, _scratch) = laboratory_state().await;

    // 150 interacciones nuevas sin subidas pendientes: retención.
    let corpus: Vec<synapse_domain_models::DeviceInteraction> = (0..150)
        .map(|index| synapse_domain_models::DeviceInteraction {
            id: format!("fresh-{}", index),
            device_id: "device-f".into(),
            timestamp: Utc::now().to_rfc3339(),
            user_message: format!("message {}", index),
            ai_response: "ok".into(),
            detected_intent: "greet".into(),
            confidence_score: 0.7,
            app_version: None,
            model_version: None,
            os_version: None,
            feedback: None,
        })
        .collect();
    state.interactions().upsert_interactions(&corpus).await.expect("corpus");

    let verdict = trigger::evaluate_trigger_policy(&state).await.expect("policy");
    assert!(!verdict.fire, "interactions alone must never fire without pending uploads");

    // Con una subida pendiente, la regla de interacciones enciende.
    plant_pending_upload(&state, "solo").await;
    let verdict = trigger::evaluate_trigger_policy(&state).await.expect("policy");
    assert!(verdict.fire, "pending upload + fresh interactions must ignite");
    assert!(verdict.reason.contains("new interactions"), "reason: {}", verdict.reason);
}
