// [apps/aggregation-server/src/services/pipeline.rs]
/*!
 * =================================================================
 * APARATO: TRAINING CYCLE PIPELINE (V9.3)
 * CLASIFICACIÓN: DOMAIN SERVICE (ESTRATO L2-APP)
 * RESPONSABILIDAD: CICLO COMPLETO RECOLECTAR -> ENTRENAR -> FUSIONAR ->
 *                  PUBLICAR -> RETENER
 *
 * Máquina de estados del ciclo:
 *   Idle -> Collecting -> Training -> Fusing -> Publishing -> Retaining -> Idle
 * con sumidero Failed que revierte las subidas 'processing' a 'pending'
 * cuando el colapso precede a la publicación.
 *
 * Orden de publicación: blobs primero, filas después. Una fila sin blob
 * es imposible por construcción; un blob sin fila lo sobrescribe el
 * siguiente ciclo (auto-sanación).
 * =================================================================
 */

use crate::services::retention;
use crate::state::AppState;
use anyhow::Context;
use chrono::Utc;
use std::collections::BTreeMap;
use std::time::Duration;
use synapse_core_trainer::{
    build_training_dataset, IntentClassifier, ModelArtifact, TrainerError, TrainingRecord,
    TrainingReport, WeightedMember,
};
use synapse_domain_models::{
    BlobRef, EnsembleComponent, EnsembleRecord, IncorporatedModelInfo, IncorporationStatus,
    ModelComparison, ModelFlavor, ModelPerformance, ModelVersionRecord, TrainingDataProfile,
    TrainingSummary, UploadedModel,
};
use synapse_infra_blobstore::paths::{BASE_MODEL_FOLDER, MODEL_INFO_FOLDER};
use synapse_infra_blobstore::user_data;
use tracing::{error, info, instrument, warn};

/// Resultado de los pasos de fusión y exportación, listo para publicar.
struct PreparedPublish {
    version: String,
    training_date: String,
    artifact_bytes: Vec<u8>,
    export_marker: Option<String>,
    /// Subidas cuya fusión prosperó, con su huella para el acta.
    incorporated: Vec<(UploadedModel, IncorporatedModelInfo)>,
    /// Subidas que no pudieron materializarse (o fusión globalmente vacía).
    failed_upload_ids: Vec<String>,
    is_ensemble: bool,
    accuracy: f64,
    training_data_size: u64,
}

/// Ejecuta un ciclo completo. Devuelve la versión publicada, o `None`
/// cuando el ciclo concluyó sin publicar (datos insuficientes, apagado).
///
/// # Errors:
/// Colapsos pre-publicación revierten las subidas a 'pending' y afloran;
/// colapsos durante la publicación dejan el estado parcial documentado.
#[instrument(skip(application_state))]
pub async fn execute_training_cycle(
    application_state: &AppState,
) -> anyhow::Result<Option<String>> {
    // ========== FASE: COLLECTING ==========
    info!("📥 [CYCLE]: Collecting training inputs...");

    let ledger_corpus = application_state
        .interactions()
        .load_training_corpus()
        .await
        .context("ledger corpus snapshot")?;

    let mirrored_corpus = match user_data::load_user_interactions(&application_state.vault).await
    {
        Ok(mirrored_rows) => mirrored_rows,
        Err(mirror_fault) => {
            warn!("⚠️ [CYCLE]: Mirrored corpus unavailable: {}", mirror_fault);
            Vec::new()
        }
    };

    let training_dataset = build_training_dataset(&[ledger_corpus, mirrored_corpus]);
    let minimum_required = application_state.config.min_training_data;

    if training_dataset.len() < minimum_required {
        info!(
            "🧊 [CYCLE]: Dataset too small ({} < {}). Pending uploads left untouched.",
            training_dataset.len(),
            minimum_required
        );
        return Ok(None);
    }

    if application_state.shutdown_requested() {
        return Ok(None);
    }

    let dataset_profile = profile_dataset(&training_dataset);

    // ========== FASE: TRAINING ==========
    info!("🧠 [CYCLE]: Training base classifier on {} samples...", training_dataset.len());

    let training_settings = application_state.config.training_settings();
    let training_outcome = tokio::task::spawn_blocking(move || {
        IntentClassifier::train(&training_dataset, &training_settings)
    })
    .await
    .context("training task join")?;

    let (mut classifier, training_report) = match training_outcome {
        Ok(trained_pair) => trained_pair,
        Err(TrainerError::InsufficientData { have, need }) => {
            info!("🧊 [CYCLE]: Trainer refused dataset ({} < {}).", have, need);
            return Ok(None);
        }
        Err(TrainerError::DegenerateCorpus(detail)) => {
            warn!("🧊 [CYCLE]: Degenerate corpus, no publish: {}", detail);
            return Ok(None);
        }
        Err(training_fault) => return Err(training_fault.into()),
    };

    if application_state.shutdown_requested() {
        return Ok(None);
    }

    // ========== FASE: FUSING (pasos 5-8) ==========
    let pending_uploads = application_state
        .uploads()
        .list_pending_uploaded()
        .await
        .context("pending upload snapshot")?;

    for pending_upload in &pending_uploads {
        application_state
            .uploads()
            .set_uploaded_status(&pending_upload.id, IncorporationStatus::Processing, None)
            .await
            .context("mark upload processing")?;
    }

    let prepared_publish = match fuse_and_export(
        application_state,
        &mut classifier,
        &pending_uploads,
        &training_report,
    )
    .await
    {
        Ok(prepared) => prepared,
        Err(fusion_fault) => {
            rollback_processing(application_state, &pending_uploads).await;
            return Err(fusion_fault);
        }
    };

    if application_state.shutdown_requested() {
        rollback_processing(application_state, &pending_uploads).await;
        return Ok(None);
    }

    // ========== FASE: PUBLISHING (paso 9, no cancelable) ==========
    info!("📤 [CYCLE]: Publishing version '{}'...", prepared_publish.version);
    publish_version(application_state, &prepared_publish)
        .await
        .context("publish phase")?;

    // ========== PASO 10: ACTA DE ENTRENAMIENTO (best-effort) ==========
    if let Err(summary_fault) =
        emit_training_summary(application_state, &prepared_publish, &dataset_profile).await
    {
        error!("❌ [CYCLE]: Training summary emission degraded: {:#}", summary_fault);
    }

    // ========== FASE: RETAINING (paso 11, best-effort) ==========
    match retention::run_retention_sweep(application_state).await {
        Ok(purged_count) if purged_count > 0 => {
            info!("🗑️  [CYCLE]: Retention purged {} expired versions.", purged_count);
        }
        Ok(_) => {}
        Err(retention_fault) => {
            error!("❌ [CYCLE]: Retention sweep degraded: {:#}", retention_fault);
        }
    }

    Ok(Some(prepared_publish.version))
}

/// Pasos 6-8: fusión de miembros, asignación de versión y exportación.
async fn fuse_and_export(
    application_state: &AppState,
    classifier: &mut IntentClassifier,
    pending_uploads: &[UploadedModel],
    training_report: &TrainingReport,
) -> anyhow::Result<PreparedPublish> {
    let user_weight = application_state.config.user_model_weight;
    let base_weight = application_state.config.base_model_weight;

    let artifact_download_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(60))
        .user_agent("Synapse-Cycle-Hydrator/V9")
        .build()
        .context("hydrator client ignition")?;

    let mut weighted_members: Vec<WeightedMember> = Vec::new();
    let mut incorporated: Vec<(UploadedModel, IncorporatedModelInfo)> = Vec::new();
    let mut failed_upload_ids: Vec<String> = Vec::new();

    for (member_index, pending_upload) in pending_uploads.iter().enumerate() {
        let Some(artifact_bytes) = materialize_uploaded_artifact(
            application_state,
            &artifact_download_client,
            pending_upload,
        )
        .await
        else {
            warn!(
                "❌ [FUSION]: Artifact '{}' could not be materialized; marking failed.",
                pending_upload.id
            );
            failed_upload_ids.push(pending_upload.id.clone());
            continue;
        };

        let mut member_accuracy = None;
        let member_forest = match ModelArtifact::decode(&artifact_bytes) {
            Ok(decoded_artifact) => match classifier.compatible_member(&decoded_artifact) {
                Some(compatible_forest) => {
                    member_accuracy = Some(decoded_artifact.metadata.accuracy);
                    compatible_forest
                }
                None => {
                    // Dimensiones ajenas: placeholder sintético que preserva la
                    // forma del ensamble; el pesado domina el voto.
                    warn!(
                        "⚠️ [FUSION]: Artifact '{}' dimensionally alien; substituting placeholder.",
                        pending_upload.id
                    );
                    classifier.synthetic_member(member_index as u64 + 1)
                }
            },
            Err(decode_fault) => {
                warn!(
                    "⚠️ [FUSION]: Artifact '{}' undecodable ({}); substituting placeholder.",
                    pending_upload.id, decode_fault
                );
                classifier.synthetic_member(member_index as u64 + 1)
            }
        };

        weighted_members.push(WeightedMember { forest: member_forest, weight: user_weight });
        incorporated.push((
            pending_upload.clone(),
            IncorporatedModelInfo {
                device_id: pending_upload.device_id.clone(),
                weight: user_weight as f64,
                size: pending_upload.file_size,
                accuracy: member_accuracy,
            },
        ));
    }

    let is_ensemble = !weighted_members.is_empty();
    if is_ensemble {
        info!(
            "🧬 [FUSION]: Soft-voting ensemble assembled (base weight {}, {} members at {}).",
            base_weight,
            weighted_members.len(),
            user_weight
        );
        classifier.fuse(weighted_members, base_weight);
    } else if !pending_uploads.is_empty() {
        // Cero miembros: se publica el base y las subidas involucradas fallan.
        warn!("⚠️ [FUSION]: Zero members joined; publishing base classifier alone.");
        failed_upload_ids = pending_uploads.iter().map(|upload| upload.id.clone()).collect();
        incorporated.clear();
    }

    // Paso 7: asignación de versión (monotónica por reloj de pared).
    let version = format!(
        "{}{}",
        application_state.config.model_version_prefix,
        Utc::now().timestamp()
    );
    let training_date = Utc::now().to_rfc3339();

    // Paso 8: exportación del artefacto, con fallback a los bytes del base.
    let (artifact_bytes, export_marker) =
        match classifier.export_artifact(&version, &training_date) {
            Ok(exported_bytes) => (exported_bytes, None),
            Err(export_fault) => {
                warn!(
                    "⚠️ [EXPORT]: Serialization collapsed ({}); republishing current base bytes.",
                    export_fault
                );
                match fetch_current_base_bytes(application_state).await {
                    Some(base_bytes) => {
                        (base_bytes, Some(format!("export_failed: {}", export_fault)))
                    }
                    None => anyhow::bail!(
                        "artifact export collapsed and no base fallback is available: {}",
                        export_fault
                    ),
                }
            }
        };

    Ok(PreparedPublish {
        version,
        training_date,
        artifact_bytes,
        export_marker,
        incorporated,
        failed_upload_ids,
        is_ensemble,
        accuracy: training_report.accuracy,
        training_data_size: training_report.training_data_size,
    })
}

/// Materializa los bytes de un artefacto subido: URL directa preferida,
/// bytes de la bóveda como fallback.
async fn materialize_uploaded_artifact(
    application_state: &AppState,
    download_client: &reqwest::Client,
    pending_upload: &UploadedModel,
) -> Option<Vec<u8>> {
    let (virtual_folder, object_name) = match &pending_upload.blob_ref {
        BlobRef::Blob(vault_path) | BlobRef::File(vault_path) => {
            let trimmed = vault_path.trim_start_matches('/');
            match trimmed.rsplit_once('/') {
                Some((folder, name)) => (folder.to_string(), name.to_string()),
                None => (String::new(), trimmed.to_string()),
            }
        }
        BlobRef::Stream(direct_url) => {
            let streamed = download_client.get(direct_url).send().await.ok()?;
            return streamed.bytes().await.ok().map(|payload| payload.to_vec());
        }
        BlobRef::Mem(_) => return None,
    };

    if let Ok(Some(stream_handle)) = application_state
        .vault
        .get_model_stream(&object_name, &virtual_folder)
        .await
    {
        if let Ok(streamed) = download_client.get(&stream_handle.direct_url).send().await {
            if streamed.status().is_success() {
                if let Ok(payload) = streamed.bytes().await {
                    return Some(payload.to_vec());
                }
            }
        }
    }

    application_state
        .vault
        .get_model_bytes(&object_name, &virtual_folder)
        .await
        .ok()
}

/// Paso 9: blobs primero (trained + punteros base), filas después,
/// transiciones de subida al final, caché invalidado al cierre.
async fn publish_version(
    application_state: &AppState,
    prepared: &PreparedPublish,
) -> anyhow::Result<()> {
    let artifact_extension = application_state.config.artifact_extension();
    let namespace = application_state.vault.namespace();

    let trained_name = namespace.versioned_model_name(&prepared.version, &artifact_extension);
    let trained_folder = namespace.trained_folder();
    let latest_name = namespace.latest_model_name(&artifact_extension);

    application_state
        .vault
        .put_model(prepared.artifact_bytes.clone(), &trained_name, &trained_folder)
        .await
        .context("trained blob write")?;

    application_state
        .vault
        .put_model(prepared.artifact_bytes.clone(), &latest_name, BASE_MODEL_FOLDER)
        .await
        .context("base latest pointer write")?;

    application_state
        .vault
        .put_model(prepared.artifact_bytes.clone(), &trained_name, BASE_MODEL_FOLDER)
        .await
        .context("base versioned snapshot write")?;

    let version_record = ModelVersionRecord {
        version: prepared.version.clone(),
        blob_ref: application_state.vault.blob_ref_for(&trained_name, &trained_folder),
        accuracy: prepared.accuracy,
        training_data_size: prepared.training_data_size,
        training_date: prepared.training_date.clone(),
        created_at: None,
        export_marker: prepared.export_marker.clone(),
    };
    application_state
        .versions()
        .insert_model_version(&version_record)
        .await
        .context("version row insert")?;

    if prepared.is_ensemble {
        let ensemble_record = EnsembleRecord {
            version: prepared.version.clone(),
            description: format!(
                "Ensemble of base classifier (weight {}) with {} uploaded models",
                application_state.config.base_model_weight,
                prepared.incorporated.len()
            ),
            components: prepared
                .incorporated
                .iter()
                .map(|(upload, member_info)| EnsembleComponent {
                    uploaded_model_id: upload.id.clone(),
                    device_id: upload.device_id.clone(),
                    weight: member_info.weight,
                })
                .collect(),
        };
        application_state
            .versions()
            .insert_ensemble_record(&ensemble_record)
            .await
            .context("ensemble row insert")?;
    }

    for (incorporated_upload, _) in &prepared.incorporated {
        application_state
            .uploads()
            .set_uploaded_status(
                &incorporated_upload.id,
                IncorporationStatus::Incorporated,
                Some(&prepared.version),
            )
            .await
            .context("upload incorporation seal")?;
    }

    for failed_upload_id in &prepared.failed_upload_ids {
        application_state
            .uploads()
            .set_uploaded_status(failed_upload_id, IncorporationStatus::Failed, None)
            .await
            .context("upload failure seal")?;
    }

    application_state.registry.invalidate_base_cache().await;
    Ok(())
}

/// Paso 10: acta JSON + reporte Markdown hacia la bóveda.
async fn emit_training_summary(
    application_state: &AppState,
    prepared: &PreparedPublish,
    dataset_profile: &TrainingDataProfile,
) -> anyhow::Result<()> {
    let comparison = application_state
        .versions()
        .previous_model_info(&prepared.version)
        .await
        .ok()
        .flatten()
        .map(|previous_record| {
            let accuracy_delta = prepared.accuracy - previous_record.accuracy;
            ModelComparison {
                previous_version: previous_record.version,
                accuracy_delta,
                improvement: accuracy_delta > 0.0,
            }
        });

    let mut changes: Vec<String> = Vec::new();
    if let Some(comparison_block) = &comparison {
        if comparison_block.accuracy_delta > 0.0 {
            changes.push(format!(
                "Increased accuracy to {:.4} (+{:.4} vs {})",
                prepared.accuracy,
                comparison_block.accuracy_delta,
                comparison_block.previous_version
            ));
        } else if comparison_block.accuracy_delta < 0.0 {
            changes.push(format!(
                "Decreased accuracy to {:.4} ({:.4} vs {})",
                prepared.accuracy,
                comparison_block.accuracy_delta,
                comparison_block.previous_version
            ));
        }
    }
    if !prepared.incorporated.is_empty() {
        changes.push(format!(
            "Incorporated {} user-submitted models",
            prepared.incorporated.len()
        ));
    }
    if changes.is_empty() {
        changes.push("Retrained model with latest data".to_string());
    }

    let summary = TrainingSummary {
        version: prepared.version.clone(),
        training_date: prepared.training_date.clone(),
        model_type: if prepared.is_ensemble {
            ModelFlavor::Ensemble
        } else {
            ModelFlavor::Standard
        },
        performance: ModelPerformance {
            accuracy: prepared.accuracy,
            training_data_size: prepared.training_data_size,
        },
        comparison,
        training_data: dataset_profile.clone(),
        incorporated_models: prepared
            .incorporated
            .iter()
            .map(|(_, member_info)| member_info.clone())
            .collect(),
        summary_text: TrainingSummary::compose_summary_text(&prepared.version, &changes),
        changes,
    };

    let summary_json = serde_json::to_vec_pretty(&summary).context("summary serialize")?;
    let summary_markdown = summary.render_markdown().into_bytes();

    let vault = &application_state.vault;
    vault
        .put_model(summary_json.clone(), "latest_model_info.json", BASE_MODEL_FOLDER)
        .await
        .context("latest summary write")?;
    vault
        .put_model(
            summary_json.clone(),
            &format!("model_info_{}.json", prepared.version),
            BASE_MODEL_FOLDER,
        )
        .await
        .context("versioned summary write")?;
    vault
        .put_model(
            summary_json,
            &format!("model_{}_update.json", prepared.version),
            MODEL_INFO_FOLDER,
        )
        .await
        .context("model_info json write")?;
    vault
        .put_model(
            summary_markdown,
            &format!("model_{}_update.md", prepared.version),
            MODEL_INFO_FOLDER,
        )
        .await
        .context("model_info markdown write")?;

    info!("📝 [CYCLE]: Training summary crystallized for '{}'.", prepared.version);
    Ok(())
}

/// Sumidero Failed pre-publicación: 'processing' regresa a 'pending'.
async fn rollback_processing(application_state: &AppState, pending_uploads: &[UploadedModel]) {
    for touched_upload in pending_uploads {
        if let Err(rollback_fault) = application_state
            .uploads()
            .set_uploaded_status(&touched_upload.id, IncorporationStatus::Pending, None)
            .await
        {
            warn!(
                "⚠️ [CYCLE]: Rollback degraded for upload '{}': {}",
                touched_upload.id, rollback_fault
            );
        }
    }
}

/// Bytes del puntero base vigente (fallback de exportación).
async fn fetch_current_base_bytes(application_state: &AppState) -> Option<Vec<u8>> {
    let latest_name = application_state
        .vault
        .namespace()
        .latest_model_name(&application_state.config.artifact_extension());
    application_state
        .vault
        .get_model_bytes(&latest_name, BASE_MODEL_FOLDER)
        .await
        .ok()
}

/// Perfil del dataset para el acta (distribución y señales de feedback).
fn profile_dataset(training_dataset: &[TrainingRecord]) -> TrainingDataProfile {
    let mut intent_distribution: BTreeMap<String, u64> = BTreeMap::new();
    let mut feedback_samples = 0u64;
    let mut positive_feedback = 0u64;

    for training_record in training_dataset {
        *intent_distribution
            .entry(training_record.intent.clone())
            .or_insert(0) += 1;
        if training_record.weight >= 2.0 {
            feedback_samples += 1;
        }
        if training_record.weight >= 3.0 {
            positive_feedback += 1;
        }
    }

    TrainingDataProfile {
        total: training_dataset.len() as u64,
        intent_distribution,
        feedback_samples,
        positive_feedback,
    }
}
