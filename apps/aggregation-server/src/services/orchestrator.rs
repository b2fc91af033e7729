// [apps/aggregation-server/src/services/orchestrator.rs]
/*!
 * =================================================================
 * APARATO: TRAINING ORCHESTRATOR WORKER (V7.0)
 * CLASIFICACIÓN: BACKGROUND SERVICE (ESTRATO L4)
 * RESPONSABILIDAD: CONSUMO SERIALIZADO DE DISPAROS DE ENTRENAMIENTO
 *
 * VISION:
 * 1. SINGLE INSTANCE: Un único worker consume el canal de disparo; la
 *    bandera de ciclo-en-progreso hace observable el invariante.
 * 2. COALESCING: Canal de capacidad 1; disparos durante un ciclo en
 *    curso colapsan en a lo sumo uno encolado (try_send descarta el
 *    exceso sin bloquear).
 * 3. LIVENESS SHIELD: Todo error no-publicación se registra y se traga;
 *    el siguiente disparo reintenta.
 * =================================================================
 */

use crate::services::{pipeline, trigger};
use crate::state::{AppState, TrainingTrigger};
use std::sync::atomic::Ordering;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};

/// Lanza el worker del orquestador sobre el reactor de Tokio.
pub fn spawn_orchestrator_worker(
    application_state: AppState,
    mut trigger_receiver: mpsc::Receiver<TrainingTrigger>,
) {
    tokio::spawn(async move {
        info!("🏭 [ORCHESTRATOR]: Training worker online. Awaiting triggers.");

        while let Some(training_trigger) = trigger_receiver.recv().await {
            if application_state.shutdown_requested() {
                info!("🛑 [ORCHESTRATOR]: Shutdown observed; worker standing down.");
                break;
            }

            info!(
                "🔥 [ORCHESTRATOR]: Cycle ignited by '{}' ({}).",
                training_trigger.origin, training_trigger.reason
            );

            application_state.cycle_in_progress.store(true, Ordering::SeqCst);
            let cycle_outcome = pipeline::execute_training_cycle(&application_state).await;
            application_state.cycle_in_progress.store(false, Ordering::SeqCst);

            match cycle_outcome {
                Ok(Some(published_version)) => {
                    info!("🏁 [ORCHESTRATOR]: Cycle published version '{}'.", published_version);
                }
                Ok(None) => {
                    info!("🧊 [ORCHESTRATOR]: Cycle concluded without a publish.");
                }
                Err(cycle_fault) => {
                    // Protección de liveness: registrar y esperar el siguiente disparo.
                    error!("💥 [ORCHESTRATOR]: Cycle collapsed: {:#}", cycle_fault);
                }
            }
        }
    });
}

/// Evalúa la política y despacha un disparo coalescente si enciende.
/// Se invoca desde el scheduler y tras cada subida exitosa.
#[instrument(skip(application_state))]
pub async fn evaluate_and_dispatch(application_state: &AppState, origin: &str) {
    let verdict = match trigger::evaluate_trigger_policy(application_state).await {
        Ok(verdict) => verdict,
        Err(policy_fault) => {
            warn!("⚠️ [TRIGGER]: Policy evaluation degraded: {}", policy_fault);
            return;
        }
    };

    if !verdict.fire {
        debug!("🧭 [TRIGGER]: Holding ({}).", verdict.reason);
        return;
    }

    let dispatch_outcome = application_state.training_trigger.try_send(TrainingTrigger {
        origin: origin.to_string(),
        reason: verdict.reason.clone(),
    });

    match dispatch_outcome {
        Ok(()) => info!("📨 [TRIGGER]: Cycle dispatched ({}).", verdict.reason),
        Err(mpsc::error::TrySendError::Full(_)) => {
            // Ya hay un disparo encolado: el exceso coalesce por diseño.
            debug!("🧊 [TRIGGER]: Dispatch coalesced; a cycle is already queued.");
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            warn!("🛑 [TRIGGER]: Worker channel closed; dispatch dropped.");
        }
    }
}
