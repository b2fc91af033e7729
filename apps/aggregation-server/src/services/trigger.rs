// [apps/aggregation-server/src/services/trigger.rs]
/*!
 * =================================================================
 * APARATO: RETRAINING TRIGGER POLICY (V5.0)
 * CLASIFICACIÓN: DOMAIN SERVICE (ESTRATO L2-APP)
 * RESPONSABILIDAD: EVALUACIÓN DEL PREDICADO DE DISPARO DE CICLOS
 *
 * Política: un ciclo arranca cuando CUALQUIERA de estos predicados
 * enciende Y existe al menos una subida pendiente:
 *   1. pendientes >= umbral de subidas.
 *   2. horas desde el último entrenamiento >= umbral horario.
 *   3. interacciones nuevas desde el último entrenamiento >= umbral.
 * =================================================================
 */

use crate::state::AppState;
use chrono::{DateTime, Utc};
use synapse_infra_db::StoreError;
use tracing::{debug, instrument};

/// Veredicto de la política de disparo.
#[derive(Debug, Clone)]
pub struct TriggerVerdict {
    pub fire: bool,
    pub reason: String,
}

impl TriggerVerdict {
    fn hold(reason: impl Into<String>) -> Self {
        Self { fire: false, reason: reason.into() }
    }

    fn ignite(reason: impl Into<String>) -> Self {
        Self { fire: true, reason: reason.into() }
    }
}

/// Evalúa la política completa contra el estado vigente del ledger.
#[instrument(skip(application_state))]
pub async fn evaluate_trigger_policy(
    application_state: &AppState,
) -> Result<TriggerVerdict, StoreError> {
    let pending_uploads = application_state.uploads().count_pending().await?;

    // Sin subidas pendientes no hay ciclo, sin importar el resto.
    if pending_uploads == 0 {
        return Ok(TriggerVerdict::hold("no pending uploads"));
    }

    let pending_threshold = application_state.config.retrain_pending_models;
    if pending_uploads >= pending_threshold {
        return Ok(TriggerVerdict::ignite(format!(
            "{} pending uploads (threshold {})",
            pending_uploads, pending_threshold
        )));
    }

    let Some(last_training_stamp) = application_state.versions().last_training_date().await?
    else {
        debug!("🧭 [TRIGGER]: No training history yet; holding.");
        return Ok(TriggerVerdict::hold("no training history"));
    };

    if let Ok(last_training) = DateTime::parse_from_rfc3339(&last_training_stamp) {
        let elapsed_hours =
            (Utc::now() - last_training.with_timezone(&Utc)).num_hours();
        if elapsed_hours >= application_state.config.retrain_hours_since {
            return Ok(TriggerVerdict::ignite(format!(
                "{} pending uploads and {}h since last training",
                pending_uploads, elapsed_hours
            )));
        }
    }

    let fresh_interactions = application_state
        .interactions()
        .count_interactions_since(&last_training_stamp)
        .await?;
    if fresh_interactions >= application_state.config.retrain_new_interactions {
        return Ok(TriggerVerdict::ignite(format!(
            "{} pending uploads and {} new interactions",
            pending_uploads, fresh_interactions
        )));
    }

    Ok(TriggerVerdict::hold(format!(
        "{} pending uploads below every threshold",
        pending_uploads
    )))
}
