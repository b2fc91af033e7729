// [libs/domain/models/src/stats.rs]
// =================================================================
// APARATO: GLOBAL STATS DOMAIN MODEL (V2.0)
// RESPONSABILIDAD: AGREGADOS OPERATIVOS PARA EL ENDPOINT DE ESTADÍSTICAS
// =================================================================

use serde::{Deserialize, Serialize};
use typeshare::typeshare;

/// Frecuencia de una intención detectada en el corpus de interacciones.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IntentCount {
    pub intent: String,
    #[typeshare(serialized_as = "number")]
    pub count: u64,
}

/// Instantánea agregada del sistema tal como la expone el gateway.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalStats {
    #[typeshare(serialized_as = "number")]
    pub total_interactions: u64,
    #[typeshare(serialized_as = "number")]
    pub unique_devices: u64,
    pub average_feedback_rating: f64,
    /// Cinco intenciones más frecuentes, orden descendente.
    pub top_intents: Vec<IntentCount>,
    pub latest_model_version: String,
    #[serde(default)]
    pub last_training_date: Option<String>,
    #[typeshare(serialized_as = "number")]
    pub total_models: u64,
    #[typeshare(serialized_as = "number")]
    pub incorporated_user_models: u64,
}
