// [libs/domain/models/src/interaction.rs]
/*!
 * =================================================================
 * APARATO: INTERACTION DOMAIN MODELS (V4.0)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: CONTRATOS DE INGESTA DE INTERACCIONES Y FEEDBACK
 *
 * VISION:
 * 1. IDEMPOTENCY ANCHOR: 'id' es la llave de idempotencia del lote;
 *    una re-emisión del mismo lote es un upsert, nunca un duplicado.
 * 2. WIRE PARITY: Serialización camelCase bit-perfecta con los
 *    clientes móviles (Swift) vía typeshare.
 * =================================================================
 */

use serde::{Deserialize, Serialize};
use typeshare::typeshare;

/// Señal de feedback opcional adjunta a una interacción (0..1 por id).
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InteractionFeedback {
    /// Calificación del usuario en la escala cerrada 1..5.
    pub rating: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Unidad de ingesta tal como viaja en el lote del endpoint de aprendizaje.
/// Los metadatos de dispositivo llegan en el sobre, no en cada unidad.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionReport {
    pub id: String,
    pub timestamp: String,
    pub user_message: String,
    pub ai_response: String,
    pub detected_intent: String,
    pub confidence_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<InteractionFeedback>,
}

/// Sobre del lote de ingesta: metadatos de dispositivo + unidades.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnEnvelope {
    pub device_id: String,
    #[serde(default)]
    pub app_version: Option<String>,
    #[serde(default)]
    pub model_version: Option<String>,
    #[serde(default)]
    pub os_version: Option<String>,
    #[serde(default)]
    pub interactions: Vec<InteractionReport>,
}

/// Fila completa de interacción: unidad de ingesta desnormalizada con los
/// metadatos del sobre. Es también el registro que se espeja como dump JSON
/// en `user_data/<deviceId>/` y el que consume el ciclo de entrenamiento.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInteraction {
    pub id: String,
    pub device_id: String,
    pub timestamp: String,
    pub user_message: String,
    pub ai_response: String,
    pub detected_intent: String,
    pub confidence_score: f64,
    #[serde(default)]
    pub app_version: Option<String>,
    #[serde(default)]
    pub model_version: Option<String>,
    #[serde(default)]
    pub os_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<InteractionFeedback>,
}

impl DeviceInteraction {
    /// Desnormaliza una unidad de lote con los metadatos de su sobre.
    pub fn from_report(report: InteractionReport, envelope: &LearnEnvelope) -> Self {
        Self {
            id: report.id,
            device_id: envelope.device_id.clone(),
            timestamp: report.timestamp,
            user_message: report.user_message,
            ai_response: report.ai_response,
            detected_intent: report.detected_intent,
            confidence_score: report.confidence_score,
            app_version: envelope.app_version.clone(),
            model_version: envelope.model_version.clone(),
            os_version: envelope.os_version.clone(),
            feedback: report.feedback,
        }
    }

    /// Valida los invariantes de dominio de la fila.
    ///
    /// # Errors:
    /// Mensaje de una línea apto para la respuesta `success:false` del gateway.
    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("interaction id must not be empty".into());
        }
        if !(0.0..=1.0).contains(&self.confidence_score) {
            return Err(format!(
                "confidence score {} outside [0,1] for interaction '{}'",
                self.confidence_score, self.id
            ));
        }
        if let Some(feedback_signal) = &self.feedback {
            if !(1..=5).contains(&feedback_signal.rating) {
                return Err(format!(
                    "feedback rating {} outside 1..5 for interaction '{}'",
                    feedback_signal.rating, self.id
                ));
            }
        }
        Ok(())
    }

    /// Señal de feedback positivo (rating >= 4) para el pesado de muestras.
    pub fn has_positive_feedback(&self) -> bool {
        self.feedback
            .as_ref()
            .map(|signal| signal.rating >= 4)
            .unwrap_or(false)
    }
}
