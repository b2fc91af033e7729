// [libs/domain/models/src/summary.rs]
/*!
 * =================================================================
 * APARATO: TRAINING SUMMARY DOMAIN MODEL (V3.2)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: REPORTE CANÓNICO DE CADA CICLO DE ENTRENAMIENTO
 *
 * VISION:
 * El resumen es el acta notarial del ciclo: versión, rendimiento,
 * comparación con la versión anterior, perfil del dataset y modelos
 * incorporados. Se persiste como JSON programático y como reporte
 * Markdown legible para el operador.
 * =================================================================
 */

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Naturaleza del artefacto publicado.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelFlavor {
    Standard,
    Ensemble,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelPerformance {
    pub accuracy: f64,
    pub training_data_size: u64,
}

/// Delta contra la versión publicada inmediatamente anterior.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelComparison {
    pub previous_version: String,
    pub accuracy_delta: f64,
    pub improvement: bool,
}

/// Perfil del dataset que alimentó el ciclo.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrainingDataProfile {
    pub total: u64,
    /// Distribución de muestras por intención (orden determinista).
    pub intent_distribution: BTreeMap<String, u64>,
    pub feedback_samples: u64,
    pub positive_feedback: u64,
}

/// Huella de un modelo subido que participó en la fusión.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IncorporatedModelInfo {
    pub device_id: String,
    pub weight: f64,
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
}

/// Acta completa de un ciclo de entrenamiento publicado.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub version: String,
    pub training_date: String,
    pub model_type: ModelFlavor,
    pub performance: ModelPerformance,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comparison: Option<ModelComparison>,
    pub training_data: TrainingDataProfile,
    pub incorporated_models: Vec<IncorporatedModelInfo>,
    /// Cambios legibles por humanos detectados durante el ciclo.
    pub changes: Vec<String>,
    pub summary_text: String,
}

impl TrainingSummary {
    /// Construye la línea de resumen a partir de los cambios acumulados.
    pub fn compose_summary_text(version: &str, changes: &[String]) -> String {
        format!("Model {}: {}", version, changes.join("; "))
    }

    /// Renderiza el acta como reporte Markdown para el operador.
    pub fn render_markdown(&self) -> String {
        let mut report_lines: Vec<String> = vec![
            format!("# Model Update Report: v{}", self.version),
            format!("**Generated:** {}", self.training_date),
            String::new(),
            "## Performance".to_string(),
            format!(
                "- **Type:** {}",
                match self.model_type {
                    ModelFlavor::Standard => "standard",
                    ModelFlavor::Ensemble => "ensemble",
                }
            ),
            format!("- **Accuracy:** {:.4}", self.performance.accuracy),
            format!(
                "- **Training samples:** {}",
                self.performance.training_data_size
            ),
        ];

        if let Some(comparison_block) = &self.comparison {
            report_lines.push(String::new());
            report_lines.push("## Comparison".to_string());
            report_lines.push(format!(
                "- **Previous version:** {}",
                comparison_block.previous_version
            ));
            report_lines.push(format!(
                "- **Accuracy delta:** {:+.4}",
                comparison_block.accuracy_delta
            ));
            report_lines.push(format!(
                "- **Improvement:** {}",
                if comparison_block.improvement { "yes" } else { "no" }
            ));
        }

        report_lines.push(String::new());
        report_lines.push("## Training Data".to_string());
        report_lines.push(format!("- **Total samples:** {}", self.training_data.total));
        report_lines.push(format!(
            "- **Samples with feedback:** {}",
            self.training_data.feedback_samples
        ));
        report_lines.push(format!(
            "- **Positive feedback:** {}",
            self.training_data.positive_feedback
        ));

        if !self.training_data.intent_distribution.is_empty() {
            report_lines.push(String::new());
            report_lines.push("### Intent Distribution".to_string());
            report_lines.push("| Intent | Samples |".to_string());
            report_lines.push("|---|---|".to_string());
            for (intent_label, sample_count) in &self.training_data.intent_distribution {
                report_lines.push(format!("| {} | {} |", intent_label, sample_count));
            }
        }

        if !self.incorporated_models.is_empty() {
            report_lines.push(String::new());
            report_lines.push("## Incorporated Models".to_string());
            report_lines.push("| Device | Weight | Size (bytes) |".to_string());
            report_lines.push("|---|---|---|".to_string());
            for member_info in &self.incorporated_models {
                report_lines.push(format!(
                    "| {} | {:.1} | {} |",
                    member_info.device_id, member_info.weight, member_info.size
                ));
            }
        }

        report_lines.push(String::new());
        report_lines.push("## Changes".to_string());
        for change_entry in &self.changes {
            report_lines.push(format!("- {}", change_entry));
        }

        report_lines.push(String::new());
        report_lines.push(self.summary_text.clone());
        report_lines.push(String::new());

        report_lines.join("\n")
    }
}
