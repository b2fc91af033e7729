// [libs/core/trainer/src/dataset.rs]
/*!
 * =================================================================
 * APARATO: TRAINING DATASET ASSEMBLER (V3.0)
 * CLASIFICACIÓN: CORE ENGINE (ESTRATO L2)
 * RESPONSABILIDAD: ENSAMBLADO Y PESADO DEL CORPUS DE ENTRENAMIENTO
 *
 * Regla de pesos por muestra:
 *   1 = base; 2 = con cualquier feedback; 3 = feedback positivo (>=4).
 * La deduplicación por id absorbe el solape entre el ledger y los
 * dumps espejados de user_data.
 * =================================================================
 */

use std::collections::HashSet;
use synapse_domain_models::DeviceInteraction;

/// Muestra lista para vectorizar, con su peso de entrenamiento.
#[derive(Debug, Clone)]
pub struct TrainingRecord {
    pub text: String,
    pub intent: String,
    pub weight: f32,
}

/// Ensambla el dataset desde una o más fuentes de interacciones,
/// deduplicando por id (gana la primera aparición).
pub fn build_training_dataset(sources: &[Vec<DeviceInteraction>]) -> Vec<TrainingRecord> {
    let mut seen_identifiers: HashSet<String> = HashSet::new();
    let mut dataset = Vec::new();

    for source in sources {
        for interaction in source {
            if interaction.user_message.trim().is_empty()
                || interaction.detected_intent.trim().is_empty()
            {
                continue;
            }
            if !seen_identifiers.insert(interaction.id.clone()) {
                continue;
            }

            let weight = match &interaction.feedback {
                Some(signal) if signal.rating >= 4 => 3.0,
                Some(_) => 2.0,
                None => 1.0,
            };

            dataset.push(TrainingRecord {
                text: interaction.user_message.clone(),
                intent: interaction.detected_intent.clone(),
                weight,
            });
        }
    }

    dataset
}

#[cfg(test)]
mod tests {
    use super::*;
    use synapse_domain_models::InteractionFeedback;

    fn interaction(id: &str, rating: Option<i64>) -> DeviceInteraction {
        DeviceInteraction {
            id: id.into(),
            device_id: "d".into(),
            timestamp: "2026-07-30T00:00:00Z".into(),
            user_message: format!("message {}", id),
            ai_response: "ok".into(),
            detected_intent: "greet".into(),
            confidence_score: 0.5,
            app_version: None,
            model_version: None,
            os_version: None,
            feedback: rating.map(|value| InteractionFeedback { rating: value, comment: None }),
        }
    }

    #[test]
    fn weights_follow_feedback_rule() {
        let dataset = build_training_dataset(&[vec![
            interaction("plain", None),
            interaction("rated", Some(3)),
            interaction("loved", Some(5)),
        ]]);

        let weight_of = |id: &str| {
            dataset
                .iter()
                .find(|record| record.text.ends_with(id))
                .map(|record| record.weight)
                .unwrap()
        };

        assert_eq!(weight_of("plain"), 1.0);
        assert_eq!(weight_of("rated"), 2.0);
        assert_eq!(weight_of("loved"), 3.0);
    }

    #[test]
    fn duplicate_identifiers_collapse_across_sources() {
        let ledger_source = vec![interaction("dup", Some(5)), interaction("solo", None)];
        let mirror_source = vec![interaction("dup", None)];

        let dataset = build_training_dataset(&[ledger_source, mirror_source]);
        assert_eq!(dataset.len(), 2);

        // Gana la primera aparición (la del ledger, con peso 3).
        let duplicated = dataset.iter().find(|r| r.text.ends_with("dup")).unwrap();
        assert_eq!(duplicated.weight, 3.0);
    }

    #[test]
    fn blank_rows_are_excluded() {
        let mut blank_message = interaction("blank", None);
        blank_message.user_message = "   ".into();
        let mut blank_intent = interaction("void", None);
        blank_intent.detected_intent = String::new();

        let dataset = build_training_dataset(&[vec![blank_message, blank_intent]]);
        assert!(dataset.is_empty());
    }
}
