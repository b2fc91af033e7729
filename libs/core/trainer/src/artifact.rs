// [libs/core/trainer/src/artifact.rs]
/*!
 * =================================================================
 * APARATO: MODEL ARTIFACT CODEC (V5.0)
 * CLASIFICACIÓN: CORE ENGINE (ESTRATO L2)
 * RESPONSABILIDAD: SERIALIZACIÓN BINARIA DEL CLASIFICADOR PUBLICABLE
 *
 * VISION:
 * 1. SELF-CONTAINED: El artefacto viaja con vectorizador, bosque base,
 *    ensamble opcional y metadatos; el consumidor no necesita estado
 *    externo.
 * 2. MAGIC GUARD: Prefijo mágico + revisión de formato; los bytes que
 *    no lo portan se rechazan como artefacto irreconocible (el ciclo
 *    sustituye por placeholder o marca la subida como fallida).
 * =================================================================
 */

use crate::classifier::IntentClassifier;
use crate::ensemble::SoftVotingEnsemble;
use crate::errors::TrainerError;
use crate::forest::RandomForest;
use crate::vectorizer::TfIdfVectorizer;
use serde::{Deserialize, Serialize};

/// Prefijo mágico del formato de artefacto.
pub const ARTIFACT_MAGIC: &[u8; 4] = b"SYNM";
/// Revisión vigente del formato.
pub const ARTIFACT_FORMAT_REVISION: u16 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub version: String,
    pub training_date: String,
    pub accuracy: f64,
    pub training_data_size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format_revision: u16,
    pub metadata: ArtifactMetadata,
    pub classes: Vec<String>,
    pub vectorizer: TfIdfVectorizer,
    pub base_forest: RandomForest,
    pub ensemble: Option<SoftVotingEnsemble>,
}

impl ModelArtifact {
    /// Serializa el artefacto a la forma binaria consumible en dispositivo.
    pub fn encode(&self) -> Result<Vec<u8>, TrainerError> {
        let body = bincode::serialize(self)
            .map_err(|e| TrainerError::ArtifactEncode(e.to_string()))?;

        let mut framed = Vec::with_capacity(ARTIFACT_MAGIC.len() + body.len());
        framed.extend_from_slice(ARTIFACT_MAGIC);
        framed.extend_from_slice(&body);
        Ok(framed)
    }

    /// Decodifica un artefacto binario, validando el prefijo mágico y la
    /// revisión de formato.
    pub fn decode(raw_bytes: &[u8]) -> Result<Self, TrainerError> {
        let Some(body) = raw_bytes.strip_prefix(ARTIFACT_MAGIC.as_slice()) else {
            return Err(TrainerError::ArtifactDecode(
                "magic prefix absent: not a recognized model artifact".into(),
            ));
        };

        let artifact: ModelArtifact = bincode::deserialize(body)
            .map_err(|e| TrainerError::ArtifactDecode(e.to_string()))?;

        if artifact.format_revision != ARTIFACT_FORMAT_REVISION {
            return Err(TrainerError::ArtifactDecode(format!(
                "format revision {} unsupported (expected {})",
                artifact.format_revision, ARTIFACT_FORMAT_REVISION
            )));
        }

        Ok(artifact)
    }
}

impl IntentClassifier {
    /// Exporta el clasificador completo como artefacto binario versionado.
    pub fn export_artifact(
        &self,
        version: &str,
        training_date: &str,
    ) -> Result<Vec<u8>, TrainerError> {
        ModelArtifact {
            format_revision: ARTIFACT_FORMAT_REVISION,
            metadata: ArtifactMetadata {
                version: version.to_string(),
                training_date: training_date.to_string(),
                accuracy: self.accuracy,
                training_data_size: self.training_data_size,
            },
            classes: self.classes.clone(),
            vectorizer: self.vectorizer.clone(),
            base_forest: self.base_forest.clone(),
            ensemble: self.ensemble.clone(),
        }
        .encode()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::TrainingSettings;
    use crate::dataset::TrainingRecord;

    fn trained_classifier() -> IntentClassifier {
        let records: Vec<TrainingRecord> = (0..40)
            .map(|index| TrainingRecord {
                text: if index % 2 == 0 {
                    format!("turn on the lights {}", index)
                } else {
                    format!("play some music {}", index)
                },
                intent: if index % 2 == 0 { "home".into() } else { "music".into() },
                weight: 1.0,
            })
            .collect();

        let settings = TrainingSettings { min_training_data: 10, ..Default::default() };
        IntentClassifier::train(&records, &settings).expect("train").0
    }

    #[test]
    fn artifact_roundtrip_preserves_the_decision_function() {
        let classifier = trained_classifier();
        let encoded = classifier
            .export_artifact("1.0.1712052481", "2026-07-30T02:00:00Z")
            .expect("encode");

        let decoded = ModelArtifact::decode(&encoded).expect("decode");
        assert_eq!(decoded.metadata.version, "1.0.1712052481");
        assert_eq!(decoded.classes, classifier.classes);

        let probe = classifier.vectorizer.transform("play some music");
        assert_eq!(
            decoded.base_forest.predict(&probe),
            classifier.base_forest.predict(&probe)
        );
    }

    #[test]
    fn foreign_bytes_are_rejected() {
        assert!(matches!(
            ModelArtifact::decode(b"not a model at all"),
            Err(TrainerError::ArtifactDecode(_))
        ));
        assert!(matches!(
            ModelArtifact::decode(b"SYNMgarbage-after-magic"),
            Err(TrainerError::ArtifactDecode(_))
        ));
    }
}
