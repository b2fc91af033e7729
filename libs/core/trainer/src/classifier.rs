// [libs/core/trainer/src/classifier.rs]
/*!
 * =================================================================
 * APARATO: INTENT CLASSIFIER ENGINE (V7.1)
 * CLASIFICACIÓN: CORE ENGINE (ESTRATO L2)
 * RESPONSABILIDAD: ENTRENAMIENTO, EVALUACIÓN Y FUSIÓN DEL CLASIFICADOR
 *
 * VISION:
 * 1. STRATIFIED HOLD-OUT: Partición 80/20 estratificada por clase
 *    cuando hay más de una; la exactitud se mide ponderada sobre el
 *    tramo retenido.
 * 2. FROZEN PIPELINE: El vectorizador se ajusta SOLO sobre el tramo de
 *    entrenamiento y viaja congelado dentro del artefacto.
 * 3. COMPATIBLE FUSION: Solo se fusionan miembros con el mismo espacio
 *    de rasgos y conjunto de clases del base.
 * =================================================================
 */

use crate::artifact::ModelArtifact;
use crate::dataset::TrainingRecord;
use crate::ensemble::SoftVotingEnsemble;
use crate::errors::TrainerError;
use crate::forest::{ForestHyperparameters, RandomForest};
use crate::vectorizer::TfIdfVectorizer;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::BTreeMap;
use tracing::{info, instrument};

/// Parámetros del ciclo de entrenamiento. Los defaults son el contrato
/// canónico del sistema.
#[derive(Debug, Clone)]
pub struct TrainingSettings {
    pub min_training_data: usize,
    pub max_features: usize,
    pub ngram_max: usize,
    pub test_fraction: f64,
    pub forest: ForestHyperparameters,
}

impl Default for TrainingSettings {
    fn default() -> Self {
        Self {
            min_training_data: 50,
            max_features: 5000,
            ngram_max: 2,
            test_fraction: 0.2,
            forest: ForestHyperparameters::default(),
        }
    }
}

/// Resultado observable de un entrenamiento.
#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub accuracy: f64,
    pub training_data_size: u64,
    pub held_out_size: usize,
    pub classes: Vec<String>,
}

/// Miembro ponderado listo para la fusión.
pub struct WeightedMember {
    pub forest: RandomForest,
    pub weight: f32,
}

#[derive(Debug, Clone)]
pub struct IntentClassifier {
    pub vectorizer: TfIdfVectorizer,
    pub classes: Vec<String>,
    pub base_forest: RandomForest,
    pub ensemble: Option<SoftVotingEnsemble>,
    pub accuracy: f64,
    pub training_data_size: u64,
}

impl IntentClassifier {
    /// Entrena el clasificador base sobre el dataset pesado.
    ///
    /// # Errors:
    /// - `InsufficientData` bajo el umbral mínimo (el ciclo aborta sin
    ///   tocar las subidas pendientes).
    /// - `DegenerateCorpus` si la normalización vacía el corpus.
    #[instrument(skip(records, settings), fields(samples = records.len()))]
    pub fn train(
        records: &[TrainingRecord],
        settings: &TrainingSettings,
    ) -> Result<(Self, TrainingReport), TrainerError> {
        if records.len() < settings.min_training_data {
            return Err(TrainerError::InsufficientData {
                have: records.len(),
                need: settings.min_training_data,
            });
        }

        // Clases ordenadas alfabéticamente: índice de etiqueta estable.
        let mut class_index_map: BTreeMap<String, usize> = BTreeMap::new();
        for record in records {
            let next_index = class_index_map.len();
            class_index_map.entry(record.intent.clone()).or_insert(next_index);
        }
        let classes: Vec<String> = class_index_map.keys().cloned().collect();
        let class_of = |intent: &str| {
            classes
                .binary_search_by(|candidate| candidate.as_str().cmp(intent))
                .unwrap_or(0)
        };

        let (train_indices, test_indices) =
            stratified_split(records, &classes, settings, class_of);

        // El vectorizador se ajusta SOLO sobre el tramo de entrenamiento.
        let train_documents: Vec<String> = train_indices
            .iter()
            .map(|&index| records[index].text.clone())
            .collect();
        let vectorizer =
            TfIdfVectorizer::fit(&train_documents, settings.max_features, settings.ngram_max)?;

        let train_matrix = vectorizer.transform_batch(&train_documents);
        let train_labels: Vec<usize> = train_indices
            .iter()
            .map(|&index| class_of(&records[index].intent))
            .collect();
        let train_weights: Vec<f32> =
            train_indices.iter().map(|&index| records[index].weight).collect();

        let base_forest = RandomForest::fit(
            &train_matrix,
            &train_labels,
            &train_weights,
            classes.len(),
            &settings.forest,
        );

        // Exactitud ponderada sobre el tramo retenido.
        let accuracy = if test_indices.is_empty() || classes.len() < 2 {
            1.0
        } else {
            let mut correct_weight = 0.0f64;
            let mut total_weight = 0.0f64;
            for &test_index in &test_indices {
                let record = &records[test_index];
                let projection = vectorizer.transform(&record.text);
                let predicted_class = base_forest.predict(&projection);
                let sample_weight = record.weight as f64;
                total_weight += sample_weight;
                if predicted_class == class_of(&record.intent) {
                    correct_weight += sample_weight;
                }
            }
            if total_weight > 0.0 { correct_weight / total_weight } else { 1.0 }
        };

        info!(
            "🧠 [CLASSIFIER]: Trained on {} samples ({} held out). Accuracy: {:.4}",
            train_indices.len(),
            test_indices.len(),
            accuracy
        );

        let report = TrainingReport {
            accuracy,
            training_data_size: train_indices.len() as u64,
            held_out_size: test_indices.len(),
            classes: classes.clone(),
        };

        Ok((
            Self {
                vectorizer,
                classes,
                base_forest,
                ensemble: None,
                accuracy,
                training_data_size: report.training_data_size,
            },
            report,
        ))
    }

    pub fn is_ensemble(&self) -> bool {
        self.ensemble.is_some()
    }

    pub fn feature_dimension(&self) -> usize {
        self.vectorizer.dimension()
    }

    /// Extrae de un artefacto un miembro dimensionalmente compatible con
    /// este clasificador base. `None` si el espacio de rasgos o las clases
    /// difieren: el llamador decide sustituir por un placeholder sintético.
    pub fn compatible_member(&self, artifact: &ModelArtifact) -> Option<RandomForest> {
        let dimensions_match =
            artifact.base_forest.feature_dimension == self.feature_dimension();
        let classes_match = artifact.classes == self.classes;

        if dimensions_match && classes_match {
            Some(artifact.base_forest.clone())
        } else {
            None
        }
    }

    /// Clasificador placeholder con las dimensiones del base, inicializado
    /// sobre datos sintéticos.
    pub fn synthetic_member(&self, seed: u64) -> RandomForest {
        RandomForest::synthetic(self.feature_dimension(), self.classes.len(), seed)
    }

    /// Fusiona los miembros entregados con el base en votación suave.
    pub fn fuse(&mut self, members: Vec<WeightedMember>, base_weight: f32) {
        if members.is_empty() {
            return;
        }

        let user_members: Vec<(RandomForest, f32)> = members
            .into_iter()
            .map(|member| (member.forest, member.weight))
            .collect();

        self.ensemble = Some(SoftVotingEnsemble::assemble(
            self.base_forest.clone(),
            base_weight,
            user_members,
        ));
    }

    /// Intención más probable con su confianza (diagnóstico y tests).
    pub fn predict_intent(&self, raw_text: &str) -> Option<(String, f64)> {
        let projection = self.vectorizer.transform(raw_text);
        let distribution = match &self.ensemble {
            Some(voting_ensemble) => voting_ensemble.predict_proba(&projection),
            None => self.base_forest.predict_proba(&projection),
        };

        distribution
            .iter()
            .enumerate()
            .max_by(|left, right| {
                left.1
                    .partial_cmp(right.1)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .and_then(|(class_index, probability)| {
                self.classes
                    .get(class_index)
                    .map(|intent| (intent.clone(), *probability as f64))
            })
    }
}

/// Partición estratificada por clase; cada clase aporta su fracción al
/// tramo retenido, preservando al menos una muestra en entrenamiento.
fn stratified_split(
    records: &[TrainingRecord],
    classes: &[String],
    settings: &TrainingSettings,
    class_of: impl Fn(&str) -> usize,
) -> (Vec<usize>, Vec<usize>) {
    let mut split_rng = StdRng::seed_from_u64(settings.forest.seed);

    if classes.len() < 2 {
        // Sin estratificación posible: partición simple barajada.
        let mut all_indices: Vec<usize> = (0..records.len()).collect();
        all_indices.shuffle(&mut split_rng);
        let test_count =
            ((records.len() as f64) * settings.test_fraction).round() as usize;
        let test_indices = all_indices.split_off(records.len() - test_count.min(records.len()));
        return (all_indices, test_indices);
    }

    let mut per_class_buckets: Vec<Vec<usize>> = vec![Vec::new(); classes.len()];
    for (record_index, record) in records.iter().enumerate() {
        per_class_buckets[class_of(&record.intent)].push(record_index);
    }

    let mut train_indices = Vec::new();
    let mut test_indices = Vec::new();

    for mut class_bucket in per_class_buckets {
        class_bucket.shuffle(&mut split_rng);
        let bucket_size = class_bucket.len();
        let mut held_out = ((bucket_size as f64) * settings.test_fraction).round() as usize;
        // Toda clase conserva al menos una muestra en entrenamiento.
        if held_out >= bucket_size {
            held_out = bucket_size.saturating_sub(1);
        }

        let retained = class_bucket.split_off(bucket_size - held_out);
        test_indices.extend(retained);
        train_indices.extend(class_bucket);
    }

    (train_indices, test_indices)
}
