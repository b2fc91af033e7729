// [libs/core/trainer/src/vectorizer.rs]
/*!
 * =================================================================
 * APARATO: TF-IDF VECTORIZER ENGINE (V5.1)
 * CLASIFICACIÓN: CORE ENGINE (ESTRATO L2)
 * RESPONSABILIDAD: PROYECCIÓN DEL CORPUS AL ESPACIO DE RASGOS
 *
 * VISION:
 * 1. NGRAM STRATA: Unigramas y bigramas sobre el texto canónicamente
 *    normalizado; vocabulario acotado a los términos más frecuentes.
 * 2. DETERMINISM: Desempates alfabéticos; el mismo corpus produce el
 *    mismo vocabulario bit-perfecto en cualquier corrida.
 * 3. SMOOTH IDF: idf = ln((1+N)/(1+df)) + 1 con normalización L2 por
 *    documento.
 * =================================================================
 */

use crate::errors::TrainerError;
use crate::preprocess::canonical_normalize;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Proyector TF-IDF ajustado sobre un corpus. Forma parte del artefacto
/// serializado: el espacio de rasgos queda congelado por versión.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TfIdfVectorizer {
    /// Término (unigrama o bigrama con espacio) -> índice de columna.
    vocabulary: HashMap<String, u32>,
    /// Factor idf por columna, alineado con el vocabulario.
    inverse_document_frequency: Vec<f32>,
    pub max_features: usize,
    pub ngram_max: usize,
}

impl TfIdfVectorizer {
    /// Ajusta el vocabulario y los factores idf sobre el corpus entregado.
    pub fn fit(
        documents: &[String],
        max_features: usize,
        ngram_max: usize,
    ) -> Result<Self, TrainerError> {
        let tokenized_corpus: Vec<Vec<String>> = documents
            .iter()
            .map(|document| expand_ngrams(&canonical_normalize(document), ngram_max))
            .collect();

        // Frecuencia total y frecuencia documental por término.
        let mut total_frequency: HashMap<String, u64> = HashMap::new();
        let mut document_frequency: HashMap<String, u64> = HashMap::new();

        for document_terms in &tokenized_corpus {
            let mut seen_in_document: HashMap<&str, ()> = HashMap::new();
            for term in document_terms {
                *total_frequency.entry(term.clone()).or_insert(0) += 1;
                if seen_in_document.insert(term.as_str(), ()).is_none() {
                    *document_frequency.entry(term.clone()).or_insert(0) += 1;
                }
            }
        }

        if total_frequency.is_empty() {
            return Err(TrainerError::DegenerateCorpus(
                "empty vocabulary after canonical normalization".into(),
            ));
        }

        // Selección de los términos más frecuentes; desempate alfabético.
        let mut ranked_terms: Vec<(String, u64)> = total_frequency.into_iter().collect();
        ranked_terms.sort_by(|left, right| {
            right.1.cmp(&left.1).then_with(|| left.0.cmp(&right.0))
        });
        ranked_terms.truncate(max_features);

        // Vocabulario final en orden alfabético estable.
        let mut selected_terms: Vec<String> =
            ranked_terms.into_iter().map(|(term, _)| term).collect();
        selected_terms.sort_unstable();

        let corpus_size = tokenized_corpus.len() as f32;
        let mut vocabulary = HashMap::with_capacity(selected_terms.len());
        let mut inverse_document_frequency = Vec::with_capacity(selected_terms.len());

        for (column_index, term) in selected_terms.into_iter().enumerate() {
            let term_document_frequency =
                document_frequency.get(&term).copied().unwrap_or(0) as f32;
            inverse_document_frequency
                .push(((1.0 + corpus_size) / (1.0 + term_document_frequency)).ln() + 1.0);
            vocabulary.insert(term, column_index as u32);
        }

        Ok(Self {
            vocabulary,
            inverse_document_frequency,
            max_features,
            ngram_max,
        })
    }

    /// Dimensión del espacio de rasgos.
    pub fn dimension(&self) -> usize {
        self.vocabulary.len()
    }

    /// Proyecta un documento al vector denso TF-IDF con normalización L2.
    pub fn transform(&self, document: &str) -> Vec<f32> {
        let mut feature_vector = vec![0.0f32; self.dimension()];
        let document_terms = expand_ngrams(&canonical_normalize(document), self.ngram_max);

        for term in &document_terms {
            if let Some(&column_index) = self.vocabulary.get(term) {
                feature_vector[column_index as usize] +=
                    self.inverse_document_frequency[column_index as usize];
            }
        }

        let euclidean_norm = feature_vector
            .iter()
            .map(|value| value * value)
            .sum::<f32>()
            .sqrt();
        if euclidean_norm > 0.0 {
            for value in &mut feature_vector {
                *value /= euclidean_norm;
            }
        }

        feature_vector
    }

    /// Proyección por lotes del corpus completo.
    pub fn transform_batch(&self, documents: &[String]) -> Vec<Vec<f32>> {
        documents
            .iter()
            .map(|document| self.transform(document))
            .collect()
    }
}

/// Expande los tokens canónicos en n-gramas de 1..=ngram_max.
fn expand_ngrams(tokens: &[String], ngram_max: usize) -> Vec<String> {
    let mut expanded_terms = Vec::with_capacity(tokens.len() * ngram_max);

    for ngram_size in 1..=ngram_max.max(1) {
        if tokens.len() < ngram_size {
            break;
        }
        for window in tokens.windows(ngram_size) {
            expanded_terms.push(window.join(" "));
        }
    }

    expanded_terms
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> Vec<String> {
        vec![
            "turn on the kitchen lights".to_string(),
            "turn off the kitchen lights".to_string(),
            "play some jazz music".to_string(),
            "play rock music loudly".to_string(),
        ]
    }

    #[test]
    fn fit_produces_deterministic_vocabulary() {
        let first_fit = TfIdfVectorizer::fit(&corpus(), 5000, 2).expect("fit");
        let second_fit = TfIdfVectorizer::fit(&corpus(), 5000, 2).expect("fit");
        assert_eq!(first_fit.dimension(), second_fit.dimension());
        assert_eq!(
            first_fit.transform("turn on the music"),
            second_fit.transform("turn on the music")
        );
    }

    #[test]
    fn transform_is_l2_normalized() {
        let vectorizer = TfIdfVectorizer::fit(&corpus(), 5000, 2).expect("fit");
        let projection = vectorizer.transform("play jazz music");
        let norm: f32 = projection.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5, "norm was {}", norm);
    }

    #[test]
    fn unknown_terms_project_to_zero_vector() {
        let vectorizer = TfIdfVectorizer::fit(&corpus(), 5000, 2).expect("fit");
        let projection = vectorizer.transform("quantum chromodynamics");
        assert!(projection.iter().all(|value| *value == 0.0));
    }

    #[test]
    fn max_features_caps_the_dimension() {
        let vectorizer = TfIdfVectorizer::fit(&corpus(), 3, 2).expect("fit");
        assert_eq!(vectorizer.dimension(), 3);
    }

    #[test]
    fn empty_corpus_is_degenerate() {
        let fit_result = TfIdfVectorizer::fit(&["the a an".to_string()], 5000, 2);
        assert!(matches!(fit_result, Err(TrainerError::DegenerateCorpus(_))));
    }

    #[test]
    fn bigrams_enter_the_vocabulary() {
        let vectorizer = TfIdfVectorizer::fit(&corpus(), 5000, 2).expect("fit");
        // "kitchen lights" -> lematizado "kitchen light", presente dos veces.
        let with_bigram = vectorizer.transform("kitchen lights");
        assert!(with_bigram.iter().filter(|v| **v > 0.0).count() >= 3);
    }
}
