// [libs/core/trainer/src/forest.rs]
/*!
 * =================================================================
 * APARATO: WEIGHTED RANDOM FOREST ENGINE (V6.0)
 * CLASIFICACIÓN: CORE ENGINE (ESTRATO L2)
 * RESPONSABILIDAD: CLASIFICADOR DE BOSQUE ALEATORIO CON PESOS POR MUESTRA
 *
 * VISION:
 * 1. WEIGHTED GINI: Los pesos de muestra (feedback de usuario) fluyen
 *    a la impureza de cada partición, no solo al muestreo.
 * 2. PARALLEL FIT: Cada árbol se ajusta en un hilo de Rayon con su
 *    propia semilla derivada; el bosque completo es determinista para
 *    una semilla dada.
 * 3. EXACT SPLITS: Barrido ordenado por rasgo con conteos acumulados;
 *    O(n log n) por rasgo candidato.
 * =================================================================
 */

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Constante de dispersión para derivar semillas por árbol.
const SEED_DISPERSION: u64 = 0x9E37_79B9_7F4A_7C15;

#[derive(Debug, Clone, Serialize, Deserialize)]
enum TreeNode {
    Leaf {
        class_distribution: Vec<f32>,
    },
    Split {
        feature_index: u32,
        threshold: f32,
        left_child: u32,
        right_child: u32,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<TreeNode>,
}

impl DecisionTree {
    fn predict_proba(&self, features: &[f32]) -> &[f32] {
        let mut cursor = 0usize;
        loop {
            match &self.nodes[cursor] {
                TreeNode::Leaf { class_distribution } => return class_distribution,
                TreeNode::Split { feature_index, threshold, left_child, right_child } => {
                    let observed = features
                        .get(*feature_index as usize)
                        .copied()
                        .unwrap_or(0.0);
                    cursor = if observed <= *threshold {
                        *left_child as usize
                    } else {
                        *right_child as usize
                    };
                }
            }
        }
    }
}

/// Hiperparámetros del bosque. Los defaults replican el clasificador
/// canónico del sistema (100 árboles).
#[derive(Debug, Clone)]
pub struct ForestHyperparameters {
    pub tree_count: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub seed: u64,
}

impl Default for ForestHyperparameters {
    fn default() -> Self {
        Self {
            tree_count: 100,
            max_depth: 20,
            min_samples_split: 2,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    pub class_count: usize,
    pub feature_dimension: usize,
}

impl RandomForest {
    /// Ajusta el bosque completo en paralelo.
    ///
    /// # Panics:
    /// Nunca: entradas vacías producen un bosque de hojas uniformes.
    pub fn fit(
        feature_matrix: &[Vec<f32>],
        class_labels: &[usize],
        sample_weights: &[f32],
        class_count: usize,
        hyperparameters: &ForestHyperparameters,
    ) -> Self {
        let feature_dimension = feature_matrix.first().map(|row| row.len()).unwrap_or(0);
        let sample_count = feature_matrix.len();

        let trees: Vec<DecisionTree> = (0..hyperparameters.tree_count)
            .into_par_iter()
            .map(|tree_index| {
                let tree_seed = hyperparameters
                    .seed
                    .wrapping_add(SEED_DISPERSION.wrapping_mul(tree_index as u64 + 1));
                let mut tree_rng = StdRng::seed_from_u64(tree_seed);

                // Bootstrap uniforme con reemplazo.
                let bootstrap_indices: Vec<usize> = if sample_count == 0 {
                    Vec::new()
                } else {
                    (0..sample_count)
                        .map(|_| tree_rng.gen_range(0..sample_count))
                        .collect()
                };

                let mut tree_builder = TreeBuilder {
                    feature_matrix,
                    class_labels,
                    sample_weights,
                    class_count,
                    max_depth: hyperparameters.max_depth,
                    min_samples_split: hyperparameters.min_samples_split,
                    feature_subset_size: (feature_dimension as f64).sqrt().ceil() as usize,
                    feature_dimension,
                    nodes: Vec::new(),
                };
                tree_builder.build_node(&bootstrap_indices, 0, &mut tree_rng);

                DecisionTree { nodes: tree_builder.nodes }
            })
            .collect();

        Self { trees, class_count, feature_dimension }
    }

    /// Distribución de probabilidad promediada sobre los árboles.
    pub fn predict_proba(&self, features: &[f32]) -> Vec<f32> {
        let mut accumulated = vec![0.0f32; self.class_count];

        if self.trees.is_empty() {
            if self.class_count > 0 {
                let uniform = 1.0 / self.class_count as f32;
                accumulated.iter_mut().for_each(|slot| *slot = uniform);
            }
            return accumulated;
        }

        for tree in &self.trees {
            for (slot, probability) in accumulated.iter_mut().zip(tree.predict_proba(features)) {
                *slot += probability;
            }
        }

        let tree_count = self.trees.len() as f32;
        accumulated.iter_mut().for_each(|slot| *slot /= tree_count);
        accumulated
    }

    pub fn predict(&self, features: &[f32]) -> usize {
        let distribution = self.predict_proba(features);
        distribution
            .iter()
            .enumerate()
            .max_by(|left, right| left.1.partial_cmp(right.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(class_index, _)| class_index)
            .unwrap_or(0)
    }

    /// Clasificador placeholder con dimensiones compatibles, inicializado
    /// sobre datos sintéticos. Se usa cuando un artefacto subido no puede
    /// abrirse: preserva la forma del ensamble y deja que el pesado mande.
    pub fn synthetic(feature_dimension: usize, class_count: usize, seed: u64) -> Self {
        let mut synthesis_rng = StdRng::seed_from_u64(seed);
        let sample_count = (class_count.max(1)) * 8;

        let feature_matrix: Vec<Vec<f32>> = (0..sample_count)
            .map(|_| {
                (0..feature_dimension)
                    .map(|_| {
                        if synthesis_rng.gen::<f32>() < 0.05 {
                            synthesis_rng.gen::<f32>()
                        } else {
                            0.0
                        }
                    })
                    .collect()
            })
            .collect();
        let class_labels: Vec<usize> =
            (0..sample_count).map(|index| index % class_count.max(1)).collect();
        let sample_weights = vec![1.0f32; sample_count];

        Self::fit(
            &feature_matrix,
            &class_labels,
            &sample_weights,
            class_count.max(1),
            &ForestHyperparameters {
                tree_count: 15,
                max_depth: 4,
                min_samples_split: 2,
                seed,
            },
        )
    }
}

struct TreeBuilder<'a> {
    feature_matrix: &'a [Vec<f32>],
    class_labels: &'a [usize],
    sample_weights: &'a [f32],
    class_count: usize,
    max_depth: usize,
    min_samples_split: usize,
    feature_subset_size: usize,
    feature_dimension: usize,
    nodes: Vec<TreeNode>,
}

impl<'a> TreeBuilder<'a> {
    /// Construye el subárbol de las muestras entregadas; devuelve el índice
    /// del nodo raíz del subárbol dentro del arreglo plano.
    fn build_node(
        &mut self,
        sample_indices: &[usize],
        depth: usize,
        tree_rng: &mut StdRng,
    ) -> u32 {
        let class_distribution = self.weighted_distribution(sample_indices);

        let is_terminal = depth >= self.max_depth
            || sample_indices.len() < self.min_samples_split
            || is_pure(&class_distribution);

        if is_terminal {
            let node_index = self.nodes.len() as u32;
            self.nodes.push(TreeNode::Leaf { class_distribution });
            return node_index;
        }

        let Some((feature_index, threshold)) =
            self.find_best_split(sample_indices, tree_rng)
        else {
            let node_index = self.nodes.len() as u32;
            self.nodes.push(TreeNode::Leaf { class_distribution });
            return node_index;
        };

        let (left_samples, right_samples): (Vec<usize>, Vec<usize>) = sample_indices
            .iter()
            .copied()
            .partition(|&sample_index| {
                self.feature_matrix[sample_index][feature_index] <= threshold
            });

        if left_samples.is_empty() || right_samples.is_empty() {
            let node_index = self.nodes.len() as u32;
            self.nodes.push(TreeNode::Leaf { class_distribution });
            return node_index;
        }

        // Reserva del índice propio antes de descender.
        let node_index = self.nodes.len() as u32;
        self.nodes.push(TreeNode::Leaf {
            class_distribution: class_distribution.clone(),
        });

        let left_child = self.build_node(&left_samples, depth + 1, tree_rng);
        let right_child = self.build_node(&right_samples, depth + 1, tree_rng);

        self.nodes[node_index as usize] = TreeNode::Split {
            feature_index: feature_index as u32,
            threshold,
            left_child,
            right_child,
        };
        node_index
    }

    /// Distribución de clases ponderada por peso de muestra, normalizada.
    fn weighted_distribution(&self, sample_indices: &[usize]) -> Vec<f32> {
        let mut distribution = vec![0.0f32; self.class_count];
        for &sample_index in sample_indices {
            distribution[self.class_labels[sample_index]] +=
                self.sample_weights[sample_index];
        }

        let total_weight: f32 = distribution.iter().sum();
        if total_weight > 0.0 {
            distribution.iter_mut().for_each(|slot| *slot /= total_weight);
        } else if self.class_count > 0 {
            let uniform = 1.0 / self.class_count as f32;
            distribution.iter_mut().for_each(|slot| *slot = uniform);
        }
        distribution
    }

    /// Mejor partición sobre un subconjunto aleatorio de rasgos.
    /// Barrido ordenado con acumuladores de peso por clase.
    fn find_best_split(
        &self,
        sample_indices: &[usize],
        tree_rng: &mut StdRng,
    ) -> Option<(usize, f32)> {
        if self.feature_dimension == 0 {
            return None;
        }

        let mut best_candidate: Option<(usize, f32)> = None;
        let mut best_impurity = f32::INFINITY;

        for _ in 0..self.feature_subset_size.max(1) {
            let feature_index = tree_rng.gen_range(0..self.feature_dimension);

            let mut ordered_samples: Vec<(f32, usize, f32)> = sample_indices
                .iter()
                .map(|&sample_index| {
                    (
                        self.feature_matrix[sample_index][feature_index],
                        self.class_labels[sample_index],
                        self.sample_weights[sample_index],
                    )
                })
                .collect();
            ordered_samples
                .sort_by(|left, right| left.0.partial_cmp(&right.0).unwrap_or(std::cmp::Ordering::Equal));

            let total_weight: f32 = ordered_samples.iter().map(|sample| sample.2).sum();
            if total_weight <= 0.0 {
                continue;
            }

            let mut right_class_weight = vec![0.0f32; self.class_count];
            for (_, class_label, weight) in &ordered_samples {
                right_class_weight[*class_label] += weight;
            }
            let mut left_class_weight = vec![0.0f32; self.class_count];
            let mut left_total = 0.0f32;

            for window_index in 0..ordered_samples.len().saturating_sub(1) {
                let (observed_value, class_label, weight) = ordered_samples[window_index];
                left_class_weight[class_label] += weight;
                right_class_weight[class_label] -= weight;
                left_total += weight;

                let next_value = ordered_samples[window_index + 1].0;
                if next_value <= observed_value {
                    continue;
                }

                let right_total = total_weight - left_total;
                let partition_impurity = (left_total * gini(&left_class_weight, left_total)
                    + right_total * gini(&right_class_weight, right_total))
                    / total_weight;

                if partition_impurity < best_impurity {
                    best_impurity = partition_impurity;
                    best_candidate =
                        Some((feature_index, (observed_value + next_value) / 2.0));
                }
            }
        }

        best_candidate
    }
}

fn gini(class_weights: &[f32], total_weight: f32) -> f32 {
    if total_weight <= 0.0 {
        return 0.0;
    }
    1.0 - class_weights
        .iter()
        .map(|weight| {
            let proportion = weight / total_weight;
            proportion * proportion
        })
        .sum::<f32>()
}

fn is_pure(class_distribution: &[f32]) -> bool {
    class_distribution.iter().any(|proportion| *proportion >= 0.9999)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Corpus sintético linealmente separable en dos rasgos.
    fn separable_corpus() -> (Vec<Vec<f32>>, Vec<usize>, Vec<f32>) {
        let mut features = Vec::new();
        let mut labels = Vec::new();
        for sample_index in 0..40 {
            let offset = (sample_index % 10) as f32 / 100.0;
            if sample_index % 2 == 0 {
                features.push(vec![0.9 + offset, 0.1, 0.0]);
                labels.push(0);
            } else {
                features.push(vec![0.1, 0.9 + offset, 0.0]);
                labels.push(1);
            }
        }
        let weights = vec![1.0; features.len()];
        (features, labels, weights)
    }

    #[test]
    fn forest_learns_a_separable_frontier() {
        let (features, labels, weights) = separable_corpus();
        let forest = RandomForest::fit(
            &features,
            &labels,
            &weights,
            2,
            &ForestHyperparameters { tree_count: 25, ..Default::default() },
        );

        assert_eq!(forest.predict(&[0.95, 0.05, 0.0]), 0);
        assert_eq!(forest.predict(&[0.05, 0.95, 0.0]), 1);
    }

    #[test]
    fn fit_is_deterministic_for_a_seed() {
        let (features, labels, weights) = separable_corpus();
        let hyper = ForestHyperparameters { tree_count: 10, ..Default::default() };

        let first = RandomForest::fit(&features, &labels, &weights, 2, &hyper);
        let second = RandomForest::fit(&features, &labels, &weights, 2, &hyper);

        let probe = vec![0.5, 0.5, 0.0];
        assert_eq!(first.predict_proba(&probe), second.predict_proba(&probe));
    }

    #[test]
    fn probabilities_sum_to_one() {
        let (features, labels, weights) = separable_corpus();
        let forest = RandomForest::fit(
            &features,
            &labels,
            &weights,
            2,
            &ForestHyperparameters { tree_count: 10, ..Default::default() },
        );

        let distribution = forest.predict_proba(&[0.4, 0.6, 0.0]);
        let mass: f32 = distribution.iter().sum();
        assert!((mass - 1.0).abs() < 1e-4, "mass was {}", mass);
    }

    #[test]
    fn sample_weights_tilt_the_vote() {
        // Muestras contradictorias en el mismo punto: el peso decide.
        let features = vec![vec![0.5f32]; 20];
        let labels: Vec<usize> = (0..20).map(|i| i % 2).collect();
        let mut weights = vec![1.0f32; 20];
        for (index, weight) in weights.iter_mut().enumerate() {
            if labels[index] == 1 {
                *weight = 5.0;
            }
        }

        let forest = RandomForest::fit(
            &features,
            &labels,
            &weights,
            2,
            &ForestHyperparameters { tree_count: 15, ..Default::default() },
        );

        assert_eq!(forest.predict(&[0.5]), 1);
    }

    #[test]
    fn synthetic_placeholder_matches_requested_dimensions() {
        let placeholder = RandomForest::synthetic(64, 3, 7);
        assert_eq!(placeholder.class_count, 3);
        assert_eq!(placeholder.feature_dimension, 64);

        let distribution = placeholder.predict_proba(&vec![0.0; 64]);
        assert_eq!(distribution.len(), 3);
    }
}
