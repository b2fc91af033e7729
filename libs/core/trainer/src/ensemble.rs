// [libs/core/trainer/src/ensemble.rs]
/*!
 * =================================================================
 * APARATO: SOFT VOTING ENSEMBLE (V4.0)
 * CLASIFICACIÓN: CORE ENGINE (ESTRATO L2)
 * RESPONSABILIDAD: FUSIÓN PONDERADA DE CLASIFICADORES COMPATIBLES
 *
 * Regla de votación suave: promedio de distribuciones de probabilidad
 * ponderado por miembro, con el clasificador base siempre en la
 * posición cero. Todos los miembros comparten el espacio de rasgos y
 * el conjunto de clases del base.
 * =================================================================
 */

use crate::forest::RandomForest;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct EnsembleMemberEntry {
    forest: RandomForest,
    weight: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoftVotingEnsemble {
    members: Vec<EnsembleMemberEntry>,
}

impl SoftVotingEnsemble {
    /// Ensambla base + miembros de usuario. El peso del base domina por
    /// diseño la votación (defaults 2.0 contra 1.0 por miembro).
    pub fn assemble(
        base_forest: RandomForest,
        base_weight: f32,
        user_members: Vec<(RandomForest, f32)>,
    ) -> Self {
        let mut members = Vec::with_capacity(1 + user_members.len());
        members.push(EnsembleMemberEntry { forest: base_forest, weight: base_weight });
        for (member_forest, member_weight) in user_members {
            members.push(EnsembleMemberEntry { forest: member_forest, weight: member_weight });
        }
        Self { members }
    }

    /// Miembros totales, base incluido.
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Distribución fusionada por votación suave ponderada.
    pub fn predict_proba(&self, features: &[f32]) -> Vec<f32> {
        let class_count = self
            .members
            .first()
            .map(|entry| entry.forest.class_count)
            .unwrap_or(0);
        let mut fused_distribution = vec![0.0f32; class_count];
        let mut total_weight = 0.0f32;

        for member_entry in &self.members {
            let member_distribution = member_entry.forest.predict_proba(features);
            for (slot, probability) in
                fused_distribution.iter_mut().zip(member_distribution.iter())
            {
                *slot += probability * member_entry.weight;
            }
            total_weight += member_entry.weight;
        }

        if total_weight > 0.0 {
            fused_distribution
                .iter_mut()
                .for_each(|slot| *slot /= total_weight);
        }
        fused_distribution
    }

    pub fn predict(&self, features: &[f32]) -> usize {
        self.predict_proba(features)
            .iter()
            .enumerate()
            .max_by(|left, right| {
                left.1
                    .partial_cmp(right.1)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(class_index, _)| class_index)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forest::ForestHyperparameters;

    fn forest_voting_for(class_index: usize) -> RandomForest {
        // Corpus de una sola clase: el bosque vota esa clase siempre.
        let features = vec![vec![0.5f32, 0.5]; 8];
        let labels = vec![class_index; 8];
        let weights = vec![1.0f32; 8];
        RandomForest::fit(
            &features,
            &labels,
            &weights,
            2,
            &ForestHyperparameters { tree_count: 5, ..Default::default() },
        )
    }

    #[test]
    fn base_weight_dominates_a_single_dissenter() {
        let ensemble = SoftVotingEnsemble::assemble(
            forest_voting_for(0),
            2.0,
            vec![(forest_voting_for(1), 1.0)],
        );

        assert_eq!(ensemble.member_count(), 2);
        assert_eq!(ensemble.predict(&[0.5, 0.5]), 0);
    }

    #[test]
    fn unanimous_members_override_the_base() {
        let ensemble = SoftVotingEnsemble::assemble(
            forest_voting_for(0),
            2.0,
            vec![
                (forest_voting_for(1), 1.0),
                (forest_voting_for(1), 1.0),
                (forest_voting_for(1), 1.0),
            ],
        );

        assert_eq!(ensemble.predict(&[0.5, 0.5]), 1);
    }

    #[test]
    fn fused_distribution_is_a_probability_mass() {
        let ensemble = SoftVotingEnsemble::assemble(
            forest_voting_for(0),
            2.0,
            vec![(forest_voting_for(1), 1.0)],
        );

        let distribution = ensemble.predict_proba(&[0.5, 0.5]);
        let mass: f32 = distribution.iter().sum();
        assert!((mass - 1.0).abs() < 1e-4);
    }
}
