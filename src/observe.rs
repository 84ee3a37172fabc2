//! Observable evaluation over a generated network.
//!
//! An observable is a list of counting patterns with sum semantics. For
//! each (observable, species) pair the evaluator precomputes a coefficient:
//! the number of distinct matches of each pattern into the species, which is
//! the embedding count divided by the pattern's automorphism count so a
//! symmetric pattern does not double-count its own images (a homodimer
//! pattern finds a homodimer species once, not twice). Evaluation is then a
//! weighted sum against caller-supplied per-species populations; the
//! evaluator holds no simulation state.

use crate::matcher::{find_embeddings, pattern_automorphisms};
use crate::model::{Model, ObservableId};
use crate::network::{ReactionNetwork, SpeciesId};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Precomputed observable coefficients for one network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservableEvaluator {
    /// `coefficients[observable][species]`.
    coefficients: Vec<Vec<f64>>,
}

impl ObservableEvaluator {
    /// Matches every observable pattern against every network species.
    ///
    /// Species are independent, so the per-species columns are computed on
    /// the rayon pool; output order is index order either way.
    pub fn new(model: &Model, network: &ReactionNetwork) -> Self {
        let coefficients = model
            .observables()
            .map(|(_, obs)| {
                let corrections: Vec<f64> = obs
                    .patterns
                    .iter()
                    .map(|p| pattern_automorphisms(p) as f64)
                    .collect();
                network
                    .species()
                    .par_iter()
                    .map(|entry| {
                        obs.patterns
                            .iter()
                            .zip(&corrections)
                            .map(|(pat, auts)| {
                                find_embeddings(pat, &entry.graph).len() as f64 / auts
                            })
                            .sum()
                    })
                    .collect()
            })
            .collect();
        Self { coefficients }
    }

    /// Matches of the observable per instance of the given species.
    #[inline]
    pub fn coefficient(&self, observable: ObservableId, species: SpeciesId) -> f64 {
        self.coefficients[observable.index()][species.index()]
    }

    /// Weighted sum of the observable over per-species populations.
    ///
    /// `populations[i]` is the population of species `i`.
    ///
    /// # Panics
    /// If the slice length differs from the network's species count.
    pub fn evaluate(&self, observable: ObservableId, populations: &[f64]) -> f64 {
        let row = &self.coefficients[observable.index()];
        assert_eq!(
            row.len(),
            populations.len(),
            "one population per network species"
        );
        row.iter()
            .zip(populations)
            .map(|(c, n)| c * n)
            .sum()
    }
}
