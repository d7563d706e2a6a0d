use std::fmt;

use crate::config::DenoiseConfig;
use crate::stats::ln_poisson_tail_given_nonzero;

/// A non-center sequence evaluated for promotion against its current center.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    /// Index of the sequence in its sample.
    pub index: usize,
    /// Observed read count.
    pub abundance: u64,
    /// `ln` of the read count expected from errors off the current center.
    pub ln_expected: f64,
    /// Number of unique sequences in the sample (multiple-testing factor).
    pub n_sequences: usize,
}

impl Candidate {
    /// Expected read count from errors.
    pub fn expected(&self) -> f64 {
        self.ln_expected.exp()
    }
}

/// Decides which sequences are too abundant to be explained as errors.
///
/// The engine ranks candidates by [`SignificancePolicy::ln_score`] (lower is
/// more significant) and promotes the best one while
/// [`SignificancePolicy::admits`] holds.
pub trait SignificancePolicy: fmt::Debug + Send + Sync {
    /// Short policy name for diagnostics.
    fn name(&self) -> &'static str;

    /// Log-scale score; smaller means less consistent with errors.
    fn ln_score(&self, candidate: &Candidate) -> f64;

    /// Whether a candidate with the given score becomes a new center.
    fn admits(&self, candidate: &Candidate, ln_score: f64) -> bool;
}

/// Poisson abundance test with Bonferroni correction and a fold filter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoissonAbundance {
    ln_omega_a: f64,
    min_fold: f64,
}

impl PoissonAbundance {
    /// Threshold `omega_a` on the corrected p-value and minimum fold over
    /// the expected abundance.
    pub fn new(omega_a: f64, min_fold: f64) -> Self {
        Self {
            ln_omega_a: omega_a.ln(),
            min_fold,
        }
    }

    /// Policy parameters from a run configuration.
    pub fn from_config(config: &DenoiseConfig) -> Self {
        Self::new(config.omega_a, config.min_fold)
    }
}

impl SignificancePolicy for PoissonAbundance {
    fn name(&self) -> &'static str {
        "poisson-abundance"
    }

    fn ln_score(&self, candidate: &Candidate) -> f64 {
        ln_poisson_tail_given_nonzero(candidate.abundance, candidate.ln_expected)
    }

    fn admits(&self, candidate: &Candidate, ln_score: f64) -> bool {
        let corrected = ln_score + (candidate.n_sequences.max(1) as f64).ln();
        corrected < self.ln_omega_a && candidate.abundance as f64 >= self.min_fold * candidate.expected()
    }
}
