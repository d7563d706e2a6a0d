//! Tunables for the learning loop and the partition engine.

use crate::align::AlignParams;
use crate::DenoiseError;

/// Configuration shared by the learning loop and every partition pass.
#[derive(Debug, Clone, PartialEq)]
pub struct DenoiseConfig {
    /// Cap on error-model learning iterations.
    pub max_iterations: usize,
    /// Cap on center promotions within one sample pass.
    pub sample_max_iterations: usize,
    /// Learning stops once the largest cell change falls below this value.
    pub convergence_tolerance: f64,
    /// Bonferroni-corrected significance threshold for promotion.
    pub omega_a: f64,
    /// Minimum ratio of observed to expected abundance for promotion.
    pub min_fold: f64,
    /// Number of quality buckets (`None`: one per integer score).
    pub quality_bucket_count: Option<usize>,
    /// Additive smoothing applied to every cell during re-estimation.
    pub pseudocount: f64,
    /// Rows backed by fewer observations are left undefined.
    pub min_row_observations: u64,
    /// Cap on reassignment rounds after each promotion.
    pub max_shuffles: usize,
    /// Alignment scoring for sequences of unequal length.
    pub align: AlignParams,
    /// Worker threads for per-sample passes (`None`: rayon default).
    pub threads: Option<usize>,
}

impl Default for DenoiseConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            sample_max_iterations: 10_000,
            convergence_tolerance: 1e-6,
            omega_a: 1e-40,
            min_fold: 1.0,
            quality_bucket_count: None,
            pseudocount: 1.0,
            min_row_observations: 0,
            max_shuffles: 10,
            align: AlignParams::default(),
            threads: None,
        }
    }
}

impl DenoiseConfig {
    /// Set the learning iteration cap.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the per-sample promotion cap.
    pub fn with_sample_max_iterations(mut self, cap: usize) -> Self {
        self.sample_max_iterations = cap;
        self
    }

    /// Set the convergence tolerance.
    pub fn with_convergence_tolerance(mut self, tolerance: f64) -> Self {
        self.convergence_tolerance = tolerance;
        self
    }

    /// Set the significance threshold.
    pub fn with_omega_a(mut self, omega_a: f64) -> Self {
        self.omega_a = omega_a;
        self
    }

    /// Set the minimum fold over expected abundance.
    pub fn with_min_fold(mut self, min_fold: f64) -> Self {
        self.min_fold = min_fold;
        self
    }

    /// Set the number of quality buckets.
    pub fn with_quality_bucket_count(mut self, count: Option<usize>) -> Self {
        self.quality_bucket_count = count;
        self
    }

    /// Set the re-estimation pseudocount.
    pub fn with_pseudocount(mut self, pseudocount: f64) -> Self {
        self.pseudocount = pseudocount;
        self
    }

    /// Set the minimum observations for a defined row.
    pub fn with_min_row_observations(mut self, min: u64) -> Self {
        self.min_row_observations = min;
        self
    }

    /// Set the reassignment round cap.
    pub fn with_max_shuffles(mut self, max_shuffles: usize) -> Self {
        self.max_shuffles = max_shuffles;
        self
    }

    /// Set alignment parameters.
    pub fn with_align_params(mut self, align: AlignParams) -> Self {
        self.align = align;
        self
    }

    /// Set the worker thread count.
    pub fn with_threads(mut self, threads: Option<usize>) -> Self {
        self.threads = threads;
        self
    }

    /// Reject settings no run could honor.
    pub fn validate(&self) -> Result<(), DenoiseError> {
        if self.max_iterations == 0 {
            return Err(DenoiseError::configuration("max_iterations must be > 0"));
        }
        if self.sample_max_iterations == 0 {
            return Err(DenoiseError::configuration(
                "sample_max_iterations must be > 0",
            ));
        }
        if !self.convergence_tolerance.is_finite() || self.convergence_tolerance < 0.0 {
            return Err(DenoiseError::configuration(format!(
                "convergence_tolerance must be finite and >= 0, got {}",
                self.convergence_tolerance
            )));
        }
        if !(self.omega_a > 0.0 && self.omega_a <= 1.0) {
            return Err(DenoiseError::configuration(format!(
                "omega_a must lie in (0, 1], got {}",
                self.omega_a
            )));
        }
        if !self.min_fold.is_finite() || self.min_fold < 0.0 {
            return Err(DenoiseError::configuration(format!(
                "min_fold must be finite and >= 0, got {}",
                self.min_fold
            )));
        }
        if self.quality_bucket_count == Some(0) {
            return Err(DenoiseError::configuration(
                "quality_bucket_count must be > 0",
            ));
        }
        if !self.pseudocount.is_finite() || self.pseudocount < 0.0 {
            return Err(DenoiseError::configuration(format!(
                "pseudocount must be finite and >= 0, got {}",
                self.pseudocount
            )));
        }
        if self.max_shuffles == 0 {
            return Err(DenoiseError::configuration("max_shuffles must be > 0"));
        }
        if self.threads == Some(0) {
            return Err(DenoiseError::configuration("threads must be > 0"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(DenoiseConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_settings() {
        let bad = [
            DenoiseConfig::default().with_max_iterations(0),
            DenoiseConfig::default().with_omega_a(0.0),
            DenoiseConfig::default().with_omega_a(1.5),
            DenoiseConfig::default().with_pseudocount(-1.0),
            DenoiseConfig::default().with_convergence_tolerance(f64::NAN),
            DenoiseConfig::default().with_quality_bucket_count(Some(0)),
            DenoiseConfig::default().with_threads(Some(0)),
        ];
        for config in bad {
            assert!(
                matches!(config.validate(), Err(DenoiseError::Configuration(_))),
                "{config:?} should be rejected"
            );
        }
    }
}
