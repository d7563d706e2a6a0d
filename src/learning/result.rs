use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;

use crate::error_model::ErrorModel;
use crate::partition::{InferredVariant, Partition};
use crate::sequence::{Base, SampleId};
use crate::DenoiseError;

/// How error-model learning ended.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Convergence {
    /// Model change fell below tolerance.
    Converged {
        /// Learning iterations run.
        iterations: usize,
    },
    /// Iteration cap hit; the last model was used as-is.
    IterationCapReached {
        /// Learning iterations run.
        iterations: usize,
        /// Model change in the final iteration.
        last_change: f64,
    },
}

impl Convergence {
    /// Learning iterations run.
    pub fn iterations(&self) -> usize {
        match self {
            Convergence::Converged { iterations }
            | Convergence::IterationCapReached { iterations, .. } => *iterations,
        }
    }

    /// Whether the model converged.
    pub fn is_converged(&self) -> bool {
        matches!(self, Convergence::Converged { .. })
    }
}

/// Non-fatal signal that an iteration cap stopped work early.
#[derive(Debug, Clone, PartialEq, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum NonConvergenceWarning {
    /// The learning loop exhausted its iteration cap.
    #[error("error model did not converge after {iterations} iterations (last change {last_change:e})")]
    ErrorModel {
        /// Iterations run.
        iterations: usize,
        /// Model change in the final iteration.
        last_change: f64,
    },
    /// A sample pass exhausted its promotion cap.
    #[error("sample {sample} stopped after {promotions} promotions with significant sequences left")]
    Sample {
        /// Affected sample.
        sample: SampleId,
        /// Promotions performed.
        promotions: usize,
    },
}

/// Summary of one learning iteration.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct IterationRecord {
    /// 1-based iteration number.
    pub iteration: usize,
    /// Largest cell change between the model used and the model produced.
    pub max_change: f64,
    /// Mean mis-read probability of the produced model.
    pub mean_error_rate: f64,
    /// Samples partitioned successfully.
    pub samples_partitioned: usize,
    /// Samples whose pass failed this iteration.
    pub samples_failed: Vec<SampleId>,
}

/// Everything the run observed besides the variants themselves.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Diagnostics {
    /// One record per learning iteration.
    pub iterations: Vec<IterationRecord>,
    /// Cap-related warnings.
    pub warnings: Vec<NonConvergenceWarning>,
    /// Samples excluded from the result and why.
    pub failed_samples: BTreeMap<SampleId, DenoiseError>,
}

/// Final-pass outcome for one sample.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SampleResult {
    /// Variants by decreasing abundance.
    pub variants: Vec<InferredVariant>,
    /// Partitions in promotion order.
    pub partitions: Vec<Partition>,
    /// Centers promoted after the initial one.
    pub promotions: usize,
    /// False when the promotion cap was hit.
    pub converged: bool,
}

/// Output of a full denoising run.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DenoiseResult {
    /// Per-sample outcomes keyed by sample id.
    pub samples: BTreeMap<SampleId, SampleResult>,
    /// Frozen model used for the final pass.
    pub error_model: Arc<ErrorModel>,
    /// How learning ended.
    pub convergence: Convergence,
    /// Iteration trace, warnings and failures.
    pub diagnostics: Diagnostics,
}

impl DenoiseResult {
    /// True only if the model converged and no sample hit its cap.
    pub fn is_converged(&self) -> bool {
        self.convergence.is_converged() && self.samples.values().all(|s| s.converged)
    }

    /// Variants of one sample.
    pub fn variants(&self, sample: &str) -> Option<&[InferredVariant]> {
        self.samples.get(sample).map(|s| s.variants.as_slice())
    }

    /// Total number of variants across samples.
    pub fn variant_count(&self) -> usize {
        self.samples.values().map(|s| s.variants.len()).sum()
    }

    /// Stable digest of the variants and the final error model.
    pub fn fingerprint(&self) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new();
        for (id, sample) in &self.samples {
            hasher.update(id.as_bytes());
            hasher.update(&[0]);
            for variant in &sample.variants {
                hasher.update(&variant.sequence);
                hasher.update(&variant.abundance.to_le_bytes());
                for &member in &variant.member_indices {
                    hasher.update(&(member as u64).to_le_bytes());
                }
            }
        }
        let buckets = self.error_model.buckets();
        for bucket in 0..buckets.count() {
            for base in Base::ALL {
                match self.error_model.row(bucket, base) {
                    Some(row) => {
                        for p in row {
                            hasher.update(&p.to_bits().to_le_bytes());
                        }
                    }
                    None => {
                        hasher.update(&[0xff]);
                    }
                }
            }
        }
        hasher.finalize()
    }
}
