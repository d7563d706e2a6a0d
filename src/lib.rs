//! # Amplicon sequence variant inference
//!
//! Resolves exact biological sequences from noisy amplicon reads by
//! separating true variants from sequencing errors with a learned,
//! quality-aware substitution model.
//!
//! ## Core Algorithm
//!
//! 1. **Initialization**: bootstrap `P(observed | reference, quality)` by
//!    treating each sample as a single cluster around its most abundant
//!    sequence
//! 2. **Partitioning**: per sample, promote sequences that are too abundant
//!    to be errors of their center (Poisson abundance test, Bonferroni
//!    corrected) and reassign members to their most likely center
//! 3. **Re-estimation**: pool member-vs-center substitutions across samples
//!    and update the model
//! 4. **Repeat** until the model stops changing, then partition once more
//!    with the frozen model
//!
//! ## Usage Example
//!
//! ```no_run
//! use asv_denoise::{denoise, DenoiseConfig, SampleStore, UniqueSequence};
//!
//! let sample = SampleStore::new(
//!     "s1",
//!     vec![
//!         UniqueSequence::with_uniform_quality("ACGTACGTAC", 120, 30.0),
//!         UniqueSequence::with_uniform_quality("ACGTACGTAA", 2, 30.0),
//!     ],
//! );
//! let result = denoise(vec![sample], DenoiseConfig::default())?;
//! for variant in result.variants("s1").unwrap_or_default() {
//!     println!("{}\t{}", variant.as_str(), variant.abundance);
//! }
//! # Ok::<(), asv_denoise::DenoiseError>(())
//! ```

#![warn(missing_docs, missing_debug_implementations)]

pub mod align;       // Center-vs-sequence column pairing
pub mod config;      // Run configuration
pub mod error_model; // Quality-aware substitution model
pub mod io;          // TSV readers and writers
pub mod learning;    // Error-model learning loop
pub mod partition;   // Per-sample divisive partitioning
pub mod sequence;    // Alphabet and unique-sequence store
pub mod simulate;    // Synthetic amplicon data
pub mod stats;       // Log-space Poisson tail probabilities

// Re-exports for convenience
pub use config::DenoiseConfig;
pub use error_model::{ErrorModel, QualityBuckets, SubstitutionCounts};
pub use learning::{
    Convergence, DenoiseResult, Diagnostics, LearningLoop, LoopState, NonConvergenceWarning,
    SampleResult,
};
pub use partition::{
    InferredVariant, Partition, PartitionEngine, PartitionOutcome, PoissonAbundance,
    SignificancePolicy,
};
pub use sequence::{Base, SampleId, SampleStore, UniqueSequence};

use thiserror::Error;

/// Learn an error model from `samples` and infer their variants.
pub fn denoise(
    samples: Vec<SampleStore>,
    config: DenoiseConfig,
) -> Result<DenoiseResult, DenoiseError> {
    LearningLoop::new(samples, config)?.run()
}

/// Errors raised while denoising.
#[derive(Error, Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum DenoiseError {
    /// Invalid parameters, or an error model unable to score the data
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Malformed sample input
    #[error("Data error in sample '{sample}': {message}")]
    Data {
        /// Offending sample
        sample: String,
        /// What was wrong
        message: String,
    },

    /// No sample could be processed
    #[error("All samples failed in iteration {iteration} ({failures} failures)")]
    AllSamplesFailed {
        /// Iteration in which the last sample dropped out (0: validation)
        iteration: usize,
        /// Number of failed samples
        failures: usize,
    },
}

impl DenoiseError {
    /// Build a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        DenoiseError::Configuration(message.into())
    }

    /// Build a data error for `sample`.
    pub fn data(sample: &str, message: impl Into<String>) -> Self {
        DenoiseError::Data {
            sample: sample.to_string(),
            message: message.into(),
        }
    }
}
