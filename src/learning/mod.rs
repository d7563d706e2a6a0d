//! Alternating error-model estimation and sample partitioning.
//!
//! Each iteration partitions every sample against the current model in
//! parallel, pools the substitution counts of all partitions, and
//! re-estimates the model. Learning stops when the model stops moving or the
//! iteration cap is reached; a final pass with the frozen model produces the
//! reported variants.

mod result;
mod state;

pub use result::{
    Convergence, DenoiseResult, Diagnostics, IterationRecord, NonConvergenceWarning, SampleResult,
};
pub use state::LoopState;

use std::collections::BTreeMap;
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{info, info_span, warn};

use crate::config::DenoiseConfig;
use crate::error_model::{ErrorModel, SubstitutionCounts};
use crate::partition::{
    validate_sample, PartitionEngine, PartitionOutcome, PoissonAbundance, SignificancePolicy,
};
use crate::sequence::{SampleId, SampleStore};
use crate::DenoiseError;

type PassResults = Vec<(SampleId, Result<PartitionOutcome, DenoiseError>)>;

/// Driver for the learning state machine.
#[derive(Debug)]
pub struct LearningLoop {
    config: DenoiseConfig,
    policy: Arc<dyn SignificancePolicy>,
    samples: Vec<SampleStore>,
    state: LoopState,
    model: Option<Arc<ErrorModel>>,
    pending: Vec<PartitionOutcome>,
    last_change: f64,
    diagnostics: Diagnostics,
    pool: Option<rayon::ThreadPool>,
}

impl LearningLoop {
    /// Prepare a run over `samples`.
    pub fn new(samples: Vec<SampleStore>, config: DenoiseConfig) -> Result<Self, DenoiseError> {
        config.validate()?;
        if samples.is_empty() {
            return Err(DenoiseError::configuration("no samples provided"));
        }
        let pool = config
            .threads
            .map(|threads| {
                rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()
                    .map_err(|e| DenoiseError::configuration(format!("thread pool: {e}")))
            })
            .transpose()?;
        Ok(Self {
            policy: Arc::new(PoissonAbundance::from_config(&config)),
            config,
            samples,
            state: LoopState::Initializing,
            model: None,
            pending: Vec::new(),
            last_change: f64::INFINITY,
            diagnostics: Diagnostics::default(),
            pool,
        })
    }

    /// Replace the significance policy used by every pass.
    pub fn with_policy(mut self, policy: Arc<dyn SignificancePolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Start from a known model instead of bootstrapping one. Re-estimation
    /// uses the smoothing settings of this run's configuration.
    pub fn with_initial_model(mut self, model: ErrorModel) -> Self {
        let model = model.with_smoothing(self.config.pseudocount, self.config.min_row_observations);
        self.model = Some(Arc::new(model));
        self
    }

    /// Current state.
    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Current error model, once initialized.
    pub fn model(&self) -> Option<&ErrorModel> {
        self.model.as_deref()
    }

    /// Diagnostics gathered so far.
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Advance one transition. Terminal states are left unchanged.
    pub fn step(&mut self) -> Result<LoopState, DenoiseError> {
        self.state = match self.state {
            LoopState::Initializing => {
                self.initialize()?;
                LoopState::PartitioningPerSample { iteration: 1 }
            }
            LoopState::PartitioningPerSample { iteration } => {
                let model = self.current_model()?;
                let span = info_span!("iteration", iteration);
                let _guard = span.enter();

                let mut failed = Vec::new();
                for (sample, outcome) in self.run_pass(&model) {
                    match outcome {
                        Ok(outcome) => self.pending.push(outcome),
                        Err(err) => {
                            warn!(%sample, error = %err, "sample pass failed");
                            failed.push(sample);
                        }
                    }
                }
                if self.pending.is_empty() {
                    return Err(DenoiseError::AllSamplesFailed {
                        iteration,
                        failures: failed.len(),
                    });
                }
                self.diagnostics.iterations.push(IterationRecord {
                    iteration,
                    max_change: f64::NAN,
                    mean_error_rate: f64::NAN,
                    samples_partitioned: self.pending.len(),
                    samples_failed: failed,
                });
                LoopState::Aggregating { iteration }
            }
            LoopState::Aggregating { iteration } => {
                let model = self.current_model()?;
                let mut pooled = SubstitutionCounts::new(model.buckets());
                for outcome in self.pending.drain(..) {
                    pooled.merge(&outcome.counts);
                }
                let next = model.reestimate(&pooled);
                let change = model.max_abs_change(&next);
                let mean_error_rate = next.mean_error_rate();
                if let Some(record) = self.diagnostics.iterations.last_mut() {
                    record.max_change = change;
                    record.mean_error_rate = mean_error_rate;
                }
                info!(
                    iteration,
                    max_change = change,
                    mean_error_rate,
                    observations = pooled.total(),
                    substitutions = pooled.mismatches(),
                    "error model re-estimated"
                );
                self.model = Some(Arc::new(next));
                self.last_change = change;

                if change < self.config.convergence_tolerance {
                    LoopState::Converged {
                        iterations: iteration,
                    }
                } else if iteration >= self.config.max_iterations {
                    let warning = NonConvergenceWarning::ErrorModel {
                        iterations: iteration,
                        last_change: change,
                    };
                    warn!("{warning}");
                    self.diagnostics.warnings.push(warning);
                    LoopState::IterationCapReached {
                        iterations: iteration,
                    }
                } else {
                    LoopState::PartitioningPerSample {
                        iteration: iteration + 1,
                    }
                }
            }
            terminal => terminal,
        };
        Ok(self.state)
    }

    /// Learn the model to a terminal state, then partition every sample
    /// once more with the frozen model.
    pub fn run(mut self) -> Result<DenoiseResult, DenoiseError> {
        while !self.state.is_terminal() {
            self.step()?;
        }
        let model = self.current_model()?;
        let convergence = match self.state {
            LoopState::Converged { iterations } => Convergence::Converged { iterations },
            _ => Convergence::IterationCapReached {
                iterations: self.state.iterations().unwrap_or(0),
                last_change: self.last_change,
            },
        };

        let span = info_span!("final_pass");
        let _guard = span.enter();
        let mut samples = BTreeMap::new();
        for (sample, outcome) in self.run_pass(&model) {
            match outcome {
                Ok(outcome) => {
                    if !outcome.converged {
                        self.diagnostics.warnings.push(NonConvergenceWarning::Sample {
                            sample: Arc::clone(&sample),
                            promotions: outcome.promotions,
                        });
                    }
                    samples.insert(
                        sample,
                        SampleResult {
                            variants: outcome.variants,
                            partitions: outcome.partitions,
                            promotions: outcome.promotions,
                            converged: outcome.converged,
                        },
                    );
                }
                Err(err) => {
                    warn!(%sample, error = %err, "final pass failed");
                    self.diagnostics.failed_samples.insert(sample, err);
                }
            }
        }
        if samples.is_empty() {
            return Err(DenoiseError::AllSamplesFailed {
                iteration: convergence.iterations() + 1,
                failures: self.diagnostics.failed_samples.len(),
            });
        }

        let variants: usize = samples.values().map(|s: &SampleResult| s.variants.len()).sum();
        info!(
            samples = samples.len(),
            variants,
            converged = convergence.is_converged(),
            "denoising finished"
        );
        Ok(DenoiseResult {
            samples,
            error_model: model,
            convergence,
            diagnostics: self.diagnostics,
        })
    }

    /// Drop unusable samples and bootstrap the model if none was supplied.
    fn initialize(&mut self) -> Result<(), DenoiseError> {
        let mut usable = Vec::with_capacity(self.samples.len());
        for sample in std::mem::take(&mut self.samples) {
            match validate_sample(&sample) {
                Ok(()) => usable.push(sample),
                Err(err) => {
                    warn!(sample = %sample.id, error = %err, "excluding sample");
                    self.diagnostics.failed_samples.insert(Arc::clone(&sample.id), err);
                }
            }
        }
        if usable.is_empty() {
            return Err(DenoiseError::AllSamplesFailed {
                iteration: 0,
                failures: self.diagnostics.failed_samples.len(),
            });
        }
        self.samples = usable;

        if self.model.is_none() {
            let max_quality = self
                .samples
                .iter()
                .map(SampleStore::max_quality)
                .fold(0.0, f64::max)
                .ceil()
                .min(f64::from(u8::MAX)) as u8;
            let model = ErrorModel::initialize(&self.samples, max_quality, &self.config)?;
            info!(
                samples = self.samples.len(),
                max_quality,
                mean_error_rate = model.mean_error_rate(),
                "error model initialized"
            );
            self.model = Some(Arc::new(model));
        }
        Ok(())
    }

    fn current_model(&self) -> Result<Arc<ErrorModel>, DenoiseError> {
        self.model
            .clone()
            .ok_or_else(|| DenoiseError::configuration("error model not initialized"))
    }

    fn run_pass(&self, model: &Arc<ErrorModel>) -> PassResults {
        let engine = PartitionEngine::new(Arc::clone(model), &self.config)
            .with_policy(Arc::clone(&self.policy));
        let pass = || -> PassResults {
            self.samples
                .par_iter()
                .map(|sample| (Arc::clone(&sample.id), engine.partition(sample)))
                .collect()
        };
        match &self.pool {
            Some(pool) => pool.install(pass),
            None => pass(),
        }
    }
}
