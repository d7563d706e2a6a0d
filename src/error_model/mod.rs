//! Quality-aware nucleotide substitution model.
//!
//! The model stores `P(observed | reference, quality bucket)` as one
//! probability row per `(bucket, reference)` pair. Rows without supporting
//! observations stay undefined and lookups fall back to the nearest defined
//! bucket for the same reference base. A reference base observed in no
//! bucket at all keeps its previous rows, or a prior row at the mean error
//! rate of the observed bases.

mod buckets;
mod counts;

pub use buckets::QualityBuckets;
pub use counts::SubstitutionCounts;

use tracing::debug;

use crate::align::align;
use crate::config::DenoiseConfig;
use crate::sequence::{base_index, Base, SampleStore, NUM_BASES};
use crate::DenoiseError;

/// Probability row `P(observed | reference)` for one quality bucket.
pub type ErrorRow = [f64; NUM_BASES];

/// Substitution probabilities conditioned on quality bucket.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ErrorModel {
    buckets: QualityBuckets,
    /// Indexed by `bucket * NUM_BASES + reference`.
    rows: Vec<Option<ErrorRow>>,
    pseudocount: f64,
    min_row_observations: u64,
}

impl ErrorModel {
    /// Model where every base is read correctly with probability
    /// `1 - error_rate` and mis-read uniformly as one of the other three.
    pub fn uniform(buckets: QualityBuckets, error_rate: f64) -> Result<Self, DenoiseError> {
        if !(0.0..1.0).contains(&error_rate) {
            return Err(DenoiseError::configuration(format!(
                "error rate {error_rate} outside [0, 1)"
            )));
        }
        let rows = (0..buckets.count() * NUM_BASES)
            .map(|idx| Some(error_row(idx % NUM_BASES, error_rate)))
            .collect();
        Ok(Self {
            buckets,
            rows,
            pseudocount: 1.0,
            min_row_observations: 0,
        })
    }

    /// Bootstrap a model by comparing every unique sequence against the most
    /// abundant sequence of its sample, as if each sample were one cluster.
    pub fn initialize(
        samples: &[SampleStore],
        max_observed_quality: u8,
        config: &DenoiseConfig,
    ) -> Result<Self, DenoiseError> {
        let buckets = QualityBuckets::new(max_observed_quality, config.quality_bucket_count)?;
        let mut counts = SubstitutionCounts::new(buckets);

        for sample in samples {
            let Some(center_idx) = sample.most_abundant() else {
                continue;
            };
            let center = &sample.uniques[center_idx];
            for (idx, unique) in sample.uniques.iter().enumerate() {
                if let Err(reason) = unique.validate() {
                    debug!(sample = %sample.id, idx, %reason, "skipping sequence during initialization");
                    continue;
                }
                let Some(alignment) = align(&center.sequence, &unique.sequence, &config.align) else {
                    continue;
                };
                for (c, r) in alignment.columns() {
                    let (Some(reference), Some(observed)) =
                        (base_index(center.sequence[c]), base_index(unique.sequence[r]))
                    else {
                        continue;
                    };
                    counts.record(unique.quality_profile[r], reference, observed, unique.abundance);
                }
            }
        }

        if counts.total() == 0 {
            return Err(DenoiseError::configuration(
                "cannot initialize error model: no observations in any sample",
            ));
        }

        let empty = Self {
            buckets,
            rows: vec![None; buckets.count() * NUM_BASES],
            pseudocount: config.pseudocount,
            min_row_observations: config.min_row_observations,
        };
        Ok(empty.reestimate(&counts))
    }

    /// Same probabilities, re-estimated later with the given smoothing.
    pub fn with_smoothing(mut self, pseudocount: f64, min_row_observations: u64) -> Self {
        self.pseudocount = pseudocount;
        self.min_row_observations = min_row_observations;
        self
    }

    /// Pseudocount added to every cell on re-estimation.
    pub fn pseudocount(&self) -> f64 {
        self.pseudocount
    }

    /// Quality bucketing of this model.
    pub fn buckets(&self) -> QualityBuckets {
        self.buckets
    }

    /// Defined row for an exact `(bucket, reference)` pair, without fallback.
    pub fn row(&self, bucket: usize, reference: Base) -> Option<&ErrorRow> {
        self.rows
            .get(bucket * NUM_BASES + reference.index())
            .and_then(Option::as_ref)
    }

    /// Row for `(bucket, reference)`, falling back to the nearest defined
    /// bucket. Equidistant candidates resolve to the lower bucket.
    fn resolve_row(&self, bucket: usize, reference: usize) -> Option<&ErrorRow> {
        let count = self.buckets.count();
        let at = |b: usize| self.rows[b * NUM_BASES + reference].as_ref();
        (0..count).find_map(|distance| {
            bucket
                .checked_sub(distance)
                .and_then(at)
                .or_else(|| (bucket + distance < count).then(|| at(bucket + distance)).flatten())
        })
    }

    /// `P(observed | reference, quality)`.
    ///
    /// Fails with a configuration error if no bucket holds estimates for
    /// `reference`.
    pub fn evaluate(
        &self,
        reference: Base,
        observed: Base,
        quality: f64,
    ) -> Result<f64, DenoiseError> {
        let bucket = self.buckets.bucket(quality);
        self.resolve_row(bucket, reference.index())
            .map(|row| row[observed.index()])
            .ok_or_else(|| missing_reference(reference.index()))
    }

    /// Maximum-likelihood update from pooled counts with additive smoothing.
    ///
    /// Rows with no observations (or fewer than the configured minimum)
    /// remain undefined. A reference base left with no defined row in any
    /// bucket carries over this model's rows, or gets a prior row at the
    /// mean error rate of the other bases. The new model takes its bucketing
    /// from `counts`.
    pub fn reestimate(&self, counts: &SubstitutionCounts) -> ErrorModel {
        let buckets = counts.buckets();
        let mut rows: Vec<Option<ErrorRow>> = (0..buckets.count() * NUM_BASES)
            .map(|idx| {
                let row = counts.row(idx / NUM_BASES, idx % NUM_BASES)?;
                let total: u64 = row.iter().sum();
                if total == 0 || total < self.min_row_observations {
                    return None;
                }
                let denom = total as f64 + self.pseudocount * NUM_BASES as f64;
                let mut probs = [0.0; NUM_BASES];
                for (p, &n) in probs.iter_mut().zip(row) {
                    *p = (n as f64 + self.pseudocount) / denom;
                }
                Some(probs)
            })
            .collect();

        let prior_rate = mean_error_rate(&rows);
        let carry_over = self.buckets == buckets;
        for reference in 0..NUM_BASES {
            let observed = (0..buckets.count()).any(|b| rows[b * NUM_BASES + reference].is_some());
            if observed {
                continue;
            }
            debug!(reference, "no observations for reference base, keeping prior rows");
            for bucket in 0..buckets.count() {
                let previous = if carry_over {
                    self.resolve_row(bucket, reference).copied()
                } else {
                    None
                };
                rows[bucket * NUM_BASES + reference] =
                    previous.or_else(|| prior_rate.map(|rate| error_row(reference, rate)));
            }
        }

        ErrorModel {
            buckets,
            rows,
            pseudocount: self.pseudocount,
            min_row_observations: self.min_row_observations,
        }
    }

    /// Largest absolute difference between the two models over every
    /// `(bucket, reference, observed)` cell, after fallback resolution.
    ///
    /// A cell defined in only one model counts as a change of `1.0`; models
    /// with different bucketing are infinitely far apart.
    pub fn max_abs_change(&self, other: &ErrorModel) -> f64 {
        if self.buckets != other.buckets {
            return f64::INFINITY;
        }
        let mut change: f64 = 0.0;
        for bucket in 0..self.buckets.count() {
            for reference in 0..NUM_BASES {
                match (
                    self.resolve_row(bucket, reference),
                    other.resolve_row(bucket, reference),
                ) {
                    (Some(a), Some(b)) => {
                        for (x, y) in a.iter().zip(b) {
                            change = change.max((x - y).abs());
                        }
                    }
                    (None, None) => {}
                    _ => change = change.max(1.0),
                }
            }
        }
        change
    }

    /// Mean probability of a mis-read across defined rows.
    pub fn mean_error_rate(&self) -> f64 {
        mean_error_rate(&self.rows).unwrap_or(0.0)
    }

    /// Dense log-probability table with fallback already applied.
    pub(crate) fn log_table(&self) -> LogErrorTable {
        let rows = (0..self.buckets.count() * NUM_BASES)
            .map(|idx| {
                self.resolve_row(idx / NUM_BASES, idx % NUM_BASES)
                    .map(|row| row.map(f64::ln))
            })
            .collect();
        LogErrorTable {
            buckets: self.buckets,
            rows,
        }
    }
}

fn error_row(reference: usize, error_rate: f64) -> ErrorRow {
    let mut row = [error_rate / 3.0; NUM_BASES];
    row[reference] = 1.0 - error_rate;
    row
}

fn mean_error_rate(rows: &[Option<ErrorRow>]) -> Option<f64> {
    let (sum, n) = rows
        .iter()
        .enumerate()
        .filter_map(|(idx, row)| row.map(|r| 1.0 - r[idx % NUM_BASES]))
        .fold((0.0, 0usize), |(sum, n), e| (sum + e, n + 1));
    (n > 0).then(|| sum / n as f64)
}

fn missing_reference(reference: usize) -> DenoiseError {
    let base = Base::from_index(reference).map_or('?', |b| b.to_ascii() as char);
    DenoiseError::configuration(format!(
        "error model has no estimates for reference base {base} in any quality bucket"
    ))
}

/// Log probabilities for the inner loop of the partition engine.
#[derive(Debug, Clone)]
pub(crate) struct LogErrorTable {
    buckets: QualityBuckets,
    rows: Vec<Option<ErrorRow>>,
}

impl LogErrorTable {
    /// `ln P(observed | reference, quality)`.
    pub(crate) fn ln_prob(
        &self,
        quality: f64,
        reference: usize,
        observed: usize,
    ) -> Result<f64, DenoiseError> {
        let bucket = self.buckets.bucket(quality);
        self.rows[bucket * NUM_BASES + reference]
            .map(|row| row[observed])
            .ok_or_else(|| missing_reference(reference))
    }
}
