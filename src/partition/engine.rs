use std::sync::Arc;

use tracing::{debug, debug_span, warn};

use super::cluster::{InferredVariant, Partition};
use super::significance::{Candidate, PoissonAbundance, SignificancePolicy};
use crate::align::{align, AlignParams};
use crate::config::DenoiseConfig;
use crate::error_model::{ErrorModel, LogErrorTable, SubstitutionCounts};
use crate::sequence::{base_index, SampleId, SampleStore, UniqueSequence};
use crate::DenoiseError;

/// Result of partitioning one sample under a fixed error model.
#[derive(Debug, Clone)]
pub struct PartitionOutcome {
    /// Sample the outcome belongs to.
    pub sample: SampleId,
    /// Partitions in the order their centers were promoted.
    pub partitions: Vec<Partition>,
    /// One variant per partition, by decreasing abundance.
    pub variants: Vec<InferredVariant>,
    /// Transition tallies of every member against its center.
    pub counts: SubstitutionCounts,
    /// Number of centers promoted after the initial one.
    pub promotions: usize,
    /// False when the promotion cap stopped a still-significant sample.
    pub converged: bool,
}

impl PartitionOutcome {
    /// Partition index of every unique sequence.
    pub fn assignment(&self, n_sequences: usize) -> Vec<usize> {
        let mut assignment = vec![0; n_sequences];
        for (p, partition) in self.partitions.iter().enumerate() {
            for &member in &partition.members {
                if let Some(slot) = assignment.get_mut(member) {
                    *slot = p;
                }
            }
        }
        assignment
    }
}

/// Greedy divisive partitioning of a sample into error clusters.
#[derive(Debug, Clone)]
pub struct PartitionEngine {
    model: Arc<ErrorModel>,
    policy: Arc<dyn SignificancePolicy>,
    config: DenoiseConfig,
}

impl PartitionEngine {
    /// Engine using the Poisson abundance test configured by `config`.
    pub fn new(model: Arc<ErrorModel>, config: &DenoiseConfig) -> Self {
        Self {
            model,
            policy: Arc::new(PoissonAbundance::from_config(config)),
            config: config.clone(),
        }
    }

    /// Replace the significance policy.
    pub fn with_policy(mut self, policy: Arc<dyn SignificancePolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Error model in use.
    pub fn model(&self) -> &ErrorModel {
        &self.model
    }

    /// Partition one sample.
    ///
    /// Fails with a data error for empty or malformed samples and with a
    /// configuration error when the model cannot score a center base.
    pub fn partition(&self, sample: &SampleStore) -> Result<PartitionOutcome, DenoiseError> {
        let span = debug_span!("partition", sample = %sample.id, uniques = sample.len());
        let _guard = span.enter();

        validate_sample(sample)?;
        let first = sample
            .most_abundant()
            .ok_or_else(|| DenoiseError::data(&sample.id, "sample holds no sequences"))?;

        let table = self.model.log_table();
        let mut state = PassState::new(sample, first, &table, &self.config.align)?;

        let mut promotions = 0;
        let mut converged = true;
        while let Some((candidate, score)) = state.best_candidate(self.policy.as_ref()) {
            if !self.policy.admits(&candidate, score) {
                break;
            }
            if promotions >= self.config.sample_max_iterations {
                converged = false;
                warn!(
                    sample = %sample.id,
                    cap = self.config.sample_max_iterations,
                    "promotion cap reached with significant sequences remaining"
                );
                break;
            }
            state.promote(candidate.index, &table, &self.config.align)?;
            promotions += 1;
            debug!(
                center = candidate.index,
                abundance = candidate.abundance,
                expected = candidate.expected(),
                ln_p = score,
                "promoted new center"
            );
            state.shuffle(self.config.max_shuffles);
        }

        let partitions = state.partitions();
        let counts = tally(sample, &partitions, &self.model, &self.config.align);
        let variants = variants(sample, &partitions);
        debug!(partitions = partitions.len(), promotions, converged, "sample partitioned");

        Ok(PartitionOutcome {
            sample: Arc::clone(&sample.id),
            partitions,
            variants,
            counts,
            promotions,
            converged,
        })
    }
}

/// Reject empty samples and the first malformed sequence.
pub(crate) fn validate_sample(sample: &SampleStore) -> Result<(), DenoiseError> {
    if sample.is_empty() {
        return Err(DenoiseError::data(&sample.id, "sample holds no sequences"));
    }
    for (idx, unique) in sample.uniques.iter().enumerate() {
        unique
            .validate()
            .map_err(|reason| DenoiseError::data(&sample.id, format!("sequence {idx}: {reason}")))?;
    }
    Ok(())
}

/// `ln lambda`: log probability that `raw` arose from `center` by errors.
/// Unalignable pairs get `-inf`.
fn ln_lambda(
    center: &UniqueSequence,
    raw: &UniqueSequence,
    table: &LogErrorTable,
    params: &AlignParams,
) -> Result<f64, DenoiseError> {
    let Some(alignment) = align(&center.sequence, &raw.sequence, params) else {
        return Ok(f64::NEG_INFINITY);
    };
    let mut total = 0.0;
    for (c, r) in alignment.columns() {
        let (Some(reference), Some(observed)) =
            (base_index(center.sequence[c]), base_index(raw.sequence[r]))
        else {
            continue;
        };
        total += table.ln_prob(raw.quality_profile[r], reference, observed)?;
    }
    Ok(total)
}

/// Mutable clustering state for one pass over one sample.
struct PassState<'a> {
    sample: &'a SampleStore,
    /// Center index per partition, in promotion order.
    centers: Vec<usize>,
    /// `ln_lambda[p][i]`: sequence `i` against the center of partition `p`.
    ln_lambda: Vec<Vec<f64>>,
    assignment: Vec<usize>,
    is_center: Vec<bool>,
    reads: Vec<u64>,
}

impl<'a> PassState<'a> {
    fn new(
        sample: &'a SampleStore,
        first: usize,
        table: &LogErrorTable,
        params: &AlignParams,
    ) -> Result<Self, DenoiseError> {
        let n = sample.len();
        let mut is_center = vec![false; n];
        is_center[first] = true;
        let mut state = Self {
            sample,
            centers: vec![first],
            ln_lambda: Vec::new(),
            assignment: vec![0; n],
            is_center,
            reads: vec![sample.total_abundance()],
        };
        let row = state.compare_all(first, table, params)?;
        state.ln_lambda.push(row);
        Ok(state)
    }

    fn compare_all(
        &self,
        center: usize,
        table: &LogErrorTable,
        params: &AlignParams,
    ) -> Result<Vec<f64>, DenoiseError> {
        let center = &self.sample.uniques[center];
        self.sample
            .uniques
            .iter()
            .map(|raw| ln_lambda(center, raw, table, params))
            .collect()
    }

    /// Most significant non-center sequence. Ties go to the higher
    /// abundance, then the earlier index.
    fn best_candidate(&self, policy: &dyn SignificancePolicy) -> Option<(Candidate, f64)> {
        let n = self.sample.len();
        let mut best: Option<(Candidate, f64)> = None;
        for (i, unique) in self.sample.uniques.iter().enumerate() {
            if self.is_center[i] {
                continue;
            }
            let p = self.assignment[i];
            let candidate = Candidate {
                index: i,
                abundance: unique.abundance,
                ln_expected: self.ln_lambda[p][i] + (self.reads[p] as f64).ln(),
                n_sequences: n,
            };
            let score = policy.ln_score(&candidate);
            let better = match &best {
                None => true,
                Some((held, held_score)) => {
                    score < *held_score
                        || (score == *held_score && candidate.abundance > held.abundance)
                }
            };
            if better {
                best = Some((candidate, score));
            }
        }
        best
    }

    fn promote(
        &mut self,
        index: usize,
        table: &LogErrorTable,
        params: &AlignParams,
    ) -> Result<(), DenoiseError> {
        let row = self.compare_all(index, table, params)?;
        let abundance = self.sample.uniques[index].abundance;
        let old = self.assignment[index];
        self.reads[old] -= abundance;

        self.centers.push(index);
        self.ln_lambda.push(row);
        self.reads.push(abundance);
        self.is_center[index] = true;
        self.assignment[index] = self.centers.len() - 1;
        Ok(())
    }

    /// Move each non-center to the partition maximizing
    /// `ln_lambda + ln(reads)` until stable or `max_rounds` is hit.
    fn shuffle(&mut self, max_rounds: usize) {
        for _ in 0..max_rounds {
            let ln_reads: Vec<f64> = self.reads.iter().map(|&r| (r as f64).ln()).collect();
            let mut moves = Vec::new();
            for i in 0..self.sample.len() {
                if self.is_center[i] {
                    continue;
                }
                let mut best = (f64::NEG_INFINITY, self.assignment[i]);
                for (p, row) in self.ln_lambda.iter().enumerate() {
                    let value = row[i] + ln_reads[p];
                    if value > best.0 {
                        best = (value, p);
                    }
                }
                if best.0 > f64::NEG_INFINITY && best.1 != self.assignment[i] {
                    moves.push((i, best.1));
                }
            }
            if moves.is_empty() {
                return;
            }
            for (i, to) in moves {
                let abundance = self.sample.uniques[i].abundance;
                self.reads[self.assignment[i]] -= abundance;
                self.reads[to] += abundance;
                self.assignment[i] = to;
            }
        }
    }

    fn partitions(&self) -> Vec<Partition> {
        let mut partitions: Vec<Partition> = self
            .centers
            .iter()
            .zip(&self.reads)
            .map(|(&center, &reads)| Partition {
                center,
                members: Vec::new(),
                reads,
            })
            .collect();
        for (i, &p) in self.assignment.iter().enumerate() {
            partitions[p].members.push(i);
        }
        partitions
    }
}

fn tally(
    sample: &SampleStore,
    partitions: &[Partition],
    model: &ErrorModel,
    params: &AlignParams,
) -> SubstitutionCounts {
    let mut counts = SubstitutionCounts::new(model.buckets());
    for partition in partitions {
        let center = &sample.uniques[partition.center];
        for &member in &partition.members {
            let raw = &sample.uniques[member];
            let Some(alignment) = align(&center.sequence, &raw.sequence, params) else {
                continue;
            };
            for (c, r) in alignment.columns() {
                if let (Some(reference), Some(observed)) =
                    (base_index(center.sequence[c]), base_index(raw.sequence[r]))
                {
                    counts.record(raw.quality_profile[r], reference, observed, raw.abundance);
                }
            }
        }
    }
    counts
}

fn variants(sample: &SampleStore, partitions: &[Partition]) -> Vec<InferredVariant> {
    let mut variants: Vec<InferredVariant> = partitions
        .iter()
        .map(|partition| InferredVariant {
            source_sample: Arc::clone(&sample.id),
            sequence: Arc::clone(&sample.uniques[partition.center].sequence),
            abundance: partition.reads,
            center_index: partition.center,
            member_indices: partition.members.clone(),
        })
        .collect();
    variants.sort_by(|a, b| {
        b.abundance
            .cmp(&a.abundance)
            .then_with(|| a.center_index.cmp(&b.center_index))
    });
    variants
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_model::QualityBuckets;

    fn engine(error_rate: f64) -> PartitionEngine {
        let buckets = QualityBuckets::new(40, None).unwrap();
        let model = ErrorModel::uniform(buckets, error_rate).unwrap();
        PartitionEngine::new(Arc::new(model), &DenoiseConfig::default())
    }

    fn uniq(seq: &str, abundance: u64) -> UniqueSequence {
        UniqueSequence::with_uniform_quality(seq, abundance, 30.0)
    }

    #[test]
    fn single_sequence_sample_is_one_partition() {
        let sample = SampleStore::new("s1", vec![uniq("ACGTACGTAC", 25)]);
        let outcome = engine(0.01).partition(&sample).unwrap();

        assert_eq!(outcome.partitions.len(), 1);
        assert_eq!(outcome.partitions[0].members, vec![0]);
        assert_eq!(outcome.variants[0].abundance, 25);
        assert_eq!(outcome.variants[0].as_str(), "ACGTACGTAC");
        assert_eq!(outcome.counts.mismatches(), 0);
        assert_eq!(outcome.counts.total(), 250);
        assert!(outcome.converged);
    }

    #[test]
    fn distant_abundant_sequence_becomes_a_center() {
        let sample = SampleStore::new(
            "s1",
            vec![
                uniq("ACGTACGTACGTACGTACGT", 500),
                uniq("TCCTTCCTTCCTTCCTTCCT", 200),
                uniq("AGGTACGTACGTACGTACGT", 2),
            ],
        );
        let outcome = engine(0.005).partition(&sample).unwrap();

        assert_eq!(outcome.partitions.len(), 2);
        assert_eq!(outcome.promotions, 1);
        assert_eq!(outcome.partitions[0].members, vec![0, 2]);
        assert_eq!(outcome.partitions[1].members, vec![1]);
        assert_eq!(outcome.variants[0].abundance, 502);
        assert_eq!(outcome.variants[1].abundance, 200);
        assert_eq!(outcome.counts.mismatches(), 2);
        assert_eq!(outcome.assignment(3), vec![0, 1, 0]);
    }

    #[test]
    fn equal_candidates_promote_in_input_order() {
        let sample = SampleStore::new(
            "s1",
            vec![
                uniq("ACGTACGTACGTACGTACGT", 1000),
                uniq("TGCATGCATGCATGCATGCA", 50),
                uniq("CATGCATGCATGCATGCATG", 50),
            ],
        );
        let outcome = engine(0.01).partition(&sample).unwrap();
        let centers: Vec<usize> = outcome.partitions.iter().map(|p| p.center).collect();
        assert_eq!(centers, vec![0, 1, 2]);
    }

    #[test]
    fn promotion_cap_marks_sample_unconverged() {
        let sample = SampleStore::new(
            "s1",
            vec![
                uniq("ACGTACGTACGTACGTACGT", 1000),
                uniq("TGCATGCATGCATGCATGCA", 50),
                uniq("CATGCATGCATGCATGCATG", 50),
            ],
        );
        let buckets = QualityBuckets::new(40, None).unwrap();
        let model = Arc::new(ErrorModel::uniform(buckets, 0.01).unwrap());
        let config = DenoiseConfig::default().with_sample_max_iterations(1);
        let outcome = PartitionEngine::new(model, &config).partition(&sample).unwrap();

        assert!(!outcome.converged);
        assert_eq!(outcome.promotions, 1);
        assert_eq!(outcome.partitions.len(), 2);
    }

    #[test]
    fn malformed_sample_is_a_data_error() {
        let sample = SampleStore::new("bad", vec![UniqueSequence::new("ACGT", 3, vec![30.0; 2])]);
        let err = engine(0.01).partition(&sample).unwrap_err();
        assert!(matches!(err, DenoiseError::Data { .. }));
        assert!(err.to_string().contains("does not match"));

        let empty = SampleStore::new("empty", Vec::new());
        assert!(matches!(
            engine(0.01).partition(&empty),
            Err(DenoiseError::Data { .. })
        ));
    }
}
