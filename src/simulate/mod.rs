//! Synthetic amplicon samples with a known substitution process.
//!
//! Reads are copied from true template sequences; the number of errors per
//! read is binomial in the read length and each error replaces the base with
//! one of the other three uniformly. Every base gets the same quality score,
//! so the generating process is exactly an error model with one defined
//! bucket.

use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use rand_distr::{Binomial, Distribution};
use tracing::debug;

use crate::sequence::{Base, SampleStore, NUM_BASES};
use crate::DenoiseError;

/// Seeded generator of dereplicated amplicon samples.
#[derive(Debug, Clone)]
pub struct AmpliconSimulator {
    templates: Vec<Vec<u8>>,
    substitution_rate: f64,
    quality: u8,
    seed: u64,
}

impl AmpliconSimulator {
    /// Simulator over the given true sequences.
    pub fn new(
        templates: Vec<Vec<u8>>,
        substitution_rate: f64,
        quality: u8,
        seed: u64,
    ) -> Result<Self, DenoiseError> {
        if !(0.0..=1.0).contains(&substitution_rate) {
            return Err(DenoiseError::configuration(format!(
                "substitution rate {substitution_rate} outside [0, 1]"
            )));
        }
        if templates.is_empty() || templates.iter().any(Vec::is_empty) {
            return Err(DenoiseError::configuration(
                "simulation needs at least one non-empty template",
            ));
        }
        let templates = templates
            .into_iter()
            .map(|t| t.to_ascii_uppercase())
            .collect::<Vec<_>>();
        if templates
            .iter()
            .flatten()
            .any(|&b| Base::from_ascii(b).is_none())
        {
            return Err(DenoiseError::configuration(
                "templates may only contain A, C, G and T",
            ));
        }
        Ok(Self {
            templates,
            substitution_rate,
            quality,
            seed,
        })
    }

    /// `count` random templates of length `len`.
    pub fn random_templates(count: usize, len: usize, seed: u64) -> Vec<Vec<u8>> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..count)
            .map(|_| {
                (0..len)
                    .map(|_| Base::ALL[rng.gen_range(0..NUM_BASES)].to_ascii())
                    .collect()
            })
            .collect()
    }

    /// True sequences reads are drawn from.
    pub fn templates(&self) -> &[Vec<u8>] {
        &self.templates
    }

    /// Generate one dereplicated sample per `(id, reads per template)` entry.
    ///
    /// Missing trailing abundances count as zero. Output depends only on the
    /// seed and the layout.
    pub fn generate<S: AsRef<str>>(&self, layout: &[(S, Vec<u64>)]) -> Result<Vec<SampleStore>, DenoiseError> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        layout
            .iter()
            .map(|(id, abundances)| {
                let mut reads = Vec::new();
                for (template, &n) in self.templates.iter().zip(abundances) {
                    let errors = Binomial::new(template.len() as u64, self.substitution_rate)
                        .map_err(|e| DenoiseError::configuration(format!("error distribution: {e}")))?;
                    for _ in 0..n {
                        reads.push(self.read(template, &errors, &mut rng));
                    }
                }
                let quals = vec![self.quality; reads.iter().map(Vec::len).max().unwrap_or(0)];
                debug!(sample = id.as_ref(), reads = reads.len(), "simulated sample");
                Ok(SampleStore::dereplicate(
                    id.as_ref(),
                    reads.iter().map(|read| (read.as_slice(), &quals[..read.len()])),
                ))
            })
            .collect()
    }

    fn read(&self, template: &[u8], errors: &Binomial, rng: &mut StdRng) -> Vec<u8> {
        let mut read = template.to_vec();
        let k = errors.sample(rng) as usize;
        for pos in index::sample(rng, read.len(), k.min(read.len())) {
            let Some(base) = Base::from_ascii(read[pos]) else {
                continue;
            };
            let shift = rng.gen_range(1..NUM_BASES);
            if let Some(other) = Base::from_index((base.index() + shift) % NUM_BASES) {
                read[pos] = other.to_ascii();
            }
        }
        read
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_samples() {
        let templates = AmpliconSimulator::random_templates(2, 50, 7);
        let sim = AmpliconSimulator::new(templates, 0.01, 30, 11).unwrap();
        let layout = vec![("a", vec![100, 40])];
        let first = sim.generate(&layout).unwrap();
        let second = sim.generate(&layout).unwrap();
        assert_eq!(first[0].uniques, second[0].uniques);
        assert_eq!(first[0].total_abundance(), 140);
    }

    #[test]
    fn error_free_reads_collapse_to_templates() {
        let templates = AmpliconSimulator::random_templates(3, 40, 1);
        let sim = AmpliconSimulator::new(templates.clone(), 0.0, 35, 2).unwrap();
        let samples = sim.generate(&[("s", vec![30, 20, 10])]).unwrap();

        let store = &samples[0];
        assert_eq!(store.len(), 3);
        assert_eq!(store.uniques[0].sequence.as_ref(), templates[0].as_slice());
        assert_eq!(store.uniques[0].abundance, 30);
        assert_eq!(store.uniques[2].quality_profile[0], 35.0);
    }

    #[test]
    fn rejects_bad_parameters() {
        assert!(AmpliconSimulator::new(vec![b"ACGT".to_vec()], 1.5, 30, 0).is_err());
        assert!(AmpliconSimulator::new(vec![b"ACNT".to_vec()], 0.1, 30, 0).is_err());
        assert!(AmpliconSimulator::new(Vec::new(), 0.1, 30, 0).is_err());
    }
}
