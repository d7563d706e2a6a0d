use std::collections::HashMap;
use std::sync::Arc;

use super::UniqueSequence;

/// Sample identifier shared between stores, partitions and variants.
pub type SampleId = Arc<str>;

/// Unique sequences observed in one sample.
#[derive(Debug, Clone)]
pub struct SampleStore {
    /// Sample identifier.
    pub id: SampleId,
    /// Unique sequences in input order.
    pub uniques: Vec<UniqueSequence>,
}

impl SampleStore {
    /// Wrap already dereplicated sequences.
    pub fn new(id: impl Into<SampleId>, uniques: Vec<UniqueSequence>) -> Self {
        Self {
            id: id.into(),
            uniques,
        }
    }

    /// Collapse raw reads into unique sequences.
    ///
    /// Qualities are averaged per position over all reads sharing a sequence.
    /// The result is ordered by decreasing abundance, then lexicographically.
    pub fn dereplicate<I, S, Q>(id: impl Into<SampleId>, reads: I) -> Self
    where
        I: IntoIterator<Item = (S, Q)>,
        S: AsRef<[u8]>,
        Q: AsRef<[u8]>,
    {
        let mut collapsed: HashMap<Vec<u8>, (u64, Vec<f64>)> = HashMap::new();
        for (seq, quals) in reads {
            let seq = seq.as_ref().to_ascii_uppercase();
            let quals = quals.as_ref();
            let entry = collapsed
                .entry(seq)
                .or_insert_with(|| (0, vec![0.0; quals.len()]));
            entry.0 += 1;
            for (sum, &q) in entry.1.iter_mut().zip(quals) {
                *sum += f64::from(q);
            }
        }

        let mut uniques: Vec<UniqueSequence> = collapsed
            .into_iter()
            .map(|(seq, (count, sums))| {
                let profile: Vec<f64> = sums.into_iter().map(|s| s / count as f64).collect();
                UniqueSequence::new(seq, count, profile)
            })
            .collect();
        uniques.sort_by(|a, b| {
            b.abundance
                .cmp(&a.abundance)
                .then_with(|| a.sequence.cmp(&b.sequence))
        });

        Self::new(id, uniques)
    }

    /// Number of unique sequences.
    pub fn len(&self) -> usize {
        self.uniques.len()
    }

    /// Whether the sample holds no sequences.
    pub fn is_empty(&self) -> bool {
        self.uniques.is_empty()
    }

    /// Total number of reads across all unique sequences.
    pub fn total_abundance(&self) -> u64 {
        self.uniques.iter().map(|u| u.abundance).sum()
    }

    /// Index of the most abundant sequence; ties resolve to input order.
    pub fn most_abundant(&self) -> Option<usize> {
        self.uniques
            .iter()
            .enumerate()
            .fold(None, |best: Option<(usize, u64)>, (idx, uniq)| match best {
                Some((_, abundance)) if abundance >= uniq.abundance => best,
                _ => Some((idx, uniq.abundance)),
            })
            .map(|(idx, _)| idx)
    }

    /// Highest quality observed across all profiles.
    pub fn max_quality(&self) -> f64 {
        self.uniques
            .iter()
            .map(UniqueSequence::max_quality)
            .fold(0.0, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dereplicate_collapses_and_averages() {
        let reads = vec![
            (b"ACGT".to_vec(), vec![30u8, 30, 30, 30]),
            (b"ACGT".to_vec(), vec![20u8, 30, 40, 10]),
            (b"ACGA".to_vec(), vec![25u8, 25, 25, 25]),
        ];
        let store = SampleStore::dereplicate("s1", reads);

        assert_eq!(store.len(), 2);
        assert_eq!(store.total_abundance(), 3);
        let top = &store.uniques[0];
        assert_eq!(top.as_str(), "ACGT");
        assert_eq!(top.abundance, 2);
        assert_eq!(top.quality_profile.as_ref(), &[25.0, 30.0, 35.0, 20.0]);
    }

    #[test]
    fn most_abundant_prefers_input_order_on_ties() {
        let store = SampleStore::new(
            "s1",
            vec![
                UniqueSequence::with_uniform_quality("AAAA", 5, 30.0),
                UniqueSequence::with_uniform_quality("CCCC", 7, 30.0),
                UniqueSequence::with_uniform_quality("GGGG", 7, 30.0),
            ],
        );
        assert_eq!(store.most_abundant(), Some(1));
        assert_eq!(SampleStore::new("empty", Vec::new()).most_abundant(), None);
    }
}
