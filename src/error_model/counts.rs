use super::QualityBuckets;
use crate::sequence::NUM_BASES;

/// Abundance-weighted tallies of `(quality bucket, reference, observed)`
/// transitions gathered from partitions.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SubstitutionCounts {
    buckets: QualityBuckets,
    /// Indexed by `bucket * NUM_BASES + reference`.
    rows: Vec<[u64; NUM_BASES]>,
}

impl SubstitutionCounts {
    /// Empty tallies for the provided bucketing.
    pub fn new(buckets: QualityBuckets) -> Self {
        Self {
            buckets,
            rows: vec![[0; NUM_BASES]; buckets.count() * NUM_BASES],
        }
    }

    /// Bucketing these counts were gathered with.
    pub fn buckets(&self) -> QualityBuckets {
        self.buckets
    }

    /// Record `weight` observations of `observed` read where the center has
    /// `reference`, at the given quality.
    pub fn record(&mut self, quality: f64, reference: usize, observed: usize, weight: u64) {
        let bucket = self.buckets.bucket(quality);
        self.rows[bucket * NUM_BASES + reference][observed] += weight;
    }

    /// Add another tally into this one. Both must share a bucketing.
    pub fn merge(&mut self, other: &SubstitutionCounts) {
        debug_assert_eq!(self.buckets, other.buckets);
        for (mine, theirs) in self.rows.iter_mut().zip(&other.rows) {
            for (a, b) in mine.iter_mut().zip(theirs) {
                *a += *b;
            }
        }
    }

    /// Count for one cell.
    pub fn get(&self, bucket: usize, reference: usize, observed: usize) -> u64 {
        self.rows
            .get(bucket * NUM_BASES + reference)
            .map_or(0, |row| row[observed])
    }

    /// All counts for one `(bucket, reference)` row.
    pub fn row(&self, bucket: usize, reference: usize) -> Option<&[u64; NUM_BASES]> {
        self.rows.get(bucket * NUM_BASES + reference)
    }

    /// Total number of observations.
    pub fn total(&self) -> u64 {
        self.rows.iter().flat_map(|row| row.iter()).sum()
    }

    /// Number of off-diagonal (substitution) observations.
    pub fn mismatches(&self) -> u64 {
        self.rows
            .iter()
            .enumerate()
            .map(|(idx, row)| {
                let reference = idx % NUM_BASES;
                row.iter()
                    .enumerate()
                    .filter(|&(obs, _)| obs != reference)
                    .map(|(_, &n)| n)
                    .sum::<u64>()
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_and_merge_accumulate() {
        let buckets = QualityBuckets::new(40, None).unwrap();
        let mut left = SubstitutionCounts::new(buckets);
        left.record(30.0, 0, 0, 10);
        left.record(30.0, 0, 2, 1);

        let mut right = SubstitutionCounts::new(buckets);
        right.record(29.8, 0, 2, 4);
        right.record(12.0, 3, 3, 5);

        left.merge(&right);
        assert_eq!(left.get(30, 0, 0), 10);
        assert_eq!(left.get(30, 0, 2), 5);
        assert_eq!(left.get(12, 3, 3), 5);
        assert_eq!(left.total(), 20);
        assert_eq!(left.mismatches(), 5);
    }
}
