use crate::DenoiseError;

/// Mapping from Phred quality scores to error-model rows.
///
/// Qualities are rounded, clamped to `0..=max_quality`, then spread evenly
/// across `count` buckets. With one bucket per integer score the bucket
/// index equals the rounded quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct QualityBuckets {
    max_quality: u8,
    count: usize,
}

impl QualityBuckets {
    /// Build a bucketing for scores in `0..=max_quality`.
    ///
    /// `count = None` gives one bucket per integer score. Requests for more
    /// buckets than distinct scores are clamped.
    pub fn new(max_quality: u8, count: Option<usize>) -> Result<Self, DenoiseError> {
        let distinct = usize::from(max_quality) + 1;
        let count = match count {
            Some(0) => {
                return Err(DenoiseError::configuration(
                    "quality bucket count must be positive",
                ))
            }
            Some(requested) => requested.min(distinct),
            None => distinct,
        };
        Ok(Self { max_quality, count })
    }

    /// Number of buckets.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Highest quality score covered.
    pub fn max_quality(&self) -> u8 {
        self.max_quality
    }

    /// Bucket for a (possibly fractional) quality score.
    pub fn bucket(&self, quality: f64) -> usize {
        let q = if quality.is_nan() {
            0.0
        } else {
            quality.round().clamp(0.0, f64::from(self.max_quality))
        };
        let distinct = usize::from(self.max_quality) + 1;
        ((q as usize) * self.count / distinct).min(self.count - 1)
    }

    /// Lowest quality score falling into `bucket`.
    pub fn lower_bound(&self, bucket: usize) -> u8 {
        let distinct = usize::from(self.max_quality) + 1;
        (0..distinct)
            .find(|&q| self.bucket(q as f64) >= bucket)
            .map_or(self.max_quality, |q| q as u8)
    }
}
