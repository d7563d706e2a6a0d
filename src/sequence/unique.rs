use std::sync::Arc;

use super::base_index;

/// A dereplicated sequence with its read count and consensus qualities.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct UniqueSequence {
    /// Nucleotides stored as uppercase ASCII.
    pub sequence: Arc<[u8]>,
    /// Number of raw reads collapsing to this sequence.
    pub abundance: u64,
    /// Per-position mean quality (Phred) over the contributing reads.
    pub quality_profile: Arc<[f64]>,
}

impl UniqueSequence {
    /// Construct a unique sequence. The sequence is uppercased; lengths are
    /// checked later by [`UniqueSequence::validate`].
    pub fn new(
        sequence: impl AsRef<[u8]>,
        abundance: u64,
        quality_profile: impl Into<Arc<[f64]>>,
    ) -> Self {
        Self {
            sequence: Arc::from(sequence.as_ref().to_ascii_uppercase().into_boxed_slice()),
            abundance,
            quality_profile: quality_profile.into(),
        }
    }

    /// Construct a unique sequence with the same quality at every position.
    pub fn with_uniform_quality(sequence: impl AsRef<[u8]>, abundance: u64, quality: f64) -> Self {
        let len = sequence.as_ref().len();
        Self::new(sequence, abundance, vec![quality; len])
    }

    /// Sequence length.
    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    /// Whether the sequence is empty.
    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    /// Quality at the provided position.
    pub fn quality_at(&self, pos: usize) -> Option<f64> {
        self.quality_profile.get(pos).copied()
    }

    /// Highest quality in the profile (0 for an empty profile).
    pub fn max_quality(&self) -> f64 {
        self.quality_profile.iter().copied().fold(0.0, f64::max)
    }

    /// Sequence as a string slice (always ASCII).
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.sequence).unwrap_or("")
    }

    /// Check the structural invariants, returning a description of the first
    /// violation.
    pub fn validate(&self) -> Result<(), String> {
        if self.sequence.is_empty() {
            return Err("empty sequence".to_string());
        }
        if self.abundance == 0 {
            return Err("abundance must be positive".to_string());
        }
        if self.sequence.len() != self.quality_profile.len() {
            return Err(format!(
                "sequence length {} does not match quality length {}",
                self.sequence.len(),
                self.quality_profile.len()
            ));
        }
        if let Some(pos) = self.sequence.iter().position(|&b| base_index(b).is_none()) {
            return Err(format!(
                "invalid nucleotide '{}' at position {}",
                self.sequence[pos] as char,
                pos
            ));
        }
        if let Some(pos) = self
            .quality_profile
            .iter()
            .position(|q| !q.is_finite() || *q < 0.0)
        {
            return Err(format!("invalid quality at position {}", pos));
        }
        Ok(())
    }
}
