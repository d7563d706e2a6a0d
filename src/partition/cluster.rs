use std::sync::Arc;

use crate::sequence::SampleId;

/// A center and the unique sequences assigned to it.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Partition {
    /// Index of the center within its sample.
    pub center: usize,
    /// Member indices in ascending order, center included.
    pub members: Vec<usize>,
    /// Summed abundance of all members.
    pub reads: u64,
}

impl Partition {
    /// Number of member sequences.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Always false: a partition holds at least its center.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Whether the sequence at `index` belongs to this partition.
    pub fn contains(&self, index: usize) -> bool {
        self.members.binary_search(&index).is_ok()
    }
}

/// A sequence inferred to be biologically real.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct InferredVariant {
    /// Sample the variant was inferred in.
    pub source_sample: SampleId,
    /// Variant sequence (the partition center).
    pub sequence: Arc<[u8]>,
    /// Reads supporting the variant: the summed abundance of its partition.
    pub abundance: u64,
    /// Index of the center within its sample.
    pub center_index: usize,
    /// Indices of the sequences folded into this variant.
    pub member_indices: Vec<usize>,
}

impl InferredVariant {
    /// Sequence as a string slice.
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.sequence).unwrap_or("")
    }
}
