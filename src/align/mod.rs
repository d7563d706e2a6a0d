//! Pairwise comparison of a cluster center against a unique sequence.
//!
//! Equal-length sequences are compared column by column. Sequences of
//! different length go through an end-gap-free banded global alignment;
//! only the matched/mismatched columns are reported, gaps never enter the
//! error model.

mod banded;

pub use banded::banded_global;

use std::ops::Range;
use std::slice;

/// Scoring and banding parameters for gapped alignment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignParams {
    /// Score for identical bases.
    pub match_score: i32,
    /// Score for differing bases.
    pub mismatch: i32,
    /// Score per gap position.
    pub gap: i32,
    /// Maximum diagonal offset explored by the DP.
    pub band: usize,
}

impl Default for AlignParams {
    fn default() -> Self {
        Self {
            match_score: 5,
            mismatch: -4,
            gap: -8,
            band: 16,
        }
    }
}

/// Result of comparing a center (reference) against a unique (observed).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Alignment {
    /// Same length, columns pair position `i` with position `i`.
    Ungapped {
        /// Number of columns.
        len: usize,
    },
    /// Gapped alignment.
    Gapped {
        /// `(center_pos, raw_pos)` for every non-gap column, in order.
        columns: Vec<(usize, usize)>,
        /// Number of internal gap positions.
        indels: usize,
    },
}

impl Alignment {
    /// Iterate the aligned `(center_pos, raw_pos)` columns.
    pub fn columns(&self) -> Columns<'_> {
        match self {
            Alignment::Ungapped { len } => Columns::Ungapped(0..*len),
            Alignment::Gapped { columns, .. } => Columns::Gapped(columns.iter()),
        }
    }

    /// Number of internal gap positions.
    pub fn indels(&self) -> usize {
        match self {
            Alignment::Ungapped { .. } => 0,
            Alignment::Gapped { indels, .. } => *indels,
        }
    }
}

/// Iterator over aligned columns.
#[derive(Debug)]
pub enum Columns<'a> {
    /// Identity columns.
    Ungapped(Range<usize>),
    /// Explicit columns from a gapped alignment.
    Gapped(slice::Iter<'a, (usize, usize)>),
}

impl Iterator for Columns<'_> {
    type Item = (usize, usize);

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Columns::Ungapped(range) => range.next().map(|i| (i, i)),
            Columns::Gapped(iter) => iter.next().copied(),
        }
    }
}

/// Align `raw` against `center`. Returns `None` when the length difference
/// exceeds the band.
pub fn align(center: &[u8], raw: &[u8], params: &AlignParams) -> Option<Alignment> {
    if center.len() == raw.len() {
        return Some(Alignment::Ungapped { len: center.len() });
    }
    banded_global(center, raw, params)
}

/// Number of mismatching aligned columns.
pub fn mismatches(center: &[u8], raw: &[u8], alignment: &Alignment) -> usize {
    alignment
        .columns()
        .filter(|&(c, r)| center[c] != raw[r])
        .count()
}
