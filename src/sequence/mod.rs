//! Nucleotide alphabet and the per-sample unique-sequence store.
//!
//! Dereplication is normally done upstream; the store here is the boundary
//! contract the partition engine consumes.

mod store;
mod unique;

pub use store::{SampleStore, SampleId};
pub use unique::UniqueSequence;

/// Number of nucleotide symbols the error model distinguishes.
pub const NUM_BASES: usize = 4; // A, C, G, T

/// Nucleotide symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Base {
    /// Adenine.
    A,
    /// Cytosine.
    C,
    /// Guanine.
    G,
    /// Thymine (or uracil).
    T,
}

impl Base {
    /// All bases in index order.
    pub const ALL: [Base; NUM_BASES] = [Base::A, Base::C, Base::G, Base::T];

    /// Parse an ASCII nucleotide, case-insensitive.
    pub fn from_ascii(byte: u8) -> Option<Self> {
        match byte {
            b'A' | b'a' => Some(Base::A),
            b'C' | b'c' => Some(Base::C),
            b'G' | b'g' => Some(Base::G),
            b'T' | b't' | b'U' | b'u' => Some(Base::T),
            _ => None,
        }
    }

    /// Dense index in `0..NUM_BASES`.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Inverse of [`Base::index`].
    pub fn from_index(idx: usize) -> Option<Self> {
        Self::ALL.get(idx).copied()
    }

    /// Uppercase ASCII representation.
    pub fn to_ascii(self) -> u8 {
        match self {
            Base::A => b'A',
            Base::C => b'C',
            Base::G => b'G',
            Base::T => b'T',
        }
    }
}

pub(crate) fn base_index(byte: u8) -> Option<usize> {
    Base::from_ascii(byte).map(Base::index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_round_trips_through_index() {
        for base in Base::ALL {
            assert_eq!(Base::from_index(base.index()), Some(base));
            assert_eq!(Base::from_ascii(base.to_ascii()), Some(base));
        }
        assert_eq!(Base::from_ascii(b'u'), Some(Base::T));
        assert_eq!(Base::from_ascii(b'N'), None);
    }
}
