//! Per-sample divisive partitioning.
//!
//! A pass starts with every sequence in one partition centered on the most
//! abundant sequence. The sequence least consistent with being an error of
//! its center is promoted to a new center while it passes the significance
//! test; members are then reassigned to the center most likely to have
//! produced them.

mod cluster;
mod engine;
mod significance;

pub use cluster::{InferredVariant, Partition};
pub use engine::{PartitionEngine, PartitionOutcome};
pub(crate) use engine::validate_sample;
pub use significance::{Candidate, PoissonAbundance, SignificancePolicy};
