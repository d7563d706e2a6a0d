//! Shared sample fixtures for integration tests

#![allow(dead_code)]
use asv_denoise::simulate::AmpliconSimulator;
use asv_denoise::{SampleStore, UniqueSequence};

/// Template shared by both fixture samples.
pub const MAJOR: &str = "ACGTACGTACGTACGTACGT";
/// Ten substitutions away from [`MAJOR`].
pub const MINOR: &str = "TCCTTCCTTCCTTCCTTCCT";
/// One substitution away from [`MAJOR`].
pub const MAJOR_ERROR: &str = "AGGTACGTACGTACGTACGT";

fn uniq(seq: &str, abundance: u64) -> UniqueSequence {
    UniqueSequence::with_uniform_quality(seq, abundance, 30.0)
}

/// Two hand-built samples: one with a real minor variant and an error
/// read, one holding only the major variant.
pub fn two_variant_samples() -> Vec<SampleStore> {
    vec![
        SampleStore::new(
            "s1",
            vec![uniq(MAJOR, 200), uniq(MINOR, 80), uniq(MAJOR_ERROR, 2)],
        ),
        SampleStore::new("s2", vec![uniq(MAJOR, 50)]),
    ]
}

/// Simulator over three random 100 bp templates.
pub fn simulator(rate: f64, seed: u64) -> AmpliconSimulator {
    let templates = AmpliconSimulator::random_templates(3, 100, seed);
    AmpliconSimulator::new(templates, rate, 30, seed + 1).expect("valid simulation parameters")
}

/// Two simulated samples; the second lacks the second template.
pub fn simulated_samples(simulator: &AmpliconSimulator, scale: u64) -> Vec<SampleStore> {
    simulator
        .generate(&[
            ("a", vec![4 * scale, 2 * scale, scale]),
            ("b", vec![12 * scale / 5, 0, 8 * scale / 5]),
        ])
        .expect("simulation succeeds")
}
