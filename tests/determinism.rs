use std::collections::HashSet;

use blake3::hash;
use asv_denoise::io::render_variants;
use asv_denoise::{denoise, DenoiseConfig};

mod test_helpers;
use test_helpers::{simulated_samples, simulator};

#[test]
fn denoising_is_deterministic_across_thread_counts() {
    let samples = simulated_samples(&simulator(0.005, 17), 100);

    let mut fingerprints = HashSet::new();
    let mut renders = HashSet::new();
    for threads in [None, Some(1), Some(3)] {
        let config = DenoiseConfig::default().with_threads(threads);
        let result = denoise(samples.clone(), config).expect("denoising succeeds");
        fingerprints.insert(result.fingerprint());
        let tsv = render_variants(&result).expect("rendering succeeds");
        renders.insert(hash(tsv.as_bytes()));
    }

    assert_eq!(fingerprints.len(), 1, "results diverged across runs");
    assert_eq!(renders.len(), 1, "rendered output diverged across runs");
}

#[test]
fn simulation_is_reproducible_from_its_seed() {
    let first = simulated_samples(&simulator(0.01, 5), 50);
    let second = simulated_samples(&simulator(0.01, 5), 50);
    for (a, b) in first.iter().zip(&second) {
        assert_eq!(a.id, b.id);
        assert_eq!(a.uniques, b.uniques);
    }
}
