//! Error-model learning on simulated data with a known error process

use std::collections::BTreeSet;

use asv_denoise::{
    denoise, Base, Convergence, DenoiseConfig, NonConvergenceWarning, SampleStore, UniqueSequence,
};

mod test_helpers;
use test_helpers::{simulated_samples, simulator};

const RATE: f64 = 0.005;

#[test]
fn recovers_templates_and_error_rates() {
    let sim = simulator(RATE, 2024);
    let samples = simulated_samples(&sim, 500);
    let result = denoise(samples, DenoiseConfig::default()).expect("denoising succeeds");

    assert!(result.is_converged(), "{:?}", result.convergence);
    assert!(result.diagnostics.warnings.is_empty());
    assert!(result.diagnostics.failed_samples.is_empty());

    let templates = sim.templates();
    let expected_a: BTreeSet<&[u8]> = templates.iter().map(Vec::as_slice).collect();
    let expected_b: BTreeSet<&[u8]> = [templates[0].as_slice(), templates[2].as_slice()]
        .into_iter()
        .collect();
    let inferred = |id: &str| -> BTreeSet<&[u8]> {
        result
            .variants(id)
            .expect("sample present")
            .iter()
            .map(|v| v.sequence.as_ref())
            .collect()
    };
    assert_eq!(inferred("a"), expected_a);
    assert_eq!(inferred("b"), expected_b);

    let model = &result.error_model;
    for reference in Base::ALL {
        for observed in Base::ALL {
            let p = model
                .evaluate(reference, observed, 30.0)
                .expect("quality 30 is covered");
            let truth = if reference == observed { 1.0 - RATE } else { RATE / 3.0 };
            assert!(
                (p - truth).abs() < 1e-3,
                "P({observed:?}|{reference:?},30) = {p}, expected {truth}"
            );
        }
    }
}

#[test]
fn variant_abundances_account_for_every_read() {
    let samples = simulated_samples(&simulator(RATE, 99), 100);
    let totals: Vec<u64> = samples.iter().map(|s| s.total_abundance()).collect();
    let result = denoise(samples, DenoiseConfig::default()).expect("denoising succeeds");

    for ((_, sample), total) in result.samples.iter().zip(totals) {
        let assigned: u64 = sample.variants.iter().map(|v| v.abundance).sum();
        assert_eq!(assigned, total);
        let members: usize = sample.partitions.iter().map(|p| p.members.len()).sum();
        let distinct: BTreeSet<usize> = sample
            .partitions
            .iter()
            .flat_map(|p| p.members.iter().copied())
            .collect();
        assert_eq!(members, distinct.len(), "a sequence sits in two partitions");
    }
}

#[test]
fn iteration_cap_tags_result_as_unconverged() {
    let samples = simulated_samples(&simulator(RATE, 7), 100);
    let config = DenoiseConfig::default().with_max_iterations(1);
    let result = denoise(samples, config).expect("denoising still produces output");

    assert!(!result.is_converged());
    assert!(matches!(
        result.convergence,
        Convergence::IterationCapReached { iterations: 1, .. }
    ));
    assert!(result
        .diagnostics
        .warnings
        .iter()
        .any(|w| matches!(w, NonConvergenceWarning::ErrorModel { iterations: 1, .. })));
    assert_eq!(result.diagnostics.iterations.len(), 1);
    assert!(result.variant_count() > 0);
}

#[test]
fn center_bases_missing_from_the_bootstrap_are_still_scored() {
    let poly_a = "A".repeat(20);
    let poly_c = "C".repeat(20);
    let near_a = format!("{}C", "A".repeat(19));
    let sample = SampleStore::new(
        "s1",
        vec![
            UniqueSequence::with_uniform_quality(poly_a.as_str(), 1000, 30.0),
            UniqueSequence::with_uniform_quality(poly_c.as_str(), 500, 30.0),
            UniqueSequence::with_uniform_quality(near_a.as_str(), 3, 30.0),
        ],
    );
    let result = denoise(vec![sample], DenoiseConfig::default()).expect("denoising succeeds");

    assert!(result.is_converged(), "{:?}", result.convergence);
    assert!(result.diagnostics.failed_samples.is_empty());
    let variants = result.variants("s1").expect("sample present");
    let found: Vec<(&str, u64)> = variants.iter().map(|v| (v.as_str(), v.abundance)).collect();
    assert_eq!(found, vec![(poly_a.as_str(), 1003), (poly_c.as_str(), 500)]);

    let same = result
        .error_model
        .evaluate(Base::G, Base::G, 30.0)
        .expect("unobserved reference still has a row");
    assert!(same > 0.5);
}
