//! End-to-end runs through the TSV boundary

use asv_denoise::io::{read_uniques, render_variants, write_error_model, write_uniques};
use asv_denoise::{denoise, DenoiseConfig, DenoiseError, LearningLoop, LoopState};
mod test_helpers;
use test_helpers::*;

#[test]
fn tsv_input_to_variants() {
    let mut buffer = Vec::new();
    write_uniques(&mut buffer, &two_variant_samples()).expect("writing succeeds");
    let samples = read_uniques(buffer.as_slice()).expect("parsing succeeds");
    assert_eq!(samples.len(), 2);

    let result = denoise(samples, DenoiseConfig::default()).expect("denoising succeeds");
    assert!(result.is_converged());
    let rendered = render_variants(&result).expect("rendering succeeds");
    assert_eq!(rendered.lines().count(), 4);
    assert!(rendered.contains(MINOR));
    assert!(!rendered.contains(MAJOR_ERROR));
}

#[test]
fn malformed_sample_is_reported_and_skipped() {
    let input = format!(
        "s1\t{MAJOR}\t200\t{q}\n\
         s1\t{MINOR}\t80\t{q}\n\
         broken\tACGN\t5\t30,30,30,30\n",
        q = vec!["30"; 20].join(",")
    );
    let samples = read_uniques(input.as_bytes()).expect("parsing succeeds");
    let result = denoise(samples, DenoiseConfig::default()).expect("denoising succeeds");

    assert_eq!(result.samples.len(), 1);
    let err = result
        .diagnostics
        .failed_samples
        .get("broken")
        .expect("broken sample recorded");
    assert!(matches!(err, DenoiseError::Data { .. }));
}

#[test]
fn learned_model_is_exported() {
    let result = denoise(two_variant_samples(), DenoiseConfig::default()).expect("denoising succeeds");
    let mut buffer = Vec::new();
    write_error_model(&mut buffer, &result.error_model).expect("writing succeeds");
    let text = String::from_utf8(buffer).expect("utf-8");

    let mut lines = text.lines();
    assert_eq!(
        lines.next(),
        Some("#bucket\tmin_quality\treference\tobserved\tprobability")
    );
    // Only quality 30 was observed: four reference rows of four cells.
    assert_eq!(lines.count(), 16);
}

#[test]
fn loop_can_be_driven_step_by_step() {
    let mut lp = LearningLoop::new(two_variant_samples(), DenoiseConfig::default())
        .expect("valid configuration");
    let mut visited = vec![lp.state()];
    while !lp.state().is_terminal() {
        visited.push(lp.step().expect("step succeeds"));
    }
    assert_eq!(visited.first(), Some(&LoopState::Initializing));
    assert!(matches!(visited.last(), Some(LoopState::Converged { .. })));

    let result = lp.run().expect("final pass succeeds");
    assert_eq!(result.variants("s1").map(<[_]>::len), Some(2));
    assert_eq!(result.variants("s2").map(<[_]>::len), Some(1));
}
