//! Numerical helpers for the abundance significance test.
//!
//! Everything is computed in natural-log space: expected abundances of
//! highly divergent sequences underflow `f64` long before the test becomes
//! uninformative.

mod gamma;

pub use gamma::{ln_gamma, ln_regularized_lower_gamma};

/// `ln P(X >= k | X >= 1)` for `X ~ Poisson(exp(ln_mean))`.
///
/// Returns `0.0` (probability one) for `k <= 1` and for non-finite or
/// positive-infinite means, and `-inf` when the mean is exactly zero.
pub fn ln_poisson_tail_given_nonzero(k: u64, ln_mean: f64) -> f64 {
    if k <= 1 || ln_mean.is_nan() || ln_mean == f64::INFINITY {
        return 0.0;
    }
    if ln_mean == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }

    let mean = ln_mean.exp();
    let ln_tail = ln_regularized_lower_gamma(k as f64, ln_mean);
    let ln_nonzero = if mean < 1e-10 {
        ln_mean - mean / 2.0
    } else {
        (-(-mean).exp_m1()).ln()
    };

    (ln_tail - ln_nonzero).min(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conditional_tail_matches_closed_form() {
        // P(X >= 2 | X >= 1) with mean 1 = (1 - 2/e) / (1 - 1/e)
        let expected = (1.0 - 2.0 / std::f64::consts::E) / (1.0 - 1.0 / std::f64::consts::E);
        let got = ln_poisson_tail_given_nonzero(2, 0.0).exp();
        assert!((got - expected).abs() < 1e-9, "got {got}, expected {expected}");
    }

    #[test]
    fn singletons_are_never_significant() {
        assert_eq!(ln_poisson_tail_given_nonzero(1, -500.0), 0.0);
        assert_eq!(ln_poisson_tail_given_nonzero(0, 3.0), 0.0);
    }

    #[test]
    fn tiny_means_stay_finite() {
        let ln_mean = -10_000.0;
        let ln_p = ln_poisson_tail_given_nonzero(10, ln_mean);
        assert!(ln_p.is_finite());
        // Leading term: (k - 1) * ln_mean - ln(k!)
        let leading = 9.0 * ln_mean - ln_gamma(11.0);
        assert!((ln_p - leading).abs() < 1e-6);
    }

    #[test]
    fn large_means_approach_certainty() {
        let ln_p = ln_poisson_tail_given_nonzero(3, 50f64.ln());
        assert!(ln_p <= 0.0);
        assert!(ln_p > -1e-12);
    }

    #[test]
    fn zero_mean_is_impossible_to_reach() {
        assert_eq!(
            ln_poisson_tail_given_nonzero(2, f64::NEG_INFINITY),
            f64::NEG_INFINITY
        );
    }
}
