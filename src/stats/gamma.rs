pub use statrs::function::gamma::ln_gamma;

const MAX_TERMS: usize = 10_000;
const EPSILON: f64 = 1e-15;
const TINY: f64 = 1e-300;

/// `ln P(a, x)`, the log of the regularized lower incomplete gamma function,
/// taking `ln x` so that vanishing `x` keeps full precision.
///
/// For integer `a`, `P(a, x)` is the probability that a Poisson variable of
/// mean `x` is at least `a`.
pub fn ln_regularized_lower_gamma(a: f64, ln_x: f64) -> f64 {
    let x = ln_x.exp();
    if x < a + 1.0 {
        // Series: x^a e^-x / Gamma(a+1) * sum_n x^n / ((a+1)...(a+n))
        let mut term = 1.0;
        let mut sum = 1.0;
        for n in 1..MAX_TERMS {
            term *= x / (a + n as f64);
            sum += term;
            if term < sum * EPSILON {
                break;
            }
        }
        a * ln_x - x - ln_gamma(a + 1.0) + sum.ln()
    } else {
        // Continued fraction for the upper tail Q(a, x), modified Lentz.
        let mut b = x + 1.0 - a;
        let mut c = 1.0 / TINY;
        let mut d = 1.0 / b;
        let mut h = d;
        for i in 1..MAX_TERMS {
            let an = -(i as f64) * (i as f64 - a);
            b += 2.0;
            d = an * d + b;
            if d.abs() < TINY {
                d = TINY;
            }
            c = b + an / c;
            if c.abs() < TINY {
                c = TINY;
            }
            d = 1.0 / d;
            let delta = d * c;
            h *= delta;
            if (delta - 1.0).abs() < EPSILON {
                break;
            }
        }
        let q = (a * ln_x - x - ln_gamma(a)).exp() * h;
        (-q).ln_1p()
    }
}
