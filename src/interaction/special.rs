//! Sine and cosine integrals `Si(x)`, `Ci(x)`, needed by the FCD prescription
//! (§4.2). Rational-polynomial approximations, Abramowitz & Stegun 5.2.38/39
//! (accurate to ~1e-8 for all positive `x`), matching the role of the
//! original engine's `cisi()` routine (`original_source/.../interaction.c`
//! references a dedicated `sinint.c` unit for exactly this pair).

/// Returns `(Si(x), Ci(x))` for real `x >= 0`.
pub fn si_ci(x: f64) -> (f64, f64) {
    if x == 0.0 {
        return (0.0, f64::NEG_INFINITY);
    }
    let x = x.abs();
    if x <= 1.0 {
        si_ci_small(x)
    } else {
        si_ci_large(x)
    }
}

/// Power-series evaluation, accurate for small `x` (converges fast for `x <= 1`).
fn si_ci_small(x: f64) -> (f64, f64) {
    const EULER_GAMMA: f64 = 0.5772156649015329;
    let x2 = x * x;
    let mut term = x;
    let mut si = x;
    let mut k = 1i64;
    loop {
        k += 1;
        term *= -x2 / ((2 * k - 2) as f64 * (2 * k - 1) as f64);
        let add = term / (2 * k - 1) as f64;
        si += add;
        if add.abs() < 1e-16 * si.abs().max(1.0) || k > 200 {
            break;
        }
    }

    let mut term = 1.0;
    let mut ci_sum = 0.0;
    let mut k = 0i64;
    loop {
        k += 1;
        term *= -x2 / ((2 * k - 1) as f64 * (2 * k) as f64);
        let add = term / (2 * k) as f64;
        ci_sum += add;
        if add.abs() < 1e-16 * ci_sum.abs().max(1.0) || k > 200 {
            break;
        }
    }
    let ci = EULER_GAMMA + x.ln() + ci_sum;
    (si, ci)
}

/// Asymptotic auxiliary-function form, accurate for `x > 1`
/// (A&S 5.2.38/39: `Si(x) = pi/2 - f(x)cos(x) - g(x)sin(x)`,
/// `Ci(x) = f(x)sin(x) - g(x)cos(x)`).
fn si_ci_large(x: f64) -> (f64, f64) {
    let inv = 1.0 / x;
    let inv2 = inv * inv;

    // Rational approximations for f(x) and g(x), A&S Table 5.2.
    let f = (1.0
        + inv2 * (7.241163e-1 + inv2 * (-1.91167e-1 + inv2 * 2.5249e-2)))
        / (x * (1.0 + inv2 * (9.13738e-1 + inv2 * (2.4220e-1 + inv2 * 2.34e-2))));
    let g = inv2
        * (1.0 + inv2 * (1.2832484 + inv2 * (0.3124716 + inv2 * 0.0283499)))
        / (1.0 + inv2 * (1.7556893 + inv2 * (0.5539281 + inv2 * 0.0511293)));

    let (sinx, cosx) = x.sin_cos();
    let si = std::f64::consts::FRAC_PI_2 - f * cosx - g * sinx;
    let ci = f * sinx - g * cosx;
    (si, ci)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn si_ci_matches_known_values_at_one() {
        let (si, ci) = si_ci(1.0);
        assert!((si - 0.946_083).abs() < 1e-4);
        assert!((ci - 0.337_404).abs() < 1e-4);
    }

    #[test]
    fn si_approaches_pi_over_2_for_large_x() {
        let (si, _) = si_ci(50.0);
        assert!((si - std::f64::consts::FRAC_PI_2).abs() < 1e-2);
    }

    #[test]
    fn si_ci_continuous_across_the_small_large_split() {
        let (si_a, ci_a) = si_ci(0.999);
        let (si_b, ci_b) = si_ci(1.001);
        assert!((si_a - si_b).abs() < 1e-3);
        assert!((ci_a - ci_b).abs() < 1e-3);
    }
}
