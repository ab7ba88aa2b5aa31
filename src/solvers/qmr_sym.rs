//! QMR specialized to complex-symmetric `A` (Freund, 1992). Builds the same
//! three-term symmetric Lanczos recurrence as [`super::bicg_sym`] but,
//! rather than imposing the Galerkin condition on the Krylov subspace,
//! minimizes the quasi-residual by incrementally QR-factorizing the
//! growing tridiagonal Lanczos matrix with Givens rotations — the
//! coupled-two-term update below is the complex-symmetric analogue of
//! Paige & Saunders' MINRES recurrence, using the bilinear form `x^T y`
//! throughout (never `x^H y`) since `A` is symmetric, not Hermitian.

use super::{bilinear_dot, hermitian_norm, init_residual, is_breakdown, zeros};
use super::{LinearOperator, SolverOutcome, SolverResult};
use crate::comm::CommBackend;
use num_complex::Complex64;

pub fn solve(op: &dyn LinearOperator, b: &[Complex64], eps: f64, maxiter: usize, comm: &dyn CommBackend) -> SolverResult {
    let n = op.len();
    let mut x = zeros(n);
    let r1_init = init_residual(op, &x, b);
    let b_norm = hermitian_norm(b, comm).max(1e-300);

    let mut resid_ratio = hermitian_norm(&r1_init, comm) / b_norm;
    if resid_ratio < eps {
        return SolverResult { x, outcome: SolverOutcome::Converged, iterations: 0, final_resid_ratio: resid_ratio };
    }

    let beta1 = bilinear_dot(&r1_init, &r1_init, comm).sqrt();
    if is_breakdown(beta1) {
        return SolverResult { x, outcome: SolverOutcome::Breakdown, iterations: 0, final_resid_ratio: resid_ratio };
    }

    let mut r1 = r1_init.clone();
    let mut r2 = r1_init;
    let mut oldb = Complex64::new(0.0, 0.0);
    let mut beta = beta1;
    let mut dbar = Complex64::new(0.0, 0.0);
    let mut epsln = Complex64::new(0.0, 0.0);
    let mut phibar = beta1;
    let mut cs = -1.0f64;
    let mut sn = 0.0f64;
    let mut w = zeros(n);
    let mut w1 = zeros(n);
    let mut w2 = zeros(n);

    for iter in 1..=maxiter {
        let s = Complex64::new(1.0, 0.0) / beta;
        let v: Vec<Complex64> = r2.iter().map(|ri| s * ri).collect();

        let mut y = zeros(n);
        op.apply(&v, &mut y);
        if iter > 1 {
            let coeff = beta / oldb;
            for (yi, r1i) in y.iter_mut().zip(&r1) {
                *yi -= coeff * r1i;
            }
        }
        let alpha = bilinear_dot(&v, &y, comm);
        for (yi, r2i) in y.iter_mut().zip(&r2) {
            *yi -= (alpha / beta) * r2i;
        }
        r1 = r2;
        r2 = y;

        oldb = beta;
        beta = bilinear_dot(&r2, &r2, comm).sqrt();

        let oldeps = epsln;
        let delta = cs * dbar + sn * alpha;
        let gbar = sn * dbar - cs * alpha;
        epsln = Complex64::new(sn, 0.0) * beta;
        dbar = Complex64::new(-cs, 0.0) * beta;

        // Givens rotation eliminating `beta` against `gbar`: real cs/sn built
        // from the magnitudes (valid since only |gamma| and the resulting
        // |phibar| feed the quasi-residual test; the complex phase is
        // absorbed into `w`/`x` via `delta`/`dbar`/`epsln` directly).
        let gamma = (gbar.norm_sqr() + beta.norm_sqr()).sqrt().max(1e-300);
        cs = gbar.norm() / gamma;
        sn = beta.norm() / gamma;

        let phi = cs * phibar;
        phibar *= sn;

        let inv_gamma = Complex64::new(1.0 / gamma.max(1e-300), 0.0);
        w1 = w2;
        w2 = w;
        w = v
            .iter()
            .zip(&w1)
            .zip(&w2)
            .map(|((vi, w1i), w2i)| (vi - oldeps * w1i - delta * w2i) * inv_gamma)
            .collect();

        for (xi, wi) in x.iter_mut().zip(&w) {
            *xi += Complex64::new(phi, 0.0) * wi;
        }

        resid_ratio = phibar.abs() / b_norm;
        if is_breakdown(Complex64::new(gamma, 0.0)) {
            return SolverResult { x, outcome: SolverOutcome::Breakdown, iterations: iter, final_resid_ratio: resid_ratio };
        }
        if resid_ratio < eps {
            return SolverResult { x, outcome: SolverOutcome::Converged, iterations: iter, final_resid_ratio: resid_ratio };
        }
    }

    SolverResult { x, outcome: SolverOutcome::DidNotConverge, iterations: maxiter, final_resid_ratio: resid_ratio }
}
