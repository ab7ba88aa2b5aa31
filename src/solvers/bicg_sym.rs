//! Bi-CG specialized to complex-symmetric `A` (COCG — "conjugate orthogonal
//! CG"). Symmetry means the left and right Krylov sequences coincide, so
//! this collapses to a three-term CG-like recurrence using the bilinear
//! form `r^T r` in place of CG's Hermitian `r^H r` — no shadow residual
//! sequence needed, unlike general (non-symmetric) Bi-CG.

use super::{axpy, bilinear_dot, hermitian_norm, init_residual, is_breakdown, zeros};
use super::{LinearOperator, SolverOutcome, SolverResult};
use crate::comm::CommBackend;
use num_complex::Complex64;

pub fn solve(op: &dyn LinearOperator, b: &[Complex64], eps: f64, maxiter: usize, comm: &dyn CommBackend) -> SolverResult {
    let n = op.len();
    let mut x = zeros(n);
    let mut r = init_residual(op, &x, b);
    let b_norm = hermitian_norm(b, comm).max(1e-300);

    let mut resid_ratio = hermitian_norm(&r, comm) / b_norm;
    if resid_ratio < eps {
        return SolverResult { x, outcome: SolverOutcome::Converged, iterations: 0, final_resid_ratio: resid_ratio };
    }

    let mut p = r.clone();
    let mut rho = bilinear_dot(&r, &r, comm);

    for iter in 1..=maxiter {
        if is_breakdown(rho) {
            return SolverResult { x, outcome: SolverOutcome::Breakdown, iterations: iter, final_resid_ratio: resid_ratio };
        }
        let mut w = zeros(n);
        op.apply(&p, &mut w);
        let pw = bilinear_dot(&p, &w, comm);
        if is_breakdown(pw) {
            return SolverResult { x, outcome: SolverOutcome::Breakdown, iterations: iter, final_resid_ratio: resid_ratio };
        }
        let alpha = rho / pw;
        axpy(alpha, &p, &mut x);
        axpy(-alpha, &w, &mut r);

        resid_ratio = hermitian_norm(&r, comm) / b_norm;
        if resid_ratio < eps {
            return SolverResult { x, outcome: SolverOutcome::Converged, iterations: iter, final_resid_ratio: resid_ratio };
        }

        let rho_new = bilinear_dot(&r, &r, comm);
        let beta = rho_new / rho;
        for (pi, ri) in p.iter_mut().zip(&r) {
            *pi = *ri + beta * *pi;
        }
        rho = rho_new;
    }

    SolverResult { x, outcome: SolverOutcome::DidNotConverge, iterations: maxiter, final_resid_ratio: resid_ratio }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::single::SingleProcess;
    use num_complex::Complex64;

    struct SymMatrix2;
    impl LinearOperator for SymMatrix2 {
        fn apply(&self, p: &[Complex64], out: &mut [Complex64]) {
            // [[2+1i, 1], [1, 3]]  (complex-symmetric, not Hermitian)
            out[0] = Complex64::new(2.0, 1.0) * p[0] + p[1];
            out[1] = p[0] + Complex64::new(3.0, 0.0) * p[1];
        }
        fn len(&self) -> usize {
            2
        }
    }

    #[test]
    fn solves_small_complex_symmetric_system() {
        let op = SymMatrix2;
        let x_true = [Complex64::new(1.0, 0.0), Complex64::new(-2.0, 0.5)];
        let mut b = [Complex64::new(0.0, 0.0); 2];
        op.apply(&x_true, &mut b);
        let result = solve(&op, &b, 1e-10, 100, &SingleProcess);
        assert_eq!(result.outcome, SolverOutcome::Converged);
        assert!((result.x[0] - x_true[0]).norm() < 1e-6);
        assert!((result.x[1] - x_true[1]).norm() < 1e-6);
    }
}
