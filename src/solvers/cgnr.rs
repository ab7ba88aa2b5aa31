//! CGNR: conjugate gradient applied to the normal equations `A^H A x = A^H b`.
//! Converges for any nonsingular `A`, at the cost of squaring the condition
//! number — the fallback solver when the complex-symmetric structure isn't
//! exploitable directly.

use super::{apply_adjoint, axpy, hermitian_dot, hermitian_norm, init_residual, is_breakdown, zeros};
use super::{LinearOperator, SolverOutcome, SolverResult};
use crate::comm::CommBackend;
use num_complex::Complex64;

pub fn solve(op: &dyn LinearOperator, b: &[Complex64], eps: f64, maxiter: usize, comm: &dyn CommBackend) -> SolverResult {
    let n = op.len();
    let mut x = zeros(n);
    let mut r = init_residual(op, &x, b);
    let b_norm = hermitian_norm(b, comm).max(1e-300);

    let mut z = apply_adjoint(op, &r);
    let mut p = z.clone();
    // `z^H z`, not the bilinear `z^T z`: CG here runs on the Hermitian
    // normal-equations system `A^H A x = A^H b`, not on `A` itself.
    let mut zz = hermitian_dot(&z, &z, comm);

    let mut resid_ratio = hermitian_norm(&r, comm) / b_norm;
    if resid_ratio < eps {
        return SolverResult { x, outcome: SolverOutcome::Converged, iterations: 0, final_resid_ratio: resid_ratio };
    }

    for iter in 1..=maxiter {
        let mut w = zeros(n);
        op.apply(&p, &mut w);
        let ww = hermitian_dot(&w, &w, comm);
        if is_breakdown(ww) {
            return SolverResult { x, outcome: SolverOutcome::Breakdown, iterations: iter, final_resid_ratio: resid_ratio };
        }
        let alpha = zz / ww;
        axpy(alpha, &p, &mut x);
        axpy(-alpha, &w, &mut r);

        resid_ratio = hermitian_norm(&r, comm) / b_norm;
        if resid_ratio < eps {
            return SolverResult { x, outcome: SolverOutcome::Converged, iterations: iter, final_resid_ratio: resid_ratio };
        }

        let z_new = apply_adjoint(op, &r);
        let zz_new = hermitian_dot(&z_new, &z_new, comm);
        if is_breakdown(zz) {
            return SolverResult { x, outcome: SolverOutcome::Breakdown, iterations: iter, final_resid_ratio: resid_ratio };
        }
        let beta = zz_new / zz;
        for (pi, zi) in p.iter_mut().zip(&z_new) {
            *pi = *zi + beta * *pi;
        }
        z = z_new;
        zz = zz_new;
    }

    SolverResult { x, outcome: SolverOutcome::DidNotConverge, iterations: maxiter, final_resid_ratio: resid_ratio }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::single::SingleProcess;

    /// Diagonal operator `A = diag(2, 3, 4)`, trivially solvable.
    struct Diag(Vec<Complex64>);
    impl LinearOperator for Diag {
        fn apply(&self, p: &[Complex64], out: &mut [Complex64]) {
            for i in 0..p.len() {
                out[i] = self.0[i] * p[i];
            }
        }
        fn len(&self) -> usize {
            self.0.len()
        }
    }

    #[test]
    fn solves_diagonal_system() {
        let op = Diag(vec![Complex64::new(2.0, 0.0), Complex64::new(3.0, 0.0), Complex64::new(4.0, 0.0)]);
        let b = vec![Complex64::new(2.0, 0.0), Complex64::new(6.0, 0.0), Complex64::new(12.0, 0.0)];
        let result = solve(&op, &b, 1e-10, 50, &SingleProcess);
        assert_eq!(result.outcome, SolverOutcome::Converged);
        assert!((result.x[0] - Complex64::new(1.0, 0.0)).norm() < 1e-6);
        assert!((result.x[1] - Complex64::new(2.0, 0.0)).norm() < 1e-6);
        assert!((result.x[2] - Complex64::new(3.0, 0.0)).norm() < 1e-6);
    }

    /// A genuinely complex, non-Hermitian (merely complex-symmetric)
    /// operator: a bilinear `z^T z` in place of the Hermitian `z^H z` CGNR's
    /// normal-equations recurrence needs would still converge on a real or
    /// accidentally-aligned system, but diverges or breaks down here.
    struct SymMatrix2;
    impl LinearOperator for SymMatrix2 {
        fn apply(&self, p: &[Complex64], out: &mut [Complex64]) {
            out[0] = Complex64::new(2.0, 1.0) * p[0] + p[1];
            out[1] = p[0] + Complex64::new(3.0, 0.0) * p[1];
        }
        fn len(&self) -> usize {
            2
        }
    }

    #[test]
    fn solves_small_complex_system() {
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
