//! Bi-CGSTAB (van der Vorst, 1992), using the bilinear inner product since
//! `A` is complex-symmetric rather than Hermitian. The "shadow" residual
//! `r_hat` is fixed to the initial residual, the standard choice.

use super::{axpy, bilinear_dot, hermitian_norm, init_residual, is_breakdown, zeros};
use super::{LinearOperator, SolverOutcome, SolverResult};
use crate::comm::CommBackend;
use num_complex::Complex64;

pub fn solve(op: &dyn LinearOperator, b: &[Complex64], eps: f64, maxiter: usize, comm: &dyn CommBackend) -> SolverResult {
    let n = op.len();
    let mut x = zeros(n);
    let mut r = init_residual(op, &x, b);
    let r_hat = r.clone();
    let b_norm = hermitian_norm(b, comm).max(1e-300);

    let mut resid_ratio = hermitian_norm(&r, comm) / b_norm;
    if resid_ratio < eps {
        return SolverResult { x, outcome: SolverOutcome::Converged, iterations: 0, final_resid_ratio: resid_ratio };
    }

    let mut rho = Complex64::new(1.0, 0.0);
    let mut alpha = Complex64::new(1.0, 0.0);
    let mut omega = Complex64::new(1.0, 0.0);
    let mut v = zeros(n);
    let mut p = zeros(n);

    for iter in 1..=maxiter {
        let rho_new = bilinear_dot(&r_hat, &r, comm);
        if is_breakdown(rho_new) || is_breakdown(omega) {
            return SolverResult { x, outcome: SolverOutcome::Breakdown, iterations: iter, final_resid_ratio: resid_ratio };
        }
        let beta = (rho_new / rho) * (alpha / omega);
        rho = rho_new;

        for i in 0..n {
            p[i] = r[i] + beta * (p[i] - omega * v[i]);
        }

        v = zeros(n);
        op.apply(&p, &mut v);
        let denom = bilinear_dot(&r_hat, &v, comm);
        if is_breakdown(denom) {
            return SolverResult { x, outcome: SolverOutcome::Breakdown, iterations: iter, final_resid_ratio: resid_ratio };
        }
        alpha = rho / denom;

        let mut s: Vec<Complex64> = r.iter().zip(&v).map(|(ri, vi)| ri - alpha * vi).collect();
        let s_norm = hermitian_norm(&s, comm);
        if s_norm / b_norm < eps {
            axpy(alpha, &p, &mut x);
            resid_ratio = s_norm / b_norm;
            return SolverResult { x, outcome: SolverOutcome::Converged, iterations: iter, final_resid_ratio: resid_ratio };
        }

        let mut t = zeros(n);
        op.apply(&s, &mut t);
        let tt = bilinear_dot(&t, &t, comm);
        if is_breakdown(tt) {
            return SolverResult { x, outcome: SolverOutcome::Breakdown, iterations: iter, final_resid_ratio: resid_ratio };
        }
        omega = bilinear_dot(&t, &s, comm) / tt;

        axpy(alpha, &p, &mut x);
        axpy(omega, &s, &mut x);

        r = s.iter().zip(&t).map(|(si, ti)| si - omega * ti).collect();
        s.clear();

        resid_ratio = hermitian_norm(&r, comm) / b_norm;
        if resid_ratio < eps {
            return SolverResult { x, outcome: SolverOutcome::Converged, iterations: iter, final_resid_ratio: resid_ratio };
        }
    }

    SolverResult { x, outcome: SolverOutcome::DidNotConverge, iterations: maxiter, final_resid_ratio: resid_ratio }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::single::SingleProcess;

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
        let op = Diag(vec![Complex64::new(1.0, 0.5), Complex64::new(2.0, -0.3)]);
        let b = vec![Complex64::new(1.0, 0.5) * Complex64::new(3.0, 0.0), Complex64::new(2.0, -0.3) * Complex64::new(-1.0, 0.0)];
        let result = solve(&op, &b, 1e-10, 50, &SingleProcess);
        assert_eq!(result.outcome, SolverOutcome::Converged);
        assert!((result.x[0] - Complex64::new(3.0, 0.0)).norm() < 1e-6);
        assert!((result.x[1] - Complex64::new(-1.0, 0.0)).norm() < 1e-6);
    }
}
