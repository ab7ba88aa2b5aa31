//! C5: the four Krylov solvers for `A x = b`, `A = I - alpha_self . D`.
//! `D` (and hence `A`) is complex-symmetric (`A^T = A`) but not Hermitian,
//! so every solver here uses the bilinear inner product `x^T y` (no
//! conjugation) rather than the Hermitian `x^H y` (§4.5).

pub mod bicg_sym;
pub mod bicgstab;
pub mod cgnr;
pub mod qmr_sym;

use crate::comm::CommBackend;
use crate::config::SolverKind;
use num_complex::Complex64;

/// Routes to the solver named by the `iter` option (§6, C5).
pub fn dispatch(
    kind: SolverKind,
    op: &dyn LinearOperator,
    b: &[Complex64],
    eps: f64,
    maxiter: usize,
    comm: &dyn CommBackend,
) -> SolverResult {
    match kind {
        SolverKind::Cgnr => cgnr::solve(op, b, eps, maxiter, comm),
        SolverKind::BiCgStab => bicgstab::solve(op, b, eps, maxiter, comm),
        SolverKind::BiCgSym => bicg_sym::solve(op, b, eps, maxiter, comm),
        SolverKind::QmrSym => qmr_sym::solve(op, b, eps, maxiter, comm),
    }
}

/// The matvec contract the solvers are driven by: `apply` computes `A p`
/// for the caller's chosen self-term wrapping of the core D-matrix matvec
/// (§4.4's "given `p`, compute `y = (I - alpha.D.Gamma) p`" contract).
pub trait LinearOperator {
    fn apply(&self, p: &[Complex64], out: &mut [Complex64]);
    fn len(&self) -> usize;
}

/// `A^H q` via `A`'s complex-symmetry: `A^H = conj(A(conj(.)))` when
/// `A^T = A`. Used only by CGNR, which needs the adjoint to form the
/// normal equations `A^H A x = A^H b`.
pub fn apply_adjoint(op: &dyn LinearOperator, p: &[Complex64]) -> Vec<Complex64> {
    let conj_p: Vec<Complex64> = p.iter().map(|z| z.conj()).collect();
    let mut out = vec![Complex64::new(0.0, 0.0); p.len()];
    op.apply(&conj_p, &mut out);
    for z in out.iter_mut() {
        *z = z.conj();
    }
    out
}

/// Bilinear inner product `sum_i x_i y_i`, all-reduced across workers — the
/// dot product every complex-symmetric solver in this module uses (§4.5,
/// §4.7: "local dot followed by a single global all-reduce").
pub fn bilinear_dot(x: &[Complex64], y: &[Complex64], comm: &dyn CommBackend) -> Complex64 {
    let local: Complex64 = x.iter().zip(y).map(|(a, b)| a * b).sum();
    comm.all_reduce_sum_c64(local)
}

/// Hermitian inner product `sum_i conj(x_i) y_i`, all-reduced across
/// workers. Used only by CGNR: its descent quantities (`z^H z`, `w^H w`)
/// come from conjugate-gradient on the normal equations `A^H A x = A^H b`,
/// an honestly Hermitian system even though `A` itself is merely
/// complex-symmetric, so CGNR must not use the bilinear form the other
/// three solvers are built on.
pub fn hermitian_dot(x: &[Complex64], y: &[Complex64], comm: &dyn CommBackend) -> Complex64 {
    let local: Complex64 = x.iter().zip(y).map(|(a, b)| a.conj() * b).sum();
    comm.all_reduce_sum_c64(local)
}

/// `sqrt(Re(x^T x))` as used for residual norms; not a true Euclidean norm
/// for complex-symmetric bilinear forms in general, but matches the
/// reference engine's convergence criterion based on the bilinear residual.
pub fn hermitian_norm(x: &[Complex64], comm: &dyn CommBackend) -> f64 {
    let local: f64 = x.iter().map(|a| a.norm_sqr()).sum();
    comm.all_reduce_sum_f64(local).sqrt()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverOutcome {
    Converged,
    DidNotConverge,
    Breakdown,
}

#[derive(Debug, Clone)]
pub struct SolverResult {
    pub x: Vec<Complex64>,
    pub outcome: SolverOutcome,
    pub iterations: usize,
    pub final_resid_ratio: f64,
}

pub(crate) fn axpy(alpha: Complex64, x: &[Complex64], y: &mut [Complex64]) {
    for (yi, xi) in y.iter_mut().zip(x) {
        *yi += alpha * xi;
    }
}

pub(crate) fn zeros(n: usize) -> Vec<Complex64> {
    vec![Complex64::new(0.0, 0.0); n]
}

/// `r = b - A x0` (x0 given, may be all-zero).
pub(crate) fn init_residual(op: &dyn LinearOperator, x0: &[Complex64], b: &[Complex64]) -> Vec<Complex64> {
    let mut ax0 = zeros(op.len());
    op.apply(x0, &mut ax0);
    b.iter().zip(&ax0).map(|(bi, axi)| bi - axi).collect()
}

const BREAKDOWN_EPS: f64 = 1e-300;

pub(crate) fn is_breakdown(c: Complex64) -> bool {
    c.norm() < BREAKDOWN_EPS
}
