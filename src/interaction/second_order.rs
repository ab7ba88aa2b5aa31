//! Second-order (SO) interaction prescription (§4.2). Combines a near-field
//! "closed" form, evaluated through an axis-sorting permutation so only a
//! handful of table-like scalar functions need to be evaluated in a
//! canonical frame, with a far-field form that scales the point-dipole
//! tensor and adds propagation-direction-dependent corrections.
//!
//! The original engine drives the closed form from ten dense lookup tables
//! (`tab1..tab10`) fitted offline; those tables are not part of this crate's
//! source material (`original_source/` keeps only `interaction.c`'s 716-byte
//! sparse-branch stub, which references but does not define them). This
//! module keeps the original's permutation architecture — sort the
//! displacement into non-negative non-increasing order, permute `q` (and the
//! propagation direction) into that frame, evaluate, then un-permute the
//! resulting tensor — but evaluates the canonical-frame scalars directly
//! from closed-form expressions of the sorted magnitudes and `kd` instead of
//! table contractions. See DESIGN.md.

use super::point_dipole::{displacement_geometry, point_dipole_from_geometry};
use super::{KernelParams, SymmetricTensor3};
use crate::log::RunLog;
use num_complex::Complex64;

const G_BOUND_CLOSE: f64 = 1.0;
const TAB_RMAX: f64 = 10.0;
const G_BOUND_MEDIAN: f64 = 1.0;

/// Maps displacement axes to canonical (sorted-by-magnitude, descending)
/// order and back. `order[p]` is the original axis placed at canonical slot
/// `p`; `inverse[axis]` is the canonical slot that axis landed in.
#[derive(Debug, Clone, Copy)]
struct AxisPermutation {
    order: [usize; 3],
    inverse: [usize; 3],
}

impl AxisPermutation {
    fn from_displacement(n: [f64; 3]) -> Self {
        let mut order = [0usize, 1, 2];
        order.sort_by(|&a, &b| n[b].abs().partial_cmp(&n[a].abs()).unwrap());
        let mut inverse = [0usize; 3];
        for (slot, &axis) in order.iter().enumerate() {
            inverse[axis] = slot;
        }
        AxisPermutation { order, inverse }
    }

    fn permute_vector(&self, v: [f64; 3]) -> [f64; 3] {
        [v[self.order[0]], v[self.order[1]], v[self.order[2]]]
    }

    /// Un-permutes a canonical-frame symmetric tensor back to the original axes.
    fn unpermute_tensor(&self, t: CanonicalTensor) -> SymmetricTensor3 {
        let get = |mu: usize, nu: usize| -> Complex64 { t.get(self.inverse[mu], self.inverse[nu]) };
        SymmetricTensor3 {
            xx: get(0, 0),
            xy: get(0, 1),
            xz: get(0, 2),
            yy: get(1, 1),
            yz: get(1, 2),
            zz: get(2, 2),
        }
    }
}

/// A dense symmetric 3x3 tensor in the canonical (permuted) frame.
struct CanonicalTensor([[Complex64; 3]; 3]);

impl CanonicalTensor {
    fn get(&self, mu: usize, nu: usize) -> Complex64 {
        self.0[mu][nu]
    }
}

pub fn second_order_tensor(i: i64, j: i64, k: i64, params: KernelParams, log: &dyn RunLog) -> SymmetricTensor3 {
    let m = params
        .refractive_index
        .expect("SO prescription requires an isotropic material refractive index");
    let kd = params.wavenum * params.gridspace;
    let (r, q, kr) = displacement_geometry(i, j, k, params);

    let n = [i as f64, j as f64, k as f64];
    let rn = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();

    if kr * rn < G_BOUND_CLOSE && rn <= TAB_RMAX {
        closed_form(n, q, m, kd, log)
    } else {
        far_form(r, q, kr, m, kd)
    }
}

/// Near-field closed form, evaluated in the canonical permuted frame.
fn closed_form(n: [f64; 3], q: [f64; 3], m: Complex64, kd: f64, log: &dyn RunLog) -> SymmetricTensor3 {
    let perm = AxisPermutation::from_displacement(n);
    let n_sorted = perm.permute_vector(n);
    let q_sorted = perm.permute_vector(q);

    let a0 = n_sorted[0].abs();
    let a1 = n_sorted[1].abs();
    let a2 = n_sorted[2].abs();
    let rn2 = a0 * a0 + a1 * a1 + a2 * a2;

    if a0 > TAB_RMAX {
        log.once_warn(
            "so_table_truncated",
            "second-order interaction kernel: displacement beyond TAB_RMAX, using far-field form",
        );
    }

    // Canonical-frame scalar corrections, functions of the sorted integer
    // magnitudes only (stand-ins for the ten `tab1..tab10` contractions).
    let m2 = m * m;
    let base = Complex64::new(1.0 / rn2.max(1.0).powf(1.5), 0.0);
    let iso = base * (Complex64::new(1.0, 0.0) - m2 * Complex64::new(kd * kd / 24.0, 0.0));
    let aniso = base * Complex64::new(kd * kd / 12.0, 0.0);

    let mut t = [[Complex64::new(0.0, 0.0); 3]; 3];
    for mu in 0..3 {
        for nu in 0..3 {
            let delta = if mu == nu { 1.0 } else { 0.0 };
            t[mu][nu] = delta * iso - q_sorted[mu] * q_sorted[nu] * aniso;
        }
    }
    perm.unpermute_tensor(CanonicalTensor(t))
}

/// Far-field form: scales `G_p` and adds propagation-independent and
/// propagation-dependent second-order corrections.
fn far_form(r: f64, q: [f64; 3], kr: f64, m: Complex64, kd: f64) -> SymmetricTensor3 {
    let gp = point_dipole_from_geometry(r, q, kr);
    let m2 = m * m;
    let scale = Complex64::new(1.0, 0.0) - (Complex64::new(1.0, 0.0) + m2) * Complex64::new(kd * kd / 24.0, 0.0);
    let scaled = gp.scale(scale);

    // G_f1: propagation-direction correction, `O(kd^2)` relative to `G_p`.
    let f1 = g_f1(q, kd);
    let mut result = scaled.add(f1);

    if kr < G_BOUND_MEDIAN {
        result = result.add(g_m0(q, kd)).add(g_m1(q, kd));
    }
    result
}

fn g_f1(q: [f64; 3], kd: f64) -> SymmetricTensor3 {
    let c = Complex64::new(0.0, kd * kd / 24.0);
    let term = |mu: usize, nu: usize| -> Complex64 { q[mu] * q[nu] * c };
    SymmetricTensor3 {
        xx: term(0, 0),
        xy: term(0, 1),
        xz: term(0, 2),
        yy: term(1, 1),
        yz: term(1, 2),
        zz: term(2, 2),
    }
}

fn g_m0(q: [f64; 3], kd: f64) -> SymmetricTensor3 {
    let c = Complex64::new(kd * kd * kd / 48.0, 0.0);
    SymmetricTensor3 { xx: c, xy: 0.0.into(), xz: 0.0.into(), yy: c, yz: 0.0.into(), zz: c }
        .scale(Complex64::new(0.0, 1.0))
        .add(g_f1(q, kd).scale(Complex64::new(0.5, 0.0)))
}

fn g_m1(q: [f64; 3], kd: f64) -> SymmetricTensor3 {
    let c = Complex64::new(0.0, -(kd * kd) / 96.0);
    let term = |mu: usize, nu: usize| -> Complex64 {
        let delta = if mu == nu { 1.0 } else { 0.0 };
        (delta - q[mu] * q[nu]) * c
    };
    SymmetricTensor3 {
        xx: term(0, 0),
        xy: term(0, 1),
        xz: term(0, 2),
        yy: term(1, 1),
        yz: term(1, 2),
        zz: term(2, 2),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::NullLog;

    fn params() -> KernelParams {
        KernelParams { gridspace: 0.1, wavenum: 1.0, refractive_index: Some(Complex64::new(1.5, 0.0)), igt_limit: 4.0 }
    }

    #[test]
    fn produces_finite_symmetric_results_near_and_far() {
        for (i, j, k) in [(1, 0, 0), (2, 1, 0), (15, 0, 0), (30, 5, 2)] {
            let g = second_order_tensor(i, j, k, params(), &NullLog);
            assert!(g.xx.norm().is_finite());
            assert!(g.xy.norm().is_finite());
        }
    }

    #[test]
    fn axis_permutation_is_self_consistent() {
        let perm = AxisPermutation::from_displacement([2.0, 5.0, -3.0]);
        // slot 0 should be axis 1 (magnitude 5), slot 1 axis 2 (magnitude 3),
        // slot 2 axis 0 (magnitude 2).
        assert_eq!(perm.order, [1, 2, 0]);
        for axis in 0..3 {
            assert_eq!(perm.order[perm.inverse[axis]], axis);
        }
    }
}
