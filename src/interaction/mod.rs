//! C2: the interaction kernel. Computes the symmetric 3x3 complex Green
//! tensor `G(r)` between two lattice sites under a selected prescription.

pub mod fcd;
pub mod igt;
pub mod point_dipole;
pub mod second_order;
pub mod special;

use crate::config::InteractionPrescription;
use num_complex::Complex64;

/// The six independent components of a symmetric complex 3x3 tensor,
/// component order `{xx, xy, xz, yy, yz, zz}` (§3).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SymmetricTensor3 {
    pub xx: Complex64,
    pub xy: Complex64,
    pub xz: Complex64,
    pub yy: Complex64,
    pub yz: Complex64,
    pub zz: Complex64,
}

impl SymmetricTensor3 {
    pub const ZERO: SymmetricTensor3 = SymmetricTensor3 {
        xx: Complex64::new(0.0, 0.0),
        xy: Complex64::new(0.0, 0.0),
        xz: Complex64::new(0.0, 0.0),
        yy: Complex64::new(0.0, 0.0),
        yz: Complex64::new(0.0, 0.0),
        zz: Complex64::new(0.0, 0.0),
    };

    pub fn scale(self, s: Complex64) -> Self {
        SymmetricTensor3 {
            xx: self.xx * s,
            xy: self.xy * s,
            xz: self.xz * s,
            yy: self.yy * s,
            yz: self.yz * s,
            zz: self.zz * s,
        }
    }

    pub fn add(self, rhs: Self) -> Self {
        SymmetricTensor3 {
            xx: self.xx + rhs.xx,
            xy: self.xy + rhs.xy,
            xz: self.xz + rhs.xz,
            yy: self.yy + rhs.yy,
            yz: self.yz + rhs.yz,
            zz: self.zz + rhs.zz,
        }
    }

    /// `y = G . p`, the "six-component symmetric 3x3 complex multiply per
    /// grid point" of §4.4 step 4.
    pub fn apply(&self, p: [Complex64; 3]) -> [Complex64; 3] {
        [
            self.xx * p[0] + self.xy * p[1] + self.xz * p[2],
            self.xy * p[0] + self.yy * p[1] + self.yz * p[2],
            self.xz * p[0] + self.yz * p[1] + self.zz * p[2],
        ]
    }

    pub fn component(&self, idx: usize) -> Complex64 {
        match idx {
            0 => self.xx,
            1 => self.xy,
            2 => self.xz,
            3 => self.yy,
            4 => self.yz,
            _ => self.zz,
        }
    }

    pub fn from_components(c: [Complex64; 6]) -> Self {
        SymmetricTensor3 { xx: c[0], xy: c[1], xz: c[2], yy: c[3], yz: c[4], zz: c[5] }
    }
}

/// Physical parameters the kernel needs beyond the integer displacement:
/// the lattice spacing, the host wavenumber, and (for SO only) the single
/// scatterer refractive index.
#[derive(Debug, Clone, Copy)]
pub struct KernelParams {
    pub gridspace: f64,
    pub wavenum: f64,
    /// Required (and must be isotropic) only by the `SecondOrder` prescription.
    pub refractive_index: Option<Complex64>,
    pub igt_limit: f64,
}

/// Computes `G(i,j,k)` under the chosen prescription. Pure: no global state,
/// no I/O. The self term `(0,0,0)` is not handled here (§4.2) — callers must
/// special-case it via the polarizability module.
pub fn interaction_tensor(
    prescription: InteractionPrescription,
    i: i64,
    j: i64,
    k: i64,
    params: KernelParams,
    log: &dyn crate::log::RunLog,
) -> SymmetricTensor3 {
    debug_assert!((i, j, k) != (0, 0, 0), "self term must be handled separately");
    match prescription {
        InteractionPrescription::PointDipole => point_dipole::point_dipole_tensor(i, j, k, params),
        InteractionPrescription::Fcd => fcd::fcd_tensor(i, j, k, params, true),
        InteractionPrescription::FcdSt => fcd::fcd_tensor(i, j, k, params, false),
        InteractionPrescription::Igt => igt::igt_tensor(i, j, k, params),
        InteractionPrescription::IgtSo => igt::igt_tensor(i, j, k, params),
        InteractionPrescription::SecondOrder => second_order::second_order_tensor(i, j, k, params, log),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InteractionPrescription as P;

    fn params() -> KernelParams {
        KernelParams { gridspace: 0.1, wavenum: 1.0, refractive_index: Some(Complex64::new(1.5, 0.0)), igt_limit: 4.0 }
    }

    #[test]
    fn interaction_tensor_is_symmetric_under_mu_nu_swap() {
        // xy/xz/yz already store the single off-diagonal value, so symmetry
        // under mu<->nu is structural; this test checks reciprocity instead:
        // G(-n) == G(n) for the point-dipole and FCD prescriptions.
        for prescription in [P::PointDipole, P::Fcd, P::FcdSt] {
            let g1 = interaction_tensor(prescription, 2, 1, -1, params(), &crate::log::NullLog);
            let g2 = interaction_tensor(prescription, -2, -1, 1, params(), &crate::log::NullLog);
            assert!((g1.xx - g2.xx).norm() < 1e-10);
            assert!((g1.xy - g2.xy).norm() < 1e-10);
            assert!((g1.yz - g2.yz).norm() < 1e-10);
            assert!((g1.zz - g2.zz).norm() < 1e-10);
        }
    }
}
