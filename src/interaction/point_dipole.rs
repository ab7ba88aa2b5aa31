//! Point-dipole Green tensor, the baseline prescription all others correct
//! or replace (§4.2): `G_p^{mu nu} = e^{ikr}/r^3 . [delta_{mu nu}(kr^2-1+ikr) -
//! q_mu q_nu (kr^2-3+3ikr)]`.

use super::{KernelParams, SymmetricTensor3};
use num_complex::Complex64;

pub fn point_dipole_tensor(i: i64, j: i64, k: i64, params: KernelParams) -> SymmetricTensor3 {
    let (r, q, kr) = displacement_geometry(i, j, k, params);
    point_dipole_from_geometry(r, q, kr)
}

/// Shared geometry: physical distance `r`, unit direction `q`, and `kr = k*r`.
pub fn displacement_geometry(i: i64, j: i64, k: i64, params: KernelParams) -> (f64, [f64; 3], f64) {
    let n = [i as f64, j as f64, k as f64];
    let norm = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
    let r = params.gridspace * norm;
    let q = [n[0] / norm, n[1] / norm, n[2] / norm];
    let kr = params.wavenum * r;
    (r, q, kr)
}

pub fn point_dipole_from_geometry(r: f64, q: [f64; 3], kr: f64) -> SymmetricTensor3 {
    let phase = Complex64::from_polar(1.0, kr);
    let prefactor = phase / (r * r * r);

    let kr2 = kr * kr;
    let diag_scalar = Complex64::new(kr2 - 1.0, kr);
    let outer_scalar = Complex64::new(kr2 - 3.0, 3.0 * kr);

    let comp = |mu: usize, nu: usize| -> Complex64 {
        let delta = if mu == nu { 1.0 } else { 0.0 };
        prefactor * (delta * diag_scalar - q[mu] * q[nu] * outer_scalar)
    };

    SymmetricTensor3 {
        xx: comp(0, 0),
        xy: comp(0, 1),
        xz: comp(0, 2),
        yy: comp(1, 1),
        yz: comp(1, 2),
        zz: comp(2, 2),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> KernelParams {
        KernelParams { gridspace: 0.2, wavenum: 1.0, refractive_index: None, igt_limit: 4.0 }
    }

    #[test]
    fn reciprocity_under_full_sign_flip() {
        let g1 = point_dipole_tensor(3, -1, 2, params());
        let g2 = point_dipole_tensor(-3, 1, -2, params());
        assert!((g1.xx - g2.xx).norm() < 1e-12);
        assert!((g1.xy - g2.xy).norm() < 1e-12);
        assert!((g1.yz - g2.yz).norm() < 1e-12);
    }

    #[test]
    fn matches_convolution_property_for_single_dipole() {
        // S3: single dipole at origin, unit x-polarization; field at (1,0,0)
        // equals G^{xx}(1,0,0) exactly by construction of the kernel.
        let g = point_dipole_tensor(1, 0, 0, params());
        let out = g.apply([Complex64::new(1.0, 0.0), Complex64::new(0.0, 0.0), Complex64::new(0.0, 0.0)]);
        assert!((out[0] - g.xx).norm() < 1e-12);
        assert!((out[1] - g.xy).norm() < 1e-12);
        assert!((out[2] - g.xz).norm() < 1e-12);
    }
}
