//! Cross-section and radiation-pressure observables computed from the
//! converged dipole moments (§6's observable selection, `Cext`/`Cabs`/
//! `Csca`/`asym`/`Cpr_mat`). Formulas follow Draine, Astrophys. J. 333,
//! 848-872 (1988), which this engine's `scat=dr` prescription is named
//! after (§4.6) — no cross-section source file was available to ground
//! this module on directly (see DESIGN.md), so it is supplemented from
//! that standard reference rather than ported line by line.

use num_complex::Complex64;

use crate::romberg::{Romberg2D, RombergParams};

/// `Cext = (4 pi k / |E_inc|^2) sum_i Im(E_inc_i^* . p_i)` (Draine 1988 eq. 5),
/// the optical theorem applied to the incident-field/dipole-moment overlap.
/// `moments` and `incident` are both flattened `3 * n_sites` arrays.
pub fn extinction_cross_section(wavenum: f64, incident: &[Complex64], moments: &[Complex64], e_inc_norm_sq: f64) -> f64 {
    let mut acc = 0.0;
    for (e, p) in incident.iter().zip(moments.iter()) {
        acc += (e.conj() * p).im;
    }
    4.0 * std::f64::consts::PI * wavenum * acc / e_inc_norm_sq
}

/// `Cabs = (4 pi k / |E_inc|^2) sum_i [Im(p_i . (alpha_i^-1)^* . p_i^*) - (2/3) k^3 |p_i|^2]`
/// (Draine 1988 eq. 6): dissipation inside each dipole minus the radiative
/// self-reaction already folded into its polarizability.
pub fn absorption_cross_section(
    wavenum: f64,
    moments: &[Complex64],
    alpha_inv: &[Complex64],
    e_inc_norm_sq: f64,
) -> f64 {
    let mut acc = 0.0;
    let k3 = wavenum.powi(3);
    for (p, a_inv) in moments.iter().zip(alpha_inv.iter()) {
        let term = (p * a_inv.conj() * p.conj()).im;
        acc += term - (2.0 / 3.0) * k3 * p.norm_sqr();
    }
    4.0 * std::f64::consts::PI * wavenum * acc / e_inc_norm_sq
}

pub fn scattering_cross_section(c_ext: f64, c_abs: f64) -> f64 {
    c_ext - c_abs
}

/// `dC_sca/dOmega` for a fixed far-field direction `n_hat`, summed over the
/// dipole array (Draine 1988 eq. 13): each dipole radiates as a point
/// source with phase `exp(-i k n_hat . r_j)`, and the angular Poynting flux
/// is assembled from the component of `p_j` transverse to `n_hat`.
fn differential_cross_section(
    wavenum: f64,
    n_hat: [f64; 3],
    moments: &[Complex64],
    positions: &[[f64; 3]],
) -> f64 {
    let mut sum = [Complex64::new(0.0, 0.0); 3];
    for (p, r) in moments.chunks_exact(3).zip(positions.iter()) {
        let phase_arg = -wavenum * (n_hat[0] * r[0] + n_hat[1] * r[1] + n_hat[2] * r[2]);
        let phase = Complex64::new(phase_arg.cos(), phase_arg.sin());
        for axis in 0..3 {
            sum[axis] += p[axis] * phase;
        }
    }
    // subtract the radial component: only the transverse part radiates
    let dot: Complex64 = sum.iter().zip(n_hat.iter()).map(|(s, n)| s * n).sum();
    let mut transverse_norm_sq = 0.0;
    for axis in 0..3 {
        let t = sum[axis] - dot * n_hat[axis];
        transverse_norm_sq += t.norm_sqr();
    }
    wavenum.powi(4) * transverse_norm_sq
}

/// Direction cosines for spherical angles `(theta, phi)`, `theta` measured
/// from the z-axis.
fn direction(theta: f64, phi: f64) -> [f64; 3] {
    [theta.sin() * phi.cos(), theta.sin() * phi.sin(), theta.cos()]
}

/// Integrates the far-field differential cross section over the full
/// sphere to recover the asymmetry parameter `g = <cos(theta_sca)>` and the
/// radiation-pressure efficiency `Cpr_mat = Csca - g . Csca` (§6 `asym`,
/// `Cpr_mat`), using the adaptive 2-D Romberg quadrature of C6 rather than a
/// fixed angular grid.
pub fn angular_integrated_observables(
    wavenum: f64,
    prop: [f64; 3],
    moments: &[Complex64],
    positions: &[[f64; 3]],
    ntheta: usize,
) -> (f64, f64, f64, usize) {
    use std::f64::consts::PI;

    let theta_params = RombergParams {
        min: 0.0,
        max: PI,
        jmin: 2,
        jmax: ntheta.max(3),
        eps: 1e-4,
        periodic: false,
        equival: false,
    };
    let phi_params =
        RombergParams { min: 0.0, max: 2.0 * PI, jmin: 2, jmax: ntheta.max(3), eps: 1e-4, periodic: true, equival: false };

    let theta_grid = theta_params.grid_size();
    let phi_grid = phi_params.grid_size();

    let mut romberg = Romberg2D::new(3, &theta_params, &phi_params);
    let mut func = move |ti: usize, pi: usize, out: &mut [f64]| -> f64 {
        let theta = theta_params.min + (theta_params.max - theta_params.min) * ti as f64 / (theta_grid - 1) as f64;
        let phi = phi_params.min + (phi_params.max - phi_params.min) * pi as f64 / (phi_grid - 1) as f64;
        let n_hat = direction(theta, phi);
        let dcs = differential_cross_section(wavenum, n_hat, moments, positions);
        let cos_sca = n_hat[0] * prop[0] + n_hat[1] * prop[1] + n_hat[2] * prop[2];
        // weight by sin(theta) for the solid-angle element, fold into all
        // three accumulated quantities at once: [Csca, g-weighted Csca, unused]
        let jac = theta.sin();
        out[0] = dcs * jac;
        out[1] = dcs * cos_sca * jac;
        out[2] = 0.0;
        0.0
    };

    let (res, _err) = romberg.integrate(&theta_params, &phi_params, &mut func);
    let solid_angle = (theta_params.max - theta_params.min) * (phi_params.max - phi_params.min);
    let c_sca = res[0] * solid_angle;
    let g_weighted = res[1] * solid_angle;
    let g = if c_sca.abs() > 1e-300 { g_weighted / c_sca } else { 0.0 };
    let c_pr = c_sca - g * c_sca;
    (c_sca, g, c_pr, romberg.inner_not_converged())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extinction_is_zero_for_real_in_phase_overlap() {
        // Im(E* . p) = 0 when E and p are both purely real, so Cext is zero
        // regardless of wavenumber — a degenerate but useful sanity check.
        let incident = vec![Complex64::new(1.0, 0.0), Complex64::new(0.0, 0.0), Complex64::new(0.0, 0.0)];
        let moments = vec![Complex64::new(0.5, 0.0), Complex64::new(0.0, 0.0), Complex64::new(0.0, 0.0)];
        let c_ext = extinction_cross_section(1.0, &incident, &moments, 1.0);
        assert!(c_ext.abs() < 1e-12);
    }

    #[test]
    fn scattering_cross_section_is_extinction_minus_absorption() {
        assert!((scattering_cross_section(5.0, 2.0) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn single_dipole_angular_integration_is_finite_and_non_negative() {
        let moments = vec![Complex64::new(1.0, 0.0), Complex64::new(0.0, 0.0), Complex64::new(0.0, 0.0)];
        let positions = vec![[0.0, 0.0, 0.0]];
        let (c_sca, g, c_pr, _inner_not_converged) = angular_integrated_observables(1.0, [0.0, 0.0, 1.0], &moments, &positions, 4);
        assert!(c_sca >= 0.0);
        assert!(g.abs() <= 1.0 + 1e-6);
        assert!(c_pr.is_finite());
    }
}
