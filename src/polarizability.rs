//! Self (diagonal) dipole polarizability, prescription selected by the `pol`
//! option (§3, §6). Distinct from the inter-dipole interaction kernel (C2):
//! this is the `(0,0,0)` term the interaction module explicitly excludes.
//!
//! `CM` is the static Clausius-Mossotti polarizability; `RRC` adds the
//! radiative-reaction correction; `LDR` is the Draine & Goodman (1993)
//! lattice dispersion relation, which also folds in the radiative-reaction
//! term; `CLDR` is its per-axis corrected variant (Gutkowicz-Krusin & Draine,
//! 2004); `SO` (second order) reuses the plain Clausius-Mossotti value,
//! matching the self term the second-order interaction kernel was derived
//! against (documented as an Open Question resolution in DESIGN.md).

use crate::config::PolarizabilityPrescription;
use num_complex::Complex64;
use std::f64::consts::PI;

const LDR_B1: f64 = -1.891_531_6;
const LDR_B2: f64 = 0.164_846_9;
const LDR_B3: f64 = -1.770_000_4;

/// Orientation-averaged value of `S = sum_mu (a_mu e_mu)^2` used by the
/// `ldr avgpol` sub-option, which drops the dependence on incidence and
/// polarization direction entirely.
const LDR_AVGPOL_S: f64 = 0.2;

pub struct PolarizabilityInputs {
    pub gridspace: f64,
    pub wavenum: f64,
    pub refractive_index: Complex64,
    /// Incident propagation direction, unit vector.
    pub prop: [f64; 3],
    /// Incident polarization direction, unit vector (real part only — DDA
    /// polarization bases are taken along real Cartesian axes).
    pub polarization: [f64; 3],
}

fn clausius_mossotti(inputs: &PolarizabilityInputs) -> Complex64 {
    let d3 = inputs.gridspace.powi(3);
    let eps = inputs.refractive_index * inputs.refractive_index;
    let one = Complex64::new(1.0, 0.0);
    (Complex64::new(3.0 * d3 / (4.0 * PI), 0.0)) * (eps - one) / (eps + Complex64::new(2.0, 0.0))
}

fn radiative_reaction(alpha_cm: Complex64, wavenum: f64) -> Complex64 {
    let k3 = wavenum.powi(3);
    let denom = Complex64::new(1.0, 0.0) - Complex64::new(0.0, (2.0 / 3.0) * k3) * alpha_cm;
    alpha_cm / denom
}

fn ldr_scalar(inputs: &PolarizabilityInputs, avgpol: bool) -> Complex64 {
    let alpha_cm = clausius_mossotti(inputs);
    let d = inputs.gridspace;
    let kd = inputs.wavenum * d;
    let m2 = inputs.refractive_index * inputs.refractive_index;

    let s = if avgpol {
        LDR_AVGPOL_S
    } else {
        inputs.prop.iter().zip(inputs.polarization.iter()).map(|(a, e)| (a * e).powi(2)).sum()
    };

    let bracket = Complex64::new(LDR_B1 + LDR_B2 * kd * kd, 0.0)
        + m2 * Complex64::new(LDR_B3 * s, 0.0);
    let geometric_correction = (alpha_cm / Complex64::new(d * d * d, 0.0)) * bracket * Complex64::new(kd * kd, 0.0);
    let radiative = Complex64::new(0.0, (2.0 / 3.0) * inputs.wavenum.powi(3)) * alpha_cm;

    alpha_cm / (Complex64::new(1.0, 0.0) + geometric_correction - radiative)
}

fn cldr_diagonal(inputs: &PolarizabilityInputs) -> [Complex64; 3] {
    let alpha_cm = clausius_mossotti(inputs);
    let d = inputs.gridspace;
    let kd = inputs.wavenum * d;
    let m2 = inputs.refractive_index * inputs.refractive_index;
    let radiative = Complex64::new(0.0, (2.0 / 3.0) * inputs.wavenum.powi(3)) * alpha_cm;

    let mut out = [Complex64::new(0.0, 0.0); 3];
    for mu in 0..3 {
        let s_mu = (inputs.prop[mu] * inputs.polarization[mu]).powi(2);
        let bracket = Complex64::new(LDR_B1 + LDR_B2 * kd * kd, 0.0) + m2 * Complex64::new(LDR_B3 * s_mu, 0.0);
        let geometric_correction = (alpha_cm / Complex64::new(d * d * d, 0.0)) * bracket * Complex64::new(kd * kd, 0.0);
        out[mu] = alpha_cm / (Complex64::new(1.0, 0.0) + geometric_correction - radiative);
    }
    out
}

/// Returns the diagonal self-polarizability tensor `{alpha_x, alpha_y, alpha_z}`.
/// All prescriptions except `CLDR` are isotropic (the three entries are equal).
pub fn self_polarizability(prescription: PolarizabilityPrescription, inputs: &PolarizabilityInputs) -> [Complex64; 3] {
    match prescription {
        PolarizabilityPrescription::ClausiusMossotti | PolarizabilityPrescription::SecondOrder => {
            let a = clausius_mossotti(inputs);
            [a, a, a]
        }
        PolarizabilityPrescription::RadiativeReaction => {
            let a = radiative_reaction(clausius_mossotti(inputs), inputs.wavenum);
            [a, a, a]
        }
        PolarizabilityPrescription::Ldr { avgpol } => {
            let a = ldr_scalar(inputs, avgpol);
            [a, a, a]
        }
        PolarizabilityPrescription::CorrectedLdr => cldr_diagonal(inputs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs() -> PolarizabilityInputs {
        PolarizabilityInputs {
            gridspace: 0.1,
            wavenum: 1.0,
            refractive_index: Complex64::new(1.5, 0.01),
            prop: [0.0, 0.0, 1.0],
            polarization: [1.0, 0.0, 0.0],
        }
    }

    #[test]
    fn cm_has_positive_real_part_for_dense_dielectric() {
        let a = clausius_mossotti(&inputs());
        assert!(a.re > 0.0);
    }

    #[test]
    fn rrc_reduces_to_cm_as_k_to_zero() {
        let mut i = inputs();
        i.wavenum = 1e-6;
        let cm = clausius_mossotti(&i);
        let rrc = radiative_reaction(cm, i.wavenum);
        assert!((cm - rrc).norm() < 1e-9);
    }

    #[test]
    fn cldr_is_isotropic_when_prop_perpendicular_to_polarization() {
        // a = z, e = x: a . e per-axis products are all zero, so every axis
        // gets the same (zero) S_mu correction term.
        let out = cldr_diagonal(&inputs());
        assert!((out[0] - out[1]).norm() < 1e-12);
        assert!((out[1] - out[2]).norm() < 1e-12);
    }

    #[test]
    fn avgpol_ignores_prop_and_polarization() {
        let mut i = inputs();
        let a1 = ldr_scalar(&i, true);
        i.prop = [1.0, 0.0, 0.0];
        i.polarization = [0.0, 1.0, 0.0];
        let a2 = ldr_scalar(&i, true);
        assert!((a1 - a2).norm() < 1e-12);
    }
}
