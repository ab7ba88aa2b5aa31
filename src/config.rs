//! The equivalent configuration structure the orchestrator consumes (§6).
//! Command-line parsing itself is out of scope; this struct is the contract
//! a CLI front-end (or any other caller) must fill in and validate.

use crate::error::{ConfigError, EngineError, ValidationError};
use nalgebra::Vector3;

/// Inter-dipole interaction term, selected once at startup (§4.2, `int` option).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionPrescription {
    PointDipole,
    Igt,
    IgtSo,
    Fcd,
    FcdSt,
    SecondOrder,
}

impl InteractionPrescription {
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        Ok(match s {
            "poi" => Self::PointDipole,
            "igt" => Self::Igt,
            "igt_so" => Self::IgtSo,
            "fcd" => Self::Fcd,
            "fcd_st" => Self::FcdSt,
            "so" => Self::SecondOrder,
            other => return Err(ConfigError::UnknownInteraction(other.to_string())),
        })
    }
}

/// Self-polarizability prescription (`pol` option).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolarizabilityPrescription {
    ClausiusMossotti,
    RadiativeReaction,
    Ldr { avgpol: bool },
    CorrectedLdr,
    SecondOrder,
}

impl PolarizabilityPrescription {
    pub fn parse(s: &str, avgpol: bool) -> Result<Self, ConfigError> {
        Ok(match s {
            "cm" => Self::ClausiusMossotti,
            "rrc" => Self::RadiativeReaction,
            "ldr" => Self::Ldr { avgpol },
            "cldr" => Self::CorrectedLdr,
            "so" => Self::SecondOrder,
            other => return Err(ConfigError::UnknownPolarizability(other.to_string())),
        })
    }
}

/// Scattered-field evaluation formula (`scat` option).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScatFormula {
    DrainePhysRevB,
    SecondOrder,
}

impl ScatFormula {
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        Ok(match s {
            "dr" => Self::DrainePhysRevB,
            "so" => Self::SecondOrder,
            other => return Err(ConfigError::UnknownScatFormula(other.to_string())),
        })
    }
}

/// Iterative solver selection (`iter` option, C5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverKind {
    Cgnr,
    BiCgStab,
    BiCgSym,
    QmrSym,
}

impl SolverKind {
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        Ok(match s {
            "cgnr" => Self::Cgnr,
            "bicgstab" => Self::BiCgStab,
            "bicg" => Self::BiCgSym,
            "qmr" => Self::QmrSym,
            other => return Err(ConfigError::UnknownSolver(other.to_string())),
        })
    }
}

/// Incident beam shape (`beam` option).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Beam {
    Plane,
    Gaussian { w0: f64, x0: f64, y0: f64, z0: f64 },
}

/// Either a single fixed orientation or an averaging grid (`orient` option).
#[derive(Debug, Clone)]
pub enum Orientation {
    Fixed { alpha_deg: f64, beta_deg: f64, gamma_deg: f64 },
    Average { angle_file: Option<String> },
}

/// Which observables the orchestrator should compute (§6).
#[derive(Debug, Clone, Copy, Default)]
pub struct ObservableSelection {
    pub c_ext: bool,
    pub c_abs: bool,
    pub c_sca: bool,
    pub asym: bool,
    pub cpr_mat: bool,
}

/// Exactly one of `dpl` or `size` is supplied by the caller.
#[derive(Debug, Clone, Copy)]
pub enum SizeSpec {
    DipolesPerWavelength(f64),
    PhysicalXSize(f64),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub lambda: f64,
    pub box_dims: (usize, usize, usize),
    pub refractive_indices: Vec<num_complex::Complex64>,
    pub size_spec: SizeSpec,
    pub eps_neg_log10: f64,
    pub solver: SolverKind,
    pub polarizability: PolarizabilityPrescription,
    pub scat_formula: ScatFormula,
    pub interaction: InteractionPrescription,
    pub orientation: Orientation,
    pub beam: Beam,
    pub prop: Vector3<f64>,
    pub observables: ObservableSelection,
    pub maxiter: Option<usize>,
    pub ntheta: usize,
    pub reduced_fft: bool,
    pub nprocs: usize,
}

impl Config {
    /// `eps` as stored is `-log10(tolerance)`; §6.
    pub fn eps(&self) -> f64 {
        10f64.powf(-self.eps_neg_log10)
    }

    /// Cross-option and range checks that must all pass before any collective
    /// runs (§7): validation/configuration errors abort before collectives,
    /// identically on every worker.
    pub fn validate(&self) -> Result<(), EngineError> {
        if matches!(self.orientation, Orientation::Average { .. }) {
            // `prop` combined with orientation averaging is meaningless: the
            // propagation direction is defined per-orientation instead.
            let default_prop = Vector3::new(0.0, 0.0, 1.0);
            if (self.prop - default_prop).norm() > 1e-12 {
                return Err(ConfigError::PropWithOrientationAverage.into());
            }
        }
        let prop_norm = self.prop.norm();
        if (prop_norm - 1.0).abs() > 1e-9 {
            return Err(ValidationError::NonUnitPropagation(prop_norm).into());
        }
        let nmat = self.refractive_indices.len();
        if nmat == 0 {
            return Err(ConfigError::MaterialIndexOutOfRange(0, 0).into());
        }
        // The SO kernel (§4.2) carries a single scalar refractive index
        // through its closed-form and far-field tables; it has no per-pair
        // material slot the way `igt`/`fcd` do, so a multi-material target
        // cannot be driven through it.
        if nmat > 1 && matches!(self.interaction, InteractionPrescription::SecondOrder) {
            return Err(EngineError::AnisotropicMaterialWithSecondOrder(nmat));
        }
        Ok(())
    }

    pub fn default_maxiter(&self, nvoid_ndip: usize) -> usize {
        self.maxiter.unwrap_or(3 * nvoid_ndip)
    }

    /// Lattice spacing in the same length unit as `lambda`, derived from
    /// whichever of `dpl`/`size` was supplied (§6: "exactly one must be set").
    pub fn gridspace(&self) -> f64 {
        match self.size_spec {
            SizeSpec::DipolesPerWavelength(dpl) => self.lambda / dpl,
            SizeSpec::PhysicalXSize(size) => size / self.box_dims.0 as f64,
        }
    }

    pub fn wavenum(&self) -> f64 {
        2.0 * std::f64::consts::PI / self.lambda
    }
}
