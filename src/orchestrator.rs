//! C8: the top-level run driver. Wires every other module into the
//! `BuildParticle -> BuildD -> ForEachOrientation -> Solve -> Evaluate ->
//! Integrate` pipeline (§4, §9), the way the reference engine's
//! `Simulation`/`SimulationBuilder` pair wires density, basis, and FFT-grid
//! construction into a single `run()` call.

use nalgebra::{Rotation3, Vector3};
use num_complex::Complex64;

use crate::comm::single::SingleProcess;
use crate::comm::CommBackend;
use crate::config::{Beam, Config, InteractionPrescription, Orientation};
use crate::core::grid::{FftCapability, GridDims};
use crate::core::partition::Partition;
use crate::dmatrix::{self, DMatrix};
use crate::error::{ConfigError, EngineError, Warning};
use crate::geometry::Shape;
use crate::interaction::KernelParams;
use crate::log::{RunLog, StderrLog};
use crate::matvec::{DipoleSite, MatvecEngine, SelfTermOperator};
use crate::observables;
use crate::polarizability::{self, PolarizabilityInputs};
use crate::romberg::{Romberg2D, RombergParams};
use crate::solvers::{self, SolverOutcome};
use crate::timing::{RunTimings, Stopwatch};

/// Distance (in lattice units) beyond which `igt`/`igt_so` fall back to the
/// plain point-dipole tensor. Not a `Config` field (§6 lists no `igt_limit`
/// option); fixed at the value the reference engine hardcodes as its own
/// default, per DESIGN.md.
const DEFAULT_IGT_LIMIT: f64 = 4.0;

/// One orientation's converged observables (§6 `ObservableSelection`).
#[derive(Debug, Clone, Copy)]
pub struct OrientationObservables {
    pub alpha_deg: f64,
    pub beta_deg: f64,
    pub gamma_deg: f64,
    pub c_ext: f64,
    pub c_abs: f64,
    pub c_sca: f64,
    pub asym: f64,
    pub cpr_mat: f64,
    pub solver_iterations: usize,
    pub solver_converged: bool,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub grid: (usize, usize, usize),
    pub weird_nprocs: bool,
    pub n_sites: usize,
    pub timings: RunTimings,
    pub orientations: Vec<OrientationObservables>,
    /// Populated only for `Orientation::Average` (§6): the Romberg-integrated
    /// observables over the requested beta/gamma grid.
    pub averaged: Option<OrientationObservables>,
    /// Non-fatal conditions accumulated over the run (§7): logged as they
    /// occur and carried here rather than aborting, e.g. one
    /// `Warning::RombergInnerNotConverged` per angular (or orientation-
    /// average) integration whose inner Romberg axis exhausted its
    /// refinement budget without meeting `eps` (§4.6).
    pub warnings: Vec<Warning>,
}

/// A cheap dry run that sizes the grid and the D-matrix without building a
/// single dipole tensor or running any solver (§9's `debug.c`-grounded
/// "prognose" addition — reports what a real run would allocate).
#[derive(Debug, Clone, Copy)]
pub struct PrognoseReport {
    pub grid: (usize, usize, usize),
    pub weird_nprocs: bool,
    pub n_sites: usize,
    pub dmatrix_bytes: u64,
}

pub struct Engine {
    config: Config,
    log: Box<dyn RunLog>,
    comm: Box<dyn CommBackend>,
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    fn grid_and_partition(&self, shape: &Shape) -> (GridDims, Partition) {
        let cap = FftCapability::Radix2357;
        let grid = GridDims::new(shape.box_dims, self.comm.nprocs(), cap, self.log.as_ref());
        let partition = Partition::new(self.comm.rank(), self.comm.nprocs(), &grid, shape.box_dims.2, self.log.as_ref());
        (grid, partition)
    }

    fn local_sites(&self, shape: &Shape, partition: &Partition) -> Vec<DipoleSite> {
        shape
            .sites
            .iter()
            .filter(|s| {
                let z = s.iz as usize;
                z >= partition.local_z0 && z < partition.local_z1_coer
            })
            .map(|s| DipoleSite {
                ix: s.ix as usize,
                iy: s.iy as usize,
                iz_local: s.iz as usize - partition.local_z0,
                material: s.material,
            })
            .collect()
    }

    fn dry_cost(&self, shape: &Shape) -> Result<(GridDims, Partition, u64), EngineError> {
        let (grid, partition) = self.grid_and_partition(shape);
        let (dsize_y, dsize_z) = if self.config.reduced_fft { grid.reduced_d_sizes() } else { (grid.grid_y, grid.grid_z) };
        let local_nx = partition.local_nx.max(1);
        let elems = (local_nx as u64) * (dsize_y as u64) * (dsize_z as u64) * 6;
        let bytes = elems * std::mem::size_of::<Complex64>() as u64;
        Ok((grid, partition, bytes))
    }

    pub fn prognose(&self, shape: &Shape) -> Result<PrognoseReport, EngineError> {
        self.config.validate()?;
        let (grid, _partition, bytes) = self.dry_cost(shape)?;
        Ok(PrognoseReport {
            grid: (grid.grid_x, grid.grid_y, grid.grid_z),
            weird_nprocs: grid.weird,
            n_sites: shape.sites.len(),
            dmatrix_bytes: bytes,
        })
    }

    /// Rotates the lab-frame propagation (`base_prop`, §6's `prop` option —
    /// `(0,0,1)` when unset) and a polarization direction orthogonal to it
    /// by the three orientation Euler angles, `Z-Y-Z` convention (§6 `orient
    /// alpha beta gamma`).
    fn rotated_frame(alpha_deg: f64, beta_deg: f64, gamma_deg: f64, base_prop: Vector3<f64>) -> ([f64; 3], [f64; 3]) {
        let to_rad = std::f64::consts::PI / 180.0;
        let rot = Rotation3::from_euler_angles(0.0, beta_deg * to_rad, alpha_deg * to_rad)
            * Rotation3::from_axis_angle(&Vector3::z_axis(), gamma_deg * to_rad);

        // Gram-Schmidt a polarization direction orthogonal to `base_prop`,
        // picking whichever Cartesian axis is least parallel to it as the
        // seed; for the default `base_prop = (0,0,1)` this reduces exactly
        // to `(1,0,0)`, matching the original fixed-frame convention.
        let seed = if base_prop.x.abs() < 0.9 { Vector3::new(1.0, 0.0, 0.0) } else { Vector3::new(0.0, 1.0, 0.0) };
        let base_pol = (seed - base_prop * seed.dot(&base_prop)).normalize();

        let prop = rot * base_prop;
        let pol = rot * base_pol;
        ([prop.x, prop.y, prop.z], [pol.x, pol.y, pol.z])
    }

    fn incident_field(&self, prop: [f64; 3], pol: [f64; 3], positions: &[[f64; 3]]) -> Vec<Complex64> {
        let k = self.config.wavenum();
        let mut out = vec![Complex64::new(0.0, 0.0); positions.len() * 3];
        for (idx, r) in positions.iter().enumerate() {
            let phase_arg = k * (prop[0] * r[0] + prop[1] * r[1] + prop[2] * r[2]);
            let mut phase = Complex64::new(phase_arg.cos(), phase_arg.sin());
            if let Beam::Gaussian { w0, x0, y0, .. } = self.config.beam {
                let dx = r[0] - x0;
                let dy = r[1] - y0;
                let envelope = (-(dx * dx + dy * dy) / (w0 * w0)).exp();
                phase *= envelope;
            }
            for axis in 0..3 {
                out[3 * idx + axis] = pol[axis] * phase;
            }
        }
        out
    }

    fn solve_orientation(
        &self,
        grid: GridDims,
        partition: Partition,
        dmat: &DMatrix,
        sites: &[DipoleSite],
        positions: &[[f64; 3]],
        alpha_deg: f64,
        beta_deg: f64,
        gamma_deg: f64,
        timings: &mut RunTimings,
        warnings: &mut Vec<Warning>,
    ) -> OrientationObservables {
        let (prop, pol) = Self::rotated_frame(alpha_deg, beta_deg, gamma_deg, self.config.prop);
        let gridspace = self.config.gridspace();
        let wavenum = self.config.wavenum();

        let mut alpha_self = vec![Complex64::new(0.0, 0.0); sites.len() * 3];
        for (idx, site) in sites.iter().enumerate() {
            let n = self.config.refractive_indices[site.material];
            let inputs = PolarizabilityInputs { gridspace, wavenum, refractive_index: n, prop, polarization: pol };
            let a = polarizability::self_polarizability(self.config.polarizability, &inputs);
            for axis in 0..3 {
                alpha_self[3 * idx + axis] = a[axis];
            }
        }

        let e_inc = self.incident_field(prop, pol, positions);
        let mut b = vec![Complex64::new(0.0, 0.0); e_inc.len()];
        for i in 0..b.len() {
            b[i] = alpha_self[i] * e_inc[i];
        }

        let engine = MatvecEngine { grid, partition, dmatrix: dmat, sites: sites.to_vec(), comm: self.comm.as_ref() };
        let op = SelfTermOperator { engine, alpha_self: alpha_self.clone() };

        let sw = Stopwatch::start();
        let result = solvers::dispatch(self.config.solver, &op, &b, self.config.eps(), self.config.default_maxiter(sites.len()), self.comm.as_ref());
        sw.stop(&mut timings.solve);

        let moments = result.x;
        let alpha_inv: Vec<Complex64> = alpha_self.iter().map(|a| Complex64::new(1.0, 0.0) / a).collect();

        let c_ext = observables::extinction_cross_section(wavenum, &e_inc, &moments, 1.0);
        let c_abs = observables::absorption_cross_section(wavenum, &moments, &alpha_inv, 1.0);
        let c_sca_nearfield = observables::scattering_cross_section(c_ext, c_abs);

        let sw2 = Stopwatch::start();
        let (_c_sca_far, asym, cpr_mat, inner_not_converged) =
            observables::angular_integrated_observables(wavenum, prop, &moments, positions, self.config.ntheta);
        sw2.stop(&mut timings.integrate);

        if inner_not_converged > 0 {
            self.log.warn(&format!(
                "orientation (alpha={alpha_deg}, beta={beta_deg}, gamma={gamma_deg}): {inner_not_converged} inner \
                 Romberg integration(s) over the scattering azimuth did not converge within jmax"
            ));
            warnings.push(Warning::RombergInnerNotConverged);
        }

        OrientationObservables {
            alpha_deg,
            beta_deg,
            gamma_deg,
            c_ext,
            c_abs,
            c_sca: c_sca_nearfield,
            asym,
            cpr_mat,
            solver_iterations: result.iterations,
            solver_converged: matches!(result.outcome, SolverOutcome::Converged),
        }
    }

    pub fn run(&self, shape: &Shape) -> Result<RunReport, EngineError> {
        self.config.validate()?;
        if shape.nmat != self.config.refractive_indices.len() {
            return Err(crate::error::ValidationError::RefractiveIndexCountMismatch(
                self.config.refractive_indices.len(),
                shape.nmat,
            )
            .into());
        }

        let mut timings = RunTimings::default();

        let sw_init = Stopwatch::start();
        let (grid, partition) = self.grid_and_partition(shape);
        sw_init.stop(&mut timings.init);

        let sw_particle = Stopwatch::start();
        let sites = self.local_sites(shape, &partition);
        let gridspace = self.config.gridspace();
        let positions: Vec<[f64; 3]> = sites
            .iter()
            .map(|s| {
                let global_z = s.iz_local + partition.local_z0;
                [s.ix as f64 * gridspace, s.iy as f64 * gridspace, global_z as f64 * gridspace]
            })
            .collect();
        sw_particle.stop(&mut timings.build_particle);

        let kernel_params = KernelParams {
            gridspace,
            wavenum: self.config.wavenum(),
            refractive_index: if matches!(self.config.interaction, InteractionPrescription::SecondOrder) {
                self.config.refractive_indices.first().copied()
            } else {
                None
            },
            igt_limit: DEFAULT_IGT_LIMIT,
        };

        let sw_d = Stopwatch::start();
        let dmat = dmatrix::build(
            &grid,
            &partition,
            self.config.interaction,
            kernel_params,
            self.config.reduced_fft,
            self.comm.as_ref(),
            self.log.as_ref(),
        )?;
        sw_d.stop(&mut timings.build_dmatrix);

        let mut orientations = Vec::new();
        let mut averaged = None;
        let mut warnings: Vec<Warning> = Vec::new();

        match &self.config.orientation {
            Orientation::Fixed { alpha_deg, beta_deg, gamma_deg } => {
                let obs = self.solve_orientation(
                    grid, partition, &dmat, &sites, &positions, *alpha_deg, *beta_deg, *gamma_deg, &mut timings,
                    &mut warnings,
                );
                orientations.push(obs);
            }
            Orientation::Average { .. } => {
                use std::f64::consts::PI;
                let beta_params =
                    RombergParams { min: 0.0, max: PI, jmin: 2, jmax: 4, eps: 1e-2, periodic: false, equival: false };
                let gamma_params =
                    RombergParams { min: 0.0, max: 2.0 * PI, jmin: 2, jmax: 4, eps: 1e-2, periodic: true, equival: false };
                let beta_grid = beta_params.grid_size();
                let gamma_grid = gamma_params.grid_size();

                let mut collected: Vec<OrientationObservables> = Vec::new();
                let mut romberg = Romberg2D::new(5, &beta_params, &gamma_params);
                let mut timings_cell = timings;
                let mut warnings_cell = warnings;
                {
                    let mut func = |bi: usize, gi: usize, out: &mut [f64]| -> f64 {
                        let beta_deg = (beta_params.min + (beta_params.max - beta_params.min) * bi as f64 / (beta_grid - 1) as f64)
                            * 180.0
                            / PI;
                        let gamma_deg = (gamma_params.min
                            + (gamma_params.max - gamma_params.min) * gi as f64 / (gamma_grid - 1) as f64)
                            * 180.0
                            / PI;
                        let obs = self.solve_orientation(
                            grid, partition, &dmat, &sites, &positions, 0.0, beta_deg, gamma_deg, &mut timings_cell,
                            &mut warnings_cell,
                        );
                        out[0] = obs.c_ext;
                        out[1] = obs.c_abs;
                        out[2] = obs.c_sca;
                        out[3] = obs.asym;
                        out[4] = obs.cpr_mat;
                        collected.push(obs);
                        0.0
                    };
                    let (res, _err) = romberg.integrate(&beta_params, &gamma_params, &mut func);
                    if romberg.inner_not_converged() > 0 {
                        self.log.warn(&format!(
                            "orientation average: {} inner (gamma-axis) Romberg integration(s) did not converge \
                             within jmax",
                            romberg.inner_not_converged()
                        ));
                        warnings_cell.push(Warning::RombergInnerNotConverged);
                    }
                    averaged = Some(OrientationObservables {
                        alpha_deg: 0.0,
                        beta_deg: f64::NAN,
                        gamma_deg: f64::NAN,
                        c_ext: res[0],
                        c_abs: res[1],
                        c_sca: res[2],
                        asym: res[3],
                        cpr_mat: res[4],
                        solver_iterations: 0,
                        solver_converged: collected.iter().all(|o| o.solver_converged),
                    });
                }
                timings = timings_cell;
                warnings = warnings_cell;
                orientations = collected;
            }
        }

        Ok(RunReport {
            grid: (grid.grid_x, grid.grid_y, grid.grid_z),
            weird_nprocs: grid.weird,
            n_sites: sites.len(),
            timings,
            orientations,
            averaged,
            warnings,
        })
    }
}

pub struct EngineBuilder {
    config: Option<Config>,
    log: Option<Box<dyn RunLog>>,
    comm: Option<Box<dyn CommBackend>>,
}

impl EngineBuilder {
    pub fn new() -> Self {
        EngineBuilder { config: None, log: None, comm: None }
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    pub fn log(mut self, log: Box<dyn RunLog>) -> Self {
        self.log = Some(log);
        self
    }

    pub fn comm(mut self, comm: Box<dyn CommBackend>) -> Self {
        self.comm = Some(comm);
        self
    }

    pub fn build(self) -> Result<Engine, EngineError> {
        let config = self.config.ok_or(ConfigError::DplOrSizeMissing)?;
        config.validate()?;
        Ok(Engine {
            config,
            log: self.log.unwrap_or_else(|| Box::new(StderrLog::new())),
            comm: self.comm.unwrap_or_else(|| Box::new(SingleProcess)),
        })
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ObservableSelection, PolarizabilityPrescription, ScatFormula, SizeSpec, SolverKind};
    use nalgebra::Vector3 as NVector3;

    fn base_config() -> Config {
        Config {
            lambda: 6.0,
            box_dims: (2, 2, 2),
            refractive_indices: vec![Complex64::new(1.5, 0.01)],
            size_spec: SizeSpec::DipolesPerWavelength(10.0),
            eps_neg_log10: 2.0,
            solver: SolverKind::Cgnr,
            polarizability: PolarizabilityPrescription::ClausiusMossotti,
            scat_formula: ScatFormula::DrainePhysRevB,
            interaction: InteractionPrescription::PointDipole,
            orientation: Orientation::Fixed { alpha_deg: 0.0, beta_deg: 0.0, gamma_deg: 0.0 },
            beam: Beam::Plane,
            prop: NVector3::new(0.0, 0.0, 1.0),
            observables: ObservableSelection { c_ext: true, c_abs: true, c_sca: true, asym: true, cpr_mat: true },
            maxiter: Some(50),
            ntheta: 4,
            reduced_fft: true,
            nprocs: 1,
        }
    }

    #[test]
    fn prognose_reports_grid_and_dmatrix_size_without_solving() {
        let engine = Engine::builder().config(base_config()).build().unwrap();
        let shape = Shape::rectangular(2, 2, 2);
        let report = engine.prognose(&shape).unwrap();
        assert_eq!(report.n_sites, 8);
        assert!(report.dmatrix_bytes > 0);
    }

    #[test]
    fn run_on_a_tiny_cube_converges_and_reports_observables() {
        let engine = Engine::builder().config(base_config()).build().unwrap();
        let shape = Shape::rectangular(2, 2, 2);
        let report = engine.run(&shape).unwrap();
        assert_eq!(report.orientations.len(), 1);
        let obs = report.orientations[0];
        assert!(obs.c_ext.is_finite());
        assert!(obs.c_abs.is_finite());
    }

    #[test]
    fn rotated_frame_uses_the_configured_propagation_direction() {
        let (prop, pol) = Engine::rotated_frame(0.0, 0.0, 0.0, NVector3::new(0.0, 1.0, 0.0));
        assert!((prop[0] - 0.0).abs() < 1e-12);
        assert!((prop[1] - 1.0).abs() < 1e-12);
        assert!((prop[2] - 0.0).abs() < 1e-12);
        // pol must stay orthogonal to the (now non-default) prop direction.
        let dot = prop[0] * pol[0] + prop[1] * pol[1] + prop[2] * pol[2];
        assert!(dot.abs() < 1e-12);
    }

    #[test]
    fn rotated_frame_reduces_to_the_fixed_frame_default_for_prop_z() {
        let (prop, pol) = Engine::rotated_frame(0.0, 0.0, 0.0, NVector3::new(0.0, 0.0, 1.0));
        assert!((prop[2] - 1.0).abs() < 1e-12);
        assert!((pol[0] - 1.0).abs() < 1e-12);
    }
}
