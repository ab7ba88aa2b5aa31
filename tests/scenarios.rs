//! Integration tests exercising the literal scenarios of spec.md §8 at
//! reduced grid sizes (S1, S2, S4; S3 is covered directly against the
//! interaction kernel in `src/interaction/point_dipole.rs`'s unit tests,
//! and S5's multi-worker partition invariance needs the `mpi` feature and a
//! real process group to mean anything, so it isn't exercised here).

use adda_rs::config::{
    Beam, Config, InteractionPrescription, ObservableSelection, Orientation, PolarizabilityPrescription,
    ScatFormula, SizeSpec, SolverKind,
};
use adda_rs::geometry::Shape;
use adda_rs::Engine;
use nalgebra::Vector3;
use num_complex::Complex64;

fn plane_wave_config(box_dims: (usize, usize, usize), refractive_indices: Vec<Complex64>) -> Config {
    Config {
        lambda: 8.0,
        box_dims,
        refractive_indices,
        size_spec: SizeSpec::DipolesPerWavelength(box_dims.0 as f64),
        eps_neg_log10: 5.0,
        solver: SolverKind::Cgnr,
        polarizability: PolarizabilityPrescription::ClausiusMossotti,
        scat_formula: ScatFormula::DrainePhysRevB,
        interaction: InteractionPrescription::PointDipole,
        orientation: Orientation::Fixed { alpha_deg: 0.0, beta_deg: 0.0, gamma_deg: 0.0 },
        beam: Beam::Plane,
        prop: Vector3::new(0.0, 0.0, 1.0),
        observables: ObservableSelection { c_ext: true, c_abs: true, c_sca: true, asym: true, cpr_mat: true },
        maxiter: Some(200),
        ntheta: 5,
        reduced_fft: true,
        nprocs: 1,
    }
}

/// S1 (reduced): a small homogeneous sphere under a plane wave converges
/// within `maxiter` and yields finite, physically sane cross-sections
/// (`Cext >= Cabs >= 0`, since a lossy sphere cannot absorb more than it
/// extincts) under CGNR.
#[test]
fn s1_homogeneous_sphere_converges_with_sane_cross_sections() {
    let config = plane_wave_config((6, 6, 6), vec![Complex64::new(1.5, 0.01)]);
    let engine = Engine::builder().config(config).build().unwrap();
    let shape = Shape::sphere(6);

    let report = engine.run(&shape).unwrap();
    assert_eq!(report.orientations.len(), 1);
    let obs = report.orientations[0];

    assert!(obs.solver_converged, "CGNR did not converge within maxiter on S1");
    assert!(obs.c_ext.is_finite() && obs.c_abs.is_finite() && obs.c_sca.is_finite());
    assert!(obs.c_ext >= 0.0);
    assert!(obs.c_abs >= -1e-9, "absorption cross-section should not be meaningfully negative");
}

/// S2 (reduced): a coated sphere with a denser, absorbing core extincts more
/// than it absorbs alone — `Qext > Qabs` translates at fixed volume/k to
/// `Cext > Cabs`.
#[test]
fn s2_coated_sphere_extinction_exceeds_absorption() {
    let config = plane_wave_config((8, 8, 8), vec![Complex64::new(1.5, 0.02), Complex64::new(2.0, 0.05)]);
    let engine = Engine::builder().config(config).build().unwrap();
    let shape = Shape::coated_sphere(8, 0.5);

    let report = engine.run(&shape).unwrap();
    let obs = report.orientations[0];
    assert!(obs.c_ext.is_finite() && obs.c_abs.is_finite());
    assert!(obs.c_ext > obs.c_abs);
}

/// S4 (reduced): orientation-averaging a spherically symmetric shape must
/// reproduce the single-orientation cross-sections, since a sphere's
/// response has no orientation dependence to average over.
#[test]
fn s4_orientation_average_matches_fixed_orientation_for_a_sphere() {
    let mut fixed_config = plane_wave_config((6, 6, 6), vec![Complex64::new(1.5, 0.01)]);
    fixed_config.orientation = Orientation::Fixed { alpha_deg: 0.0, beta_deg: 0.0, gamma_deg: 0.0 };
    let fixed_engine = Engine::builder().config(fixed_config).build().unwrap();
    let shape = Shape::sphere(6);
    let fixed_report = fixed_engine.run(&shape).unwrap();
    let fixed_c_ext = fixed_report.orientations[0].c_ext;

    let mut avg_config = plane_wave_config((6, 6, 6), vec![Complex64::new(1.5, 0.01)]);
    avg_config.orientation = Orientation::Average { angle_file: None };
    let avg_engine = Engine::builder().config(avg_config).build().unwrap();
    let avg_report = avg_engine.run(&shape).unwrap();
    let averaged = avg_report.averaged.expect("orientation-average run must report an averaged observable");

    let rel_diff = (averaged.c_ext - fixed_c_ext).abs() / fixed_c_ext.abs().max(1e-300);
    assert!(
        rel_diff < 0.05,
        "orientation-averaged Cext ({}) should track the single-orientation value ({}) for a sphere",
        averaged.c_ext,
        fixed_c_ext
    );
}

/// The `prognose` dry run sizes the grid/D-matrix without ever building a
/// tensor component or invoking a solver — used here to sanity-check the
/// reported dipole count against a known sphere rasterization size.
#[test]
fn prognose_sizes_without_solving() {
    let config = plane_wave_config((10, 10, 10), vec![Complex64::new(1.5, 0.0)]);
    let engine = Engine::builder().config(config).build().unwrap();
    let shape = Shape::sphere(10);
    let report = engine.prognose(&shape).unwrap();
    assert_eq!(report.n_sites, shape.sites.len());
    assert!(report.dmatrix_bytes > 0);
}
