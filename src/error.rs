//! Error kinds per the core's failure taxonomy: configuration and validation
//! errors abort before any collective runs, resource errors abort globally,
//! convergence/numeric warnings are logged and carried to the end.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("both 'dpl' and 'size' were set; exactly one must be")]
    DplAndSizeBothSet,
    #[error("neither 'dpl' nor 'size' was set")]
    DplOrSizeMissing,
    #[error("'prop' cannot be combined with orientation averaging")]
    PropWithOrientationAverage,
    #[error("unknown iterative solver '{0}'")]
    UnknownSolver(String),
    #[error("unknown interaction prescription '{0}'")]
    UnknownInteraction(String),
    #[error("unknown polarizability prescription '{0}'")]
    UnknownPolarizability(String),
    #[error("unknown scattered-field formula '{0}'")]
    UnknownScatFormula(String),
    #[error("material index {0} out of range (Nmat={1})")]
    MaterialIndexOutOfRange(usize, usize),
}

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("negative geometry coordinate at line {0}")]
    NegativeCoordinate(usize),
    #[error("propagation vector is not unit norm (|prop|={0})")]
    NonUnitPropagation(f64),
    #[error("malformed geometry line {0}: {1}")]
    MalformedGeometryLine(usize, String),
    #[error("empty geometry: no occupied dipoles")]
    EmptyGeometry,
    #[error("refractive index list has {0} entries but Nmat={1}")]
    RefractiveIndexCountMismatch(usize, usize),
}

#[derive(Error, Debug)]
pub enum ResourceError {
    #[error("allocation size overflow while sizing {what} ({detail})")]
    SizeOverflow { what: &'static str, detail: String },
    #[error("allocation of {bytes} bytes for {what} exceeds configured ceiling of {ceiling} bytes")]
    CeilingExceeded { what: &'static str, bytes: u64, ceiling: u64 },
}

#[derive(Error, Debug)]
pub enum CommError {
    #[error("partner send/recv failed in round {round} with partner {partner}")]
    PartnerExchangeFailed { round: usize, partner: usize },
    #[error("collective called with mismatched buffer length: expected {expected}, got {got}")]
    LengthMismatch { expected: usize, got: usize },
}

/// Non-fatal outcomes that are logged and accumulated rather than aborting the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Warning {
    SolverDidNotConverge,
    RombergInnerNotConverged,
    InteractionTableTruncated,
}

/// Top-level error a fatal run condition surfaces as, gathering the kinds above
/// plus the `anisotropic material in SO prescription` hard error from §4.2.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Resource(#[from] ResourceError),
    #[error(transparent)]
    Comm(#[from] CommError),
    #[error("second-order interaction prescription requires an isotropic material, material {0} is anisotropic")]
    AnisotropicMaterialWithSecondOrder(usize),
    #[error("solver breakdown: {0}")]
    Breakdown(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
