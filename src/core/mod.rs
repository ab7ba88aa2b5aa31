//! C1: grid sizing and the 1-D processor decomposition of the doubled lattice.

pub mod grid;
pub mod partition;

pub use grid::{fit, FftCapability, GridDims};
pub use partition::Partition;
