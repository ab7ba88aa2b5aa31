//! The default, dependency-free backend: one rank, every collective is
//! either a no-op or an identity reduction. Used whenever the crate is
//! built without the `mpi` feature, and in every test.

use super::{CommBackend, TransposeAxis};
use num_complex::Complex64;

pub struct SingleProcess;

impl CommBackend for SingleProcess {
    fn rank(&self) -> usize {
        0
    }

    fn nprocs(&self) -> usize {
        1
    }

    fn barrier(&self) {}

    fn broadcast_ints(&self, _buf: &mut [i64], _root: usize) {}

    fn all_reduce_sum_f64(&self, local: f64) -> f64 {
        local
    }

    fn all_reduce_sum_c64(&self, local: Complex64) -> Complex64 {
        local
    }

    fn all_reduce_sum_vec(&self, local: &[f64]) -> Vec<f64> {
        local.to_vec()
    }

    fn accumulate_max(&self, local: f64) -> (f64, f64) {
        (local, local)
    }

    fn block_transpose(&self, _data: &mut Vec<Complex64>, _local_nx: usize, _local_nz: usize, _scatter: TransposeAxis) {}
}
