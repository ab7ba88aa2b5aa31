//! C7: the communication backend. Abstracts over the handful of collective
//! operations the rest of the engine needs — broadcast, reductions, and the
//! block-transpose that shuttles data between the x-local and z-local
//! decompositions of the FFT grid (§4.4, §9) — behind a trait, so the engine
//! runs identically on a single process or across an MPI ring.

pub mod single;

#[cfg(feature = "mpi")]
pub mod mpi_backend;

use num_complex::Complex64;

/// Ring position of the partner process for a given transmission round, or
/// `nprocs` if this process sits out that round (odd `nprocs` only). Mirrors
/// `CalcPartner` from the reference implementation's communication module:
/// self-inverse (`f(tran, f(tran, rank)) == rank`) and exhaustive (as
/// `tran` ranges over `1..=n_transmissions`, the partner visits every other
/// rank exactly once).
pub fn calc_partner(rank: usize, nprocs: usize, n_transmissions: usize, tran: usize) -> usize {
    if rank == 0 {
        tran
    } else if rank == tran {
        0
    } else {
        let rank = rank as i64;
        let tran = tran as i64;
        let n = n_transmissions as i64;
        let mut part = 2 * tran - rank;
        if part <= 0 {
            part += n;
        } else if part > n {
            part -= n;
        }
        part as usize
    }
}

/// Number of transmission rounds a ring block-transpose needs to visit every
/// other rank exactly once: `nprocs` for odd `nprocs` (no self-pairing
/// needed beyond rank 0), `nprocs - 1` for even `nprocs` (rank 0 pairs with
/// every other rank across `nprocs - 1` rounds, remaining ranks self-inverse
/// pair up).
pub fn n_transmissions(nprocs: usize) -> usize {
    if nprocs <= 1 {
        0
    } else if nprocs % 2 == 1 {
        nprocs
    } else {
        nprocs - 1
    }
}

/// Collective operations needed by the solver loop and the D-matrix/matvec
/// pipeline. All reductions are over `f64`/`Complex64` slices; the engine
/// never needs to reduce anything larger than a local field array.
pub trait CommBackend: Send + Sync {
    fn rank(&self) -> usize;
    fn nprocs(&self) -> usize;

    fn barrier(&self);

    /// Broadcasts `buf` from `root` to all ranks, in place.
    fn broadcast_ints(&self, buf: &mut [i64], root: usize);

    /// Sums `local` across all ranks and returns the result to every rank
    /// (all-reduce, not reduce-to-root: both the solver's inner products and
    /// the orientation-averaging accumulation need the sum everywhere).
    fn all_reduce_sum_f64(&self, local: f64) -> f64;
    fn all_reduce_sum_c64(&self, local: Complex64) -> Complex64;

    /// Elementwise sum-across-ranks of equal-length vectors, e.g. combining
    /// per-process partial fields before evaluating observables.
    fn all_reduce_sum_vec(&self, local: &[f64]) -> Vec<f64>;

    /// Sums `local` on rank 0 and also returns the max across ranks there;
    /// non-root ranks receive the same pair (mirrors `AccumulateMax`, used
    /// for residual-norm bookkeeping in the solvers).
    fn accumulate_max(&self, local: f64) -> (f64, f64);

    /// The ring block-transpose (§4.4/§9): `data` holds a flattened
    /// `(x_extent, mid, z_extent)` array in this process's current
    /// decomposition; after the call it holds the same logical array
    /// reassembled in the complementary decomposition. `scatter` names which
    /// axis goes from "every rank holds the full extent" to "every rank
    /// holds only its own `local_nx`/`local_nz` slice" in this call — the
    /// other axis goes the opposite way, gathered from every rank's
    /// contribution. `local_nx`/`local_nz` are this process's extent along
    /// each axis in the TARGET decomposition, and must be the same value
    /// every rank computed for its own slab via `core::partition`'s split
    /// rule — `GridDims::fit` (C1) guarantees that split is always uniform,
    /// so implementations are entitled to assume every rank's `local_nx`/
    /// `local_nz` agree, and may derive `mid` from `data.len()`. A
    /// single-process backend is a no-op.
    fn block_transpose(&self, data: &mut Vec<Complex64>, local_nx: usize, local_nz: usize, scatter: TransposeAxis);
}

/// Which axis is being scattered (full extent -> this rank's local slice) in
/// a `block_transpose` call; the other axis is simultaneously gathered (this
/// rank's local slice -> full extent, assembled from every rank).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransposeAxis {
    X,
    Z,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calc_partner_is_self_inverse() {
        for nprocs in 2..9 {
            let n = n_transmissions(nprocs);
            for rank in 0..nprocs {
                for tran in 1..=n {
                    let part = calc_partner(rank, nprocs, n, tran);
                    if part != nprocs {
                        let back = calc_partner(part, nprocs, n, tran);
                        assert_eq!(back, rank, "nprocs={nprocs} rank={rank} tran={tran}");
                    }
                }
            }
        }
    }

    #[test]
    fn calc_partner_visits_every_other_rank() {
        for nprocs in 2..9 {
            let n = n_transmissions(nprocs);
            for rank in 0..nprocs {
                let mut seen = std::collections::HashSet::new();
                for tran in 1..=n {
                    let part = calc_partner(rank, nprocs, n, tran);
                    if part != nprocs {
                        seen.insert(part);
                    }
                }
                let expected: std::collections::HashSet<_> = (0..nprocs).filter(|&p| p != rank).collect();
                assert_eq!(seen, expected, "nprocs={nprocs} rank={rank}");
            }
        }
    }
}
