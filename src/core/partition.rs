//! 1-D slab decomposition of the doubled grid, z-partitioned before the
//! block-transpose and x-partitioned after it (§3 "Partition", §4.1).

use crate::core::grid::GridDims;
use crate::log::RunLog;

#[derive(Debug, Clone, Copy)]
pub struct Partition {
    pub rank: usize,
    pub nprocs: usize,

    /// Doubled-grid z-range owned by this worker, `[local_z0, local_z1)`,
    /// a contiguous block of `gridZ/(2*nprocs)` planes.
    pub local_z0: usize,
    pub local_z1: usize,
    pub local_nz: usize,
    /// `local_z1` clamped at `boxZ`: the physical (non-padding) extent.
    pub local_z1_coer: usize,

    /// x-range owned by this worker once the layout is x-partitioned
    /// (after the first block-transpose), a contiguous block of
    /// `gridX/nprocs` planes.
    pub local_x0: usize,
    pub local_x1: usize,
    pub local_nx: usize,
}

impl Partition {
    pub fn new(rank: usize, nprocs: usize, grid: &GridDims, box_z: usize, log: &dyn RunLog) -> Self {
        let half_z = grid.grid_z / 2;
        let unit_z = half_z / nprocs;
        let local_z0 = rank * unit_z;
        let local_z1 = if rank + 1 == nprocs { half_z } else { (rank + 1) * unit_z };
        let local_z1_coer = local_z1.min(box_z);

        let unit_x = grid.grid_x / nprocs;
        let local_x0 = rank * unit_x;
        let local_x1 = if rank + 1 == nprocs { grid.grid_x } else { (rank + 1) * unit_x };

        if local_z1_coer <= local_z0 {
            // Empty slab: not fatal, this worker still participates in
            // every collective with zero-length local contributions (§4.1).
            log.warn(&format!(
                "worker {rank}/{nprocs}: empty z-slab [{local_z0},{local_z1}) (box_z={box_z})"
            ));
        }

        Partition {
            rank,
            nprocs,
            local_z0,
            local_z1,
            local_nz: local_z1 - local_z0,
            local_z1_coer,
            local_x0,
            local_x1,
            local_nx: local_x1 - local_x0,
        }
    }

    pub fn is_empty_slab(&self) -> bool {
        self.local_z1_coer <= self.local_z0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::grid::FftCapability;
    use crate::log::NullLog;

    #[test]
    fn partitions_tile_the_full_doubled_z_range() {
        let grid = GridDims::new((8, 8, 8), 4, FftCapability::Radix2357, &NullLog);
        let parts: Vec<_> = (0..4)
            .map(|r| Partition::new(r, 4, &grid, 8, &NullLog))
            .collect();
        assert_eq!(parts[0].local_z0, 0);
        for w in parts.windows(2) {
            assert_eq!(w[0].local_z1, w[1].local_z0);
        }
        assert_eq!(parts.last().unwrap().local_z1, grid.grid_z / 2);
    }

    #[test]
    fn single_worker_owns_everything() {
        let grid = GridDims::new((4, 4, 4), 1, FftCapability::Radix2357, &NullLog);
        let p = Partition::new(0, 1, &grid, 4, &NullLog);
        assert_eq!(p.local_z0, 0);
        assert_eq!(p.local_z1, grid.grid_z / 2);
        assert_eq!(p.local_x0, 0);
        assert_eq!(p.local_x1, grid.grid_x);
    }
}
